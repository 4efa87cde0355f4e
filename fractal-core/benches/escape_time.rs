use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fractal_core::{escape_time, evaluate_pixel, EngineConfig, KernelParams};

fn bench_escape_time(c: &mut Criterion) {
    let mut group = c.benchmark_group("escape_time");
    for budget in [100_u32, 1_000, 10_000] {
        group.bench_with_input(BenchmarkId::new("interior", budget), &budget, |b, &budget| {
            b.iter(|| escape_time(black_box(-0.1), black_box(0.1), budget));
        });
        group.bench_with_input(BenchmarkId::new("boundary", budget), &budget, |b, &budget| {
            b.iter(|| escape_time(black_box(-0.743_643_887), black_box(0.131_825_904), budget));
        });
    }
    group.finish();
}

fn bench_row(c: &mut Criterion) {
    let config = EngineConfig::default();
    let view = config.view(-0.5, 0.0, 1.0);
    let params = KernelParams::new(&config.grid, &config.viewport, &view, 256);
    let y = config.grid.height / 2;
    c.bench_function("evaluate_pixel_row", |b| {
        b.iter(|| {
            (0..params.width)
                .map(|x| evaluate_pixel(x, black_box(y), &params))
                .sum::<u32>()
        });
    });
}

criterion_group!(benches, bench_escape_time, bench_row);
criterion_main!(benches);
