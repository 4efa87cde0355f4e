//! Command implementations.

use std::sync::Arc;

use anyhow::Result;
use fractal_core::EngineConfig;
use fractal_gpu::{AcceleratorManager, ComputeEngine, GenerateResponse, WgpuBackend};

use crate::benchmark::{self, BenchmarkPlan};
use crate::config::{BenchmarkArgs, GenerateArgs};
use crate::error::AppError;
use crate::output::write_json;

/// Discovery blocks on the device, so it runs on a blocking worker thread.
async fn discover() -> Result<Arc<AcceleratorManager<WgpuBackend>>, AppError> {
    let manager = tokio::task::spawn_blocking(AcceleratorManager::discover).await?;
    log::info!("{}", manager.status_message());
    Ok(Arc::new(manager))
}

async fn build_engine(config: EngineConfig) -> Result<Arc<ComputeEngine<WgpuBackend>>, AppError> {
    let manager = discover().await?;
    let engine = tokio::task::spawn_blocking(move || ComputeEngine::new(manager, config)).await??;
    Ok(Arc::new(engine))
}

pub async fn info() -> Result<()> {
    let manager = discover().await?;
    write_json(&manager.device_info(), None, true)
}

/// Writes the response, then reports a failed request as an error so the
/// process exits non-zero.
pub async fn generate(config: EngineConfig, args: GenerateArgs) -> Result<()> {
    let view = config.default_view;
    let center_real = args.center_real.unwrap_or(view.center_real);
    let center_imag = args.center_imag.unwrap_or(view.center_imag);
    let zoom = args.zoom.unwrap_or(view.zoom);

    let engine = build_engine(config).await?;
    let outcome = tokio::task::spawn_blocking(move || {
        engine.generate(center_real, center_imag, zoom)
    })
    .await
    .map_err(AppError::from)?;

    let response = outcome.into_response();
    write_json(&response, args.output.as_deref(), args.pretty)?;

    match response {
        GenerateResponse::Success(s) => {
            log::info!(
                "Generated {} pixels at zoom {} with budget {} in {} ms",
                s.data.len(),
                s.zoom,
                s.max_iterations,
                s.compute_time_ms
            );
            Ok(())
        }
        GenerateResponse::Failure(f) => Err(AppError::Generate(f.error).into()),
    }
}

pub async fn benchmark(config: EngineConfig, args: BenchmarkArgs) -> Result<()> {
    let engine = build_engine(config).await?;
    if !engine.manager().is_available() {
        log::warn!(
            "Benchmarking without an accelerator: {}",
            engine.manager().diagnostic()
        );
    }

    let plan = BenchmarkPlan {
        zooms: args.zooms,
        runs: args.runs,
        concurrency: args.concurrency,
        max_duration: args.max_duration,
    };
    let records = benchmark::run_benchmark(engine, &plan).await?;
    benchmark::print_summary(&benchmark::summarize(&records));

    if let Some(path) = args.csv_output {
        benchmark::write_records_to_csv(&records, &path)?;
        log::info!("Benchmark records written to {:?}", path);
    }
    Ok(())
}
