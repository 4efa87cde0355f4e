use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use fractal_core::{evaluate_pixel, BudgetConfig, EngineConfig, KernelParams, PixelGrid};
use fractal_gpu::{
    AcceleratorIdentity, AcceleratorManager, CompilationError, ComputeBackend, ComputeEngine,
    DeviceBuffer, EngineError, GenerateOutcome, GenerateResponse, GpuError, KernelSpec,
    SequentialBackend,
};

fn setup_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_config() -> EngineConfig {
    EngineConfig {
        grid: PixelGrid::new(16, 12),
        budget: BudgetConfig {
            base_iterations: 100,
            max_iterations: 400,
            scaling_factor: 50.0,
        },
        ..EngineConfig::default()
    }
}

fn sequential_engine() -> ComputeEngine<SequentialBackend> {
    let manager = Arc::new(AcceleratorManager::from_backend(SequentialBackend::new()));
    ComputeEngine::new(manager, small_config()).unwrap()
}

// --- Fault-injecting backend ---

#[derive(Debug, Default)]
struct Faults {
    compile_failures_left: AtomicUsize,
    compile_attempts: AtomicUsize,
    fail_next_dispatch: AtomicBool,
    fail_next_sync: AtomicBool,
    truncate_next_copy: AtomicBool,
    allocations: AtomicUsize,
    releases: AtomicUsize,
    live_buffers: AtomicUsize,
    max_live_buffers: AtomicUsize,
}

#[derive(Debug)]
struct FaultyBuffer {
    data: Vec<u32>,
    faults: Arc<Faults>,
    released: bool,
}

impl DeviceBuffer for FaultyBuffer {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.faults.releases.fetch_add(1, Ordering::SeqCst);
            self.faults.live_buffers.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[derive(Debug)]
struct FaultyBackend {
    identity: AcceleratorIdentity,
    faults: Arc<Faults>,
}

impl FaultyBackend {
    fn new(faults: Arc<Faults>) -> Self {
        Self {
            identity: AcceleratorIdentity {
                name: "Faulty test device".to_string(),
                class: "Test".to_string(),
                device_type: "Other".to_string(),
                max_threads: None,
                max_group_size: None,
                warp_size: None,
                multiprocessor_count: None,
            },
            faults,
        }
    }
}

impl ComputeBackend for FaultyBackend {
    type Buffer = FaultyBuffer;
    type Executable = ();

    fn identity(&self) -> &AcceleratorIdentity {
        &self.identity
    }

    fn compile(&self, spec: &KernelSpec) -> Result<(), CompilationError> {
        self.faults.compile_attempts.fetch_add(1, Ordering::SeqCst);
        let left = self.faults.compile_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.faults
                .compile_failures_left
                .store(left - 1, Ordering::SeqCst);
            return Err(CompilationError::new(spec.label(), "injected compile failure"));
        }
        Ok(())
    }

    fn allocate(&self, len: usize) -> Result<FaultyBuffer, GpuError> {
        self.faults.allocations.fetch_add(1, Ordering::SeqCst);
        let live = self.faults.live_buffers.fetch_add(1, Ordering::SeqCst) + 1;
        self.faults.max_live_buffers.fetch_max(live, Ordering::SeqCst);
        Ok(FaultyBuffer {
            data: vec![0; len],
            faults: Arc::clone(&self.faults),
            released: false,
        })
    }

    fn dispatch(
        &self,
        _executable: &(),
        buffer: &mut FaultyBuffer,
        params: &KernelParams,
    ) -> Result<(), GpuError> {
        if self.faults.fail_next_dispatch.swap(false, Ordering::SeqCst) {
            return Err(GpuError::KernelExecution("injected dispatch failure".to_string()));
        }
        let grid = params.grid();
        for (i, slot) in buffer.data.iter_mut().enumerate() {
            let (x, y) = grid.coords(i).unwrap();
            *slot = evaluate_pixel(x, y, params);
        }
        // Widen the window in which overlapping requests could interleave.
        thread::yield_now();
        Ok(())
    }

    fn synchronize(&self) -> Result<(), GpuError> {
        if self.faults.fail_next_sync.swap(false, Ordering::SeqCst) {
            return Err(GpuError::Synchronization("injected sync failure".to_string()));
        }
        Ok(())
    }

    fn copy_to_host(&self, buffer: &mut FaultyBuffer) -> Result<Vec<u32>, GpuError> {
        let mut data = buffer.data.clone();
        if self.faults.truncate_next_copy.swap(false, Ordering::SeqCst) {
            data.pop();
        }
        Ok(data)
    }
}

fn faulty_engine(faults: &Arc<Faults>) -> ComputeEngine<FaultyBackend> {
    let manager = Arc::new(AcceleratorManager::from_backend(FaultyBackend::new(
        Arc::clone(faults),
    )));
    ComputeEngine::new(manager, small_config()).unwrap()
}

fn expect_success(outcome: GenerateOutcome) -> fractal_gpu::GenerateSuccess {
    match outcome {
        GenerateOutcome::Success(s) => s,
        GenerateOutcome::Failure(f) => panic!("unexpected failure: {}", f.error),
    }
}

fn expect_failure(outcome: GenerateOutcome) -> fractal_gpu::GenerateFailure {
    match outcome {
        GenerateOutcome::Failure(f) => f,
        GenerateOutcome::Success(_) => panic!("expected a failure"),
    }
}

// --- Tests ---

#[test]
fn unavailable_accelerator_reports_failure_with_budget() {
    setup_logger();
    let manager = Arc::new(AcceleratorManager::<SequentialBackend>::unavailable(
        "no GPU in this test",
    ));
    let engine = ComputeEngine::new(manager, small_config()).unwrap();

    let failure = expect_failure(engine.generate(-0.5, 0.0, 4.0));
    assert!(matches!(failure.error, EngineError::DeviceUnavailable(ref m) if m == "no GPU in this test"));
    // 100 + log2(4) * 50
    assert_eq!(failure.budget, 200);

    let value = serde_json::to_value(engine.generate(-0.5, 0.0, 1.0).into_response()).unwrap();
    assert_eq!(value["maxIterations"], 100);
    assert!(value["error"].as_str().unwrap().contains("no GPU in this test"));
    assert!(value.get("data").is_none());
}

#[test]
fn success_covers_every_pixel() {
    setup_logger();
    let engine = sequential_engine();
    let grid = engine.config().grid;

    let success = expect_success(engine.generate(-0.5, 0.0, 1.0));
    assert_eq!(success.data.len(), grid.len());
    assert!(success.data.iter().all(|&n| n <= success.budget));
    assert_eq!(success.budget, 100);
    assert_eq!(success.accelerator.name, "Sequential host loop");
}

#[test]
fn reported_bounds_match_requested_view() {
    let engine = sequential_engine();
    let success = expect_success(engine.generate(0.25, -0.1, 2.0));
    let viewport = engine.config().viewport;
    assert!((success.bounds.real_extent() - viewport.width / 2.0).abs() < 1e-12);
    assert!((success.bounds.imag_extent() - viewport.height / 2.0).abs() < 1e-12);
    assert!(((success.bounds.min_real + success.bounds.max_real) / 2.0 - 0.25).abs() < 1e-12);
}

#[test]
fn data_matches_reference_kernel() {
    let engine = sequential_engine();
    let success = expect_success(engine.generate(-0.75, 0.1, 3.0));
    let config = engine.config();
    let params = KernelParams::new(&config.grid, &config.viewport, &success.view, success.budget);
    for y in 0..config.grid.height {
        for x in 0..config.grid.width {
            let i = config.grid.index(x, y).unwrap();
            assert_eq!(success.data[i], evaluate_pixel(x, y, &params), "pixel ({x}, {y})");
        }
    }
}

#[test]
fn response_uses_post_clamp_view() {
    let engine = sequential_engine();
    let response = engine.generate(-0.5, 0.0, 1e20).into_response();
    let GenerateResponse::Success(success) = &response else {
        panic!("expected success");
    };
    assert!((success.zoom - 1e12).abs() < 1.0);
    assert_eq!(success.max_iterations, 400);
    assert_eq!(success.accelerator_type, "Sequential");

    let value = serde_json::to_value(&response).unwrap();
    for key in [
        "maxIterations",
        "data",
        "computeTimeMs",
        "acceleratorType",
        "acceleratorName",
        "viewMinReal",
        "viewMaxReal",
        "viewMinImaginary",
        "viewMaxImaginary",
        "centerReal",
        "centerImaginary",
        "zoom",
    ] {
        assert!(value.get(key).is_some(), "missing key {key}");
    }
    assert_eq!(value["data"].as_array().unwrap().len(), 16 * 12);
}

#[test]
fn explicit_kernel_is_built_once_at_construction() {
    let faults = Arc::new(Faults::default());
    let manager = Arc::new(AcceleratorManager::from_backend(FaultyBackend::new(
        Arc::clone(&faults),
    )));
    let spec = KernelSpec::escape_time().with_workgroup_size(8);
    let engine = ComputeEngine::with_kernel(manager, small_config(), spec).unwrap();

    assert!(engine.registry().try_get_precompiled().is_some());
    assert_eq!(faults.compile_attempts.load(Ordering::SeqCst), 1);

    // Requests reuse the eager build.
    expect_success(engine.generate(-0.5, 0.0, 1.0));
    expect_success(engine.generate(-0.5, 0.0, 2.0));
    assert_eq!(faults.compile_attempts.load(Ordering::SeqCst), 1);
}

#[test]
fn eager_failure_falls_back_to_on_demand_build() {
    setup_logger();
    let faults = Arc::new(Faults::default());
    faults.compile_failures_left.store(1, Ordering::SeqCst);
    let engine = faulty_engine(&faults);

    assert!(engine.registry().try_get_precompiled().is_none());
    assert_eq!(faults.compile_attempts.load(Ordering::SeqCst), 1);

    expect_success(engine.generate(-0.5, 0.0, 1.0));
    assert_eq!(faults.compile_attempts.load(Ordering::SeqCst), 2);

    // The on-demand build is cached.
    expect_success(engine.generate(-0.5, 0.0, 1.0));
    assert_eq!(faults.compile_attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn double_compile_failure_is_request_failure() {
    let faults = Arc::new(Faults::default());
    faults.compile_failures_left.store(2, Ordering::SeqCst);
    let engine = faulty_engine(&faults);

    let failure = expect_failure(engine.generate(-0.5, 0.0, 1.0));
    assert!(matches!(failure.error, EngineError::Compilation(_)));
    assert_eq!(failure.budget, 100);
    // The buffer acquired before the build attempt was still released.
    assert_eq!(
        faults.allocations.load(Ordering::SeqCst),
        faults.releases.load(Ordering::SeqCst)
    );

    // A later request builds successfully.
    expect_success(engine.generate(-0.5, 0.0, 1.0));
}

#[test]
fn compute_failures_release_buffer_and_engine_keeps_serving() {
    setup_logger();
    let faults = Arc::new(Faults::default());
    let engine = faulty_engine(&faults);

    faults.fail_next_dispatch.store(true, Ordering::SeqCst);
    let failure = expect_failure(engine.generate(-0.5, 0.0, 1.0));
    assert!(matches!(failure.error, EngineError::Compute(GpuError::KernelExecution(_))));

    faults.fail_next_sync.store(true, Ordering::SeqCst);
    let failure = expect_failure(engine.generate(-0.5, 0.0, 1.0));
    assert!(matches!(failure.error, EngineError::Compute(GpuError::Synchronization(_))));

    faults.truncate_next_copy.store(true, Ordering::SeqCst);
    let failure = expect_failure(engine.generate(-0.5, 0.0, 1.0));
    assert!(matches!(failure.error, EngineError::Compute(GpuError::BufferSizeMismatch(_))));

    let success = expect_success(engine.generate(-0.5, 0.0, 1.0));
    assert_eq!(success.data.len(), 16 * 12);

    assert_eq!(faults.allocations.load(Ordering::SeqCst), 4);
    assert_eq!(faults.releases.load(Ordering::SeqCst), 4);
    assert_eq!(faults.live_buffers.load(Ordering::SeqCst), 0);
}

#[test]
fn overlapping_requests_are_serialized_per_device() {
    setup_logger();
    let faults = Arc::new(Faults::default());
    let engine = Arc::new(faulty_engine(&faults));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let zoom = 1.0 + f64::from(i);
                expect_success(engine.generate(-0.5, 0.0, zoom)).data.len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 16 * 12);
    }
    assert_eq!(faults.max_live_buffers.load(Ordering::SeqCst), 1);
    assert_eq!(faults.releases.load(Ordering::SeqCst), 8);
}

#[test]
fn identical_requests_are_deterministic() {
    let engine = Arc::new(sequential_engine());
    let a = Arc::clone(&engine);
    let b = Arc::clone(&engine);
    let first = thread::spawn(move || expect_success(a.generate(-0.1, 0.65, 8.0)).data);
    let second = thread::spawn(move || expect_success(b.generate(-0.1, 0.65, 8.0)).data);
    assert_eq!(first.join().unwrap(), second.join().unwrap());
}

#[test]
fn device_info_reflects_manager() {
    let engine = sequential_engine();
    let info = engine.device_info();
    assert!(info.available);
    assert_eq!(info.device_type.as_deref(), Some("Sequential"));
}
