//! Request orchestration: one `generate` call from view to iteration array.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fractal_core::{
    ComplexBounds, ConfigError, EngineConfig, IterationBudgetPolicy, KernelParams, ViewState,
};
use log::{debug, info, warn};

use crate::accelerator::AcceleratorManager;
use crate::backend::{AcceleratorIdentity, ComputeBackend, DeviceBuffer};
use crate::error::{EngineError, GpuError};
use crate::kernel_registry::KernelRegistry;
use crate::response::{DeviceInfo, FailureResponse, GenerateResponse, SuccessResponse};
use crate::shader::{KernelSpec, DEFAULT_WORKGROUP_SIZE};
use crate::wgpu_backend::WgpuBackend;

/// A successful request.
#[derive(Debug, Clone)]
pub struct GenerateSuccess {
    /// Row-major escape counts, one per pixel.
    pub data: Vec<u32>,
    pub bounds: ComplexBounds,
    /// The view after zoom clamping.
    pub view: ViewState,
    pub budget: u32,
    pub accelerator: AcceleratorIdentity,
    pub elapsed: Duration,
}

/// A failed request. The budget is still reported.
#[derive(Debug)]
pub struct GenerateFailure {
    pub error: EngineError,
    pub budget: u32,
}

#[derive(Debug)]
pub enum GenerateOutcome {
    Success(GenerateSuccess),
    Failure(GenerateFailure),
}

impl GenerateOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub const fn budget(&self) -> u32 {
        match self {
            Self::Success(s) => s.budget,
            Self::Failure(f) => f.budget,
        }
    }

    /// Converts into the serialized caller-facing shape.
    #[must_use]
    pub fn into_response(self) -> GenerateResponse {
        match self {
            Self::Success(s) => GenerateResponse::Success(SuccessResponse {
                max_iterations: s.budget,
                compute_time_ms: u64::try_from(s.elapsed.as_millis()).unwrap_or(u64::MAX),
                accelerator_type: s.accelerator.class,
                accelerator_name: s.accelerator.name,
                view_min_real: s.bounds.min_real,
                view_max_real: s.bounds.max_real,
                view_min_imaginary: s.bounds.min_imag,
                view_max_imaginary: s.bounds.max_imag,
                center_real: s.view.center_real,
                center_imaginary: s.view.center_imag,
                zoom: s.view.zoom,
                data: s.data,
            }),
            Self::Failure(f) => GenerateResponse::Failure(FailureResponse {
                error: f.error.to_string(),
                max_iterations: f.budget,
            }),
        }
    }
}

/// Releases the wrapped device buffer when dropped, whichever way the
/// request exits.
struct ScopedBuffer<T: DeviceBuffer>(T);

impl<T: DeviceBuffer> Deref for ScopedBuffer<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeviceBuffer> DerefMut for ScopedBuffer<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T: DeviceBuffer> Drop for ScopedBuffer<T> {
    fn drop(&mut self) {
        self.0.release();
    }
}

/// Computes escape-time arrays for views of the configured pixel grid.
///
/// The engine is `Send + Sync`; share it with `Arc` and call
/// [`generate`](Self::generate) from any thread. Requests on the same device
/// run one at a time.
#[derive(Debug)]
pub struct ComputeEngine<B: ComputeBackend = WgpuBackend> {
    manager: Arc<AcceleratorManager<B>>,
    registry: KernelRegistry<B>,
    config: EngineConfig,
    policy: IterationBudgetPolicy,
}

impl<B: ComputeBackend> ComputeEngine<B> {
    /// Builds an engine running the escape-time kernel specialized for the
    /// manager's device, and precompiles the kernel when a device is present.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` does not validate.
    pub fn new(manager: Arc<AcceleratorManager<B>>, config: EngineConfig) -> Result<Self, ConfigError> {
        let workgroup_size = manager
            .backend()
            .map_or(DEFAULT_WORKGROUP_SIZE, |backend| backend.preferred_workgroup_size());
        let spec = KernelSpec::escape_time().with_workgroup_size(workgroup_size);
        Self::with_kernel(manager, config, spec)
    }

    /// Like [`new`](Self::new) with an explicit kernel.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when `config` does not validate.
    pub fn with_kernel(
        manager: Arc<AcceleratorManager<B>>,
        config: EngineConfig,
        spec: KernelSpec,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let registry = KernelRegistry::<B>::new(spec);
        if let Some(backend) = manager.backend() {
            registry.warm_up(backend.as_ref());
        }
        info!(
            "Compute engine ready: {}x{} grid, budget {}..={}",
            config.grid.width,
            config.grid.height,
            config.budget.min_iterations(),
            config.budget.max_iterations
        );
        Ok(Self {
            policy: config.budget_policy(),
            manager,
            registry,
            config,
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn manager(&self) -> &Arc<AcceleratorManager<B>> {
        &self.manager
    }

    pub const fn registry(&self) -> &KernelRegistry<B> {
        &self.registry
    }

    pub fn device_info(&self) -> DeviceInfo {
        self.manager.device_info()
    }

    /// Generates the escape-time array at the configured default view.
    pub fn generate_default(&self) -> GenerateOutcome {
        let view = self.config.default_view;
        self.generate(view.center_real, view.center_imag, view.zoom)
    }

    /// Computes one iteration array.
    ///
    /// Never panics on device trouble: an unavailable accelerator, a kernel
    /// that cannot be built, a device error or a non-finite center all come
    /// back as [`GenerateOutcome::Failure`] with the budget that applied.
    pub fn generate(&self, center_real: f64, center_imag: f64, zoom: f64) -> GenerateOutcome {
        let view = self.config.view(center_real, center_imag, zoom);
        let budget = self.policy.budget(view.zoom);
        debug!(
            "generate: center ({}, {}), zoom {} (requested {}), budget {}",
            view.center_real, view.center_imag, view.zoom, zoom, budget
        );

        match self.run(&view, budget) {
            Ok(success) => {
                debug!(
                    "generate: {} pixels in {:?}",
                    success.data.len(),
                    success.elapsed
                );
                GenerateOutcome::Success(success)
            }
            Err(error) => {
                warn!("generate failed: {}", error);
                GenerateOutcome::Failure(GenerateFailure { error, budget })
            }
        }
    }

    fn run(&self, view: &ViewState, budget: u32) -> Result<GenerateSuccess, EngineError> {
        let backend = self
            .manager
            .backend()
            .ok_or_else(|| EngineError::DeviceUnavailable(self.manager.diagnostic()))?;
        if !view.has_finite_center() {
            return Err(EngineError::InvalidView(format!(
                "center ({}, {}) is not finite",
                view.center_real, view.center_imag
            )));
        }

        let start = Instant::now();
        let params = KernelParams::new(&self.config.grid, &self.config.viewport, view, budget);
        let bounds = params.bounds();
        let work_units = params.work_units();

        let _device = self.manager.lock_device();
        let mut buffer = ScopedBuffer(backend.allocate(work_units)?);
        let executable = match self.registry.try_get_precompiled() {
            Some(executable) => executable,
            None => self.registry.compile_on_demand(backend.as_ref())?,
        };
        backend.dispatch(&executable, &mut buffer, &params)?;
        backend.synchronize()?;
        let data = backend.copy_to_host(&mut buffer)?;
        drop(buffer);

        if data.len() != work_units {
            return Err(GpuError::BufferSizeMismatch(format!(
                "copied back {} entries, expected {}",
                data.len(),
                work_units
            ))
            .into());
        }

        Ok(GenerateSuccess {
            data,
            bounds,
            view: *view,
            budget,
            accelerator: backend.identity().clone(),
            elapsed: start.elapsed(),
        })
    }
}
