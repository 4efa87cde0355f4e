//! Error types for accelerator, kernel and engine operations.

use thiserror::Error;

/// Device-level failures raised by a compute backend.
#[derive(Debug, Error)]
pub enum GpuError {
    #[error("No GPU-class adapter found ({adapters_seen} adapter(s) enumerated)")]
    AdapterNotFound { adapters_seen: usize },
    #[error("Adapter '{adapter}' lacks required feature {feature}")]
    MissingFeature {
        adapter: String,
        feature: &'static str,
    },
    #[error("GPU Device request failed: {0}")]
    DeviceRequestFailed(#[from] wgpu::RequestDeviceError),
    #[error("GPU out of memory: {0}")]
    OutOfMemory(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Kernel execution failed: {0}")]
    KernelExecution(String),
    #[error("Device synchronization failed: {0}")]
    Synchronization(String),
    #[error("Buffer mapping failed: {0}")]
    BufferMapping(String),
    #[error("Buffer size mismatch: {0}")]
    BufferSizeMismatch(String),
}

/// A kernel could not be built for the current device.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("Failed to compile kernel '{kernel}': {message}")]
pub struct CompilationError {
    pub kernel: String,
    pub message: String,
}

impl CompilationError {
    pub fn new(kernel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kernel: kernel.into(),
            message: message.into(),
        }
    }
}

/// Request-level failure reported by the compute engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No usable accelerator; carries the manager's diagnostic.
    #[error("Accelerator unavailable: {0}")]
    DeviceUnavailable(String),
    /// Both the eager and the on-demand kernel build failed.
    #[error(transparent)]
    Compilation(#[from] CompilationError),
    /// The device failed while allocating, dispatching, synchronizing or copying.
    #[error("Compute failed: {0}")]
    Compute(#[from] GpuError),
    #[error("Invalid view: {0}")]
    InvalidView(String),
}
