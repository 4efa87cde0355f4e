//! GPU-accelerated escape-time computation.
//!
//! [`AcceleratorManager`] discovers the device once, [`KernelRegistry`] owns
//! the compiled kernel and [`ComputeEngine`] turns a view request into a flat
//! iteration array.

pub mod accelerator;
pub mod backend;
pub mod buffers;
pub mod engine;
pub mod error;
pub mod kernel_registry;
pub mod response;
pub mod sequential;
pub mod shader;
pub mod wgpu_backend;

pub use accelerator::{AcceleratorManager, DEFAULT_DIAGNOSTIC};
pub use backend::{AcceleratorIdentity, ComputeBackend, DeviceBuffer};
pub use engine::{ComputeEngine, GenerateFailure, GenerateOutcome, GenerateSuccess};
pub use error::{CompilationError, EngineError, GpuError};
pub use kernel_registry::KernelRegistry;
pub use response::{DeviceInfo, FailureResponse, GenerateResponse, SuccessResponse};
pub use sequential::{SequentialBackend, SequentialBuffer};
pub use shader::{KernelSpec, DEFAULT_WORKGROUP_SIZE};
pub use wgpu_backend::WgpuBackend;
