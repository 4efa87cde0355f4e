// backend.rs - Compute Backend Abstraction Layer
//
// Separates the device-specific dispatch code from the engine's request
// orchestration, so the same engine drives a wgpu device or the sequential
// in-process loop.

use std::fmt::Debug;

use fractal_core::KernelParams;
use serde::Serialize;

use crate::error::{CompilationError, GpuError};
use crate::shader::KernelSpec;

/// Identity and capability descriptor of a compute device.
///
/// Capabilities the backend cannot report are `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceleratorIdentity {
    /// Human readable device name.
    pub name: String,
    /// Execution class of the device (API backend, e.g. "Vulkan").
    pub class: String,
    /// Physical device kind as reported by the driver.
    pub device_type: String,
    /// Upper bound on concurrently addressable invocations in one dispatch.
    pub max_threads: Option<u64>,
    /// Maximum invocations per workgroup.
    pub max_group_size: Option<u32>,
    /// Subgroup (warp) width.
    pub warp_size: Option<u32>,
    pub multiprocessor_count: Option<u32>,
}

/// A device allocation holding one result slot per pixel.
///
/// `release` frees the device memory; calling it twice is a no-op.
pub trait DeviceBuffer: Send + Debug {
    /// Number of `u32` slots in the buffer.
    fn len(&self) -> usize;

    /// Returns true if the buffer has no slots.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frees the device memory backing this buffer.
    fn release(&mut self);
}

/// Trait defining the operations the engine needs from a compute device.
pub trait ComputeBackend: Send + Sync + Debug + 'static {
    /// Result buffer type allocated on this device.
    type Buffer: DeviceBuffer;
    /// Compiled per-pixel executable.
    type Executable: Send + Sync + Debug;

    /// Identity of the device this backend drives.
    fn identity(&self) -> &AcceleratorIdentity;

    /// Workgroup size the kernel should be specialized for on this device.
    fn preferred_workgroup_size(&self) -> u32 {
        256
    }

    /// Builds an executable from a kernel spec.
    ///
    /// # Errors
    ///
    /// Returns a [`CompilationError`] when the device rejects the kernel.
    fn compile(&self, spec: &KernelSpec) -> Result<Self::Executable, CompilationError>;

    /// Allocates a result buffer with `len` slots.
    ///
    /// # Errors
    ///
    /// Returns a [`GpuError`] when the device cannot provide the memory.
    fn allocate(&self, len: usize) -> Result<Self::Buffer, GpuError>;

    /// Enqueues one work unit per slot of `buffer`.
    ///
    /// # Errors
    ///
    /// Returns a [`GpuError`] when the dispatch is rejected.
    fn dispatch(
        &self,
        executable: &Self::Executable,
        buffer: &mut Self::Buffer,
        params: &KernelParams,
    ) -> Result<(), GpuError>;

    /// Blocks until every dispatched work unit has completed.
    ///
    /// # Errors
    ///
    /// Returns a [`GpuError`] when the device reports a failure while waiting.
    fn synchronize(&self) -> Result<(), GpuError>;

    /// Copies the buffer contents into host memory.
    ///
    /// # Errors
    ///
    /// Returns a [`GpuError`] when the copy or mapping fails.
    fn copy_to_host(&self, buffer: &mut Self::Buffer) -> Result<Vec<u32>, GpuError>;
}
