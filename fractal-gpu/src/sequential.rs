//! In-process backend that evaluates the pixel kernel in a plain loop.
//!
//! Never chosen by discovery. Tests construct it explicitly to drive the
//! engine without a device, and the GPU tests use it as the reference result.

use fractal_core::{evaluate_pixel, KernelParams, PixelKernel};
use log::trace;

use crate::backend::{AcceleratorIdentity, ComputeBackend, DeviceBuffer};
use crate::error::{CompilationError, GpuError};
use crate::shader::KernelSpec;

/// Host-memory result buffer.
#[derive(Debug, Default)]
pub struct SequentialBuffer {
    data: Vec<u32>,
    len: usize,
    released: bool,
}

impl SequentialBuffer {
    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl DeviceBuffer for SequentialBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn release(&mut self) {
        self.data = Vec::new();
        self.released = true;
    }
}

/// "Compiled" form of a kernel for the sequential backend.
#[derive(Debug, Clone, Copy)]
pub struct SequentialExecutable {
    kernel: PixelKernel,
}

#[derive(Debug)]
pub struct SequentialBackend {
    identity: AcceleratorIdentity,
    kernel: PixelKernel,
}

impl Default for SequentialBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SequentialBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::with_kernel(evaluate_pixel)
    }

    /// Uses `kernel` in place of the reference escape-time kernel.
    #[must_use]
    pub fn with_kernel(kernel: PixelKernel) -> Self {
        Self {
            identity: AcceleratorIdentity {
                name: "Sequential host loop".to_string(),
                class: "Sequential".to_string(),
                device_type: "Cpu".to_string(),
                max_threads: Some(1),
                max_group_size: Some(1),
                warp_size: None,
                multiprocessor_count: None,
            },
            kernel,
        }
    }
}

impl ComputeBackend for SequentialBackend {
    type Buffer = SequentialBuffer;
    type Executable = SequentialExecutable;

    fn identity(&self) -> &AcceleratorIdentity {
        &self.identity
    }

    fn preferred_workgroup_size(&self) -> u32 {
        1
    }

    fn compile(&self, spec: &KernelSpec) -> Result<SequentialExecutable, CompilationError> {
        if spec.source().trim().is_empty() {
            return Err(CompilationError::new(spec.label(), "kernel source is empty"));
        }
        Ok(SequentialExecutable {
            kernel: self.kernel,
        })
    }

    fn allocate(&self, len: usize) -> Result<SequentialBuffer, GpuError> {
        Ok(SequentialBuffer {
            data: vec![0; len],
            len,
            released: false,
        })
    }

    fn dispatch(
        &self,
        executable: &SequentialExecutable,
        buffer: &mut SequentialBuffer,
        params: &KernelParams,
    ) -> Result<(), GpuError> {
        if buffer.released || buffer.len != params.work_units() {
            return Err(GpuError::BufferSizeMismatch(format!(
                "result buffer holds {} slots, dispatch needs {}",
                buffer.len,
                params.work_units()
            )));
        }
        let grid = params.grid();
        for (index, slot) in buffer.data.iter_mut().enumerate() {
            // Every index is below `grid.len()`, so `coords` always resolves.
            if let Some((x, y)) = grid.coords(index) {
                *slot = (executable.kernel)(x, y, params);
            }
        }
        trace!("Sequential dispatch evaluated {} pixels", buffer.len);
        Ok(())
    }

    fn synchronize(&self) -> Result<(), GpuError> {
        Ok(())
    }

    fn copy_to_host(&self, buffer: &mut SequentialBuffer) -> Result<Vec<u32>, GpuError> {
        if buffer.released {
            return Err(GpuError::BufferMapping(
                "result buffer was released before copy-back".to_string(),
            ));
        }
        Ok(buffer.data.clone())
    }
}
