//! GPU buffer types and host transfer helpers for the wgpu backend.

use bytemuck::{Pod, Zeroable};
use fractal_core::KernelParams;
use log::{error, trace};
use wgpu::{BufferAsyncError, Device, MapMode, Queue};

use crate::backend::DeviceBuffer;
use crate::error::GpuError;

/// Uniform block passed to the escape-time kernel.
///
/// Layout must match `Params` in `shaders/escape_time.wgsl`: four `u32`
/// words followed by six `f64` words, 64 bytes in total.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GpuKernelParams {
    pub width: u32,
    pub height: u32,
    pub iteration_budget: u32,
    pub _pad0: u32,
    pub center_real: f64,
    pub center_imag: f64,
    pub zoom: f64,
    pub viewport_width: f64,
    pub viewport_height: f64,
    pub _pad1: f64,
}

impl From<&KernelParams> for GpuKernelParams {
    fn from(params: &KernelParams) -> Self {
        Self {
            width: params.width,
            height: params.height,
            iteration_budget: params.iteration_budget,
            _pad0: 0,
            center_real: params.center_real,
            center_imag: params.center_imag,
            zoom: params.zoom,
            viewport_width: params.viewport_width,
            viewport_height: params.viewport_height,
            _pad1: 0.0,
        }
    }
}

/// Device-side result storage plus the staging buffer used for copy-back.
#[derive(Debug)]
pub struct GpuResultBuffer {
    pub(crate) storage: wgpu::Buffer,
    pub(crate) staging: wgpu::Buffer,
    len: usize,
    released: bool,
}

impl GpuResultBuffer {
    /// Allocates storage and staging buffers for `len` result slots.
    pub fn new(device: &Device, len: usize) -> Self {
        let size = Self::byte_size(len);
        let storage = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Escape Counts"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Escape Counts Staging"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            storage,
            staging,
            len,
            released: false,
        }
    }

    /// Size in bytes of a buffer with `len` `u32` slots.
    #[must_use]
    pub const fn byte_size(len: usize) -> u64 {
        (len * std::mem::size_of::<u32>()) as u64
    }

    pub const fn is_released(&self) -> bool {
        self.released
    }
}

impl DeviceBuffer for GpuResultBuffer {
    fn len(&self) -> usize {
        self.len
    }

    fn release(&mut self) {
        if !self.released {
            self.storage.destroy();
            self.staging.destroy();
            self.released = true;
            trace!("Released result buffers ({} slots)", self.len);
        }
    }
}

impl Drop for GpuResultBuffer {
    fn drop(&mut self) {
        self.release();
    }
}

/// Copies `buffer_size` bytes of `source` into `staging`, maps the staging
/// buffer and returns its contents.
///
/// Blocks on the device until the copy and the map have completed.
pub fn download_buffer_data<T>(
    device: &Device,
    queue: &Queue,
    source: &wgpu::Buffer,
    staging: &wgpu::Buffer,
    buffer_size: u64,
    label: &str,
) -> Result<Vec<T>, GpuError>
where
    T: Pod + Send + 'static,
{
    if staging.size() < buffer_size || source.size() < buffer_size {
        return Err(GpuError::BufferSizeMismatch(format!(
            "Buffers for '{}' too small ({} / {} bytes) for download ({} bytes)",
            label,
            source.size(),
            staging.size(),
            buffer_size
        )));
    }

    trace!("Downloading {} bytes from buffer '{}'", buffer_size, label);

    // 1. Copy data from GPU buffer to staging buffer
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some(&format!("Download Encoder for {label}")),
    });
    encoder.copy_buffer_to_buffer(source, 0, staging, 0, buffer_size);
    queue.submit(Some(encoder.finish()));

    // 2. Map the staging buffer for reading
    let buffer_slice = staging.slice(..buffer_size);
    let (sender, receiver) = futures::channel::oneshot::channel();
    let closure_label = label.to_string();
    buffer_slice.map_async(MapMode::Read, move |result| {
        if let Err(e) = sender.send(result) {
            error!(
                "Failed to send map_async result for buffer '{}': {:?}",
                closure_label, e
            );
        }
    });

    // 3. Poll the device until the mapping is complete
    device
        .poll(wgpu::PollType::Wait)
        .map_err(|e| GpuError::Synchronization(format!("Polling for '{label}' failed: {e}")))?;

    // 4. Receive the mapping result
    let map_result: Result<(), BufferAsyncError> = match pollster::block_on(receiver) {
        Ok(result) => result,
        Err(e) => {
            error!("Failed to receive map_async result for buffer '{}': {}", label, e);
            return Err(GpuError::BufferMapping(format!(
                "Channel error receiving map result for {label}: {e}"
            )));
        }
    };
    if let Err(e) = map_result {
        error!("Failed to map buffer '{}' for reading: {}", label, e);
        return Err(GpuError::BufferMapping(format!(
            "Failed to map buffer '{label}': {e}"
        )));
    }

    // 5. Copy out while the view is alive, then unmap
    let data = {
        let view = buffer_slice.get_mapped_range();
        bytemuck::cast_slice::<u8, T>(&view).to_vec()
    };
    staging.unmap();
    trace!("Unmapped buffer '{}'", label);

    Ok(data)
}

/// Splits `work_units` invocations into a 2D workgroup grid that respects the
/// per-dimension dispatch limit.
///
/// Returns `(groups_x, groups_y)`. The kernel reconstructs the linear index as
/// `gid.y * groups_x * workgroup_size + gid.x`, and invocations past
/// `work_units` return early.
#[must_use]
pub fn dispatch_dimensions(work_units: u32, workgroup_size: u32, max_per_dimension: u32) -> (u32, u32) {
    let workgroup_size = workgroup_size.max(1);
    let max_per_dimension = max_per_dimension.max(1);
    let groups = work_units.div_ceil(workgroup_size);
    if groups <= max_per_dimension {
        (groups.max(1), 1)
    } else {
        (max_per_dimension, groups.div_ceil(max_per_dimension))
    }
}
