//! wgpu implementation of [`ComputeBackend`].

use std::sync::Arc;

use fractal_core::KernelParams;
use log::{debug, error, info, trace};
use wgpu::util::DeviceExt;

use crate::backend::{AcceleratorIdentity, ComputeBackend, DeviceBuffer};
use crate::buffers::{dispatch_dimensions, download_buffer_data, GpuKernelParams, GpuResultBuffer};
use crate::error::{CompilationError, GpuError};
use crate::shader::{KernelSpec, DEFAULT_WORKGROUP_SIZE};

/// Feature every selected adapter must support: the kernel computes in `f64`.
pub const REQUIRED_FEATURES: wgpu::Features = wgpu::Features::SHADER_F64;

/// Compiled escape-time pipeline and the layout its bind groups use.
#[derive(Debug)]
pub struct GpuExecutable {
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    workgroup_size: u32,
    fingerprint: u64,
}

impl GpuExecutable {
    pub const fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }
}

/// A wgpu device and queue selected by [`WgpuBackend::discover`].
#[derive(Debug)]
pub struct WgpuBackend {
    limits: wgpu::Limits,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    identity: AcceleratorIdentity,
}

/// Returns true for adapter kinds that count as general-purpose GPU
/// accelerators. Software rasterizers and host CPUs are excluded.
#[must_use]
pub const fn is_gpu_class(device_type: wgpu::DeviceType) -> bool {
    matches!(
        device_type,
        wgpu::DeviceType::DiscreteGpu | wgpu::DeviceType::IntegratedGpu | wgpu::DeviceType::VirtualGpu
    )
}

impl WgpuBackend {
    /// Enumerates adapters on every available backend, picks the first
    /// GPU-class adapter supporting [`REQUIRED_FEATURES`] and opens a device
    /// on it.
    ///
    /// # Errors
    ///
    /// Returns a [`GpuError`] describing why no device could be opened.
    pub fn discover() -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapters = instance.enumerate_adapters(wgpu::Backends::all());
        info!("Enumerated {} adapter(s)", adapters.len());

        let mut gpu_without_features = None;
        let mut selected = None;
        for adapter in adapters.iter() {
            let info = adapter.get_info();
            debug!(
                "Adapter '{}' ({:?}, {:?}), features: {:?}",
                info.name,
                info.device_type,
                info.backend,
                adapter.features()
            );
            if !is_gpu_class(info.device_type) {
                continue;
            }
            if !adapter.features().contains(REQUIRED_FEATURES) {
                gpu_without_features.get_or_insert(info.name);
                continue;
            }
            selected = Some(adapter);
            break;
        }

        let adapter = match (selected, gpu_without_features) {
            (Some(adapter), _) => adapter,
            (None, Some(adapter)) => {
                return Err(GpuError::MissingFeature {
                    adapter,
                    feature: "SHADER_F64",
                })
            }
            (None, None) => {
                return Err(GpuError::AdapterNotFound {
                    adapters_seen: adapters.len(),
                })
            }
        };

        let adapter_info = adapter.get_info();
        let limits = adapter.limits();
        info!("Adapter selected: {:?}", adapter_info);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("Fractal Compute Device"),
            required_features: REQUIRED_FEATURES,
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))?;
        info!("Device and queue obtained.");

        device.on_uncaptured_error(Box::new(|e| {
            error!("Uncaptured wgpu error: {}", e);
        }));

        let identity = identity_from(&adapter_info, &limits);
        Ok(Self {
            limits,
            device: Arc::new(device),
            queue: Arc::new(queue),
            identity,
        })
    }

    /// Runs `f` inside a validation and an out-of-memory error scope and
    /// converts any captured error.
    fn scoped<T>(&self, f: impl FnOnce() -> T) -> Result<T, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f();
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());
        if let Some(e) = out_of_memory {
            return Err(GpuError::OutOfMemory(e.to_string()));
        }
        if let Some(e) = validation {
            return Err(GpuError::Validation(e.to_string()));
        }
        Ok(value)
    }
}

fn identity_from(info: &wgpu::AdapterInfo, limits: &wgpu::Limits) -> AcceleratorIdentity {
    let max_group_size = limits.max_compute_invocations_per_workgroup;
    let max_threads =
        u64::from(max_group_size) * u64::from(limits.max_compute_workgroups_per_dimension);
    AcceleratorIdentity {
        name: info.name.clone(),
        class: format!("{:?}", info.backend),
        device_type: format!("{:?}", info.device_type),
        max_threads: Some(max_threads),
        max_group_size: Some(max_group_size),
        warp_size: (limits.max_subgroup_size > 0).then_some(limits.max_subgroup_size),
        // wgpu does not expose a multiprocessor count.
        multiprocessor_count: None,
    }
}

impl ComputeBackend for WgpuBackend {
    type Buffer = GpuResultBuffer;
    type Executable = GpuExecutable;

    fn identity(&self) -> &AcceleratorIdentity {
        &self.identity
    }

    fn preferred_workgroup_size(&self) -> u32 {
        DEFAULT_WORKGROUP_SIZE
            .min(self.limits.max_compute_invocations_per_workgroup)
            .min(self.limits.max_compute_workgroup_size_x)
            .max(1)
    }

    fn compile(&self, spec: &KernelSpec) -> Result<GpuExecutable, CompilationError> {
        let fingerprint = spec.fingerprint();
        let label = format!("{}_{:016x}", spec.label(), fingerprint);
        debug!("Compiling kernel '{}'", label);

        let build = || {
            let module = self
                .device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(&label),
                    source: wgpu::ShaderSource::Wgsl(spec.source().into()),
                });
            let bind_group_layout =
                self.device
                    .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                        label: Some("Escape Time Bind Group Layout"),
                        entries: &[
                            wgpu::BindGroupLayoutEntry {
                                binding: 0,
                                visibility: wgpu::ShaderStages::COMPUTE,
                                ty: wgpu::BindingType::Buffer {
                                    ty: wgpu::BufferBindingType::Uniform,
                                    has_dynamic_offset: false,
                                    min_binding_size: None,
                                },
                                count: None,
                            },
                            wgpu::BindGroupLayoutEntry {
                                binding: 1,
                                visibility: wgpu::ShaderStages::COMPUTE,
                                ty: wgpu::BindingType::Buffer {
                                    ty: wgpu::BufferBindingType::Storage { read_only: false },
                                    has_dynamic_offset: false,
                                    min_binding_size: None,
                                },
                                count: None,
                            },
                        ],
                    });
            let pipeline_layout =
                self.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("Escape Time Pipeline Layout"),
                        bind_group_layouts: &[&bind_group_layout],
                        push_constant_ranges: &[],
                    });
            let pipeline = self
                .device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some(&label),
                    layout: Some(&pipeline_layout),
                    module: &module,
                    entry_point: Some(spec.entry_point()),
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                    cache: None,
                });
            (pipeline, bind_group_layout)
        };

        let (pipeline, bind_group_layout) = self
            .scoped(build)
            .map_err(|e| CompilationError::new(spec.label(), e.to_string()))?;

        info!("Kernel '{}' compiled", label);
        Ok(GpuExecutable {
            pipeline,
            bind_group_layout,
            workgroup_size: spec.workgroup_size(),
            fingerprint,
        })
    }

    fn allocate(&self, len: usize) -> Result<GpuResultBuffer, GpuError> {
        let size = GpuResultBuffer::byte_size(len);
        let max_binding = u64::from(self.limits.max_storage_buffer_binding_size);
        if size > max_binding || size > self.limits.max_buffer_size {
            return Err(GpuError::OutOfMemory(format!(
                "{size} byte result buffer exceeds device limits ({max_binding} byte binding)"
            )));
        }
        trace!("Allocating result buffer: {} slots", len);
        self.scoped(|| GpuResultBuffer::new(&self.device, len))
    }

    fn dispatch(
        &self,
        executable: &GpuExecutable,
        buffer: &mut GpuResultBuffer,
        params: &KernelParams,
    ) -> Result<(), GpuError> {
        let work_units = params.work_units();
        if buffer.len() != work_units || buffer.is_released() {
            return Err(GpuError::BufferSizeMismatch(format!(
                "result buffer holds {} slots, dispatch needs {}",
                buffer.len(),
                work_units
            )));
        }
        let work_units = u32::try_from(work_units).map_err(|_| {
            GpuError::KernelExecution(format!("{work_units} work units exceed the index range"))
        })?;

        let (groups_x, groups_y) = dispatch_dimensions(
            work_units,
            executable.workgroup_size,
            self.limits.max_compute_workgroups_per_dimension,
        );
        debug!(
            "Dispatching {} work units as {}x{} workgroups of {}",
            work_units, groups_x, groups_y, executable.workgroup_size
        );

        self.scoped(|| {
            let uniform = GpuKernelParams::from(params);
            let params_buffer = self
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Escape Time Params"),
                    contents: bytemuck::bytes_of(&uniform),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
            let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Escape Time Bind Group"),
                layout: &executable.bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: params_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: buffer.storage.as_entire_binding(),
                    },
                ],
            });

            let mut encoder = self
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Escape Time Encoder"),
                });
            {
                let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                    label: Some("Escape Time Pass"),
                    timestamp_writes: None,
                });
                pass.set_pipeline(&executable.pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.dispatch_workgroups(groups_x, groups_y, 1);
            }
            self.queue.submit(Some(encoder.finish()));
        })
        .map_err(|e| GpuError::KernelExecution(e.to_string()))
    }

    fn synchronize(&self) -> Result<(), GpuError> {
        self.device
            .poll(wgpu::PollType::Wait)
            .map(|_| ())
            .map_err(|e| GpuError::Synchronization(e.to_string()))
    }

    fn copy_to_host(&self, buffer: &mut GpuResultBuffer) -> Result<Vec<u32>, GpuError> {
        if buffer.is_released() {
            return Err(GpuError::BufferMapping(
                "result buffer was released before copy-back".to_string(),
            ));
        }
        download_buffer_data::<u32>(
            &self.device,
            &self.queue,
            &buffer.storage,
            &buffer.staging,
            GpuResultBuffer::byte_size(buffer.len()),
            "Escape Counts",
        )
    }
}
