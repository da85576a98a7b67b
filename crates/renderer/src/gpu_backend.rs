//! wgpu implementation of [`RenderBackend`].
//!
//! Frame buffers are storage buffers of `vec4<f32>` at display resolution, so
//! accumulation can read the settled image and update the sample in one
//! compute dispatch and readback needs no row padding.

use render_protocol::{Extent, FrameBufferDesc, StorageClass, TileRegion};
use wgpu::util::DeviceExt;

use crate::backend::{ReadbackCallback, ReadbackError, RenderBackend, SubmitCallback};
use crate::errors::{AllocationError, ConstructionError, DispatchError};

pub const COMPUTE_WORKGROUP_SIZE: u32 = 8;

#[derive(Debug, Clone)]
pub struct GpuImage {
    buffer: wgpu::Buffer,
    extent: Extent,
    label: &'static str,
}

impl GpuImage {
    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }

    pub fn extent(&self) -> Extent {
        self.extent
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn binding(&self) -> wgpu::BindingResource<'_> {
        self.buffer.as_entire_binding()
    }
}

pub struct GpuReadback {
    staging: wgpu::Buffer,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct AverageParamsGpu {
    width: u32,
    height: u32,
    passes_completed: u32,
    _padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct PresentParamsGpu {
    width: u32,
    height: u32,
    _padding: [u32; 2],
}

/// A compute pipeline and the layout of its single bind group.
pub struct ComputeProgram {
    label: &'static str,
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,
}

impl ComputeProgram {
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Dispatches `main` over `region` with one invocation per pixel.
    pub fn encode(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        entries: &[wgpu::BindGroupEntry<'_>],
        region: TileRegion,
    ) {
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.label),
            layout: &self.bind_group_layout,
            entries,
        });
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some(self.label),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        let (groups_x, groups_y) = workgroups_for(region.extent());
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }
}

pub fn workgroups_for(extent: Extent) -> (u32, u32) {
    (
        extent.width.div_ceil(COMPUTE_WORKGROUP_SIZE),
        extent.height.div_ceil(COMPUTE_WORKGROUP_SIZE),
    )
}

pub fn uniform_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

pub struct GpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    average: ComputeProgram,
    present_layout: wgpu::BindGroupLayout,
    present_pipeline: wgpu::RenderPipeline,
}

impl GpuBackend {
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        present_format: wgpu::TextureFormat,
    ) -> Result<Self, ConstructionError> {
        let average = create_compute_program(
            &device,
            "renderer.average",
            include_str!("average.wgsl"),
            &[
                uniform_entry(0),
                storage_entry(1, true),
                storage_entry(2, false),
            ],
        )?;

        let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let present_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("renderer.present.bind_group_layout"),
            entries: &[uniform_entry(0), storage_entry(1, true)],
        });
        let present_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("renderer.present.pipeline_layout"),
                bind_group_layouts: &[&present_layout],
                immediate_size: 0,
            });
        let present_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("renderer.present.shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("present.wgsl").into()),
        });
        let present_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("renderer.present.pipeline"),
            layout: Some(&present_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &present_shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &present_shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: present_format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });
        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(ConstructionError::Pipeline {
                label: "renderer.present",
                reason: error.to_string(),
            });
        }

        Ok(Self {
            device,
            queue,
            average,
            present_layout,
            present_pipeline,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn create_compute_program(
        &self,
        label: &'static str,
        source: &str,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> Result<ComputeProgram, ConstructionError> {
        create_compute_program(&self.device, label, source, entries)
    }

    /// Uniform buffer initialised with `contents`. A fresh buffer per pass
    /// keeps passes of one submission from seeing each other's values.
    pub fn uniform_buffer(&self, label: &'static str, contents: &[u8]) -> wgpu::Buffer {
        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::UNIFORM,
            })
    }

    /// Storage buffer for technique-owned state such as a cell grid.
    pub fn storage_buffer(
        &self,
        label: &'static str,
        contents: &[u8],
    ) -> Result<wgpu::Buffer, AllocationError> {
        let bytes = contents.len() as u64;
        self.check_limit(label, bytes)?;
        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_DST
                    | wgpu::BufferUsages::COPY_SRC,
            });
        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(AllocationError::OutOfMemory {
                label,
                bytes,
                reason: error.to_string(),
            });
        }
        Ok(buffer)
    }

    /// Zero-filled storage buffer of `bytes` bytes.
    pub fn scratch_buffer(
        &self,
        label: &'static str,
        bytes: u64,
    ) -> Result<wgpu::Buffer, AllocationError> {
        self.check_limit(label, bytes)?;
        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: bytes.max(16),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(AllocationError::OutOfMemory {
                label,
                bytes,
                reason: error.to_string(),
            });
        }
        Ok(buffer)
    }

    fn check_limit(&self, label: &'static str, bytes: u64) -> Result<(), AllocationError> {
        let limits = self.device.limits();
        let limit = u64::from(limits.max_storage_buffer_binding_size).min(limits.max_buffer_size);
        if bytes > limit {
            return Err(AllocationError::ExceedsLimit {
                label,
                bytes,
                limit,
            });
        }
        Ok(())
    }
}

fn create_compute_program(
    device: &wgpu::Device,
    label: &'static str,
    source: &str,
    entries: &[wgpu::BindGroupLayoutEntry],
) -> Result<ComputeProgram, ConstructionError> {
    let error_scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
    let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries,
    });
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[&bind_group_layout],
        immediate_size: 0,
    });
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    });
    if let Some(error) = pollster::block_on(error_scope.pop()) {
        return Err(ConstructionError::Pipeline {
            label,
            reason: error.to_string(),
        });
    }
    Ok(ComputeProgram {
        label,
        bind_group_layout,
        pipeline,
    })
}

impl RenderBackend for GpuBackend {
    type Image = GpuImage;
    type Encoder = wgpu::CommandEncoder;
    type Readback = GpuReadback;
    type PresentTarget = wgpu::TextureView;

    fn allocate_image(&self, desc: &FrameBufferDesc) -> Result<GpuImage, AllocationError> {
        let bytes = desc.byte_len();
        self.check_limit(desc.label, bytes)?;
        let usage = match desc.storage {
            StorageClass::Private | StorageClass::Shared => {
                wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST
            }
            StorageClass::HostVisible => {
                wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST
            }
        };
        let error_scope = self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: bytes,
            usage,
            mapped_at_creation: false,
        });
        if let Some(error) = pollster::block_on(error_scope.pop()) {
            return Err(AllocationError::OutOfMemory {
                label: desc.label,
                bytes,
                reason: error.to_string(),
            });
        }
        Ok(GpuImage {
            buffer,
            extent: desc.extent,
            label: desc.label,
        })
    }

    fn create_encoder(&self, label: &'static str) -> wgpu::CommandEncoder {
        self.device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn encode_average(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        settled: &GpuImage,
        sample: &GpuImage,
        extent: Extent,
        passes_completed: u32,
    ) -> Result<(), DispatchError> {
        if settled.extent != extent || sample.extent != extent {
            return Err(DispatchError::MissingResource("renderer.average.extent"));
        }
        let params = self.uniform_buffer(
            "renderer.average.params",
            bytemuck::bytes_of(&AverageParamsGpu {
                width: extent.width,
                height: extent.height,
                passes_completed,
                _padding: 0,
            }),
        );
        self.average.encode(
            &self.device,
            encoder,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: settled.binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: sample.binding(),
                },
            ],
            TileRegion::full(extent),
        );
        Ok(())
    }

    fn encode_present(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        source: &GpuImage,
        extent: Extent,
        target: &wgpu::TextureView,
    ) {
        let params = self.uniform_buffer(
            "renderer.present.params",
            bytemuck::bytes_of(&PresentParamsGpu {
                width: extent.width,
                height: extent.height,
                _padding: [0; 2],
            }),
        );
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("renderer.present.bind_group"),
            layout: &self.present_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: source.binding(),
                },
            ],
        });
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("renderer.present"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.present_pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);
    }

    fn encode_clear(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("renderer.clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    fn encode_readback(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        image: &GpuImage,
        extent: Extent,
    ) -> GpuReadback {
        let size = FrameBufferDesc::render_target("renderer.readback", extent).byte_len();
        let staging = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("renderer.readback"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        encoder.copy_buffer_to_buffer(image.buffer(), 0, &staging, 0, size);
        GpuReadback { staging }
    }

    fn submit(
        &self,
        encoder: wgpu::CommandEncoder,
        readback: Option<(GpuReadback, ReadbackCallback)>,
        on_complete: SubmitCallback,
    ) {
        self.queue.submit(Some(encoder.finish()));
        self.queue.on_submitted_work_done(move || on_complete());
        let Some((readback, deliver)) = readback else {
            return;
        };
        let staging = readback.staging.clone();
        readback
            .staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let pixels = result
                    .map(|()| {
                        let mapped = staging.slice(..).get_mapped_range();
                        let pixels = bytemuck::pod_collect_to_vec::<u8, [f32; 4]>(&mapped);
                        drop(mapped);
                        staging.unmap();
                        pixels
                    })
                    .map_err(|error| ReadbackError(error.to_string()));
                deliver(pixels);
            });
    }

    fn poll_completions(&self) {
        if let Err(error) = self.device.poll(wgpu::PollType::Poll) {
            tracing::error!(%error, "device poll failed");
        }
    }

    fn wait_for_submissions(&self) {
        if let Err(error) = self.device.poll(wgpu::PollType::wait_indefinitely()) {
            tracing::error!(%error, "device wait failed");
        }
    }
}
