//! Progressive path tracer over a small analytic sphere scene lit by a
//! background image.
//!
//! `trace` follows one jittered path per pixel of the tile and leaves its
//! radiance, throughput and escape direction in a per-pixel state buffer;
//! `shade` resolves escaped paths against the background and writes the
//! sample. Samples are averaged by the render core.

use parameters::{ParamHandle, ParameterSpec, ParameterStore};
use render_protocol::{Extent, PassDescriptor, TechniqueDescriptor, TechniqueId};
use renderer::{
    AllocationError, ComputeProgram, ConstructionError, DispatchError, FrameContext, GpuBackend,
    PassStatus, Technique, storage_entry, uniform_entry,
};
use smallvec::smallvec;

use crate::assets::AssetLoader;
use crate::shared::RegionUniform;

pub const PATH_TRACER_ID: TechniqueId = TechniqueId::new("path_tracer");
pub const BACKGROUND_ASSET: &str = "background";

const TRACE_PASS: usize = 0;
const SHADE_PASS: usize = 1;
/// radiance, throughput and direction, one `vec4<f32>` each.
const PATH_STATE_BYTES: u64 = 48;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct TraceParamsGpu {
    camera_angle: f32,
    field_of_view: f32,
    bounces: u32,
    _padding: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ShadeParamsGpu {
    sky_size: [u32; 2],
    sky_intensity: f32,
    exposure: f32,
}

struct PathStates {
    extent: Extent,
    buffer: wgpu::Buffer,
}

pub struct PathTracerTechnique {
    descriptor: TechniqueDescriptor,
    trace: ComputeProgram,
    shade: ComputeProgram,
    camera_angle: ParamHandle<f64>,
    field_of_view: ParamHandle<f64>,
    bounces: ParamHandle<i64>,
    sky_intensity: ParamHandle<f64>,
    exposure: ParamHandle<f64>,
    sky: wgpu::Buffer,
    sky_size: Extent,
    states: Option<PathStates>,
}

impl PathTracerTechnique {
    pub fn new(
        backend: &GpuBackend,
        parameters: &mut ParameterStore,
        assets: &dyn AssetLoader,
    ) -> Result<Self, ConstructionError> {
        let background =
            assets
                .load_image_asset(BACKGROUND_ASSET)
                .map_err(|source| ConstructionError::Asset {
                    name: BACKGROUND_ASSET.to_owned(),
                    source: Box::new(source),
                })?;

        let camera_angle = parameters.register(
            ParameterSpec::new("Camera Angle", 30.0)
                .range(0.0, 360.0)
                .animatable(),
        )?;
        let field_of_view = parameters.register(
            ParameterSpec::new("Field of View", 50.0)
                .range(20.0, 100.0)
                .animatable(),
        )?;
        let bounces = parameters.register(ParameterSpec::new("Bounces", 4).range(1.0, 8.0))?;
        let sky_intensity = parameters.register(
            ParameterSpec::new("Sky Intensity", 1.0)
                .range(0.0, 4.0)
                .animatable(),
        )?;
        let exposure = parameters.register(ParameterSpec::new("Exposure", 1.0).range(0.1, 4.0))?;

        let trace = backend.create_compute_program(
            "techniques.path_tracer.trace",
            include_str!("path_trace.wgsl"),
            &[uniform_entry(0), uniform_entry(1), storage_entry(2, false)],
        )?;
        let shade = backend.create_compute_program(
            "techniques.path_tracer.shade",
            include_str!("path_shade.wgsl"),
            &[
                uniform_entry(0),
                uniform_entry(1),
                storage_entry(2, false),
                storage_entry(3, true),
                storage_entry(4, true),
            ],
        )?;
        let sky = backend.storage_buffer(
            "techniques.path_tracer.sky",
            bytemuck::cast_slice(&background.pixels),
        )?;

        Ok(Self {
            descriptor: TechniqueDescriptor {
                id: PATH_TRACER_ID,
                name: "Path Tracing",
                needs_accumulation: true,
                resolution_capped: true,
                passes: smallvec![
                    PassDescriptor::tile("path_tracer.trace"),
                    PassDescriptor::tile("path_tracer.shade"),
                ],
            },
            trace,
            shade,
            camera_angle,
            field_of_view,
            bounces,
            sky_intensity,
            exposure,
            sky,
            sky_size: Extent::new(background.width, background.height),
            states: None,
        })
    }

    fn states_for(&self, display: Extent) -> Result<&wgpu::Buffer, DispatchError> {
        match &self.states {
            Some(states) if states.extent == display => Ok(&states.buffer),
            _ => Err(DispatchError::MissingResource("path_tracer.states")),
        }
    }
}

impl Technique<GpuBackend> for PathTracerTechnique {
    fn descriptor(&self) -> &TechniqueDescriptor {
        &self.descriptor
    }

    fn encode_pass(
        &mut self,
        backend: &GpuBackend,
        encoder: &mut wgpu::CommandEncoder,
        pass_index: usize,
        pass: &PassDescriptor,
        frame: &FrameContext<'_, GpuBackend>,
    ) -> Result<PassStatus, DispatchError> {
        let parameters = frame.parameters;
        let states = self.states_for(frame.display)?;
        let region = frame.dispatch_region(pass);
        let region_uniform = backend.uniform_buffer(
            "techniques.path_tracer.region",
            bytemuck::bytes_of(&RegionUniform::new(
                frame.display,
                region,
                frame.animation_frame,
                frame.accumulation.passes_completed,
            )),
        );

        match pass_index {
            TRACE_PASS => {
                let params = backend.uniform_buffer(
                    "techniques.path_tracer.trace.params",
                    bytemuck::bytes_of(&TraceParamsGpu {
                        camera_angle: parameters.get(self.camera_angle)?.to_radians() as f32,
                        field_of_view: parameters.get(self.field_of_view)?.to_radians() as f32,
                        bounces: parameters.get(self.bounces)?.clamp(1, 64) as u32,
                        _padding: 0,
                    }),
                );
                self.trace.encode(
                    backend.device(),
                    encoder,
                    &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: region_uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: params.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: states.as_entire_binding(),
                        },
                    ],
                    region,
                );
            }
            SHADE_PASS => {
                let params = backend.uniform_buffer(
                    "techniques.path_tracer.shade.params",
                    bytemuck::bytes_of(&ShadeParamsGpu {
                        sky_size: [self.sky_size.width, self.sky_size.height],
                        sky_intensity: parameters.get(self.sky_intensity)? as f32,
                        exposure: parameters.get(self.exposure)? as f32,
                    }),
                );
                self.shade.encode(
                    backend.device(),
                    encoder,
                    &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: region_uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: params.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: frame.target.binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: states.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: self.sky.as_entire_binding(),
                        },
                    ],
                    region,
                );
            }
            _ => return Err(DispatchError::UnknownPass { label: pass.label }),
        }
        Ok(PassStatus::Encoded)
    }

    fn resize(&mut self, backend: &GpuBackend, display: Extent) -> Result<(), AllocationError> {
        if self.states.as_ref().is_some_and(|states| states.extent == display) {
            return Ok(());
        }
        self.states = None;
        let buffer = backend.scratch_buffer(
            "techniques.path_tracer.states",
            display.pixel_count() * PATH_STATE_BYTES,
        )?;
        self.states = Some(PathStates {
            extent: display,
            buffer,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<TraceParamsGpu>(), 16);
        assert_eq!(std::mem::size_of::<ShadeParamsGpu>(), 16);
    }
}
