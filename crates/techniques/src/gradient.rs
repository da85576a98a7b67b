//! Capped tester: a UV gradient with a band sweeping across it over time.

use parameters::{ParamHandle, ParameterSpec, ParameterStore};
use render_protocol::{PassDescriptor, TechniqueDescriptor, TechniqueId};
use renderer::{
    ComputeProgram, ConstructionError, DispatchError, FrameContext, GpuBackend, PassStatus,
    Technique, storage_entry, uniform_entry,
};
use smallvec::smallvec;

use crate::shared::RegionUniform;

pub const GRADIENT_ID: TechniqueId = TechniqueId::new("gradient");

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GradientParamsGpu {
    band_color: [f32; 4],
    band_width: f32,
    speed: f32,
    _padding: [f32; 2],
}

pub struct GradientTechnique {
    descriptor: TechniqueDescriptor,
    program: ComputeProgram,
    band_color: ParamHandle<[f32; 4]>,
    band_width: ParamHandle<f64>,
    speed: ParamHandle<f64>,
}

impl GradientTechnique {
    pub fn new(
        backend: &GpuBackend,
        parameters: &mut ParameterStore,
    ) -> Result<Self, ConstructionError> {
        let band_color = parameters.register(ParameterSpec::new("Band Color", [1.0, 1.0, 1.0, 1.0]))?;
        let band_width = parameters.register(
            ParameterSpec::new("Band Width", 0.05)
                .range(0.001, 0.5)
                .animatable(),
        )?;
        let speed = parameters.register(
            ParameterSpec::new("Speed", 4.0)
                .range(0.0, 64.0)
                .animatable(),
        )?;
        let program = backend.create_compute_program(
            "techniques.gradient",
            include_str!("gradient.wgsl"),
            &[uniform_entry(0), uniform_entry(1), storage_entry(2, false)],
        )?;
        Ok(Self {
            descriptor: TechniqueDescriptor {
                id: GRADIENT_ID,
                name: "Gradient Tester",
                needs_accumulation: false,
                resolution_capped: true,
                passes: smallvec![PassDescriptor::tile("gradient.fill")],
            },
            program,
            band_color,
            band_width,
            speed,
        })
    }
}

impl Technique<GpuBackend> for GradientTechnique {
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
        if pass_index != 0 {
            return Err(DispatchError::UnknownPass { label: pass.label });
        }
        let region = frame.dispatch_region(pass);
        let region_uniform = backend.uniform_buffer(
            "techniques.gradient.region",
            bytemuck::bytes_of(&RegionUniform::new(
                frame.display,
                region,
                frame.animation_frame,
                frame.accumulation.passes_completed,
            )),
        );
        let params = backend.uniform_buffer(
            "techniques.gradient.params",
            bytemuck::bytes_of(&GradientParamsGpu {
                band_color: frame.parameters.get(self.band_color)?,
                band_width: frame.parameters.get(self.band_width)? as f32,
                speed: frame.parameters.get(self.speed)? as f32,
                _padding: [0.0; 2],
            }),
        );
        self.program.encode(
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
            ],
            region,
        );
        Ok(PassStatus::Encoded)
    }
}
