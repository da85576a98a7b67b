//! Escape-time rendering of the Julia and Mandelbrot sets.

use parameters::{ParamHandle, ParameterSpec, ParameterStore};
use render_protocol::{PassDescriptor, TechniqueDescriptor, TechniqueId};
use renderer::{
    ComputeProgram, ConstructionError, DispatchError, FrameContext, GpuBackend, PassStatus,
    Technique, storage_entry, uniform_entry,
};
use smallvec::smallvec;

use crate::shared::{RegionUniform, vector_f32};

pub const COMPLEX_ID: TechniqueId = TechniqueId::new("complex");

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ComplexParamsGpu {
    center: [f32; 2],
    c: [f32; 2],
    zoom: f32,
    iterations: u32,
    mandelbrot: u32,
    _padding: u32,
    colors: [[f32; 4]; 3],
}

pub struct ComplexTechnique {
    descriptor: TechniqueDescriptor,
    program: ComputeProgram,
    c: ParamHandle<[f64; 2]>,
    zoom: ParamHandle<f64>,
    center: ParamHandle<[f64; 2]>,
    iterations: ParamHandle<i64>,
    mandelbrot: ParamHandle<bool>,
    colors: [ParamHandle<[f32; 4]>; 3],
}

impl ComplexTechnique {
    pub fn new(
        backend: &GpuBackend,
        parameters: &mut ParameterStore,
    ) -> Result<Self, ConstructionError> {
        let c = parameters.register(ParameterSpec::new("C", [-0.8, 0.156]).range(-2.0, 2.0))?;
        let zoom = parameters.register(
            ParameterSpec::new("Zoom", 1.0)
                .range(0.1, 10_000.0)
                .animatable(),
        )?;
        let center = parameters.register(
            ParameterSpec::new("Center", [0.0, 0.0]).range(-99_999.0, 99_999.0),
        )?;
        let iterations =
            parameters.register(ParameterSpec::new("Iterations", 256).range(8.0, 4096.0))?;
        let mandelbrot = parameters.register(ParameterSpec::new("Mandelbrot", false))?;
        let colors = [
            parameters.register(ParameterSpec::new("Color 0", [0.02, 0.02, 0.12, 1.0]))?,
            parameters.register(ParameterSpec::new("Color 1", [0.9, 0.45, 0.1, 1.0]))?,
            parameters.register(ParameterSpec::new("Color 2", [1.0, 1.0, 0.85, 1.0]))?,
        ];
        let program = backend.create_compute_program(
            "techniques.complex",
            include_str!("complex.wgsl"),
            &[uniform_entry(0), uniform_entry(1), storage_entry(2, false)],
        )?;
        Ok(Self {
            descriptor: TechniqueDescriptor {
                id: COMPLEX_ID,
                name: "Complex Image Generator",
                needs_accumulation: false,
                resolution_capped: true,
                passes: smallvec![PassDescriptor::tile("complex.escape")],
            },
            program,
            c,
            zoom,
            center,
            iterations,
            mandelbrot,
            colors,
        })
    }

    fn params(&self, frame: &FrameContext<'_, GpuBackend>) -> Result<ComplexParamsGpu, DispatchError> {
        let parameters = frame.parameters;
        let mut colors = [[0.0; 4]; 3];
        for (color, handle) in colors.iter_mut().zip(self.colors) {
            *color = parameters.get(handle)?;
        }
        Ok(ComplexParamsGpu {
            center: vector_f32(parameters.get(self.center)?),
            c: vector_f32(parameters.get(self.c)?),
            zoom: parameters.get(self.zoom)? as f32,
            iterations: parameters.get(self.iterations)?.clamp(1, i64::from(u32::MAX)) as u32,
            mandelbrot: u32::from(parameters.get(self.mandelbrot)?),
            _padding: 0,
            colors,
        })
    }
}

impl Technique<GpuBackend> for ComplexTechnique {
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
            "techniques.complex.region",
            bytemuck::bytes_of(&RegionUniform::new(
                frame.display,
                region,
                frame.animation_frame,
                frame.accumulation.passes_completed,
            )),
        );
        let params = backend.uniform_buffer(
            "techniques.complex.params",
            bytemuck::bytes_of(&self.params(frame)?),
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
