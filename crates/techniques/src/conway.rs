//! Conway's game of life on a cell grid independent of the display size.
//!
//! The grid lives in a pair of storage buffers stepped on the GPU
//! `Iterations Per Frame` times before the draw pass maps cells to pixels.
//! Seeding also runs on the GPU from a hashed seed.

use parameters::{ParamHandle, ParameterSpec, ParameterStore};
use render_protocol::{Extent, PassDescriptor, TechniqueDescriptor, TechniqueId, TileRegion};
use renderer::{
    AllocationError, ComputeProgram, ConstructionError, DispatchError, FrameContext, GpuBackend,
    PassStatus, Technique, storage_entry, uniform_entry,
};
use smallvec::smallvec;

use crate::shared::RegionUniform;

pub const CONWAY_ID: TechniqueId = TechniqueId::new("conway");

const STEP_PASS: usize = 0;
const DRAW_PASS: usize = 1;
const MODE_STEP: u32 = 0;
const MODE_SEED: u32 = 1;
const CELL_BYTES: u64 = std::mem::size_of::<i32>() as u64;

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct StepParamsGpu {
    cells: [u32; 2],
    seed: u32,
    mode: u32,
    spawn_probability: f32,
    _padding: [u32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct DrawParamsGpu {
    cells: [u32; 2],
    outline: u32,
    _padding: u32,
    background: [f32; 4],
    new_cell: [f32; 4],
    old_cell: [f32; 4],
    outline_color: [f32; 4],
}

struct CellGrid {
    extent: Extent,
    buffers: [wgpu::Buffer; 2],
    /// Buffer holding the latest generation.
    current: usize,
}

pub struct ConwayTechnique {
    descriptor: TechniqueDescriptor,
    step: ComputeProgram,
    draw: ComputeProgram,
    cell_count: ParamHandle<[f64; 2]>,
    spawn_probability: ParamHandle<f64>,
    outline: ParamHandle<bool>,
    iterations_per_frame: ParamHandle<i64>,
    background: ParamHandle<[f32; 4]>,
    new_cell: ParamHandle<[f32; 4]>,
    old_cell: ParamHandle<[f32; 4]>,
    outline_color: ParamHandle<[f32; 4]>,
    grid: CellGrid,
    /// Generation the step pass of this frame produced; committed by the draw
    /// pass so a dropped frame leaves the grid untouched.
    pending_current: Option<usize>,
    reseed: bool,
    seed: u32,
}

impl ConwayTechnique {
    pub fn new(
        backend: &GpuBackend,
        parameters: &mut ParameterStore,
    ) -> Result<Self, ConstructionError> {
        let cell_count =
            parameters.register(ParameterSpec::new("Cells", [512.0, 512.0]).range(50.0, 2048.0))?;
        let spawn_probability = parameters.register(
            ParameterSpec::new("Spawn Probability", 30.0)
                .range(1.0, 100.0)
                .animatable(),
        )?;
        let outline = parameters.register(ParameterSpec::new("Draw Outlines", false).display_only())?;
        let iterations_per_frame =
            parameters.register(ParameterSpec::new("Iterations Per Frame", 1).range(1.0, 10.0))?;
        let background = parameters.register(
            ParameterSpec::new("Background", [0.0, 0.0, 0.0, 1.0]).display_only(),
        )?;
        let new_cell =
            parameters.register(ParameterSpec::new("New Cell", [1.0, 0.0, 0.0, 1.0]).display_only())?;
        let old_cell =
            parameters.register(ParameterSpec::new("Old Cell", [0.0, 0.0, 1.0, 1.0]).display_only())?;
        let outline_color =
            parameters.register(ParameterSpec::new("Outline", [1.0, 1.0, 1.0, 1.0]).display_only())?;

        let step = backend.create_compute_program(
            "techniques.conway.step",
            include_str!("conway_step.wgsl"),
            &[uniform_entry(0), storage_entry(1, true), storage_entry(2, false)],
        )?;
        let draw = backend.create_compute_program(
            "techniques.conway.draw",
            include_str!("conway_draw.wgsl"),
            &[
                uniform_entry(0),
                uniform_entry(1),
                storage_entry(2, false),
                storage_entry(3, true),
            ],
        )?;
        let grid = allocate_grid(backend, grid_extent(parameters.get(cell_count)?))?;

        Ok(Self {
            descriptor: TechniqueDescriptor {
                id: CONWAY_ID,
                name: "Conway's Game of Life",
                needs_accumulation: false,
                resolution_capped: false,
                passes: smallvec![
                    PassDescriptor::display("conway.step"),
                    PassDescriptor::tile("conway.draw"),
                ],
            },
            step,
            draw,
            cell_count,
            spawn_probability,
            outline,
            iterations_per_frame,
            background,
            new_cell,
            old_cell,
            outline_color,
            grid,
            pending_current: None,
            reseed: true,
            seed: 0,
        })
    }

    fn encode_step(
        &mut self,
        backend: &GpuBackend,
        encoder: &mut wgpu::CommandEncoder,
        frame: &FrameContext<'_, GpuBackend>,
    ) -> Result<(), DispatchError> {
        let cells = frame.parameters.get(self.cell_count)?;
        if let Some(extent) = resized_grid(self.grid.extent, cells) {
            self.grid = allocate_grid(backend, extent)?;
            self.reseed = true;
            tracing::debug!(
                width = extent.width,
                height = extent.height,
                "conway grid resized"
            );
        }

        let spawn_probability = frame.parameters.get(self.spawn_probability)? as f32;
        let mut current = self.grid.current;
        if self.reseed {
            let seed = self.seed.wrapping_add(1);
            self.dispatch_step(backend, encoder, current, MODE_SEED, seed, spawn_probability);
            current = 1 - current;
        } else {
            let iterations = frame.parameters.get(self.iterations_per_frame)?.max(1);
            for _ in 0..iterations {
                self.dispatch_step(backend, encoder, current, MODE_STEP, self.seed, spawn_probability);
                current = 1 - current;
            }
        }
        self.pending_current = Some(current);
        Ok(())
    }

    fn dispatch_step(
        &self,
        backend: &GpuBackend,
        encoder: &mut wgpu::CommandEncoder,
        current: usize,
        mode: u32,
        seed: u32,
        spawn_probability: f32,
    ) {
        let extent = self.grid.extent;
        let params = backend.uniform_buffer(
            "techniques.conway.step.params",
            bytemuck::bytes_of(&StepParamsGpu {
                cells: [extent.width, extent.height],
                seed,
                mode,
                spawn_probability,
                _padding: [0; 3],
            }),
        );
        self.step.encode(
            backend.device(),
            encoder,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: self.grid.buffers[current].as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.grid.buffers[1 - current].as_entire_binding(),
                },
            ],
            TileRegion::full(extent),
        );
    }

    fn encode_draw(
        &mut self,
        backend: &GpuBackend,
        encoder: &mut wgpu::CommandEncoder,
        pass: &PassDescriptor,
        frame: &FrameContext<'_, GpuBackend>,
    ) -> Result<(), DispatchError> {
        let current = self
            .pending_current
            .take()
            .ok_or(DispatchError::MissingResource("conway.step"))?;
        let parameters = frame.parameters;
        let extent = self.grid.extent;
        let region = frame.dispatch_region(pass);
        let region_uniform = backend.uniform_buffer(
            "techniques.conway.draw.region",
            bytemuck::bytes_of(&RegionUniform::new(
                frame.display,
                region,
                frame.animation_frame,
                0,
            )),
        );
        let params = backend.uniform_buffer(
            "techniques.conway.draw.params",
            bytemuck::bytes_of(&DrawParamsGpu {
                cells: [extent.width, extent.height],
                outline: u32::from(parameters.get(self.outline)?),
                _padding: 0,
                background: parameters.get(self.background)?,
                new_cell: parameters.get(self.new_cell)?,
                old_cell: parameters.get(self.old_cell)?,
                outline_color: parameters.get(self.outline_color)?,
            }),
        );
        self.draw.encode(
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
                    resource: self.grid.buffers[current].as_entire_binding(),
                },
            ],
            region,
        );

        self.grid.current = current;
        if self.reseed {
            self.reseed = false;
            self.seed = self.seed.wrapping_add(1);
        }
        Ok(())
    }
}

impl Technique<GpuBackend> for ConwayTechnique {
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
        match pass_index {
            STEP_PASS => self.encode_step(backend, encoder, frame)?,
            DRAW_PASS => self.encode_draw(backend, encoder, pass, frame)?,
            _ => return Err(DispatchError::UnknownPass { label: pass.label }),
        }
        Ok(PassStatus::Encoded)
    }

    fn resize(&mut self, _backend: &GpuBackend, _display: Extent) -> Result<(), AllocationError> {
        self.reseed = true;
        Ok(())
    }
}

fn grid_extent(cells: [f64; 2]) -> Extent {
    Extent::new(cells[0].round().max(1.0) as u32, cells[1].round().max(1.0) as u32)
}

/// The grid extent `cells` asks for, when it differs from `current`.
fn resized_grid(current: Extent, cells: [f64; 2]) -> Option<Extent> {
    let extent = grid_extent(cells);
    (extent != current).then_some(extent)
}

fn allocate_grid(backend: &GpuBackend, extent: Extent) -> Result<CellGrid, AllocationError> {
    let bytes = extent.pixel_count() * CELL_BYTES;
    Ok(CellGrid {
        extent,
        buffers: [
            backend.scratch_buffer("techniques.conway.cells.a", bytes)?,
            backend.scratch_buffer("techniques.conway.cells.b", bytes)?,
        ],
        current: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<StepParamsGpu>(), 32);
        assert_eq!(std::mem::size_of::<DrawParamsGpu>(), 80);
        assert_eq!(std::mem::offset_of!(DrawParamsGpu, background), 16);
    }

    #[test]
    fn grid_extent_rounds_and_never_collapses() {
        assert_eq!(grid_extent([511.6, 0.2]), Extent::new(512, 1));
    }

    #[test]
    fn grid_follows_the_cell_count_without_a_change_notice() {
        let current = Extent::new(64, 64);
        assert_eq!(resized_grid(current, [64.0, 64.2]), None);
        assert_eq!(
            resized_grid(current, [128.0, 32.0]),
            Some(Extent::new(128, 32))
        );
    }
}
