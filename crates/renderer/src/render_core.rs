//! Per-frame orchestration.
//!
//! One call to [`RenderCore::render_frame`] is one displayed frame:
//! collect finished exports, resolve animation, fold parameter changes into
//! the accumulation state, apply a pending resize, encode the technique's
//! passes, present, export and finally advance the clock.
//!
//! A paused, dropped or unallocated frame runs no further step; it only shows
//! the settled image again, or black when there is none.

use animation::{AnimationClock, AnimationError, AnimationState, Animator, AnimatorSet};
use frame_scheduler::{
    AccumulationController, AccumulationState, DropReason, FrameOutcome, PassScheduler, PassSink,
    PassStatus,
};
use parameters::{ChangeSet, ParameterId, ParameterStore};
use recording::{ExportIndex, ExportJob, ExportWorker, OutputGate, OutputGateStats, WriteError};
use render_protocol::{Extent, PassDescriptor, TechniqueDescriptor, TileRegion};
use tiles::{DEFAULT_RENDER_CAP, TileCover};

use crate::backend::{ReadbackCallback, RenderBackend};
use crate::errors::{AllocationError, ConstructionError, CoreError, DispatchError};
use crate::frame_buffers::FrameBufferSet;
use crate::in_flight::InFlightGate;
use crate::technique::{FrameContext, Technique};

pub const DEFAULT_TARGET_PASSES: u32 = 10;
pub const MAX_TARGET_PASSES: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoreSettings {
    pub display: Extent,
    pub render_cap: Extent,
    pub target_passes: u32,
    pub frames_per_recording_frame: u32,
    pub loop_start: i64,
    pub loop_end: i64,
    pub recording: bool,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            display: Extent::square(1024),
            render_cap: Extent::square(DEFAULT_RENDER_CAP),
            target_passes: DEFAULT_TARGET_PASSES,
            frames_per_recording_frame: recording::DEFAULT_FRAMES_PER_RECORDING_FRAME,
            loop_start: 0,
            loop_end: 0,
            recording: false,
        }
    }
}

#[derive(Debug)]
pub enum FrameStatus {
    Completed {
        region: TileRegion,
        tile_filled: bool,
        /// A new complete image is in the settled buffer.
        image_completed: bool,
    },
    /// No technique pass ran; the settled image was presented again.
    Paused,
    /// The settled image was presented again in place of the partial frame.
    Dropped(DropReason<DispatchError>),
    /// The buffer set could not be allocated; the target was cleared.
    BuffersUnavailable(AllocationError),
}

#[derive(Debug)]
pub struct FrameReport {
    pub status: FrameStatus,
    pub animation_frame: i64,
    pub exported: Option<ExportIndex>,
    pub recording_stopped: bool,
}

impl FrameReport {
    pub fn image_completed(&self) -> bool {
        matches!(
            self.status,
            FrameStatus::Completed {
                image_completed: true,
                ..
            }
        )
    }
}

pub struct RenderCore<B: RenderBackend> {
    backend: B,
    technique: Box<dyn Technique<B>>,
    descriptor: TechniqueDescriptor,
    parameters: ParameterStore,
    animators: AnimatorSet,
    clock: AnimationClock,
    buffers: FrameBufferSet<B>,
    accumulation: AccumulationController,
    scheduler: PassScheduler,
    output: OutputGate,
    exporter: ExportWorker,
    in_flight: InFlightGate,
    pending_display: Option<Extent>,
    pending_invalidate: bool,
    configured_display: Extent,
    accumulated_generation: u64,
}

impl<B: RenderBackend> RenderCore<B> {
    pub fn new(
        backend: B,
        technique: Box<dyn Technique<B>>,
        parameters: ParameterStore,
        settings: CoreSettings,
        exporter: ExportWorker,
    ) -> Result<Self, CoreError> {
        let descriptor = technique.descriptor().clone();
        descriptor
            .validate()
            .map_err(|source| ConstructionError::Descriptor {
                technique: descriptor.id.as_str(),
                source,
            })?;
        let clock = AnimationClock::new(settings.loop_start, settings.loop_end)?;
        let buffers = FrameBufferSet::new(
            &backend,
            settings.display,
            settings.render_cap,
            descriptor.buffer_count(),
        )?;
        let cover = cover_for(&descriptor, &buffers);
        let accumulation =
            AccumulationController::new(cover, clamp_target_passes(settings.target_passes));
        let mut output = OutputGate::new(settings.frames_per_recording_frame);
        output.set_recording(settings.recording);
        let configured_display = buffers.display();
        let accumulated_generation = buffers.generation();

        let mut core = Self {
            backend,
            technique,
            descriptor,
            parameters,
            animators: AnimatorSet::new(),
            clock,
            buffers,
            accumulation,
            scheduler: PassScheduler::new(),
            output,
            exporter,
            in_flight: InFlightGate::new(),
            pending_display: None,
            pending_invalidate: false,
            configured_display,
            accumulated_generation,
        };
        core.technique
            .resize(&core.backend, configured_display)
            .map_err(ConstructionError::from)?;
        tracing::info!(
            technique = %core.descriptor.id,
            width = configured_display.width,
            height = configured_display.height,
            tiles = core.accumulation.tiles_per_frame(),
            buffers = core.descriptor.buffer_count(),
            "render core ready"
        );
        Ok(core)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn descriptor(&self) -> &TechniqueDescriptor {
        &self.descriptor
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    /// Changes take effect at the next frame boundary.
    pub fn parameters_mut(&mut self) -> &mut ParameterStore {
        &mut self.parameters
    }

    pub fn animators(&self) -> &AnimatorSet {
        &self.animators
    }

    pub fn animators_mut(&mut self) -> &mut AnimatorSet {
        &mut self.animators
    }

    /// Replaces and returns any animator already bound to `parameter`.
    pub fn bind_animator(
        &mut self,
        parameter: ParameterId,
        animator: Animator,
    ) -> Result<Option<Animator>, AnimationError> {
        self.animators.bind(&self.parameters, parameter, animator)
    }

    /// Keys the parameter's live value at the current animation frame.
    pub fn capture_keyframe(&mut self, parameter: ParameterId) -> Result<bool, AnimationError> {
        self.animators
            .capture_keyframe(&self.parameters, parameter, self.clock.current_frame())
    }

    pub fn animation_state(&self) -> AnimationState {
        self.clock.state()
    }

    pub fn accumulation_state(&self) -> AccumulationState {
        self.accumulation.state()
    }

    pub fn buffers(&self) -> &FrameBufferSet<B> {
        &self.buffers
    }

    pub fn display(&self) -> Extent {
        self.buffers.display()
    }

    pub fn render_cap(&self) -> Extent {
        self.buffers.render_cap()
    }

    pub fn output_stats(&self) -> OutputGateStats {
        self.output.stats()
    }

    pub fn is_recording(&self) -> bool {
        self.output.is_recording()
    }

    pub fn toggle_recording(&mut self) -> bool {
        self.output.toggle_recording()
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn toggle_paused(&mut self) -> bool {
        let paused = self.clock.toggle_paused();
        tracing::info!(paused, "playback toggled");
        paused
    }

    pub fn set_loop_range(&mut self, loop_start: i64, loop_end: i64) -> Result<(), CoreError> {
        self.clock.set_loop_range(loop_start, loop_end)?;
        Ok(())
    }

    pub fn set_target_passes(&mut self, target_passes: u32) {
        self.accumulation
            .set_target_passes(clamp_target_passes(target_passes));
    }

    pub fn set_frames_per_recording_frame(&mut self, frames: u32) {
        self.output.set_frames_per_recording_frame(frames);
    }

    /// Restarts accumulation and rewinds the clock at the next frame boundary.
    pub fn reset(&mut self) {
        self.pending_invalidate = true;
        self.clock.rewind();
    }

    /// Resizes at the next frame boundary.
    pub fn request_resize(&mut self, display: Extent) {
        self.pending_display = Some(display);
    }

    /// Returns the cap actually in effect after clamping.
    pub fn set_render_cap(&mut self, requested: Extent) -> Extent {
        if self.buffers.set_render_cap(requested) {
            if self.descriptor.resolution_capped {
                self.accumulation
                    .reconfigure(self.buffers.display(), self.buffers.render_cap());
            }
            tracing::info!(
                width = self.buffers.render_cap().width,
                height = self.buffers.render_cap().height,
                "render cap changed"
            );
        }
        self.buffers.render_cap()
    }

    pub fn render_frame(&mut self, present: Option<&B::PresentTarget>) -> FrameReport {
        self.backend.poll_completions();
        self.collect_exports();

        let animation_frame = self.clock.current_frame();
        if self.clock.is_paused() {
            // Parameter changes and resizes stay pending until playback resumes.
            self.present_settled(present);
            return FrameReport {
                status: FrameStatus::Paused,
                animation_frame,
                exported: None,
                recording_stopped: false,
            };
        }
        if let Err(error) = self.animators.apply(&mut self.parameters, animation_frame) {
            tracing::warn!(%error, "animated parameter update failed");
        }
        let changes = self.parameters.drain_changes();
        if changes.content_affecting() || self.pending_invalidate {
            self.pending_invalidate = false;
            self.accumulation.invalidate();
            tracing::debug!(changed = changes.len(), "accumulation invalidated");
        }
        if let Err(error) = self.prepare_buffers() {
            self.present_settled(present);
            return unavailable(error, animation_frame);
        }

        let backend = &self.backend;
        let token = self
            .in_flight
            .acquire_with(|| backend.wait_for_submissions());
        let mut encoder = self.backend.create_encoder("renderer.frame");
        let outcome = {
            let mut sink = FrameSink {
                backend: &self.backend,
                technique: self.technique.as_mut(),
                buffers: &mut self.buffers,
                encoder: &mut encoder,
                parameters: &self.parameters,
                changes: &changes,
                animation_frame,
                accumulation: self.accumulation.state(),
            };
            self.scheduler
                .run_frame(&self.descriptor, &mut self.accumulation, &mut sink)
        };
        let progress = match outcome {
            FrameOutcome::Completed(progress) => progress,
            FrameOutcome::Dropped(reason) => {
                drop(encoder);
                drop(token);
                self.present_settled(present);
                return FrameReport {
                    status: FrameStatus::Dropped(reason),
                    animation_frame,
                    exported: None,
                    recording_stopped: false,
                };
            }
        };

        let image_completed = progress.pass_recorded.is_some()
            && (!self.descriptor.needs_accumulation || self.accumulation.is_settled());
        let display = self.buffers.display();
        if let Some(target) = present {
            if let Some(source) = self.technique.present_source(&self.buffers) {
                self.backend
                    .encode_present(&mut encoder, source, display, target);
            }
        }

        let mut exported = None;
        let mut readback = None;
        if self
            .output
            .should_export_frame(image_completed, self.clock.is_paused(), animation_frame)
        {
            if let Some(settled) = self.buffers.settled() {
                let index = self.output.reserve_index();
                let staging = self.backend.encode_readback(&mut encoder, settled, display);
                readback = Some((staging, export_callback(&self.exporter, index, display)));
                exported = Some(index);
            }
        }
        self.backend
            .submit(encoder, readback, Box::new(move || drop(token)));

        let advance = if self.descriptor.advances_per_settled_image() {
            image_completed
        } else {
            true
        };
        let mut recording_stopped = false;
        if advance {
            let tick = self.clock.tick();
            recording_stopped = self.output.observe_tick(tick);
        }

        FrameReport {
            status: FrameStatus::Completed {
                region: progress.region,
                tile_filled: progress.tile_filled,
                image_completed,
            },
            animation_frame,
            exported,
            recording_stopped,
        }
    }

    /// Waits for outstanding GPU work and collects the export results it
    /// produced.
    pub fn flush(&mut self) {
        self.backend.wait_for_submissions();
        self.collect_exports();
    }

    fn collect_exports(&mut self) {
        for result in self.exporter.drain_results() {
            match result.outcome {
                Ok(path) => {
                    self.output.commit(result.index);
                    tracing::debug!(index = result.index.0, path = %path.display(), "export committed");
                }
                Err(error) => {
                    self.output.fail(result.index);
                    tracing::warn!(index = result.index.0, %error, "export skipped");
                }
            }
        }
    }

    /// Presents the settled image in its own submission, or clears the target
    /// when there is nothing to show.
    fn present_settled(&self, present: Option<&B::PresentTarget>) {
        let Some(target) = present else {
            return;
        };
        let backend = &self.backend;
        let token = self
            .in_flight
            .acquire_with(|| backend.wait_for_submissions());
        let mut encoder = self.backend.create_encoder("renderer.present_settled");
        match self.technique.present_source(&self.buffers) {
            Some(source) => {
                self.backend
                    .encode_present(&mut encoder, source, self.buffers.display(), target);
            }
            None => self.backend.encode_clear(&mut encoder, target),
        }
        self.backend
            .submit(encoder, None, Box::new(move || drop(token)));
    }

    /// Applies a pending resize, retries a failed allocation and brings the
    /// technique and tile cover in line with the buffers.
    fn prepare_buffers(&mut self) -> Result<(), AllocationError> {
        if let Some(display) = self.pending_display.take() {
            self.buffers.resize(&self.backend, display)?;
        }
        if !self.buffers.is_allocated() {
            self.buffers.reallocate(&self.backend)?;
        }
        let resized = self.buffers.display();
        if resized != self.configured_display {
            self.technique.resize(&self.backend, resized)?;
            let cover = cover_for(&self.descriptor, &self.buffers);
            self.accumulation.reconfigure(resized, cover.cap());
            self.configured_display = resized;
            tracing::info!(
                width = resized.width,
                height = resized.height,
                "display resized"
            );
        }
        if self.buffers.generation() != self.accumulated_generation {
            self.accumulation.invalidate();
            self.accumulated_generation = self.buffers.generation();
        }
        Ok(())
    }
}

fn unavailable(error: AllocationError, animation_frame: i64) -> FrameReport {
    FrameReport {
        status: FrameStatus::BuffersUnavailable(error),
        animation_frame,
        exported: None,
        recording_stopped: false,
    }
}

fn cover_for<B: RenderBackend>(
    descriptor: &TechniqueDescriptor,
    buffers: &FrameBufferSet<B>,
) -> TileCover {
    if descriptor.resolution_capped {
        TileCover::new(buffers.display(), buffers.render_cap())
    } else {
        TileCover::uncapped(buffers.display())
    }
}

fn clamp_target_passes(target_passes: u32) -> u32 {
    target_passes.clamp(1, MAX_TARGET_PASSES)
}

fn export_callback(exporter: &ExportWorker, index: ExportIndex, extent: Extent) -> ReadbackCallback {
    let sender = exporter.sender();
    Box::new(move |result| match result {
        Ok(pixels) => sender.send(ExportJob {
            index,
            extent,
            pixels,
        }),
        Err(error) => sender.fail(
            index,
            WriteError::Readback {
                index: index.0,
                reason: error.to_string(),
            },
        ),
    })
}

struct FrameSink<'a, B: RenderBackend> {
    backend: &'a B,
    technique: &'a mut dyn Technique<B>,
    buffers: &'a mut FrameBufferSet<B>,
    encoder: &'a mut B::Encoder,
    parameters: &'a ParameterStore,
    changes: &'a ChangeSet,
    animation_frame: i64,
    accumulation: AccumulationState,
}

impl<B: RenderBackend> PassSink for FrameSink<'_, B> {
    type Error = DispatchError;

    fn encode_pass(
        &mut self,
        pass_index: usize,
        pass: &PassDescriptor,
        region: TileRegion,
    ) -> Result<PassStatus, DispatchError> {
        let target = self
            .buffers
            .write_target()
            .ok_or(DispatchError::BuffersUnavailable)?;
        let frame = FrameContext {
            parameters: self.parameters,
            changes: self.changes,
            animation_frame: self.animation_frame,
            region,
            display: self.buffers.display(),
            render_cap: self.buffers.render_cap(),
            accumulation: self.accumulation,
            target,
            generation: self.buffers.generation(),
        };
        self.technique
            .encode_pass(self.backend, self.encoder, pass_index, pass, &frame)
    }

    fn encode_average(&mut self, passes_completed: u32) -> Result<(), DispatchError> {
        let settled = self
            .buffers
            .settled()
            .ok_or(DispatchError::BuffersUnavailable)?;
        let sample = self
            .buffers
            .write_target()
            .ok_or(DispatchError::BuffersUnavailable)?;
        self.backend.encode_average(
            self.encoder,
            settled,
            sample,
            self.buffers.display(),
            passes_completed,
        )
    }

    fn swap_accumulation(&mut self) {
        self.buffers.swap();
    }
}
