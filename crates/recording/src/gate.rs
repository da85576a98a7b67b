use animation::TickOutcome;

pub const DEFAULT_FRAMES_PER_RECORDING_FRAME: u32 = 1;
pub const MAX_FRAMES_PER_RECORDING_FRAME: u32 = 50;

/// A frame is exported only when recording is on, playback is running and
/// the image is complete.
pub fn should_export(complete: bool, recording: bool, paused: bool) -> bool {
    recording && !paused && complete
}

/// Index handed to an export job at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExportIndex(pub u64);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputGateStats {
    pub reserved: u64,
    pub exported: u64,
    pub failed: u64,
}

impl OutputGateStats {
    pub fn pending(&self) -> u64 {
        self.reserved - self.exported - self.failed
    }
}

/// Decides which completed images are recorded and numbers the exports.
///
/// Indices are reserved when a job is dispatched and committed once the
/// writer reports success. A failed index is never handed out again.
#[derive(Debug, Clone)]
pub struct OutputGate {
    recording: bool,
    frames_per_recording_frame: u32,
    next_index: u64,
    stats: OutputGateStats,
}

impl Default for OutputGate {
    fn default() -> Self {
        Self::new(DEFAULT_FRAMES_PER_RECORDING_FRAME)
    }
}

impl OutputGate {
    pub fn new(frames_per_recording_frame: u32) -> Self {
        Self {
            recording: false,
            frames_per_recording_frame: clamp_cadence(frames_per_recording_frame),
            next_index: 0,
            stats: OutputGateStats::default(),
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        if self.recording != recording {
            tracing::info!(recording, "recording toggled");
        }
        self.recording = recording;
    }

    pub fn toggle_recording(&mut self) -> bool {
        self.set_recording(!self.recording);
        self.recording
    }

    pub fn frames_per_recording_frame(&self) -> u32 {
        self.frames_per_recording_frame
    }

    /// Clamped into `1..=MAX_FRAMES_PER_RECORDING_FRAME`.
    pub fn set_frames_per_recording_frame(&mut self, frames: u32) {
        self.frames_per_recording_frame = clamp_cadence(frames);
    }

    /// [`should_export`] narrowed to every `frames_per_recording_frame`-th
    /// animation frame.
    pub fn should_export_frame(&self, complete: bool, paused: bool, animation_frame: i64) -> bool {
        should_export(complete, self.recording, paused)
            && animation_frame.rem_euclid(i64::from(self.frames_per_recording_frame)) == 0
    }

    /// Stops recording when the clock wrapped past the loop end. Returns
    /// whether recording was stopped by this tick.
    pub fn observe_tick(&mut self, outcome: TickOutcome) -> bool {
        if !(outcome.loop_completed() && self.recording) {
            return false;
        }
        self.recording = false;
        tracing::info!(
            exported = self.stats.exported,
            "animation loop completed; recording stopped"
        );
        true
    }

    pub fn reserve_index(&mut self) -> ExportIndex {
        let index = ExportIndex(self.next_index);
        self.next_index = self
            .next_index
            .checked_add(1)
            .expect("export index overflow");
        self.stats.reserved += 1;
        index
    }

    pub fn commit(&mut self, index: ExportIndex) {
        debug_assert!(index.0 < self.next_index, "commit of unreserved index");
        self.stats.exported += 1;
    }

    pub fn fail(&mut self, index: ExportIndex) {
        debug_assert!(index.0 < self.next_index, "failure of unreserved index");
        self.stats.failed += 1;
    }

    pub fn exported_frames(&self) -> u64 {
        self.stats.exported
    }

    pub fn stats(&self) -> OutputGateStats {
        self.stats
    }
}

fn clamp_cadence(frames: u32) -> u32 {
    frames.clamp(1, MAX_FRAMES_PER_RECORDING_FRAME)
}

#[cfg(test)]
mod tests {
    use animation::AnimationClock;

    use super::*;

    #[test]
    fn incomplete_frames_are_never_exported() {
        assert!(!should_export(false, true, false));
        assert!(!should_export(true, true, true));
        assert!(!should_export(true, false, false));
        assert!(should_export(true, true, false));
    }

    #[test]
    fn loop_completion_stops_recording() {
        let mut clock = AnimationClock::new(0, 5).expect("valid loop range");
        clock.set_frame(5);
        let mut gate = OutputGate::default();
        gate.set_recording(true);

        let outcome = clock.tick();
        assert_eq!(clock.current_frame(), 0);
        assert!(gate.observe_tick(outcome));
        assert!(!gate.is_recording());
    }

    #[test]
    fn ordinary_ticks_keep_recording() {
        let mut clock = AnimationClock::new(0, 5).expect("valid loop range");
        let mut gate = OutputGate::default();
        gate.set_recording(true);
        for _ in 0..5 {
            assert!(!gate.observe_tick(clock.tick()));
        }
        assert!(gate.is_recording());
    }

    #[test]
    fn cadence_skips_intermediate_animation_frames() {
        let mut gate = OutputGate::new(3);
        gate.set_recording(true);
        let exported: Vec<i64> = (0..10)
            .filter(|frame| gate.should_export_frame(true, false, *frame))
            .collect();
        assert_eq!(exported, vec![0, 3, 6, 9]);
    }

    #[test]
    fn cadence_is_clamped() {
        assert_eq!(OutputGate::new(0).frames_per_recording_frame(), 1);
        assert_eq!(
            OutputGate::new(500).frames_per_recording_frame(),
            MAX_FRAMES_PER_RECORDING_FRAME
        );
    }

    #[test]
    fn failed_index_is_not_reused() {
        let mut gate = OutputGate::default();
        let first = gate.reserve_index();
        let second = gate.reserve_index();
        gate.fail(first);
        gate.commit(second);
        let third = gate.reserve_index();

        assert_eq!(third, ExportIndex(2));
        assert_eq!(gate.exported_frames(), 1);
        assert_eq!(gate.stats().failed, 1);
        assert_eq!(gate.stats().pending(), 1);
    }
}
