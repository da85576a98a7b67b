use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("loop start {loop_start} is after loop end {loop_end}")]
pub struct LoopRangeError {
    pub loop_start: i64,
    pub loop_end: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    pub current_frame: i64,
    pub loop_start: i64,
    pub loop_end: i64,
    pub paused: bool,
}

impl AnimationState {
    pub const fn loop_length(&self) -> i64 {
        self.loop_end - self.loop_start
    }

    pub const fn is_looping(&self) -> bool {
        self.loop_length() > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Paused { frame: i64 },
    Advanced { frame: i64 },
    /// The frame left the loop window and wrapped to its start; an active
    /// recording must stop here.
    LoopCompleted { frame: i64 },
}

impl TickOutcome {
    pub const fn frame(&self) -> i64 {
        match *self {
            TickOutcome::Paused { frame }
            | TickOutcome::Advanced { frame }
            | TickOutcome::LoopCompleted { frame } => frame,
        }
    }

    pub const fn loop_completed(&self) -> bool {
        matches!(self, TickOutcome::LoopCompleted { .. })
    }
}

#[derive(Debug, Clone)]
pub struct AnimationClock {
    state: AnimationState,
}

impl Default for AnimationClock {
    fn default() -> Self {
        Self {
            state: AnimationState {
                current_frame: 0,
                loop_start: 0,
                loop_end: 0,
                paused: false,
            },
        }
    }
}

impl AnimationClock {
    pub fn new(loop_start: i64, loop_end: i64) -> Result<Self, LoopRangeError> {
        let mut clock = Self::default();
        clock.set_loop_range(loop_start, loop_end)?;
        clock.state.current_frame = loop_start;
        Ok(clock)
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn current_frame(&self) -> i64 {
        self.state.current_frame
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.state.paused = paused;
    }

    pub fn toggle_paused(&mut self) -> bool {
        self.state.paused = !self.state.paused;
        self.state.paused
    }

    /// Only changes the playback window; keyframes live elsewhere and are untouched.
    pub fn set_loop_range(&mut self, loop_start: i64, loop_end: i64) -> Result<(), LoopRangeError> {
        if loop_start > loop_end {
            return Err(LoopRangeError {
                loop_start,
                loop_end,
            });
        }
        self.state.loop_start = loop_start;
        self.state.loop_end = loop_end;
        Ok(())
    }

    pub fn set_frame(&mut self, frame: i64) {
        self.state.current_frame = frame;
    }

    pub fn rewind(&mut self) {
        self.state.current_frame = self.state.loop_start;
    }

    pub fn tick(&mut self) -> TickOutcome {
        if self.state.paused {
            return TickOutcome::Paused {
                frame: self.state.current_frame,
            };
        }
        let next = self
            .state
            .current_frame
            .checked_add(1)
            .expect("animation frame overflow");
        if !self.state.is_looping() {
            self.state.current_frame = next;
            return TickOutcome::Advanced { frame: next };
        }
        if next < self.state.loop_start {
            self.state.current_frame = self.state.loop_start;
            return TickOutcome::Advanced {
                frame: self.state.current_frame,
            };
        }
        if next > self.state.loop_end {
            self.state.current_frame = self.state.loop_start;
            tracing::debug!(
                loop_start = self.state.loop_start,
                loop_end = self.state.loop_end,
                "animation loop completed"
            );
            return TickOutcome::LoopCompleted {
                frame: self.state.current_frame,
            };
        }
        self.state.current_frame = next;
        TickOutcome::Advanced { frame: next }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_wraps_at_loop_end_and_reports_completion() {
        let mut clock = AnimationClock::new(0, 5).expect("valid range");
        clock.set_frame(5);
        let mut recording = true;

        let outcome = clock.tick();
        if outcome.loop_completed() {
            recording = false;
        }

        assert_eq!(outcome, TickOutcome::LoopCompleted { frame: 0 });
        assert_eq!(clock.current_frame(), 0);
        assert!(!recording);
    }

    #[test]
    fn paused_clock_does_not_advance() {
        let mut clock = AnimationClock::new(0, 10).expect("valid range");
        clock.set_paused(true);
        assert_eq!(clock.tick(), TickOutcome::Paused { frame: 0 });
        assert!(!clock.toggle_paused());
        assert_eq!(clock.tick(), TickOutcome::Advanced { frame: 1 });
    }

    #[test]
    fn empty_loop_range_never_wraps() {
        let mut clock = AnimationClock::new(3, 3).expect("valid range");
        for expected in 4..20 {
            assert_eq!(clock.tick(), TickOutcome::Advanced { frame: expected });
        }
    }

    #[test]
    fn frame_before_loop_start_is_lifted_into_window() {
        let mut clock = AnimationClock::new(0, 10).expect("valid range");
        clock.set_loop_range(4, 10).expect("valid range");
        assert_eq!(clock.tick(), TickOutcome::Advanced { frame: 4 });
    }

    #[test]
    fn inverted_loop_range_is_rejected_and_state_kept() {
        let mut clock = AnimationClock::new(0, 10).expect("valid range");
        assert_eq!(
            clock.set_loop_range(8, 2),
            Err(LoopRangeError {
                loop_start: 8,
                loop_end: 2
            })
        );
        assert_eq!(clock.state().loop_end, 10);
    }
}
