use render_protocol::{Extent, TileRegion};
use tiles::TileCover;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sweep {
    /// `tiles_written` tiles of the current sweep have been dispatched.
    InProgress { tiles_written: u32 },
    /// Every tile has been written; `recorded` once the pass was counted.
    Filled { recorded: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccumulationState {
    pub passes_completed: u32,
    pub sub_pass_index: u32,
    pub target_passes: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassRecord {
    /// Passes averaged into the settled image, including this one.
    pub passes_completed: u32,
}

/// Progressive accumulation bookkeeping for one technique instance.
///
/// A frame is settled only when the spatial sweep over the tile cover is
/// filled and the temporal pass target has been reached.
#[derive(Debug, Clone)]
pub struct AccumulationController {
    cover: TileCover,
    sweep: Sweep,
    passes_completed: u32,
    target_passes: u32,
}

impl AccumulationController {
    pub fn new(cover: TileCover, target_passes: u32) -> Self {
        Self {
            cover,
            sweep: Sweep::InProgress { tiles_written: 0 },
            passes_completed: 0,
            target_passes,
        }
    }

    pub fn cover(&self) -> &TileCover {
        &self.cover
    }

    pub fn tiles_per_frame(&self) -> u32 {
        self.cover.tiles_per_frame()
    }

    pub fn passes_completed(&self) -> u32 {
        self.passes_completed
    }

    pub fn target_passes(&self) -> u32 {
        self.target_passes
    }

    pub fn set_target_passes(&mut self, target_passes: u32) {
        self.target_passes = target_passes;
    }

    pub fn state(&self) -> AccumulationState {
        AccumulationState {
            passes_completed: self.passes_completed,
            sub_pass_index: self.sub_pass_index(),
            target_passes: self.target_passes,
        }
    }

    /// Tiles dispatched in the current sweep; `0` again once a filled sweep
    /// has been recorded.
    pub fn sub_pass_index(&self) -> u32 {
        match self.sweep {
            Sweep::InProgress { tiles_written } => tiles_written,
            Sweep::Filled { recorded: false } => self.cover.tiles_per_frame(),
            Sweep::Filled { recorded: true } => 0,
        }
    }

    /// Tile the next [`Self::begin_frame`] accounts for.
    pub fn next_region(&self) -> TileRegion {
        let index = match self.sweep {
            Sweep::InProgress { tiles_written } => tiles_written,
            Sweep::Filled { .. } => 0,
        };
        self.cover.region(index)
    }

    /// Whether the next [`Self::begin_frame`] completes a sweep.
    pub fn next_frame_fills(&self) -> bool {
        let written = match self.sweep {
            Sweep::InProgress { tiles_written } => tiles_written,
            Sweep::Filled { .. } => 0,
        };
        written + 1 >= self.cover.tiles_per_frame()
    }

    pub fn begin_frame(&mut self) {
        let written = match self.sweep {
            Sweep::InProgress { tiles_written } => tiles_written,
            Sweep::Filled { .. } => 0,
        };
        let written = written.checked_add(1).expect("sub pass index overflow");
        self.sweep = if written >= self.cover.tiles_per_frame() {
            Sweep::Filled { recorded: false }
        } else {
            Sweep::InProgress {
                tiles_written: written,
            }
        };
    }

    pub fn is_tile_filled(&self) -> bool {
        matches!(self.sweep, Sweep::Filled { .. })
    }

    pub fn is_accumulation_complete(&self, target_passes: u32) -> bool {
        self.passes_completed >= target_passes && self.is_tile_filled()
    }

    pub fn is_settled(&self) -> bool {
        self.is_accumulation_complete(self.target_passes)
    }

    /// Counts a filled sweep as one accumulated pass. `None` when the sweep is
    /// not filled or was already recorded.
    pub fn record_pass(&mut self) -> Option<PassRecord> {
        if self.sweep != (Sweep::Filled { recorded: false }) {
            return None;
        }
        self.passes_completed = self
            .passes_completed
            .checked_add(1)
            .expect("accumulated pass count overflow");
        self.sweep = Sweep::Filled { recorded: true };
        Some(PassRecord {
            passes_completed: self.passes_completed,
        })
    }

    pub fn invalidate(&mut self) {
        self.sweep = Sweep::InProgress { tiles_written: 0 };
        self.passes_completed = 0;
    }

    /// Replaces the tile cover (display or cap changed) and invalidates.
    pub fn reconfigure(&mut self, display: Extent, requested_cap: Extent) {
        self.cover = TileCover::new(display, requested_cap);
        self.invalidate();
        tracing::debug!(
            display_width = self.cover.display().width,
            display_height = self.cover.display().height,
            cap_width = self.cover.cap().width,
            cap_height = self.cover.cap().height,
            tiles = self.cover.tiles_per_frame(),
            "accumulation reconfigured"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller(target_passes: u32) -> AccumulationController {
        AccumulationController::new(
            TileCover::new(Extent::new(100, 100), Extent::new(30, 30)),
            target_passes,
        )
    }

    /// One displayed frame as the scheduler drives it.
    fn step(controller: &mut AccumulationController) {
        controller.begin_frame();
        if controller.is_tile_filled() {
            controller.record_pass();
        }
    }

    #[test]
    fn tile_filled_after_exactly_one_sweep() {
        let mut controller = controller(1);
        assert_eq!(controller.tiles_per_frame(), 16);
        for _ in 0..15 {
            controller.begin_frame();
        }
        assert!(!controller.is_tile_filled());
        controller.begin_frame();
        assert!(controller.is_tile_filled());
    }

    #[test]
    fn completion_requires_filled_sweep_and_pass_target() {
        let mut controller = controller(3);
        for _ in 0..40 {
            step(&mut controller);
        }
        assert_eq!(controller.passes_completed(), 2);
        assert!(!controller.is_accumulation_complete(3));

        for _ in 40..48 {
            step(&mut controller);
        }
        assert_eq!(controller.passes_completed(), 3);
        assert!(controller.is_accumulation_complete(3));
        assert!(controller.is_settled());
    }

    #[test]
    fn temporal_target_alone_is_not_complete_mid_sweep() {
        let mut controller = controller(3);
        for _ in 0..48 {
            step(&mut controller);
        }
        controller.begin_frame();
        assert_eq!(controller.passes_completed(), 3);
        assert!(!controller.is_accumulation_complete(3));
    }

    #[test]
    fn invalidate_resets_progress() {
        let mut controller = controller(3);
        for _ in 0..(5 * 16) {
            step(&mut controller);
        }
        assert_eq!(controller.passes_completed(), 5);

        controller.invalidate();
        assert_eq!(controller.passes_completed(), 0);
        assert_eq!(controller.sub_pass_index(), 0);
        assert!(!controller.is_accumulation_complete(3));
    }

    #[test]
    fn record_pass_only_counts_each_filled_sweep_once() {
        let mut controller = controller(1);
        assert_eq!(controller.record_pass(), None);
        for _ in 0..16 {
            controller.begin_frame();
        }
        assert_eq!(controller.sub_pass_index(), 16);
        assert_eq!(
            controller.record_pass(),
            Some(PassRecord {
                passes_completed: 1
            })
        );
        assert_eq!(controller.sub_pass_index(), 0);
        assert_eq!(controller.record_pass(), None);
        assert_eq!(controller.passes_completed(), 1);
    }

    #[test]
    fn next_region_walks_the_cover_and_restarts_after_fill() {
        let mut controller = controller(1);
        assert_eq!(controller.next_region().origin_x, 0);
        controller.begin_frame();
        assert_eq!(controller.next_region().origin_x, 30);
        for _ in 1..15 {
            controller.begin_frame();
        }
        assert!(controller.next_frame_fills());
        controller.begin_frame();
        assert_eq!(controller.next_region(), controller.cover().region(0));
    }

    #[test]
    fn reconfigure_changes_cover_and_invalidates() {
        let mut controller = controller(1);
        for _ in 0..20 {
            step(&mut controller);
        }
        controller.reconfigure(Extent::new(64, 64), Extent::new(64, 64));
        assert_eq!(controller.tiles_per_frame(), 1);
        assert_eq!(controller.passes_completed(), 0);
        assert!(controller.next_frame_fills());
    }
}
