use render_protocol::{PassDescriptor, TechniqueDescriptor, TileRegion};

use crate::accumulation::{AccumulationController, PassRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    Encoded,
    /// The technique chose not to run this pass; the frame cannot be accepted.
    Skipped,
}

/// Receives the commands of one displayed frame on a single ordered stream.
pub trait PassSink {
    type Error;

    fn encode_pass(
        &mut self,
        pass_index: usize,
        pass: &PassDescriptor,
        region: TileRegion,
    ) -> Result<PassStatus, Self::Error>;

    /// Folds the freshly filled write target into the settled image, weighted
    /// by the passes already accumulated.
    fn encode_average(&mut self, passes_completed: u32) -> Result<(), Self::Error>;

    fn swap_accumulation(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameProgress {
    pub region: TileRegion,
    pub tile_filled: bool,
    pub pass_recorded: Option<PassRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason<E> {
    PartialPassList { encoded: usize, declared: usize },
    PassFailed {
        pass_index: usize,
        label: &'static str,
        error: E,
    },
    AverageFailed(E),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome<E> {
    Completed(FrameProgress),
    /// Nothing from this frame may be submitted; counters did not advance.
    Dropped(DropReason<E>),
}

impl<E> FrameOutcome<E> {
    pub fn is_completed(&self) -> bool {
        matches!(self, FrameOutcome::Completed(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSchedulerStats {
    pub frames_completed: u64,
    pub frames_dropped: u64,
}

/// Runs a technique's declared pass list once per displayed frame and drives
/// the accumulation bookkeeping that follows it.
#[derive(Debug, Clone, Default)]
pub struct PassScheduler {
    stats: PassSchedulerStats,
}

impl PassScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self) -> PassSchedulerStats {
        self.stats
    }

    pub fn run_frame<S: PassSink>(
        &mut self,
        descriptor: &TechniqueDescriptor,
        accumulation: &mut AccumulationController,
        sink: &mut S,
    ) -> FrameOutcome<S::Error> {
        let outcome = Self::encode_frame(descriptor, accumulation, sink);
        match &outcome {
            FrameOutcome::Completed(_) => {
                self.stats.frames_completed = self
                    .stats
                    .frames_completed
                    .checked_add(1)
                    .expect("completed frame count overflow");
            }
            FrameOutcome::Dropped(reason) => {
                self.stats.frames_dropped = self
                    .stats
                    .frames_dropped
                    .checked_add(1)
                    .expect("dropped frame count overflow");
                match reason {
                    DropReason::PartialPassList { encoded, declared } => tracing::warn!(
                        technique = %descriptor.id,
                        encoded,
                        declared,
                        "dropping frame with partial pass list"
                    ),
                    DropReason::PassFailed {
                        pass_index, label, ..
                    } => tracing::warn!(
                        technique = %descriptor.id,
                        pass_index,
                        label,
                        "dropping frame after pass encode failure"
                    ),
                    DropReason::AverageFailed(_) => tracing::warn!(
                        technique = %descriptor.id,
                        "dropping frame after averaging encode failure"
                    ),
                }
            }
        }
        outcome
    }

    fn encode_frame<S: PassSink>(
        descriptor: &TechniqueDescriptor,
        accumulation: &mut AccumulationController,
        sink: &mut S,
    ) -> FrameOutcome<S::Error> {
        let region = accumulation.next_region();
        let declared = descriptor.passes.len();
        for (pass_index, pass) in descriptor.passes.iter().enumerate() {
            match sink.encode_pass(pass_index, pass, region) {
                Ok(PassStatus::Encoded) => {}
                Ok(PassStatus::Skipped) => {
                    return FrameOutcome::Dropped(DropReason::PartialPassList {
                        encoded: pass_index,
                        declared,
                    });
                }
                Err(error) => {
                    return FrameOutcome::Dropped(DropReason::PassFailed {
                        pass_index,
                        label: pass.label,
                        error,
                    });
                }
            }
        }

        let fills = accumulation.next_frame_fills();
        let passes_completed = accumulation.passes_completed();
        if descriptor.needs_accumulation && fills && passes_completed > 0 {
            if let Err(error) = sink.encode_average(passes_completed) {
                return FrameOutcome::Dropped(DropReason::AverageFailed(error));
            }
        }

        accumulation.begin_frame();
        let pass_recorded = if accumulation.is_tile_filled() {
            let record = accumulation.record_pass();
            if descriptor.needs_accumulation {
                sink.swap_accumulation();
            }
            record
        } else {
            None
        };

        FrameOutcome::Completed(FrameProgress {
            region,
            tile_filled: accumulation.is_tile_filled(),
            pass_recorded,
        })
    }
}

#[cfg(test)]
mod tests {
    use render_protocol::{Extent, TechniqueId};
    use smallvec::smallvec;
    use tiles::TileCover;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Command {
        Pass(&'static str, TileRegion),
        Average(u32),
        Swap,
    }

    #[derive(Default)]
    struct RecordingSink {
        commands: Vec<Command>,
        fail_label: Option<&'static str>,
        skip_label: Option<&'static str>,
    }

    impl PassSink for RecordingSink {
        type Error = String;

        fn encode_pass(
            &mut self,
            _pass_index: usize,
            pass: &PassDescriptor,
            region: TileRegion,
        ) -> Result<PassStatus, String> {
            if self.fail_label == Some(pass.label) {
                return Err(format!("{} failed", pass.label));
            }
            if self.skip_label == Some(pass.label) {
                return Ok(PassStatus::Skipped);
            }
            self.commands.push(Command::Pass(pass.label, region));
            Ok(PassStatus::Encoded)
        }

        fn encode_average(&mut self, passes_completed: u32) -> Result<(), String> {
            self.commands.push(Command::Average(passes_completed));
            Ok(())
        }

        fn swap_accumulation(&mut self) {
            self.commands.push(Command::Swap);
        }
    }

    fn descriptor(needs_accumulation: bool) -> TechniqueDescriptor {
        TechniqueDescriptor {
            id: TechniqueId::new("test"),
            name: "Test",
            needs_accumulation,
            resolution_capped: true,
            passes: smallvec![
                PassDescriptor::tile("primary"),
                PassDescriptor::tile("shade"),
                PassDescriptor::display("present"),
            ],
        }
    }

    fn two_tile_controller() -> AccumulationController {
        AccumulationController::new(
            TileCover::new(Extent::new(20, 10), Extent::new(10, 10)),
            2,
        )
    }

    #[test]
    fn passes_run_in_declared_order_for_the_current_tile() {
        let mut scheduler = PassScheduler::new();
        let mut accumulation = two_tile_controller();
        let mut sink = RecordingSink::default();

        let outcome = scheduler.run_frame(&descriptor(false), &mut accumulation, &mut sink);
        let region = accumulation.cover().region(0);
        assert_eq!(
            sink.commands,
            vec![
                Command::Pass("primary", region),
                Command::Pass("shade", region),
                Command::Pass("present", region),
            ]
        );
        assert_eq!(
            outcome,
            FrameOutcome::Completed(FrameProgress {
                region,
                tile_filled: false,
                pass_recorded: None,
            })
        );
    }

    #[test]
    fn filled_sweep_averages_then_swaps() {
        let mut scheduler = PassScheduler::new();
        let mut accumulation = two_tile_controller();
        let mut sink = RecordingSink::default();
        let descriptor = descriptor(true);

        for _ in 0..4 {
            assert!(
                scheduler
                    .run_frame(&descriptor, &mut accumulation, &mut sink)
                    .is_completed()
            );
        }
        let non_pass: Vec<&Command> = sink
            .commands
            .iter()
            .filter(|command| !matches!(command, Command::Pass(..)))
            .collect();
        // First sweep has nothing to average against; the second is weighted by one pass.
        assert_eq!(
            non_pass,
            vec![&Command::Swap, &Command::Average(1), &Command::Swap]
        );
        assert_eq!(accumulation.passes_completed(), 2);
        assert!(accumulation.is_settled());
    }

    #[test]
    fn failed_pass_drops_frame_without_advancing() {
        let mut scheduler = PassScheduler::new();
        let mut accumulation = two_tile_controller();
        let mut sink = RecordingSink {
            fail_label: Some("shade"),
            ..RecordingSink::default()
        };

        let outcome = scheduler.run_frame(&descriptor(true), &mut accumulation, &mut sink);
        assert_eq!(
            outcome,
            FrameOutcome::Dropped(DropReason::PassFailed {
                pass_index: 1,
                label: "shade",
                error: "shade failed".to_owned(),
            })
        );
        assert_eq!(accumulation.sub_pass_index(), 0);
        assert_eq!(scheduler.stats().frames_dropped, 1);
    }

    #[test]
    fn skipped_pass_is_a_partial_frame() {
        let mut scheduler = PassScheduler::new();
        let mut accumulation = two_tile_controller();
        accumulation.begin_frame();
        let mut sink = RecordingSink {
            skip_label: Some("present"),
            ..RecordingSink::default()
        };

        let outcome = scheduler.run_frame(&descriptor(true), &mut accumulation, &mut sink);
        assert_eq!(
            outcome,
            FrameOutcome::Dropped(DropReason::PartialPassList {
                encoded: 2,
                declared: 3,
            })
        );
        assert!(!accumulation.is_tile_filled());
        assert!(!sink.commands.contains(&Command::Swap));
    }

    #[test]
    fn direct_technique_records_passes_without_swapping() {
        let mut scheduler = PassScheduler::new();
        let mut accumulation = two_tile_controller();
        let mut sink = RecordingSink::default();

        scheduler.run_frame(&descriptor(false), &mut accumulation, &mut sink);
        let outcome = scheduler.run_frame(&descriptor(false), &mut accumulation, &mut sink);
        match outcome {
            FrameOutcome::Completed(progress) => {
                assert!(progress.tile_filled);
                assert_eq!(
                    progress.pass_recorded,
                    Some(PassRecord {
                        passes_completed: 1
                    })
                );
            }
            FrameOutcome::Dropped(reason) => panic!("unexpected drop {reason:?}"),
        }
        assert!(!sink.commands.contains(&Command::Swap));
    }
}
