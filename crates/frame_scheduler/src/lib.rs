//! Per-frame pass scheduling and progressive accumulation.
//!
//! [`PassScheduler::run_frame`] drives one displayed frame: every declared
//! pass for the current tile, then the averaging and swap that fold a filled
//! sweep into the settled image. The crate is backend-agnostic; command
//! encoding happens behind [`PassSink`].

mod accumulation;
mod average;
mod pass_scheduler;

pub use accumulation::{AccumulationController, AccumulationState, PassRecord};
pub use average::{accumulate_rgba, running_average};
pub use pass_scheduler::{
    DropReason, FrameOutcome, FrameProgress, PassScheduler, PassSchedulerStats, PassSink,
    PassStatus,
};
