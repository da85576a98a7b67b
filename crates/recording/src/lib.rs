//! Recording of completed frames.
//!
//! [`OutputGate`] decides which images are exported and numbers them,
//! [`ExportWorker`] runs a [`FrameWriter`] on its own thread so the render loop
//! never waits for disk.

mod gate;
mod worker;
mod writer;

pub use gate::{
    DEFAULT_FRAMES_PER_RECORDING_FRAME, ExportIndex, MAX_FRAMES_PER_RECORDING_FRAME, OutputGate,
    OutputGateStats, should_export,
};
pub use worker::{
    DEFAULT_EXPORT_QUEUE_CAPACITY, ExportJob, ExportResult, ExportSender, ExportWorker,
};
pub use writer::{FrameWriter, PngFrameWriter, WriteError, frame_path, rgba8_from_linear};
