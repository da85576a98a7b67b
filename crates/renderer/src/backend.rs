use render_protocol::{Extent, FrameBufferDesc};
use thiserror::Error;

use crate::errors::{AllocationError, DispatchError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("readback failed: {0}")]
pub struct ReadbackError(pub String);

/// Receives the pixels of a finished readback: f32 RGBA, row-major, unpadded.
pub type ReadbackCallback = Box<dyn FnOnce(Result<Vec<[f32; 4]>, ReadbackError>) + Send + 'static>;

/// Runs once the GPU has finished a submission.
pub type SubmitCallback = Box<dyn FnOnce() + Send + 'static>;

/// Device seam of the render core. Everything a frame needs from the GPU goes
/// through one ordered `Encoder`; nothing reaches the device before
/// [`RenderBackend::submit`].
pub trait RenderBackend {
    type Image;
    type Encoder;
    type Readback;
    type PresentTarget: ?Sized;

    fn allocate_image(&self, desc: &FrameBufferDesc) -> Result<Self::Image, AllocationError>;

    fn create_encoder(&self, label: &'static str) -> Self::Encoder;

    /// `sample = settled + (sample - settled) / (passes_completed + 1)`
    /// per channel, in place on `sample`.
    fn encode_average(
        &self,
        encoder: &mut Self::Encoder,
        settled: &Self::Image,
        sample: &Self::Image,
        extent: Extent,
        passes_completed: u32,
    ) -> Result<(), DispatchError>;

    fn encode_present(
        &self,
        encoder: &mut Self::Encoder,
        source: &Self::Image,
        extent: Extent,
        target: &Self::PresentTarget,
    );

    /// Clears `target` to opaque black.
    fn encode_clear(&self, encoder: &mut Self::Encoder, target: &Self::PresentTarget);

    fn encode_readback(
        &self,
        encoder: &mut Self::Encoder,
        image: &Self::Image,
        extent: Extent,
    ) -> Self::Readback;

    fn submit(
        &self,
        encoder: Self::Encoder,
        readback: Option<(Self::Readback, ReadbackCallback)>,
        on_complete: SubmitCallback,
    );

    /// Fires callbacks of finished submissions without blocking.
    fn poll_completions(&self);

    /// Blocks until every submission so far has finished.
    fn wait_for_submissions(&self);
}
