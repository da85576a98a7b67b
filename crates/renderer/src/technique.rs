use frame_scheduler::{AccumulationState, PassStatus};
use parameters::{ChangeSet, ParameterStore};
use render_protocol::{DispatchExtent, Extent, PassDescriptor, TechniqueDescriptor, TileRegion};

use crate::backend::RenderBackend;
use crate::errors::{AllocationError, DispatchError};
use crate::frame_buffers::FrameBufferSet;

/// Everything a pass may read while encoding one displayed frame. Buffer
/// references are only valid for this frame.
pub struct FrameContext<'a, B: RenderBackend> {
    pub parameters: &'a ParameterStore,
    /// Parameters changed since the previous frame.
    pub changes: &'a ChangeSet,
    pub animation_frame: i64,
    pub region: TileRegion,
    pub display: Extent,
    pub render_cap: Extent,
    pub accumulation: AccumulationState,
    pub target: &'a B::Image,
    pub generation: u64,
}

impl<B: RenderBackend> FrameContext<'_, B> {
    /// Region a pass covers according to its declared dispatch extent.
    pub fn dispatch_region(&self, pass: &PassDescriptor) -> TileRegion {
        match pass.dispatch {
            DispatchExtent::Tile => self.region,
            DispatchExtent::Display => TileRegion::full(self.display),
            DispatchExtent::Fixed(extent) => TileRegion::full(extent),
        }
    }
}

/// A renderer technique: a declared pass list plus the code that encodes each
/// pass. Techniques never keep buffer references between frames.
pub trait Technique<B: RenderBackend> {
    fn descriptor(&self) -> &TechniqueDescriptor;

    fn encode_pass(
        &mut self,
        backend: &B,
        encoder: &mut B::Encoder,
        pass_index: usize,
        pass: &PassDescriptor,
        frame: &FrameContext<'_, B>,
    ) -> Result<PassStatus, DispatchError>;

    /// Called after the frame buffers were reallocated for a new display size.
    fn resize(&mut self, _backend: &B, _display: Extent) -> Result<(), AllocationError> {
        Ok(())
    }

    fn present_source<'a>(&self, buffers: &'a FrameBufferSet<B>) -> Option<&'a B::Image> {
        buffers.settled()
    }
}
