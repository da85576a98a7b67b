//! Renderer crate root.
//!
//! Drives one technique instance frame by frame on top of a [`RenderBackend`].
//!
//! Internal architecture overview:
//! - `backend`: the device seam, implemented for wgpu by `gpu_backend`.
//! - `frame_buffers`: the one or two display-sized output buffers.
//! - `technique`: the trait techniques implement and the per-frame context they see.
//! - `render_core`: per-frame orchestration of animation, parameters, tiles,
//!   accumulation, presentation and export.
//! - `in_flight`: keeps at most one frame on the GPU.

mod backend;
mod errors;
mod frame_buffers;
mod gpu_backend;
#[cfg(any(test, feature = "test-helpers"))]
mod host_backend;
mod in_flight;
mod render_core;
mod technique;

pub use backend::{ReadbackCallback, ReadbackError, RenderBackend, SubmitCallback};
pub use errors::{AllocationError, ConstructionError, CoreError, DispatchError};
pub use frame_buffers::FrameBufferSet;
pub use frame_scheduler::{AccumulationState, DropReason, PassStatus};
pub use gpu_backend::{
    COMPUTE_WORKGROUP_SIZE, ComputeProgram, GpuBackend, GpuImage, GpuReadback, storage_entry,
    uniform_entry, workgroups_for,
};
#[cfg(any(test, feature = "test-helpers"))]
pub use host_backend::{HostBackend, HostEncoder, HostImage, HostReadback};
pub use in_flight::{InFlightGate, InFlightToken};
pub use render_core::{
    CoreSettings, DEFAULT_TARGET_PASSES, FrameReport, FrameStatus, MAX_TARGET_PASSES, RenderCore,
};
pub use technique::{FrameContext, Technique};

#[cfg(test)]
mod wgsl_tests;
