use animation::LoopRangeError;
use parameters::ParameterError;
use render_protocol::DescriptorError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("{label}: {bytes} bytes exceeds the device limit of {limit} bytes")]
    ExceedsLimit {
        label: &'static str,
        bytes: u64,
        limit: u64,
    },
    #[error("{label}: out of memory allocating {bytes} bytes: {reason}")]
    OutOfMemory {
        label: &'static str,
        bytes: u64,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("pass {label} is not declared by this technique")]
    UnknownPass { label: &'static str },
    #[error("frame buffers are not allocated")]
    BuffersUnavailable,
    #[error("missing resource {0}")]
    MissingResource(&'static str),
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// A technique instance could not be built; it is unusable.
#[derive(Debug, Error)]
pub enum ConstructionError {
    #[error("unknown technique {0}")]
    UnknownTechnique(String),
    #[error("technique {technique} has an invalid descriptor: {source}")]
    Descriptor {
        technique: &'static str,
        #[source]
        source: DescriptorError,
    },
    #[error("pipeline {label} failed to build: {reason}")]
    Pipeline { label: &'static str, reason: String },
    #[error("asset {name} could not be loaded")]
    Asset {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Construction(#[from] ConstructionError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
    #[error(transparent)]
    LoopRange(#[from] LoopRangeError),
}
