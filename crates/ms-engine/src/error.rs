//! Error types for graph construction and rendering.

use thiserror::Error;

use crate::machine::MachineType;

/// The render graph does not have the shape the pipeline needs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphConfigError {
    #[error("render graph has no {0:?} node")]
    Missing(MachineType),
    #[error("render graph has {count} {kind:?} nodes, expected exactly one")]
    Ambiguous { kind: MachineType, count: usize },
    #[error("node handle does not refer to a {0:?} node in this graph")]
    StaleHandle(MachineType),
}

/// A property change or render pull failed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("{machine}: property {property} rejected: {reason}")]
    Property {
        machine: &'static str,
        property: &'static str,
        reason: String,
    },
    #[error("{0}: not initialized (sample rate unset)")]
    NotInitialized(&'static str),
    #[error("{0}: live rendering needs a real-time clock; enable offline render")]
    NotOffline(&'static str),
    #[error("hardware output cannot be pulled; reconfigure the sink as a generic output")]
    HardwareOutput,
    #[error("requested {requested} frames, maximum per slice is {max}")]
    SliceTooLarge { requested: usize, max: usize },
    #[error(transparent)]
    Graph(#[from] GraphConfigError),
}
