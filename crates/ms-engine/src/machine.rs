//! Machine trait for render-graph nodes.

use ms_ir::{AudioBuffer, EventKind};

use crate::error::RenderError;

/// Role a machine plays in the render graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MachineType {
    /// Generates audio from MIDI events.
    Instrument,
    /// Processes audio from its inputs.
    Effect,
    /// Terminal node the renderer pulls from.
    Output,
}

/// Static metadata about a machine.
pub struct MachineInfo {
    pub name: &'static str,
    pub short_name: &'static str,
    pub machine_type: MachineType,
}

/// Configurable properties, set before rendering starts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Property {
    /// Output sample rate in Hz.
    SampleRate(u32),
    /// Largest frame count a single `work` call may be asked for.
    MaxFramesPerSlice(usize),
    /// Fraction (0, 1] of the processing budget the machine may use.
    CpuLoad(f32),
    /// Render from an explicit virtual clock instead of a real-time one.
    OfflineRender(bool),
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::SampleRate(_) => "SampleRate",
            Property::MaxFramesPerSlice(_) => "MaxFramesPerSlice",
            Property::CpuLoad(_) => "CpuLoad",
            Property::OfflineRender(_) => "OfflineRender",
        }
    }
}

/// Core trait for render-graph nodes.
pub trait Machine: Send {
    fn info(&self) -> &MachineInfo;

    /// Apply a property. Machines reject properties they do not support.
    fn set_property(&mut self, property: Property) -> Result<(), RenderError>;

    /// Receive a MIDI event that takes effect `offset` frames into the next block.
    fn handle_event(&mut self, _offset: usize, _event: &EventKind) {}

    /// Render one block. `buffer` arrives holding the sum of this node's
    /// inputs (silence for sources) and is overwritten with the node's output.
    fn work(&mut self, buffer: &mut AudioBuffer) -> Result<(), RenderError>;

    /// Silence all sound immediately.
    fn stop(&mut self) {}
}

/// Shorthand for the error a machine returns for an unsupported property.
pub(crate) fn unsupported(info: &MachineInfo, property: Property) -> RenderError {
    RenderError::Property {
        machine: info.name,
        property: property.name(),
        reason: "not supported by this machine".to_string(),
    }
}
