//! Built-in machine implementations.

mod output;
mod synth;

pub use output::{OutputKind, OutputMachine};
pub use synth::SynthMachine;
