//! Offline synthesis engine for midisplit.
//!
//! A render graph of machines (an oscillator synth feeding an output sink)
//! driven by a sequencer on a virtual clock, pulled block by block into
//! 16-bit stereo frames.

mod channel;
mod envelope_state;
mod error;
mod event_queue;
mod frame;
mod frequency;
mod graph;
mod machine;
pub mod machines;
mod offline;
mod sequencer;
mod voice;
mod voice_pool;

pub use channel::ChannelState;
pub use envelope_state::{AdsrParams, EnvelopePhase, EnvelopeState};
pub use error::{GraphConfigError, RenderError};
pub use event_queue::{EventQueue, ScheduledEvent};
pub use frame::Frame;
pub use frequency::note_to_frequency;
pub use graph::{topological_sort, Connection, NodeKey, RenderGraph, SinkHandle, SynthHandle};
pub use machine::{Machine, MachineInfo, MachineType, Property};
pub use offline::{block_count, PcmBlocks};
pub use sequencer::Sequencer;
pub use voice_pool::{VoicePool, MAX_VOICES};
