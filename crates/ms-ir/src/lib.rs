//! Core IR types for midisplit.
//!
//! This crate defines the intermediate representation shared by the
//! MIDI reader/writer, the track splitter and the offline renderer:
//! timed events, tracks, multi-track sequences and tempo maps.

mod audio_buffer;
mod event;
mod sequence;
mod tempo;

pub use audio_buffer::{AudioBuffer, BLOCK_SIZE, MAX_CHANNELS};
pub use event::{EventKind, MidiClockTime, TimedEvent, DEFAULT_USEC_PER_BEAT};
pub use sequence::{MultiTrackSequence, Track};
pub use tempo::TempoMap;
