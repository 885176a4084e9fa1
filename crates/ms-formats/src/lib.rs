//! File formats for midisplit.
//!
//! Reads and writes Standard MIDI Files and writes the PCM containers
//! (WAV, AIFF) the renderer produces.

mod chunk;
mod error;
mod pcm;
mod reader;
mod writer;

pub use chunk::{ChunkHeader, HeaderChunk};
pub use error::{OpenError, ParseError, PcmInfoError, WriteError};
pub use pcm::{read_pcm_info, ContainerType, PcmInfo, PcmWriter};
pub use reader::{parse_bytes, MidiStream};
pub use writer::{create_output, encode_sequence, SmfWriter, FORMAT_MULTI_TRACK};
