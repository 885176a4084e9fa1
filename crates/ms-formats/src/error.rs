//! Error types for reading and writing files.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The input file could not be read.
#[derive(Debug, Error)]
#[error("cannot open {}: {source}", path.display())]
pub struct OpenError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}

/// The input bytes are not a decodable Standard MIDI File.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed MIDI data: {0}")]
    Malformed(String),
}

impl ParseError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        ParseError::Malformed(reason.into())
    }
}

impl From<midly::Error> for ParseError {
    fn from(err: midly::Error) -> Self {
        let mut reason = err.kind().to_string();
        let mut cause = err.source();
        while let Some(inner) = cause {
            reason.push_str(": ");
            reason.push_str(&inner.kind().to_string());
            cause = inner.source();
        }
        ParseError::Malformed(reason)
    }
}

/// The bytes are not a WAV or AIFF file this crate can describe.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("not a PCM container: {reason}")]
pub struct PcmInfoError {
    pub reason: &'static str,
}

/// Writing a MIDI or PCM file failed.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("cannot create {}: {source}", path.display())]
    CannotCreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("write failed: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported audio container extension {0:?} (expected wav or aiff)")]
    UnsupportedContainer(String),
    #[error("{what} exceeds the 32-bit chunk size limit")]
    TooLarge { what: &'static str },
    #[error("event at tick {time} precedes the previous event at tick {previous}")]
    NonMonotonic { time: u64, previous: u64 },
}

impl From<binrw::Error> for WriteError {
    fn from(err: binrw::Error) -> Self {
        match err {
            binrw::Error::Io(io) => WriteError::Io(io),
            other => WriteError::Io(io::Error::new(io::ErrorKind::InvalidData, other.to_string())),
        }
    }
}
