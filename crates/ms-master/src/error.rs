//! Errors surfaced by the split and convert stages.

use std::path::PathBuf;
use std::sync::Arc;

use ms_engine::{GraphConfigError, RenderError};
use ms_formats::{OpenError, ParseError, WriteError};
use thiserror::Error;

use crate::config::ConfigError;
use crate::Stage;

/// A source track's events are not in time order.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("track {track}: event {index} is earlier than the event before it")]
pub struct OrderError {
    /// 1-based source track number
    pub track: usize,
    /// Index of the first out-of-order event within the track
    pub index: usize,
}

/// Every failure the processor can report. Each one aborts the stage.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    #[error(transparent)]
    Write(#[from] WriteError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Graph(#[from] GraphConfigError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("input {} is not a valid MIDI file: {reason}", path.display())]
    NotValidated {
        path: PathBuf,
        reason: &'static str,
        /// Set when the file could not be read at all
        #[source]
        source: Option<Arc<OpenError>>,
    },
    #[error("no split track files to convert; run split_tracks first")]
    NoSplitFiles,
    #[error("{operation} is not allowed in stage {stage:?}")]
    InvalidStage { operation: &'static str, stage: Stage },
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    pub(crate) fn parse(path: impl Into<PathBuf>, source: ParseError) -> Self {
        Error::Parse { path: path.into(), source }
    }
}
