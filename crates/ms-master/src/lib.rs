//! Headless split-and-render controller for midisplit.
//!
//! `MidiProcessor` takes one multi-track MIDI file through two stages:
//! split each instrument track into its own MIDI file (with the tempo map
//! merged in), then render each split file offline to a PCM audio file.
//! Callers get back the ordered list of audio files.

mod cancel;
mod config;
mod convert;
mod error;
mod paths;
mod split;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ms_formats::{MidiStream, OpenError};
use tracing::{debug, info, warn};

pub use cancel::CancelToken;
pub use config::{ConfigError, RenderConfig, MAX_SAMPLE_RATE};
pub use convert::{convert_track, ConvertStats, RenderSession};
pub use error::{Error, OrderError};
pub use paths::{converted_path, split_track_path};
pub use split::TrackSplitter;

// Re-export common types so callers don't need the lower crates directly.
pub use ms_engine::Frame;
pub use ms_formats::{ContainerType, ParseError, WriteError};
pub use ms_ir::MultiTrackSequence;

/// Pipeline stage reached so far. Stages only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    /// The input could not be opened or has no MIDI header
    Unopened,
    /// The input has a recognizable MIDI header
    Validated,
    /// Split files are on disk
    Split,
    /// Audio files are on disk
    Converted,
}

/// Drives one input file through split and convert.
pub struct MidiProcessor {
    input: PathBuf,
    config: RenderConfig,
    stream: Option<MidiStream>,
    open_error: Option<Arc<OpenError>>,
    stage: Stage,
    split_files: Vec<PathBuf>,
    converted_files: Vec<PathBuf>,
    cancel: CancelToken,
}

impl MidiProcessor {
    /// Open and validate `input`. Never fails; check `is_valid`.
    pub fn new(input: impl AsRef<Path>, config: RenderConfig) -> Self {
        let input = input.as_ref().to_path_buf();
        let (stream, open_error) = match MidiStream::open(&input) {
            Ok(stream) if stream.is_valid() => (Some(stream), None),
            Ok(_) => (None, None),
            Err(e) => (None, Some(Arc::new(e))),
        };
        let stage = if stream.is_some() { Stage::Validated } else { Stage::Unopened };
        match (&stream, &open_error) {
            (Some(_), _) => debug!(input = %input.display(), "input validated"),
            (None, Some(e)) => warn!(input = %input.display(), error = %e.source, "input rejected"),
            (None, None) => warn!(input = %input.display(), "input rejected: no MThd header chunk"),
        }

        Self {
            input,
            config,
            stream,
            open_error,
            stage,
            split_files: Vec::new(),
            converted_files: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Observe `token` between tracks in both stages.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn is_valid(&self) -> bool {
        self.stage >= Stage::Validated
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Split every track after the tempo track into its own MIDI file.
    ///
    /// May be repeated; outputs are overwritten and produce identical bytes.
    pub fn split_tracks(&mut self) -> Result<&[PathBuf], Error> {
        let stream = match (&self.stream, self.stage) {
            (Some(stream), Stage::Validated | Stage::Split) => stream,
            (None, _) => {
                let reason = match self.open_error {
                    Some(_) => "cannot be opened",
                    None => "no MThd header chunk",
                };
                return Err(Error::NotValidated {
                    path: self.input.clone(),
                    reason,
                    source: self.open_error.clone(),
                });
            }
            (Some(_), stage) => return Err(Error::InvalidStage { operation: "split_tracks", stage }),
        };

        info!(input = %self.input.display(), "splitting tracks");
        let seq = stream.parse().map_err(|e| Error::parse(&self.input, e))?;
        let output_dir = self.config.output_dir.as_deref();
        if let Some(dir) = output_dir {
            std::fs::create_dir_all(dir).map_err(|source| ms_formats::WriteError::CannotCreateOutput {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        let files = TrackSplitter::new(&seq).split_all(&self.input, output_dir, &self.cancel)?;
        info!(tracks = seq.num_tracks(), written = files.len(), "split finished");
        self.split_files = files;
        self.stage = Stage::Split;
        Ok(&self.split_files)
    }

    /// Render every split file to audio, in split order.
    pub fn convert_tracks(&mut self) -> Result<&[PathBuf], Error> {
        match self.stage {
            Stage::Split => {}
            Stage::Converted => {
                return Err(Error::InvalidStage { operation: "convert_tracks", stage: self.stage })
            }
            Stage::Unopened | Stage::Validated => return Err(Error::NoSplitFiles),
        }
        if self.split_files.is_empty() {
            return Err(Error::NoSplitFiles);
        }

        info!(files = self.split_files.len(), "converting tracks");
        let output_dir = self.config.output_dir.as_deref();
        let mut converted = Vec::with_capacity(self.split_files.len());
        for split in &self.split_files {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let dest = converted_path(split, &self.config.output_extension, output_dir);
            let stats = convert_track(split, &dest, &self.config)?;
            debug!(
                path = %dest.display(),
                blocks = stats.blocks,
                seconds = stats.seconds,
                "track rendered"
            );
            converted.push(dest);
        }

        info!(files = converted.len(), "conversion finished");
        self.converted_files = converted;
        self.stage = Stage::Converted;
        Ok(&self.converted_files)
    }

    /// Number of rendered audio files.
    pub fn num_tracks(&self) -> usize {
        self.converted_files.len()
    }

    pub fn converted_track_names(&self) -> &[PathBuf] {
        &self.converted_files
    }

    pub fn split_track_names(&self) -> &[PathBuf] {
        &self.split_files
    }
}
