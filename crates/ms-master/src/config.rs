//! Render configuration, loadable from TOML.
//!
//! ```toml
//! sample_rate = 16000
//! block_frames = 512
//! cpu_load = 0.8
//! tail_padding_beats = 8.0
//! output_extension = "wav"
//! output_dir = "out"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Highest sample rate accepted for rendering.
pub const MAX_SAMPLE_RATE: u32 = 384_000;

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Settings for the split and render stages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Output sample rate in Hz
    pub sample_rate: u32,
    /// Frames pulled from the render graph per block
    pub block_frames: usize,
    /// Synth CPU budget in (0, 1]; bounds polyphony
    pub cpu_load: f32,
    /// Silence rendered after the last beat so releases ring out
    pub tail_padding_beats: f64,
    /// Audio file extension; selects the container (wav or aiff)
    pub output_extension: String,
    /// Directory for split and rendered files; defaults to the input's directory
    pub output_dir: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            block_frames: ms_ir::BLOCK_SIZE,
            cpu_load: 0.8,
            tail_padding_beats: 8.0,
            output_extension: "wav".to_string(),
            output_dir: None,
        }
    }
}

impl RenderConfig {
    /// Read a TOML file; unspecified fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&contents).map_err(|e| match e {
            ConfigError::Parse { message, .. } => ConfigError::Parse { path: path.to_path_buf(), message },
            other => other,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Reject values the render pipeline cannot use.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field, reason: &str| Err(ConfigError::Invalid { field, reason: reason.to_string() });
        if self.sample_rate == 0 {
            return invalid("sample_rate", "must be non-zero");
        }
        if self.sample_rate > MAX_SAMPLE_RATE {
            return invalid("sample_rate", "must be at most 384000 Hz");
        }
        if self.block_frames == 0 {
            return invalid("block_frames", "must be non-zero");
        }
        if !(self.cpu_load > 0.0 && self.cpu_load <= 1.0) {
            return invalid("cpu_load", "must be in (0, 1]");
        }
        if !(self.tail_padding_beats >= 0.0 && self.tail_padding_beats.is_finite()) {
            return invalid("tail_padding_beats", "must be a finite, non-negative number");
        }
        if let Err(e) = ms_formats::ContainerType::from_extension(&self.output_extension) {
            return invalid("output_extension", &e.to_string());
        }
        Ok(())
    }
}
