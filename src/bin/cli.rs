//! midisplit CLI: split a multi-track MIDI file and render each track to audio.
//!
//! Usage:
//!   ms-cli song.mid
//!   ms-cli song.mid --extension aiff --output-dir out/
//!   ms-cli song.mid --config render.toml -v

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use ms_master::{Error, MidiProcessor, RenderConfig};
use tracing::error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ms-cli")]
#[command(about = "Split a MIDI file into per-track files and render each to audio")]
#[command(version)]
struct Args {
    /// Multi-track Standard MIDI File
    input: PathBuf,

    /// TOML render configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(long)]
    sample_rate: Option<u32>,

    /// Audio file extension (wav or aiff)
    #[arg(short, long)]
    extension: Option<String>,

    /// Directory for split and rendered files
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Log per-track progress
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn render_config(&self) -> Result<RenderConfig, Error> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)?,
            None => RenderConfig::default(),
        };
        if let Some(rate) = self.sample_rate {
            config.sample_rate = rate;
        }
        if let Some(ext) = &self.extension {
            config.output_extension = ext.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = Some(dir.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

fn run(args: &Args) -> Result<Vec<PathBuf>, Error> {
    let mut processor = MidiProcessor::new(&args.input, args.render_config()?);
    processor.split_tracks()?;
    Ok(processor.convert_tracks()?.to_vec())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();

    match run(&args) {
        Ok(files) => {
            for file in files {
                println!("{}", file.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(input = %args.input.display(), "{e}");
            ExitCode::FAILURE
        }
    }
}
