//! Offline render of one split MIDI file to a PCM container.

use std::io::{Seek, Write};
use std::path::Path;

use ms_engine::{PcmBlocks, Property, RenderGraph, Sequencer, SinkHandle, SynthHandle};
use ms_formats::{MidiStream, PcmWriter};
use ms_ir::MultiTrackSequence;
use tracing::debug;

use crate::config::RenderConfig;
use crate::error::Error;

/// Everything one conversion needs: the loaded sequence, its render graph
/// and the target end position. Dropped when the conversion finishes.
pub struct RenderSession {
    sequencer: Sequencer,
    graph: RenderGraph,
    synth: SynthHandle,
    sink: SinkHandle,
    block_frames: usize,
    target_beats: f64,
}

impl RenderSession {
    /// Load a MIDI file and build its render graph.
    pub fn open(path: &Path, config: &RenderConfig) -> Result<Self, Error> {
        let seq = MidiStream::open(path)?
            .parse()
            .map_err(|e| Error::parse(path, e))?;
        Self::from_sequence(&seq, config)
    }

    pub fn from_sequence(seq: &MultiTrackSequence, config: &RenderConfig) -> Result<Self, Error> {
        let mut sequencer = Sequencer::load(seq, config.sample_rate);

        let (mut graph, synth, sink) = RenderGraph::build();
        let sink = graph.use_generic_output(sink)?;
        graph.set_property_all(Property::SampleRate(config.sample_rate))?;
        graph.set_property_all(Property::MaxFramesPerSlice(config.block_frames))?;
        graph.set_synth_property(synth, Property::CpuLoad(config.cpu_load))?;
        graph.set_synth_property(synth, Property::OfflineRender(true))?;

        let track_beats = sequencer.track_length_beats(0).unwrap_or(0.0);
        sequencer.set_time(0.0);

        Ok(Self {
            sequencer,
            graph,
            synth,
            sink,
            block_frames: config.block_frames,
            target_beats: track_beats + config.tail_padding_beats,
        })
    }

    /// Beat position at which rendering stops.
    pub fn target_beats(&self) -> f64 {
        self.target_beats
    }

    /// Rendered length in seconds, before rounding up to whole blocks.
    pub fn duration_seconds(&self) -> f64 {
        self.sequencer.tempo_map().beats_to_seconds(self.target_beats)
    }

    /// The render loop, one block of frames per item.
    pub fn blocks(&mut self) -> PcmBlocks<'_> {
        PcmBlocks::new(
            &mut self.sequencer,
            &mut self.graph,
            (self.synth, self.sink),
            self.block_frames,
            self.target_beats,
        )
    }

    /// Render every block into `writer`. Returns the number of blocks written.
    pub fn render_to<W: Write + Seek>(&mut self, writer: &mut PcmWriter<W>) -> Result<u64, Error> {
        let mut count = 0;
        for block in self.blocks() {
            writer.write_frames(&block?)?;
            count += 1;
        }
        Ok(count)
    }
}

/// Outcome of one conversion.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConvertStats {
    pub blocks: u64,
    pub frames: u64,
    pub seconds: f64,
}

/// Render the MIDI file at `source` into the audio file `dest`.
///
/// The container is chosen from `dest`'s extension.
pub fn convert_track(source: &Path, dest: &Path, config: &RenderConfig) -> Result<ConvertStats, Error> {
    let mut session = RenderSession::open(source, config)?;
    let mut writer = PcmWriter::create(dest, config.sample_rate)?;
    debug!(
        source = %source.display(),
        container = ?writer.container(),
        target_beats = session.target_beats(),
        "rendering"
    );
    let blocks = session.render_to(&mut writer)?;
    let frames = writer.frames_written();
    writer.finalize()?;
    Ok(ConvertStats {
        blocks,
        frames,
        seconds: session.duration_seconds(),
    })
}
