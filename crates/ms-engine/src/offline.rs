//! Offline render loop as an iterator of fixed-size PCM blocks.

use crate::error::RenderError;
use crate::frame::Frame;
use crate::graph::{RenderGraph, SinkHandle, SynthHandle};
use crate::sequencer::Sequencer;

/// Number of blocks the render loop produces for `seconds` of audio.
///
/// At least one block is always rendered.
pub fn block_count(seconds: f64, sample_rate: u32, block_frames: usize) -> u64 {
    let samples = target_samples(seconds, sample_rate);
    samples.div_ceil(block_frames.max(1) as u64).max(1)
}

fn target_samples(seconds: f64, sample_rate: u32) -> u64 {
    // Tolerate float noise just above an exact sample boundary.
    (seconds.max(0.0) * sample_rate as f64 - 1e-6).ceil().max(0.0) as u64
}

/// Pulls full blocks from the graph until the sequencer's clock reaches the
/// target beat position.
///
/// The check happens after each block, so the final block is always emitted
/// at full size even when it runs past the target.
pub struct PcmBlocks<'a> {
    sequencer: &'a mut Sequencer,
    graph: &'a mut RenderGraph,
    synth: SynthHandle,
    sink: SinkHandle,
    block_frames: usize,
    target_samples: u64,
    target_beats: f64,
    done: bool,
}

impl<'a> PcmBlocks<'a> {
    /// Start rendering from the sequencer's current position.
    pub fn new(
        sequencer: &'a mut Sequencer,
        graph: &'a mut RenderGraph,
        (synth, sink): (SynthHandle, SinkHandle),
        block_frames: usize,
        target_beats: f64,
    ) -> Self {
        let seconds = sequencer.tempo_map().beats_to_seconds(target_beats);
        let target_samples = target_samples(seconds, sequencer.sample_rate());
        sequencer.preroll();
        sequencer.start();
        Self {
            sequencer,
            graph,
            synth,
            sink,
            block_frames: block_frames.max(1),
            target_samples,
            target_beats,
            done: false,
        }
    }

    pub fn target_beats(&self) -> f64 {
        self.target_beats
    }

    /// Clock position in beats after the last emitted block.
    pub fn current_beats(&self) -> f64 {
        self.sequencer.current_beats()
    }
}

impl Iterator for PcmBlocks<'_> {
    type Item = Result<Vec<Frame>, RenderError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let block = self
            .sequencer
            .render_block(self.graph, self.synth, self.sink, self.block_frames)
            .map(<[Frame]>::to_vec);
        if block.is_err() || self.sequencer.position_samples() >= self.target_samples {
            self.done = true;
            self.sequencer.stop();
        }
        Some(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::Property;
    use ms_ir::{MultiTrackSequence, TimedEvent, Track};

    fn setup(rate: u32) -> (Sequencer, RenderGraph, SynthHandle, SinkHandle) {
        let mut seq = MultiTrackSequence::with_tracks(0, 96);
        seq.tracks.push(Track::from_events(vec![
            TimedEvent::note_on(0, 0, 64, 90),
            TimedEvent::note_off(96, 0, 64, 0),
        ]));
        let sequencer = Sequencer::load(&seq, rate);
        let (mut graph, synth, sink) = RenderGraph::build();
        let sink = graph.use_generic_output(sink).unwrap();
        graph.set_property_all(Property::SampleRate(rate)).unwrap();
        graph.set_property_all(Property::MaxFramesPerSlice(512)).unwrap();
        graph.set_synth_property(synth, Property::OfflineRender(true)).unwrap();
        (sequencer, graph, synth, sink)
    }

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(block_count(1.0, 16000, 512), 32);
        assert_eq!(block_count(0.5, 1024, 512), 1);
        assert_eq!(block_count(0.5001, 1024, 512), 2);
        assert_eq!(block_count(0.0, 16000, 512), 1);
    }

    #[test]
    fn renders_until_target_with_full_blocks() {
        let (mut sequencer, mut graph, synth, sink) = setup(16000);
        // 1 beat + 8 beats of tail at 120 BPM = 4.5 s
        let target = sequencer.track_length_beats(0).unwrap() + 8.0;
        let seconds = sequencer.tempo_map().beats_to_seconds(target);
        let blocks: Vec<_> = PcmBlocks::new(&mut sequencer, &mut graph, (synth, sink), 512, target)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(blocks.len() as u64, block_count(seconds, 16000, 512));
        assert_eq!(blocks.len(), 141);
        assert!(blocks.iter().all(|b| b.len() == 512));
        assert!(blocks[0].iter().any(|f| !f.is_silent()));
        assert!(sequencer.current_beats() >= target);
        assert!(!sequencer.is_playing());
    }

    #[test]
    fn render_error_ends_iteration() {
        let (mut sequencer, mut graph, synth, sink) = setup(16000);
        graph.set_synth_property(synth, Property::OfflineRender(false)).unwrap();
        let mut blocks = PcmBlocks::new(&mut sequencer, &mut graph, (synth, sink), 512, 4.0);
        assert!(matches!(blocks.next(), Some(Err(RenderError::NotOffline(_)))));
        assert!(blocks.next().is_none());
    }
}
