//! Sequencer: plays a loaded sequence into the render graph on a virtual clock.
//!
//! Event times are converted from ticks to sample positions once at load
//! time through the sequence's tempo map. Each render block then drains the
//! events that fall inside it and hands them to the instrument with their
//! frame offset, so note timing is sample-accurate regardless of block size.

use ms_ir::{EventKind, MidiClockTime, MultiTrackSequence, TempoMap};

use crate::error::RenderError;
use crate::event_queue::EventQueue;
use crate::frame::Frame;
use crate::graph::{RenderGraph, SinkHandle, SynthHandle};

pub struct Sequencer {
    tempo_map: TempoMap,
    queue: EventQueue,
    sample_rate: u32,
    /// Current playback position in samples
    position: u64,
    playing: bool,
    /// End-of-track tick of each loaded track
    track_ends: Vec<MidiClockTime>,
}

impl Sequencer {
    /// Schedule every playable event of `seq` at `sample_rate`.
    pub fn load(seq: &MultiTrackSequence, sample_rate: u32) -> Self {
        let tempo_map = TempoMap::from_sequence(seq);
        let mut queue = EventQueue::new();
        for track in &seq.tracks {
            for event in track.events().iter().filter(|e| is_playable(&e.kind)) {
                let seconds = tempo_map.ticks_to_seconds(event.time);
                queue.push(seconds_to_sample(seconds, sample_rate), event.kind.clone());
            }
        }

        Self {
            tempo_map,
            queue,
            sample_rate,
            position: 0,
            playing: false,
            track_ends: seq.tracks.iter().map(|t| t.end_time()).collect(),
        }
    }

    pub fn tempo_map(&self) -> &TempoMap {
        &self.tempo_map
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of events scheduled for playback.
    pub fn scheduled_events(&self) -> usize {
        self.queue.len()
    }

    /// Length of track `index` in beats, measured to its end-of-track tick.
    pub fn track_length_beats(&self, index: usize) -> Option<f64> {
        let end = *self.track_ends.get(index)?;
        Some(end as f64 / self.tempo_map.clocks_per_beat() as f64)
    }

    /// Move the virtual clock to `seconds`.
    pub fn set_time(&mut self, seconds: f64) {
        self.position = seconds_to_sample(seconds.max(0.0), self.sample_rate);
    }

    /// Prepare the event cursor for playback from the current position.
    pub fn preroll(&mut self) {
        self.queue.seek(self.position);
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn position_samples(&self) -> u64 {
        self.position
    }

    pub fn current_seconds(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }

    /// Virtual clock position in beats.
    pub fn current_beats(&self) -> f64 {
        self.tempo_map.seconds_to_beats(self.current_seconds())
    }

    /// Render one block of `frames` frames and advance the clock.
    ///
    /// A stopped sequencer still pulls the graph (releasing tails ring out)
    /// but dispatches no events and does not move the clock.
    pub fn render_block<'g>(
        &mut self,
        graph: &'g mut RenderGraph,
        synth: SynthHandle,
        sink: SinkHandle,
        frames: usize,
    ) -> Result<&'g [Frame], RenderError> {
        if self.playing {
            let end = self.position + frames as u64;
            for index in self.queue.drain_until(end) {
                if let Some(event) = self.queue.get(index) {
                    let offset = event.sample.saturating_sub(self.position) as usize;
                    graph.send_event(synth, offset, &event.kind)?;
                }
            }
        }

        let out = graph.pull(sink, frames)?;
        if self.playing {
            self.position += frames as u64;
        }
        Ok(out)
    }
}

/// Events the instrument reacts to; meta, sysex and tempo are clock-only.
fn is_playable(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::NoteOn { .. } | EventKind::NoteOff { .. } | EventKind::Channel { .. }
    )
}

pub(crate) fn seconds_to_sample(seconds: f64, sample_rate: u32) -> u64 {
    (seconds * sample_rate as f64).round() as u64
}
