//! Track and multi-track sequence containers.

use crate::event::{MidiClockTime, TimedEvent};

/// Ordered list of events belonging to one MIDI track.
///
/// Parsed tracks end with a `DataEnd` sentinel whose time marks the end of
/// the track. Events are expected to be non-decreasing in time; this is not
/// enforced on insert, use `first_out_of_order` to check.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Track {
    events: Vec<TimedEvent>,
}

impl Track {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Build a track from events, appending a sentinel at the last event's time.
    pub fn from_events(events: Vec<TimedEvent>) -> Self {
        let end = events.last().map(|e| e.time).unwrap_or(0);
        let mut track = Self { events };
        track.close(end);
        track
    }

    /// Append an event.
    pub fn push(&mut self, event: TimedEvent) {
        self.events.push(event);
    }

    /// Terminate the track with a `DataEnd` sentinel at `time`.
    ///
    /// Does nothing if the track is already terminated.
    pub fn close(&mut self, time: MidiClockTime) {
        if self.sentinel().is_none() {
            self.events.push(TimedEvent::data_end(time));
        }
    }

    pub fn events(&self) -> &[TimedEvent] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&TimedEvent> {
        self.events.get(index)
    }

    /// Number of events, sentinel included.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Index of the first event that is earlier than the event before it.
    pub fn first_out_of_order(&self) -> Option<usize> {
        self.events
            .windows(2)
            .position(|pair| pair[1].time < pair[0].time)
            .map(|i| i + 1)
    }

    /// The terminal `DataEnd` event, if present.
    pub fn sentinel(&self) -> Option<&TimedEvent> {
        self.events.last().filter(|e| e.is_data_end())
    }

    /// Tick at which the track ends (sentinel time, else last event time).
    pub fn end_time(&self) -> MidiClockTime {
        self.events.last().map(|e| e.time).unwrap_or(0)
    }

    /// Tempo-change events in track order.
    pub fn tempo_events(&self) -> impl Iterator<Item = &TimedEvent> {
        self.events.iter().filter(|e| e.is_tempo())
    }
}

/// A parsed multi-track MIDI sequence.
///
/// Track 0 is conventionally the tempo/meta track.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MultiTrackSequence {
    /// Tracks in file order
    pub tracks: Vec<Track>,
    /// MIDI clocks (ticks) per quarter note
    pub clocks_per_beat: u16,
}

impl MultiTrackSequence {
    /// Create a sequence with `num_tracks` empty tracks.
    pub fn with_tracks(num_tracks: usize, clocks_per_beat: u16) -> Self {
        Self {
            tracks: (0..num_tracks).map(|_| Track::new()).collect(),
            clocks_per_beat,
        }
    }

    pub fn num_tracks(&self) -> usize {
        self.tracks.len()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    /// The tempo/meta track (track 0).
    pub fn tempo_track(&self) -> Option<&Track> {
        self.tracks.first()
    }

    /// Latest end time across all tracks.
    pub fn end_time(&self) -> MidiClockTime {
        self.tracks.iter().map(Track::end_time).max().unwrap_or(0)
    }
}
