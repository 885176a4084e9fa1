//! Tick ↔ wall-clock conversion driven by tempo events.

use crate::event::{EventKind, MidiClockTime, DEFAULT_USEC_PER_BEAT};
use crate::sequence::MultiTrackSequence;

/// One constant-tempo stretch starting at `tick`.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Segment {
    tick: MidiClockTime,
    usec_per_beat: u32,
    /// Seconds elapsed at `tick`
    seconds: f64,
}

/// Piecewise-constant tempo map for a sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct TempoMap {
    clocks_per_beat: u16,
    segments: Vec<Segment>,
}

impl TempoMap {
    /// Constant tempo map.
    pub fn constant(clocks_per_beat: u16, usec_per_beat: u32) -> Self {
        Self {
            clocks_per_beat: clocks_per_beat.max(1),
            segments: vec![Segment { tick: 0, usec_per_beat, seconds: 0.0 }],
        }
    }

    /// Collect tempo events from every track of `seq`.
    ///
    /// Ties at the same tick resolve to the last one in track order.
    pub fn from_sequence(seq: &MultiTrackSequence) -> Self {
        let mut changes: Vec<(MidiClockTime, u32)> = seq
            .tracks
            .iter()
            .flat_map(|t| t.tempo_events())
            .filter_map(|e| match e.kind {
                EventKind::Tempo { usec_per_beat } => Some((e.time, usec_per_beat)),
                _ => None,
            })
            .collect();
        changes.sort_by_key(|&(tick, _)| tick);

        let mut map = Self::constant(seq.clocks_per_beat, DEFAULT_USEC_PER_BEAT);
        for (tick, usec) in changes {
            map.push_change(tick, usec);
        }
        map
    }

    fn push_change(&mut self, tick: MidiClockTime, usec_per_beat: u32) {
        let seconds = self.ticks_to_seconds(tick);
        match self.segments.last_mut() {
            Some(last) if last.tick == tick => last.usec_per_beat = usec_per_beat,
            _ => self.segments.push(Segment { tick, usec_per_beat, seconds }),
        }
    }

    pub fn clocks_per_beat(&self) -> u16 {
        self.clocks_per_beat
    }

    /// Number of tempo segments (at least one).
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn segment_for_tick(&self, tick: f64) -> &Segment {
        let idx = self
            .segments
            .partition_point(|s| s.tick as f64 <= tick)
            .saturating_sub(1);
        &self.segments[idx]
    }

    fn seconds_per_tick(&self, seg: &Segment) -> f64 {
        seg.usec_per_beat as f64 / 1_000_000.0 / self.clocks_per_beat as f64
    }

    /// Seconds elapsed at `tick`.
    pub fn ticks_to_seconds(&self, tick: MidiClockTime) -> f64 {
        self.fractional_ticks_to_seconds(tick as f64)
    }

    /// Seconds elapsed at a fractional tick position.
    pub fn fractional_ticks_to_seconds(&self, tick: f64) -> f64 {
        let seg = self.segment_for_tick(tick);
        seg.seconds + (tick - seg.tick as f64) * self.seconds_per_tick(seg)
    }

    /// Fractional tick position reached after `seconds`.
    pub fn seconds_to_ticks(&self, seconds: f64) -> f64 {
        let idx = self
            .segments
            .partition_point(|s| s.seconds <= seconds)
            .saturating_sub(1);
        let seg = &self.segments[idx];
        let per_tick = self.seconds_per_tick(seg);
        if per_tick <= 0.0 {
            return seg.tick as f64;
        }
        seg.tick as f64 + (seconds - seg.seconds) / per_tick
    }

    /// Beats (quarter notes) reached after `seconds`.
    pub fn seconds_to_beats(&self, seconds: f64) -> f64 {
        self.seconds_to_ticks(seconds) / self.clocks_per_beat as f64
    }

    /// Seconds elapsed at a beat position.
    pub fn beats_to_seconds(&self, beats: f64) -> f64 {
        self.fractional_ticks_to_seconds(beats * self.clocks_per_beat as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::TimedEvent;
    use crate::sequence::Track;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn default_tempo_is_120_bpm() {
        let seq = MultiTrackSequence::with_tracks(1, 480);
        let map = TempoMap::from_sequence(&seq);
        assert!(approx(map.ticks_to_seconds(480), 0.5));
        assert!(approx(map.seconds_to_beats(1.0), 2.0));
    }

    #[test]
    fn tempo_change_splits_segments() {
        let mut seq = MultiTrackSequence::with_tracks(1, 100);
        seq.tracks[0] = Track::from_events(vec![
            TimedEvent::tempo(0, 1_000_000),
            TimedEvent::tempo(100, 250_000),
        ]);
        let map = TempoMap::from_sequence(&seq);
        assert_eq!(map.len(), 2);
        // One beat at 60 BPM, then one beat at 240 BPM
        assert!(approx(map.ticks_to_seconds(100), 1.0));
        assert!(approx(map.ticks_to_seconds(200), 1.25));
        assert!(approx(map.seconds_to_ticks(1.25), 200.0));
    }

    #[test]
    fn beats_round_trip_through_seconds() {
        let map = TempoMap::constant(96, 600_000);
        let secs = map.beats_to_seconds(10.0);
        assert!(approx(secs, 6.0));
        assert!(approx(map.seconds_to_beats(secs), 10.0));
    }
}
