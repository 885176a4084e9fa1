//! Track splitter: one single-track MIDI file per source track.
//!
//! Each output carries the tempo changes of the source's first track merged
//! in time order, so it plays back at the right speed on its own.

use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use ms_formats::{create_output, SmfWriter, WriteError, FORMAT_MULTI_TRACK};
use ms_ir::{MidiClockTime, MultiTrackSequence, TimedEvent, Track};
use tracing::debug;

use crate::cancel::CancelToken;
use crate::error::{Error, OrderError};
use crate::paths::split_track_path;

/// Placeholder note that keeps a player from starting a split file at its
/// first sounding note: channel index 1, middle C, near-silent.
const SILENT_CHANNEL: u8 = 1;
const SILENT_NOTE: u8 = 60;
const SILENT_ON_VELOCITY: u8 = 1;
const SILENT_OFF_VELOCITY: u8 = 127;

/// Walks the tempo events of an ordered tempo track.
struct TempoCursor<'a> {
    events: Vec<&'a TimedEvent>,
    next: usize,
}

impl<'a> TempoCursor<'a> {
    fn new(tempo_track: Option<&'a Track>) -> Self {
        let events = tempo_track
            .map(|t| t.tempo_events().collect())
            .unwrap_or_default();
        Self { events, next: 0 }
    }

    /// Tempo events strictly before `time` not yet taken.
    fn take_before(&mut self, time: MidiClockTime) -> &[&'a TimedEvent] {
        let start = self.next;
        while self.events.get(self.next).is_some_and(|e| e.time < time) {
            self.next += 1;
        }
        &self.events[start..self.next]
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LeadingSilence {
    Undecided,
    Decided,
}

/// Splits the tracks of one parsed sequence.
pub struct TrackSplitter<'a> {
    seq: &'a MultiTrackSequence,
}

impl<'a> TrackSplitter<'a> {
    pub fn new(seq: &'a MultiTrackSequence) -> Self {
        Self { seq }
    }

    /// Check that track `index` (0-based) and the tempo track merged into
    /// it are both time ordered.
    pub fn check_order(&self, index: usize) -> Result<(), OrderError> {
        self.check_track_order(0)?;
        self.check_track_order(index)
    }

    fn check_track_order(&self, index: usize) -> Result<(), OrderError> {
        match self.seq.track(index).and_then(Track::first_out_of_order) {
            Some(event) => Err(OrderError { track: index + 1, index: event }),
            None => Ok(()),
        }
    }

    /// Write track `index` (0-based) as a standalone file into `sink`.
    pub fn write_track<W: Write + Seek>(&self, index: usize, sink: W) -> Result<W, Error> {
        self.check_order(index)?;
        let empty = Track::new();
        let track = self.seq.track(index).unwrap_or(&empty);
        Ok(write_split(sink, self.seq.clocks_per_beat, track, self.seq.tempo_track())?)
    }

    /// Write track `index` (0-based) to `path`, creating or truncating it.
    ///
    /// The order check runs before the file is created.
    pub fn split_to_file(&self, index: usize, path: &Path) -> Result<(), Error> {
        self.check_order(index)?;
        let file = create_output(path)?;
        self.write_track(index, file)?;
        Ok(())
    }

    /// Split every track after the tempo track, returning the paths written
    /// in source order.
    pub fn split_all(
        &self,
        input: &Path,
        output_dir: Option<&Path>,
        cancel: &CancelToken,
    ) -> Result<Vec<PathBuf>, Error> {
        let mut written = Vec::new();
        for index in 1..self.seq.num_tracks() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let path = split_track_path(input, index + 1, output_dir);
            self.split_to_file(index, &path)?;
            debug!(track = index + 1, path = %path.display(), "split track written");
            written.push(path);
        }
        Ok(written)
    }
}

fn write_split<W: Write + Seek>(
    sink: W,
    clocks_per_beat: u16,
    track: &Track,
    tempo_track: Option<&Track>,
) -> Result<W, WriteError> {
    let mut w = SmfWriter::new(sink);
    w.write_header(FORMAT_MULTI_TRACK, 1, clocks_per_beat)?;
    w.begin_track()?;

    let mut tempo = TempoCursor::new(tempo_track);
    let mut silence = LeadingSilence::Undecided;
    let mut end_time = None;
    let mut last_time = 0;

    for event in track.events() {
        if event.is_no_op() {
            continue;
        }
        if event.is_data_end() {
            end_time = Some(event.time);
            break;
        }

        if silence == LeadingSilence::Undecided {
            if event.time > 0 {
                w.write_event(&TimedEvent::note_on(0, SILENT_CHANNEL, SILENT_NOTE, SILENT_ON_VELOCITY))?;
                w.write_event(&TimedEvent::note_off(0, SILENT_CHANNEL, SILENT_NOTE, SILENT_OFF_VELOCITY))?;
                silence = LeadingSilence::Decided;
            } else if event.is_note_on() {
                silence = LeadingSilence::Decided;
            }
        }

        for tempo_event in tempo.take_before(event.time) {
            w.write_event(tempo_event)?;
        }
        w.write_event(event)?;
        last_time = event.time;
    }

    let end_time = end_time.unwrap_or(last_time);
    for tempo_event in tempo.take_before(end_time) {
        w.write_event(tempo_event)?;
    }
    w.end_track(end_time)?;
    w.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ms_formats::parse_bytes;
    use ms_ir::EventKind;
    use std::io::Cursor;

    fn sequence(tempo: Vec<TimedEvent>, tracks: Vec<Vec<TimedEvent>>) -> MultiTrackSequence {
        let mut seq = MultiTrackSequence::with_tracks(0, 480);
        seq.tracks.push(Track::from_events(tempo));
        for events in tracks {
            seq.tracks.push(Track::from_events(events));
        }
        seq
    }

    fn split(seq: &MultiTrackSequence, index: usize) -> Vec<TimedEvent> {
        let bytes = TrackSplitter::new(seq)
            .write_track(index, Cursor::new(Vec::new()))
            .unwrap()
            .into_inner();
        let parsed = parse_bytes(&bytes).unwrap();
        assert_eq!(parsed.num_tracks(), 1);
        assert_eq!(parsed.clocks_per_beat, seq.clocks_per_beat);
        parsed.tracks[0].events().to_vec()
    }

    fn silent_pair() -> [TimedEvent; 2] {
        [TimedEvent::note_on(0, 1, 60, 1), TimedEvent::note_off(0, 1, 60, 127)]
    }

    #[test]
    fn late_first_note_gets_silent_pair_and_tempo() {
        let seq = sequence(
            vec![TimedEvent::tempo(240, 400_000)],
            vec![vec![TimedEvent::note_on(480, 0, 64, 100), TimedEvent::note_off(960, 0, 64, 0)]],
        );
        let [on, off] = silent_pair();
        assert_eq!(
            split(&seq, 1),
            vec![
                on,
                off,
                TimedEvent::tempo(240, 400_000),
                TimedEvent::note_on(480, 0, 64, 100),
                TimedEvent::note_off(960, 0, 64, 0),
                TimedEvent::data_end(960),
            ]
        );
    }

    #[test]
    fn note_on_at_zero_needs_no_pair() {
        let seq = sequence(
            vec![TimedEvent::tempo(0, 500_000)],
            vec![vec![TimedEvent::note_on(0, 0, 64, 100), TimedEvent::note_off(480, 0, 64, 0)]],
        );
        assert_eq!(
            split(&seq, 1),
            vec![
                TimedEvent::note_on(0, 0, 64, 100),
                TimedEvent::tempo(0, 500_000),
                TimedEvent::note_off(480, 0, 64, 0),
                TimedEvent::data_end(480),
            ]
        );
    }

    #[test]
    fn non_note_at_zero_defers_decision() {
        let program = TimedEvent::new(0, EventKind::from_channel_bytes(0xC0, &[5]));
        let seq = sequence(
            vec![],
            vec![vec![program.clone(), TimedEvent::note_on(96, 0, 60, 90)]],
        );
        let [on, off] = silent_pair();
        assert_eq!(
            split(&seq, 1),
            vec![program, on, off, TimedEvent::note_on(96, 0, 60, 90), TimedEvent::data_end(96)]
        );
    }

    #[test]
    fn silent_velocity_zero_note_at_zero_defers_decision() {
        let seq = sequence(
            vec![],
            vec![vec![TimedEvent::note_on(0, 0, 60, 0), TimedEvent::note_on(10, 0, 62, 90)]],
        );
        let events = split(&seq, 1);
        assert_eq!(events[0], TimedEvent::note_on(0, 0, 60, 0));
        assert_eq!(events[1..3], silent_pair());
    }

    #[test]
    fn empty_track_is_just_end_of_track() {
        let seq = sequence(vec![TimedEvent::tempo(0, 500_000)], vec![vec![]]);
        assert_eq!(split(&seq, 1), vec![TimedEvent::data_end(0)]);
    }

    #[test]
    fn tempo_after_end_of_track_is_dropped() {
        let seq = sequence(
            vec![TimedEvent::tempo(100, 450_000), TimedEvent::tempo(5000, 300_000)],
            vec![vec![TimedEvent::note_on(0, 0, 60, 90), TimedEvent::note_off(200, 0, 60, 0)]],
        );
        let events = split(&seq, 1);
        assert_eq!(events.iter().filter(|e| e.is_tempo()).count(), 1);
        assert_eq!(events.last(), Some(&TimedEvent::data_end(200)));
    }

    #[test]
    fn tempo_before_end_of_track_is_flushed() {
        let track = Track::from_events(vec![TimedEvent::note_on(0, 0, 60, 90), TimedEvent::data_end(1000)]);
        let mut seq = sequence(vec![TimedEvent::tempo(500, 450_000)], vec![]);
        seq.tracks.push(track);
        assert_eq!(
            split(&seq, 1),
            vec![
                TimedEvent::note_on(0, 0, 60, 90),
                TimedEvent::tempo(500, 450_000),
                TimedEvent::data_end(1000),
            ]
        );
    }

    #[test]
    fn no_ops_are_skipped() {
        let seq = sequence(
            vec![],
            vec![vec![
                TimedEvent::note_on(0, 0, 60, 90),
                TimedEvent::new(10, EventKind::NoOp),
                TimedEvent::note_off(20, 0, 60, 0),
            ]],
        );
        assert!(split(&seq, 1).iter().all(|e| !e.is_no_op()));
    }

    #[test]
    fn out_of_order_track_is_rejected() {
        let seq = sequence(
            vec![],
            vec![vec![TimedEvent::note_on(100, 0, 60, 90), TimedEvent::note_off(50, 0, 60, 0)]],
        );
        let err = TrackSplitter::new(&seq)
            .write_track(1, Cursor::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, Error::Order(OrderError { track: 2, index: 1 })));
    }

    #[test]
    fn out_of_order_tempo_track_is_rejected() {
        let seq = sequence(
            vec![TimedEvent::tempo(100, 400_000), TimedEvent::tempo(50, 600_000)],
            vec![vec![TimedEvent::note_on(0, 0, 60, 90), TimedEvent::note_off(200, 0, 60, 0)]],
        );
        let splitter = TrackSplitter::new(&seq);
        assert_eq!(splitter.check_order(1), Err(OrderError { track: 1, index: 1 }));
        let err = splitter.write_track(1, Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, Error::Order(OrderError { track: 1, index: 1 })));
    }

    #[test]
    fn tempo_cursor_only_moves_forward() {
        let tempo = Track::from_events(vec![
            TimedEvent::tempo(0, 1),
            TimedEvent::tempo(10, 2),
            TimedEvent::tempo(20, 3),
        ]);
        let mut cursor = TempoCursor::new(Some(&tempo));
        assert_eq!(cursor.take_before(0).len(), 0);
        assert_eq!(cursor.take_before(15).len(), 2);
        assert_eq!(cursor.take_before(5).len(), 0);
        assert_eq!(cursor.take_before(100).len(), 1);
    }
}
