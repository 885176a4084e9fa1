//! Standard MIDI File reader.
//!
//! `is_valid` only checks the binrw `MThd` header; full decoding goes through
//! midly with strict checking, so any corrupt track rejects the whole file.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use binrw::BinRead;
use midly::num::u4;
use midly::{Fps, MetaMessage, MidiMessage, Smf, SmpteTime, Timing, TrackEvent, TrackEventKind};
use ms_ir::{EventKind, MidiClockTime, MultiTrackSequence, TimedEvent, Track};

use crate::chunk::HeaderChunk;
use crate::error::{OpenError, ParseError};

/// A MIDI file loaded into memory, not yet decoded.
pub struct MidiStream {
    path: PathBuf,
    data: Vec<u8>,
}

impl MidiStream {
    /// Read the whole file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpenError> {
        let path = path.as_ref().to_path_buf();
        match std::fs::read(&path) {
            Ok(data) => Ok(Self { path, data }),
            Err(source) => Err(OpenError { path, source }),
        }
    }

    /// Wrap bytes already in memory.
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        Self { path: path.into(), data }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when the data starts with a recognizable `MThd` header.
    ///
    /// Track chunks are not inspected; `parse` may still fail.
    pub fn is_valid(&self) -> bool {
        HeaderChunk::read(&mut Cursor::new(&self.data)).is_ok()
    }

    /// Decode every track.
    pub fn parse(&self) -> Result<MultiTrackSequence, ParseError> {
        parse_bytes(&self.data)
    }
}

/// Decode a complete Standard MIDI File from memory.
///
/// Only metrical (ticks per quarter note) time division is accepted.
pub fn parse_bytes(data: &[u8]) -> Result<MultiTrackSequence, ParseError> {
    let smf = Smf::parse(data)?;
    let clocks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) if tpb.as_int() > 0 => tpb.as_int(),
        Timing::Metrical(_) => return Err(ParseError::malformed("zero ticks per quarter note")),
        Timing::Timecode(..) => return Err(ParseError::malformed("SMPTE time division is not supported")),
    };

    let mut seq = MultiTrackSequence::with_tracks(0, clocks_per_beat);
    seq.tracks.extend(smf.tracks.iter().map(|events| convert_track(events)));
    Ok(seq)
}

/// Absolute-time events, closed by a sentinel at the end-of-track tick.
///
/// Events after an end-of-track marker are dropped. A track without one
/// ends at its last event.
fn convert_track(events: &[TrackEvent]) -> Track {
    let mut track = Track::new();
    let mut time: MidiClockTime = 0;
    for event in events {
        time += MidiClockTime::from(event.delta.as_int());
        let kind = match event.kind {
            TrackEventKind::Meta(MetaMessage::EndOfTrack) => break,
            TrackEventKind::Meta(meta) => meta_event(meta),
            TrackEventKind::Midi { channel, message } => channel_event(channel, message),
            TrackEventKind::SysEx(data) => EventKind::SysEx { escape: false, data: data.to_vec() },
            TrackEventKind::Escape(data) => EventKind::SysEx { escape: true, data: data.to_vec() },
        };
        track.push(TimedEvent::new(time, kind));
    }
    track.close(time);
    track
}

fn channel_event(channel: u4, message: MidiMessage) -> EventKind {
    let channel = channel.as_int();
    match message {
        MidiMessage::NoteOff { key, vel } => EventKind::NoteOff {
            channel,
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        // Velocity 0 stays a note-on here; `is_note_on` accounts for it.
        MidiMessage::NoteOn { key, vel } => EventKind::NoteOn {
            channel,
            note: key.as_int(),
            velocity: vel.as_int(),
        },
        MidiMessage::Aftertouch { key, vel } => {
            EventKind::from_channel_bytes(0xA0 | channel, &[key.as_int(), vel.as_int()])
        }
        MidiMessage::Controller { controller, value } => {
            EventKind::from_channel_bytes(0xB0 | channel, &[controller.as_int(), value.as_int()])
        }
        MidiMessage::ProgramChange { program } => EventKind::from_channel_bytes(0xC0 | channel, &[program.as_int()]),
        MidiMessage::ChannelAftertouch { vel } => EventKind::from_channel_bytes(0xD0 | channel, &[vel.as_int()]),
        MidiMessage::PitchBend { bend } => {
            let raw = bend.0.as_int();
            EventKind::from_channel_bytes(0xE0 | channel, &[(raw & 0x7F) as u8, (raw >> 7) as u8])
        }
    }
}

/// Tempo becomes a typed event; every other meta keeps its type byte and payload.
fn meta_event(meta: MetaMessage) -> EventKind {
    let (kind, data) = match meta {
        MetaMessage::Tempo(usec) => return EventKind::Tempo { usec_per_beat: usec.as_int() },
        MetaMessage::TrackNumber(number) => (0x00, number.map(|n| n.to_be_bytes().to_vec()).unwrap_or_default()),
        MetaMessage::Text(text) => (0x01, text.to_vec()),
        MetaMessage::Copyright(text) => (0x02, text.to_vec()),
        MetaMessage::TrackName(text) => (0x03, text.to_vec()),
        MetaMessage::InstrumentName(text) => (0x04, text.to_vec()),
        MetaMessage::Lyric(text) => (0x05, text.to_vec()),
        MetaMessage::Marker(text) => (0x06, text.to_vec()),
        MetaMessage::CuePoint(text) => (0x07, text.to_vec()),
        MetaMessage::ProgramName(text) => (0x08, text.to_vec()),
        MetaMessage::DeviceName(text) => (0x09, text.to_vec()),
        MetaMessage::MidiChannel(channel) => (0x20, vec![channel.as_int()]),
        MetaMessage::MidiPort(port) => (0x21, vec![port.as_int()]),
        MetaMessage::EndOfTrack => (0x2F, Vec::new()),
        MetaMessage::SmpteOffset(time) => (0x54, smpte_bytes(time).to_vec()),
        MetaMessage::TimeSignature(num, den, clocks, notes) => (0x58, vec![num, den, clocks, notes]),
        MetaMessage::KeySignature(sharps, minor) => (0x59, vec![sharps as u8, minor as u8]),
        MetaMessage::SequencerSpecific(data) => (0x7F, data.to_vec()),
        MetaMessage::Unknown(kind, data) => (kind, data.to_vec()),
    };
    EventKind::Meta { kind, data }
}

fn smpte_bytes(time: SmpteTime) -> [u8; 5] {
    let rate: u8 = match time.fps() {
        Fps::Fps24 => 0,
        Fps::Fps25 => 1,
        Fps::Fps29 => 2,
        Fps::Fps30 => 3,
    };
    [rate << 5 | time.hour(), time.minute(), time.second(), time.frame(), time.subframe()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smf(division: u16, tracks: &[&[u8]]) -> Vec<u8> {
        let mut out = b"MThd\x00\x00\x00\x06\x00\x01".to_vec();
        out.extend_from_slice(&(tracks.len() as u16).to_be_bytes());
        out.extend_from_slice(&division.to_be_bytes());
        for body in tracks {
            out.extend_from_slice(b"MTrk");
            out.extend_from_slice(&(body.len() as u32).to_be_bytes());
            out.extend_from_slice(body);
        }
        out
    }

    #[test]
    fn decodes_running_status_and_sentinel() {
        let body: &[u8] = &[
            0x00, 0x90, 60, 100, // note-on
            0x60, 62, 100, // running status, delta 96
            0x81, 0x00, 0x80, 60, 0, // delta 128, note-off
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let seq = parse_bytes(&smf(96, &[body])).unwrap();
        assert_eq!(seq.clocks_per_beat, 96);
        let events = seq.tracks[0].events();
        assert_eq!(events.len(), 4);
        assert_eq!(events[0], TimedEvent::note_on(0, 0, 60, 100));
        assert_eq!(events[1], TimedEvent::note_on(96, 0, 62, 100));
        assert_eq!(events[2], TimedEvent::note_off(224, 0, 60, 0));
        assert_eq!(events[3], TimedEvent::data_end(224));
    }

    #[test]
    fn decodes_tempo_meta_and_sysex() {
        let body: &[u8] = &[
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, // 500000
            0x00, 0xFF, 0x03, 0x02, b'h', b'i', // track name
            0x10, 0xF0, 0x03, 0x7E, 0x01, 0xF7, // sysex
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let seq = parse_bytes(&smf(480, &[body])).unwrap();
        let events = seq.tracks[0].events();
        assert_eq!(events[0], TimedEvent::tempo(0, 500_000));
        assert_eq!(events[1].kind, EventKind::Meta { kind: 0x03, data: b"hi".to_vec() });
        assert_eq!(
            events[2],
            TimedEvent::new(16, EventKind::SysEx { escape: false, data: vec![0x7E, 0x01, 0xF7] })
        );
        assert!(events[3].is_data_end());
    }

    #[test]
    fn velocity_zero_note_on_is_kept() {
        let body: &[u8] = &[0x00, 0x90, 60, 0, 0x00, 0xFF, 0x2F, 0x00];
        let seq = parse_bytes(&smf(96, &[body])).unwrap();
        let ev = &seq.tracks[0].events()[0];
        assert_eq!(ev.kind, EventKind::NoteOn { channel: 0, note: 60, velocity: 0 });
        assert!(!ev.is_note_on());
        assert!(ev.is_note_off());
    }

    #[test]
    fn missing_end_of_track_still_gets_sentinel() {
        let body: &[u8] = &[0x00, 0xC3, 0x05, 0x20, 0xB3, 0x07, 0x64];
        let seq = parse_bytes(&smf(96, &[body])).unwrap();
        let track = &seq.tracks[0];
        assert_eq!(track.len(), 3);
        assert_eq!(track.sentinel(), Some(&TimedEvent::data_end(32)));
    }

    #[test]
    fn unknown_chunks_are_skipped() {
        let mut data = smf(96, &[]);
        data[11] = 1; // ntrks = 1
        data.extend_from_slice(b"XFIH\x00\x00\x00\x02\xAB\xCD");
        data.extend_from_slice(b"MTrk\x00\x00\x00\x04\x00\xFF\x2F\x00");
        let seq = parse_bytes(&data).unwrap();
        assert_eq!(seq.num_tracks(), 1);
    }

    #[test]
    fn other_channel_messages_keep_their_bytes() {
        let body: &[u8] = &[
            0x00, 0xB2, 0x07, 0x64, // volume
            0x00, 0xE2, 0x00, 0x40, // centred pitch bend
            0x00, 0xD2, 0x30, // channel pressure
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let seq = parse_bytes(&smf(96, &[body])).unwrap();
        let events = seq.tracks[0].events();
        assert_eq!(events[0].kind, EventKind::from_channel_bytes(0xB2, &[0x07, 0x64]));
        assert_eq!(events[1].kind, EventKind::from_channel_bytes(0xE2, &[0x00, 0x40]));
        assert_eq!(events[2].kind, EventKind::from_channel_bytes(0xD2, &[0x30]));
    }

    #[test]
    fn typed_meta_events_keep_their_payload() {
        let body: &[u8] = &[
            0x00, 0xFF, 0x58, 0x04, 0x03, 0x02, 0x18, 0x08, // 3/4
            0x00, 0xFF, 0x59, 0x02, 0xFE, 0x01, // two flats, minor
            0x00, 0xFF, 0x54, 0x05, 0x61, 0x02, 0x03, 0x04, 0x05, // SMPTE offset, 30 fps
            0x00, 0xFF, 0x2F, 0x00,
        ];
        let seq = parse_bytes(&smf(96, &[body])).unwrap();
        let events = seq.tracks[0].events();
        assert_eq!(events[0].kind, EventKind::Meta { kind: 0x58, data: vec![3, 2, 24, 8] });
        assert_eq!(events[1].kind, EventKind::Meta { kind: 0x59, data: vec![0xFE, 0x01] });
        assert_eq!(events[2].kind, EventKind::Meta { kind: 0x54, data: vec![0x61, 2, 3, 4, 5] });
    }

    #[test]
    fn events_after_end_of_track_are_dropped() {
        let body: &[u8] = &[0x00, 0x90, 60, 100, 0x10, 0xFF, 0x2F, 0x00, 0x00, 0x80, 60, 0];
        let seq = parse_bytes(&smf(96, &[body])).unwrap();
        assert_eq!(
            seq.tracks[0].events(),
            &[TimedEvent::note_on(0, 0, 60, 100), TimedEvent::data_end(16)]
        );
    }

    #[test]
    fn malformed_inputs_fail() {
        let malformed = |data: &[u8]| matches!(parse_bytes(data), Err(ParseError::Malformed(_)));
        // running status with no prior status
        assert!(malformed(&smf(96, &[&[0x00, 0x40, 0x40]])));
        // truncated note-on
        assert!(malformed(&smf(96, &[&[0x00, 0x90, 0x40]])));
        // declared track missing
        let mut data = smf(96, &[]);
        data[11] = 2;
        assert!(malformed(&data));
        // SMPTE division
        assert!(malformed(&smf(0xE728, &[])));
        // zero division
        assert!(malformed(&smf(0, &[])));
        // not a MIDI file
        assert!(malformed(b"RIFF....WAVE"));
    }

    #[test]
    fn is_valid_checks_header_only() {
        let good = MidiStream::from_bytes("a.mid", smf(96, &[&[0x00, 0x90]]));
        assert!(good.is_valid());
        assert!(good.parse().is_err());
        let bad = MidiStream::from_bytes("b.mid", b"hello".to_vec());
        assert!(!bad.is_valid());
    }

    #[test]
    fn open_missing_file_fails() {
        let err = MidiStream::open("/nonexistent/dir/song.mid").err().unwrap();
        assert_eq!(err.path, PathBuf::from("/nonexistent/dir/song.mid"));
    }
}
