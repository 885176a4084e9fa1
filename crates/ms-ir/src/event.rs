//! Timed MIDI events as carried between the reader, splitter and sequencer.

use arrayvec::ArrayVec;

/// Absolute position in MIDI clocks (ticks since sequence start).
pub type MidiClockTime = u64;

/// Microseconds per quarter note when a sequence declares no tempo (120 BPM).
pub const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// A single event at an absolute tick position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimedEvent {
    /// Ticks since sequence start
    pub time: MidiClockTime,
    /// What the event carries
    pub kind: EventKind,
}

impl TimedEvent {
    /// Create a new event.
    pub fn new(time: MidiClockTime, kind: EventKind) -> Self {
        Self { time, kind }
    }

    /// Note-on with the given 0-based channel.
    pub fn note_on(time: MidiClockTime, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(time, EventKind::NoteOn { channel, note, velocity })
    }

    /// Note-off with the given 0-based channel.
    pub fn note_off(time: MidiClockTime, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(time, EventKind::NoteOff { channel, note, velocity })
    }

    /// Tempo change in microseconds per quarter note.
    pub fn tempo(time: MidiClockTime, usec_per_beat: u32) -> Self {
        Self::new(time, EventKind::Tempo { usec_per_beat })
    }

    /// End-of-data sentinel.
    pub fn data_end(time: MidiClockTime) -> Self {
        Self::new(time, EventKind::DataEnd)
    }

    /// True for a sounding note-on (velocity above zero).
    pub fn is_note_on(&self) -> bool {
        matches!(self.kind, EventKind::NoteOn { velocity, .. } if velocity > 0)
    }

    /// True for a note-off, including the velocity-zero note-on shorthand.
    pub fn is_note_off(&self) -> bool {
        matches!(
            self.kind,
            EventKind::NoteOff { .. } | EventKind::NoteOn { velocity: 0, .. }
        )
    }

    pub fn is_tempo(&self) -> bool {
        matches!(self.kind, EventKind::Tempo { .. })
    }

    pub fn is_no_op(&self) -> bool {
        matches!(self.kind, EventKind::NoOp)
    }

    pub fn is_data_end(&self) -> bool {
        matches!(self.kind, EventKind::DataEnd)
    }
}

/// Payload of a timed event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventKind {
    // === Channel voice ===
    /// Note-on (velocity 0 is kept as written; see `TimedEvent::is_note_off`)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note-off with release velocity
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Any other channel message: aftertouch, controller, program,
    /// channel pressure or pitch bend. `status` includes the channel nibble.
    Channel { status: u8, data: ArrayVec<u8, 2> },

    // === Meta / system ===
    /// Set tempo meta event (microseconds per quarter note)
    Tempo { usec_per_beat: u32 },
    /// Any other meta event, stored as its type byte and raw payload
    Meta { kind: u8, data: Vec<u8> },
    /// System exclusive; `data` excludes the leading 0xF0/0xF7 status
    SysEx { escape: bool, data: Vec<u8> },

    // === Markers ===
    /// Placeholder event with no effect
    NoOp,
    /// Terminal sentinel; its time is the end of the track
    DataEnd,
}

impl EventKind {
    /// Build a channel message from a status byte and its data bytes.
    ///
    /// Note-on and note-off statuses produce the dedicated variants.
    pub fn from_channel_bytes(status: u8, data: &[u8]) -> Self {
        let channel = status & 0x0F;
        let first = data.first().copied().unwrap_or(0);
        let second = data.get(1).copied().unwrap_or(0);
        match status & 0xF0 {
            0x80 => EventKind::NoteOff { channel, note: first, velocity: second },
            0x90 => EventKind::NoteOn { channel, note: first, velocity: second },
            _ => {
                let mut bytes = ArrayVec::new();
                for &b in data.iter().take(channel_data_len(status)) {
                    bytes.push(b);
                }
                EventKind::Channel { status, data: bytes }
            }
        }
    }

    /// MIDI channel (0-15) for channel messages.
    pub fn channel(&self) -> Option<u8> {
        match self {
            EventKind::NoteOn { channel, .. } | EventKind::NoteOff { channel, .. } => {
                Some(*channel)
            }
            EventKind::Channel { status, .. } => Some(status & 0x0F),
            _ => None,
        }
    }
}

/// Number of data bytes that follow a channel status byte.
pub fn channel_data_len(status: u8) -> usize {
    match status & 0xF0 {
        0xC0 | 0xD0 => 1,
        _ => 2,
    }
}
