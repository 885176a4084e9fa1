//! Standard MIDI File writer.
//!
//! Events are streamed into an `MTrk` chunk whose length field is written as
//! a placeholder and patched when the track is closed, so a track never has
//! to be buffered in memory.

use std::fs::File;
use std::io::{BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;

use binrw::BinWrite;
use ms_ir::{EventKind, MidiClockTime, MultiTrackSequence, TimedEvent};

use crate::chunk::{ChunkHeader, HeaderChunk};
use crate::error::WriteError;

/// SMF format 1: simultaneous tracks.
pub const FORMAT_MULTI_TRACK: u16 = 1;

/// Create (or truncate) `path` for writing.
pub fn create_output(path: &Path) -> Result<BufWriter<File>, WriteError> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| WriteError::CannotCreateOutput { path: path.to_path_buf(), source })
}

/// Streaming SMF writer.
pub struct SmfWriter<W: Write + Seek> {
    inner: W,
    /// Offset of the open track's chunk header
    track_start: Option<u64>,
    last_time: MidiClockTime,
}

impl<W: Write + Seek> SmfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, track_start: None, last_time: 0 }
    }

    /// Write the `MThd` chunk.
    pub fn write_header(&mut self, format: u16, ntrks: u16, clocks_per_beat: u16) -> Result<(), WriteError> {
        HeaderChunk::new(format, ntrks, clocks_per_beat).write(&mut self.inner)?;
        Ok(())
    }

    /// Open an `MTrk` chunk with a placeholder length.
    pub fn begin_track(&mut self) -> Result<(), WriteError> {
        if self.track_start.is_some() {
            self.end_track(self.last_time)?;
        }
        self.track_start = Some(self.inner.stream_position()?);
        self.last_time = 0;
        ChunkHeader::track(0).write(&mut self.inner)?;
        Ok(())
    }

    /// Append one event at its absolute tick.
    ///
    /// `NoOp` writes nothing; `DataEnd` closes the track.
    pub fn write_event(&mut self, event: &TimedEvent) -> Result<(), WriteError> {
        match &event.kind {
            EventKind::NoOp => Ok(()),
            EventKind::DataEnd => self.end_track(event.time),
            kind => {
                self.write_delta(event.time)?;
                self.write_kind(kind)
            }
        }
    }

    /// Write the end-of-track marker at `time` and patch the chunk length.
    pub fn end_track(&mut self, time: MidiClockTime) -> Result<(), WriteError> {
        let Some(start) = self.track_start.take() else {
            return Ok(());
        };
        self.write_delta(time)?;
        self.inner.write_all(&[0xFF, 0x2F, 0x00])?;

        let end = self.inner.stream_position()?;
        let length = u32::try_from(end - start - ChunkHeader::SIZE)
            .map_err(|_| WriteError::TooLarge { what: "MTrk chunk" })?;
        self.inner.seek(SeekFrom::Start(start))?;
        ChunkHeader::track(length).write(&mut self.inner)?;
        self.inner.seek(SeekFrom::Start(end))?;
        Ok(())
    }

    /// Close any open track, flush and hand back the sink.
    pub fn finish(mut self) -> Result<W, WriteError> {
        if self.track_start.is_some() {
            self.end_track(self.last_time)?;
        }
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_delta(&mut self, time: MidiClockTime) -> Result<(), WriteError> {
        if time < self.last_time {
            return Err(WriteError::NonMonotonic { time, previous: self.last_time });
        }
        let delta = u32::try_from(time - self.last_time)
            .ok()
            .filter(|&d| d <= MAX_VLQ)
            .ok_or(WriteError::TooLarge { what: "delta time" })?;
        self.last_time = time;
        write_vlq(&mut self.inner, delta)
    }

    fn write_kind(&mut self, kind: &EventKind) -> Result<(), WriteError> {
        let w = &mut self.inner;
        match kind {
            EventKind::NoteOn { channel, note, velocity } => {
                w.write_all(&[0x90 | (channel & 0x0F), *note, *velocity])?;
            }
            EventKind::NoteOff { channel, note, velocity } => {
                w.write_all(&[0x80 | (channel & 0x0F), *note, *velocity])?;
            }
            EventKind::Channel { status, data } => {
                w.write_all(&[*status])?;
                w.write_all(data)?;
            }
            EventKind::Tempo { usec_per_beat } => {
                let b = usec_per_beat.to_be_bytes();
                w.write_all(&[0xFF, 0x51, 0x03, b[1], b[2], b[3]])?;
            }
            EventKind::Meta { kind, data } => {
                w.write_all(&[0xFF, *kind])?;
                write_length(w, data.len())?;
                w.write_all(data)?;
            }
            EventKind::SysEx { escape, data } => {
                w.write_all(&[if *escape { 0xF7 } else { 0xF0 }])?;
                write_length(w, data.len())?;
                w.write_all(data)?;
            }
            EventKind::NoOp | EventKind::DataEnd => {}
        }
        Ok(())
    }
}

/// Largest value a four-byte variable-length quantity can hold.
const MAX_VLQ: u32 = 0x0FFF_FFFF;

fn write_length(w: &mut impl Write, len: usize) -> Result<(), WriteError> {
    let len = u32::try_from(len)
        .ok()
        .filter(|&l| l <= MAX_VLQ)
        .ok_or(WriteError::TooLarge { what: "event payload" })?;
    write_vlq(w, len)
}

fn write_vlq(w: &mut impl Write, value: u32) -> Result<(), WriteError> {
    let mut buf = [0u8; 4];
    let mut i = buf.len() - 1;
    let mut v = value;
    buf[i] = (v & 0x7F) as u8;
    v >>= 7;
    while v > 0 {
        i -= 1;
        buf[i] = (v & 0x7F) as u8 | 0x80;
        v >>= 7;
    }
    w.write_all(&buf[i..])?;
    Ok(())
}

/// Encode a whole sequence as a format 1 file.
///
/// Each track's sentinel (or last event) sets its end-of-track time.
pub fn encode_sequence(seq: &MultiTrackSequence) -> Result<Vec<u8>, WriteError> {
    let ntrks = u16::try_from(seq.tracks.len()).map_err(|_| WriteError::TooLarge { what: "track count" })?;
    let mut w = SmfWriter::new(Cursor::new(Vec::new()));
    w.write_header(FORMAT_MULTI_TRACK, ntrks, seq.clocks_per_beat)?;
    for track in &seq.tracks {
        w.begin_track()?;
        for event in track.events() {
            w.write_event(event)?;
        }
        w.end_track(track.end_time())?;
    }
    Ok(w.finish()?.into_inner())
}
