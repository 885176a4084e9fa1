//! 16-bit stereo PCM containers: WAV (little-endian) and AIFF (big-endian).
//!
//! `PcmWriter` streams frames straight to disk and patches the header sizes
//! on `finalize`, so a render never has to hold the whole file in memory.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use ms_engine::Frame;

use crate::error::{PcmInfoError, WriteError};
use crate::writer::create_output;

const CHANNELS: u16 = 2;
const BITS_PER_SAMPLE: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * (BITS_PER_SAMPLE / 8);

/// WAV header bytes before the sample data.
const WAV_HEADER_LEN: u32 = 44;
/// AIFF header bytes before the sample data (FORM, COMM, SSND headers).
const AIFF_HEADER_LEN: u32 = 54;

/// Audio container, chosen from the destination file extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerType {
    Wav,
    Aiff,
}

impl ContainerType {
    pub fn from_extension(ext: &str) -> Result<Self, WriteError> {
        match ext.to_ascii_lowercase().as_str() {
            "wav" | "wave" => Ok(ContainerType::Wav),
            "aif" | "aiff" | "aifc" => Ok(ContainerType::Aiff),
            _ => Err(WriteError::UnsupportedContainer(ext.to_string())),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, WriteError> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        Self::from_extension(ext)
    }

    fn header_len(self) -> u32 {
        match self {
            ContainerType::Wav => WAV_HEADER_LEN,
            ContainerType::Aiff => AIFF_HEADER_LEN,
        }
    }
}

/// Streaming writer for 16-bit stereo PCM.
pub struct PcmWriter<W: Write + Seek> {
    inner: W,
    container: ContainerType,
    sample_rate: u32,
    frames: u64,
}

impl PcmWriter<BufWriter<File>> {
    /// Create `path`, inferring the container from its extension.
    pub fn create(path: &Path, sample_rate: u32) -> Result<Self, WriteError> {
        let container = ContainerType::from_path(path)?;
        Self::new(create_output(path)?, container, sample_rate)
    }
}

impl<W: Write + Seek> PcmWriter<W> {
    /// Write a header with zero sizes; `finalize` fills them in.
    pub fn new(inner: W, container: ContainerType, sample_rate: u32) -> Result<Self, WriteError> {
        let mut writer = Self { inner, container, sample_rate, frames: 0 };
        writer.write_header(0)?;
        Ok(writer)
    }

    pub fn container(&self) -> ContainerType {
        self.container
    }

    pub fn frames_written(&self) -> u64 {
        self.frames
    }

    /// Append interleaved frames.
    pub fn write_frames(&mut self, frames: &[Frame]) -> Result<(), WriteError> {
        let new_total = self.frames + frames.len() as u64;
        data_size(new_total, self.container)?;

        let mut buf = Vec::with_capacity(frames.len() * BLOCK_ALIGN as usize);
        for frame in frames {
            match self.container {
                ContainerType::Wav => {
                    buf.extend_from_slice(&frame.left.to_le_bytes());
                    buf.extend_from_slice(&frame.right.to_le_bytes());
                }
                ContainerType::Aiff => {
                    buf.extend_from_slice(&frame.left.to_be_bytes());
                    buf.extend_from_slice(&frame.right.to_be_bytes());
                }
            }
        }
        self.inner.write_all(&buf)?;
        self.frames = new_total;
        Ok(())
    }

    /// Rewrite the header with final sizes, flush and hand back the sink.
    pub fn finalize(mut self) -> Result<W, WriteError> {
        let data_len = data_size(self.frames, self.container)?;
        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(0))?;
        self.write_header(data_len)?;
        self.inner.seek(SeekFrom::Start(end))?;
        self.inner.flush()?;
        Ok(self.inner)
    }

    fn write_header(&mut self, data_len: u32) -> Result<(), WriteError> {
        match self.container {
            ContainerType::Wav => {
                let byte_rate = byte_rate(self.sample_rate)?;
                write_wav_header(&mut self.inner, self.sample_rate, byte_rate, data_len)?
            }
            ContainerType::Aiff => write_aiff_header(&mut self.inner, self.sample_rate, data_len)?,
        }
        Ok(())
    }
}

/// Byte size of `frames` frames, if the container can still describe it.
fn data_size(frames: u64, container: ContainerType) -> Result<u32, WriteError> {
    frames
        .checked_mul(BLOCK_ALIGN as u64)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|&n| n.checked_add(container.header_len()).is_some())
        .ok_or(WriteError::TooLarge { what: "PCM data" })
}

/// Bytes per second, as the WAV `fmt ` chunk records it.
fn byte_rate(sample_rate: u32) -> Result<u32, WriteError> {
    sample_rate
        .checked_mul(BLOCK_ALIGN as u32)
        .ok_or(WriteError::TooLarge { what: "WAV byte rate" })
}

// --- WAV ---

fn write_wav_header(w: &mut impl Write, sample_rate: u32, byte_rate: u32, data_len: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(WAV_HEADER_LEN - 8 + data_len).to_le_bytes())?;
    w.write_all(b"WAVE")?;

    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&CHANNELS.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&byte_rate.to_le_bytes())?;
    w.write_all(&BLOCK_ALIGN.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())?;

    w.write_all(b"data")?;
    w.write_all(&data_len.to_le_bytes())
}

// --- AIFF ---

fn write_aiff_header(w: &mut impl Write, sample_rate: u32, data_len: u32) -> std::io::Result<()> {
    let frames = data_len / BLOCK_ALIGN as u32;

    w.write_all(b"FORM")?;
    w.write_all(&(AIFF_HEADER_LEN - 8 + data_len).to_be_bytes())?;
    w.write_all(b"AIFF")?;

    w.write_all(b"COMM")?;
    w.write_all(&18u32.to_be_bytes())?;
    w.write_all(&CHANNELS.to_be_bytes())?;
    w.write_all(&frames.to_be_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_be_bytes())?;
    w.write_all(&extended_from_u32(sample_rate))?;

    w.write_all(b"SSND")?;
    w.write_all(&(8 + data_len).to_be_bytes())?;
    w.write_all(&0u32.to_be_bytes())?; // offset
    w.write_all(&0u32.to_be_bytes()) // block size
}

/// 80-bit IEEE 754 extended encoding of an integer sample rate.
fn extended_from_u32(value: u32) -> [u8; 10] {
    let mut out = [0u8; 10];
    if value == 0 {
        return out;
    }
    let msb = 31 - value.leading_zeros();
    let exponent = 16383 + msb as u16;
    let mantissa = (value as u64) << (63 - msb);
    out[..2].copy_from_slice(&exponent.to_be_bytes());
    out[2..].copy_from_slice(&mantissa.to_be_bytes());
    out
}

fn extended_to_u32(bytes: &[u8]) -> u32 {
    let exponent = u16::from_be_bytes([bytes[0], bytes[1]]) & 0x7FFF;
    let mut mantissa = [0u8; 8];
    mantissa.copy_from_slice(&bytes[2..10]);
    let mantissa = u64::from_be_bytes(mantissa);
    if exponent < 16383 || mantissa == 0 {
        return 0;
    }
    let shift = 63 - (exponent - 16383) as i32;
    if shift < 0 {
        return u32::MAX;
    }
    (mantissa >> shift) as u32
}

// --- Reading ---

/// Format details read back from a container header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmInfo {
    pub container: ContainerType,
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    /// Number of sample frames
    pub frames: u32,
    /// Byte offset of the first sample
    pub data_offset: usize,
}

fn not_pcm(reason: &'static str) -> PcmInfoError {
    PcmInfoError { reason }
}

/// Parse the header of a WAV or AIFF file.
pub fn read_pcm_info(data: &[u8]) -> Result<PcmInfo, PcmInfoError> {
    match data.get(..4) {
        Some(b"RIFF") => read_wav_info(data),
        Some(b"FORM") => read_aiff_info(data),
        _ => Err(not_pcm("no RIFF or FORM signature")),
    }
}

fn read_wav_info(data: &[u8]) -> Result<PcmInfo, PcmInfoError> {
    if data.get(8..12) != Some(&b"WAVE"[..]) {
        return Err(not_pcm("RIFF file is not WAVE"));
    }
    let mut fmt = None;
    let mut data_chunk = None;
    walk_chunks(data, 12, u32::from_le_bytes, |id, body_start, size| {
        if id == b"fmt " && size >= 16 {
            let body = &data[body_start..];
            fmt = Some((
                u16::from_le_bytes([body[2], body[3]]),
                u32::from_le_bytes([body[4], body[5], body[6], body[7]]),
                u16::from_le_bytes([body[14], body[15]]),
            ));
        } else if id == b"data" {
            data_chunk = Some((body_start, size));
        }
    });

    let (channels, sample_rate, bits_per_sample) =
        fmt.ok_or_else(|| not_pcm("missing fmt chunk"))?;
    let (data_offset, size) = data_chunk.ok_or_else(|| not_pcm("missing data chunk"))?;
    let frame_bytes = (channels as usize * bits_per_sample as usize / 8).max(1);
    Ok(PcmInfo {
        container: ContainerType::Wav,
        channels,
        sample_rate,
        bits_per_sample,
        frames: (size / frame_bytes) as u32,
        data_offset,
    })
}

fn read_aiff_info(data: &[u8]) -> Result<PcmInfo, PcmInfoError> {
    if data.get(8..12) != Some(&b"AIFF"[..]) {
        return Err(not_pcm("FORM file is not AIFF"));
    }
    let mut comm = None;
    let mut ssnd = None;
    walk_chunks(data, 12, u32::from_be_bytes, |id, body_start, size| {
        if id == b"COMM" && size >= 18 {
            let body = &data[body_start..];
            comm = Some((
                u16::from_be_bytes([body[0], body[1]]),
                u32::from_be_bytes([body[2], body[3], body[4], body[5]]),
                u16::from_be_bytes([body[6], body[7]]),
                extended_to_u32(&body[8..18]),
            ));
        } else if id == b"SSND" && size >= 8 {
            let offset = u32::from_be_bytes([
                data[body_start],
                data[body_start + 1],
                data[body_start + 2],
                data[body_start + 3],
            ]) as usize;
            ssnd = Some(body_start + 8 + offset);
        }
    });

    let (channels, frames, bits_per_sample, sample_rate) =
        comm.ok_or_else(|| not_pcm("missing COMM chunk"))?;
    let data_offset = ssnd.ok_or_else(|| not_pcm("missing SSND chunk"))?;
    Ok(PcmInfo {
        container: ContainerType::Aiff,
        channels,
        sample_rate,
        bits_per_sample,
        frames,
        data_offset,
    })
}

/// Visit each `(id, body offset, body size)` chunk that fits in `data`.
fn walk_chunks(
    data: &[u8],
    mut pos: usize,
    read_size: fn([u8; 4]) -> u32,
    mut visit: impl FnMut(&[u8], usize, usize),
) {
    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = read_size([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]) as usize;
        let body_start = pos + 8;
        if body_start + size > data.len() {
            break;
        }
        visit(id, body_start, size);
        pos = body_start + size + (size & 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(|i| Frame { left: i as i16, right: -(i as i16) }).collect()
    }

    fn write(container: ContainerType, rate: u32, n: usize) -> Vec<u8> {
        let mut w = PcmWriter::new(Cursor::new(Vec::new()), container, rate).unwrap();
        w.write_frames(&frames(n)).unwrap();
        w.finalize().unwrap().into_inner()
    }

    #[test]
    fn container_from_extension() {
        assert_eq!(ContainerType::from_path(Path::new("a/b.wav")).unwrap(), ContainerType::Wav);
        assert_eq!(ContainerType::from_path(Path::new("b.AIFF")).unwrap(), ContainerType::Aiff);
        assert_eq!(ContainerType::from_path(Path::new("b.aif")).unwrap(), ContainerType::Aiff);
        assert!(matches!(
            ContainerType::from_path(Path::new("b.mp3")),
            Err(WriteError::UnsupportedContainer(ext)) if ext == "mp3"
        ));
        assert!(ContainerType::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn wav_header_and_little_endian_samples() {
        let bytes = write(ContainerType::Wav, 16000, 3);
        assert_eq!(bytes.len(), 44 + 12);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 36 + 12);
        assert_eq!(&bytes[40..44], &12u32.to_le_bytes());
        // frame 1: left=1, right=-1
        assert_eq!(&bytes[48..52], &[0x01, 0x00, 0xFF, 0xFF]);

        let info = read_pcm_info(&bytes).unwrap();
        assert_eq!(info.container, ContainerType::Wav);
        assert_eq!((info.channels, info.sample_rate, info.bits_per_sample), (2, 16000, 16));
        assert_eq!(info.frames, 3);
        assert_eq!(info.data_offset, 44);
    }

    #[test]
    fn aiff_header_and_big_endian_samples() {
        let bytes = write(ContainerType::Aiff, 16000, 3);
        assert_eq!(bytes.len(), 54 + 12);
        assert_eq!(&bytes[0..4], b"FORM");
        assert_eq!(&bytes[8..12], b"AIFF");
        assert_eq!(u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]), 46 + 12);
        assert_eq!(&bytes[58..62], &[0x00, 0x01, 0xFF, 0xFF]);

        let info = read_pcm_info(&bytes).unwrap();
        assert_eq!(info.container, ContainerType::Aiff);
        assert_eq!((info.channels, info.sample_rate, info.bits_per_sample), (2, 16000, 16));
        assert_eq!(info.frames, 3);
        assert_eq!(info.data_offset, 54);
    }

    #[test]
    fn extended_rate_encoding() {
        // 44100 Hz as stored by every AIFF writer
        assert_eq!(
            extended_from_u32(44100),
            [0x40, 0x0E, 0xAC, 0x44, 0, 0, 0, 0, 0, 0]
        );
        for rate in [1, 8000, 16000, 22050, 48000, 96000] {
            assert_eq!(extended_to_u32(&extended_from_u32(rate)), rate);
        }
    }

    #[test]
    fn empty_file_is_just_a_header() {
        let bytes = write(ContainerType::Wav, 8000, 0);
        assert_eq!(bytes.len(), 44);
        assert_eq!(read_pcm_info(&bytes).unwrap().frames, 0);
    }

    #[test]
    fn wav_byte_rate_overflow_is_an_error() {
        let err = PcmWriter::new(Cursor::new(Vec::new()), ContainerType::Wav, 1_500_000_000).err();
        assert!(matches!(err, Some(WriteError::TooLarge { what: "WAV byte rate" })));
        assert!(PcmWriter::new(Cursor::new(Vec::new()), ContainerType::Aiff, 1_500_000_000).is_ok());
    }

    #[test]
    fn garbage_is_not_pcm() {
        assert_eq!(read_pcm_info(b"MThd\0\0\0\x06"), Err(not_pcm("no RIFF or FORM signature")));
    }
}
