//! SMF chunk headers.

use binrw::binrw;

pub const MTRK: [u8; 4] = *b"MTrk";

/// Length of the header chunk body as written.
const HEADER_BODY_LEN: u32 = 6;

/// `MThd` chunk: format, track count and time division.
#[binrw]
#[brw(big, magic = b"MThd")]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeaderChunk {
    #[br(assert(length >= HEADER_BODY_LEN, "MThd body of {} bytes is too short", length))]
    pub length: u32,
    pub format: u16,
    pub ntrks: u16,
    pub division: u16,
}

impl HeaderChunk {
    pub fn new(format: u16, ntrks: u16, division: u16) -> Self {
        Self { length: HEADER_BODY_LEN, format, ntrks, division }
    }
}

/// Generic chunk header: four-byte id and body length.
#[binrw]
#[brw(big)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkHeader {
    pub id: [u8; 4],
    pub length: u32,
}

impl ChunkHeader {
    pub const SIZE: u64 = 8;

    pub fn track(length: u32) -> Self {
        Self { id: MTRK, length }
    }
}
