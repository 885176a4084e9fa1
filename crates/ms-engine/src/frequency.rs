//! Note-to-frequency conversion for the synthesizer.
//!
//! Equal temperament with A4 (MIDI note 69) at 440 Hz.

/// MIDI note number of A4.
const REFERENCE_NOTE: f32 = 69.0;

/// Frequency of A4 in Hz.
const REFERENCE_FREQ: f32 = 440.0;

/// Pitch-bend range in semitones for a full-scale bend.
pub const BEND_RANGE_SEMITONES: f32 = 2.0;

/// Convert a MIDI note plus a semitone offset to Hz.
pub fn note_to_frequency(note: u8, semitone_offset: f32) -> f32 {
    let semis = note as f32 - REFERENCE_NOTE + semitone_offset;
    REFERENCE_FREQ * 2f32.powf(semis / 12.0)
}

/// Convert a 14-bit pitch-bend value (centre 8192) to semitones.
pub fn bend_to_semitones(lsb: u8, msb: u8) -> f32 {
    let value = ((msb as i32 & 0x7F) << 7) | (lsb as i32 & 0x7F);
    (value - 8192) as f32 / 8192.0 * BEND_RANGE_SEMITONES
}

/// Per-sample phase increment (cycles per sample) for `freq` at `sample_rate`.
pub fn phase_increment(freq: f32, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    freq / sample_rate as f32
}
