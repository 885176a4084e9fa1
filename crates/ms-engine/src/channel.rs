//! Controller state for one MIDI channel.

use crate::frequency::bend_to_semitones;

/// Controller numbers the synthesizer responds to.
pub mod cc {
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const EXPRESSION: u8 = 11;
    pub const SUSTAIN: u8 = 64;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const RESET_ALL_CONTROLLERS: u8 = 121;
    pub const ALL_NOTES_OFF: u8 = 123;
}

/// Mixing state for a single MIDI channel.
#[derive(Clone, Debug, PartialEq)]
pub struct ChannelState {
    /// Channel volume (CC 7), 0-127
    pub volume: u8,
    /// Expression (CC 11), 0-127
    pub expression: u8,
    /// Pan (CC 10), 0 = left, 64 = centre, 127 = right
    pub pan: u8,
    /// Sustain pedal down (CC 64 >= 64)
    pub sustain: bool,
    /// Current pitch bend in semitones
    pub bend: f32,
    /// Last program change (recorded, single timbre)
    pub program: u8,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self {
            volume: 100,
            expression: 127,
            pan: 64,
            sustain: false,
            bend: 0.0,
            program: 0,
        }
    }
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a controller change. Channel-mode messages are handled by the caller.
    pub fn controller(&mut self, controller: u8, value: u8) {
        match controller {
            cc::VOLUME => self.volume = value.min(127),
            cc::EXPRESSION => self.expression = value.min(127),
            cc::PAN => self.pan = value.min(127),
            cc::SUSTAIN => self.sustain = value >= 64,
            cc::RESET_ALL_CONTROLLERS => {
                self.expression = 127;
                self.sustain = false;
                self.bend = 0.0;
            }
            _ => {}
        }
    }

    pub fn pitch_bend(&mut self, lsb: u8, msb: u8) {
        self.bend = bend_to_semitones(lsb, msb);
    }

    /// Left/right gain from volume, expression and equal-power pan.
    pub fn gains(&self) -> (f32, f32) {
        let level = (self.volume as f32 / 127.0) * (self.expression as f32 / 127.0);
        let pan = self.pan as f32 / 127.0;
        let angle = pan * core::f32::consts::FRAC_PI_2;
        (level * angle.cos(), level * angle.sin())
    }
}
