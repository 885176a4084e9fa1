//! Voice: one sounding note of the synthesizer.

use core::f32::consts::TAU;

use ms_ir::AudioBuffer;

use crate::envelope_state::{AdsrParams, EnvelopeState};
use crate::frequency::{note_to_frequency, phase_increment};

/// Voice lifecycle state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VoiceState {
    /// Key held.
    #[default]
    Active,
    /// Key released but held by the sustain pedal.
    Sustained,
    /// Note-off received; envelope releasing.
    Released,
}

/// Relative level of the second harmonic.
const HARMONIC_MIX: f32 = 0.3;

/// A single oscillator voice with its own envelope.
#[derive(Clone, Debug)]
pub struct Voice {
    pub channel: u8,
    pub note: u8,
    /// Velocity scaled to [0, 1].
    pub velocity: f32,
    pub state: VoiceState,
    /// Monotonic start order, used to pick steal victims.
    pub started: u64,
    phase: f32,
    increment: f32,
    envelope: EnvelopeState,
}

impl Voice {
    pub fn new(
        channel: u8,
        note: u8,
        velocity: u8,
        started: u64,
        adsr: &AdsrParams,
        sample_rate: u32,
    ) -> Self {
        Self {
            channel,
            note,
            velocity: velocity.min(127) as f32 / 127.0,
            state: VoiceState::Active,
            started,
            phase: 0.0,
            increment: phase_increment(note_to_frequency(note, 0.0), sample_rate),
            envelope: EnvelopeState::new(adsr, sample_rate),
        }
    }

    /// Retune to the current channel bend.
    pub fn set_bend(&mut self, semitones: f32, sample_rate: u32) {
        self.increment = phase_increment(note_to_frequency(self.note, semitones), sample_rate);
    }

    pub fn release(&mut self) {
        self.state = VoiceState::Released;
        self.envelope.gate_off();
    }

    /// Key up while the pedal is down: keep sounding until the pedal lifts.
    pub fn hold(&mut self) {
        self.state = VoiceState::Sustained;
    }

    pub fn is_finished(&self) -> bool {
        self.envelope.is_finished()
    }

    /// Add frames `start..end` of this voice into `output` with per-side gain.
    pub fn render(&mut self, output: &mut AudioBuffer, start: usize, end: usize, gain: (f32, f32)) {
        let end = end.min(output.frames());
        for frame in start..end {
            if self.envelope.is_finished() {
                return;
            }
            let level = self.envelope.next_value() * self.velocity;
            let s = (self.phase * TAU).sin() + HARMONIC_MIX * (self.phase * 2.0 * TAU).sin();
            let s = s * level / (1.0 + HARMONIC_MIX);
            output.add_frame(frame, s * gain.0, s * gain.1);

            self.phase += self.increment;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}
