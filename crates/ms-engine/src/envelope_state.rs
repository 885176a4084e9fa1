//! Per-voice ADSR amplitude envelope.

/// Envelope timing in seconds and sustain level in [0, 1].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AdsrParams {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl Default for AdsrParams {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.12,
            sustain: 0.6,
            release: 0.25,
        }
    }
}

/// Envelope stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopePhase {
    Attack,
    Decay,
    Sustain,
    Release,
    Finished,
}

/// Runtime state for a playing envelope, advanced one sample at a time.
#[derive(Clone, Debug)]
pub struct EnvelopeState {
    phase: EnvelopePhase,
    value: f32,
    attack_step: f32,
    decay_step: f32,
    sustain: f32,
    release_samples: f32,
    release_step: f32,
}

impl EnvelopeState {
    pub fn new(params: &AdsrParams, sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as f32;
        let samples = |secs: f32| (secs * rate).max(1.0);
        let sustain = params.sustain.clamp(0.0, 1.0);
        Self {
            phase: EnvelopePhase::Attack,
            value: 0.0,
            attack_step: 1.0 / samples(params.attack),
            decay_step: (1.0 - sustain) / samples(params.decay),
            sustain,
            release_samples: samples(params.release),
            release_step: 0.0,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::Finished
    }

    /// Enter the release stage from the current level.
    pub fn gate_off(&mut self) {
        if matches!(self.phase, EnvelopePhase::Release | EnvelopePhase::Finished) {
            return;
        }
        self.release_step = self.value / self.release_samples;
        self.phase = EnvelopePhase::Release;
    }

    /// Advance one sample and return the new level.
    pub fn next_value(&mut self) -> f32 {
        match self.phase {
            EnvelopePhase::Attack => {
                self.value += self.attack_step;
                if self.value >= 1.0 {
                    self.value = 1.0;
                    self.phase = EnvelopePhase::Decay;
                }
            }
            EnvelopePhase::Decay => {
                self.value -= self.decay_step;
                if self.value <= self.sustain {
                    self.value = self.sustain;
                    self.phase = EnvelopePhase::Sustain;
                }
            }
            EnvelopePhase::Sustain => {}
            EnvelopePhase::Release => {
                self.value -= self.release_step;
                if self.value <= 0.0 {
                    self.value = 0.0;
                    self.phase = EnvelopePhase::Finished;
                }
            }
            EnvelopePhase::Finished => {}
        }
        self.value
    }
}
