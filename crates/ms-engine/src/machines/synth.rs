//! Polyphonic oscillator synthesizer driven by MIDI events.
//!
//! All sixteen channels share one timbre. Events are queued with a frame
//! offset and applied sample-accurately inside the next `work` call.

use ms_ir::{AudioBuffer, EventKind};

use crate::channel::{cc, ChannelState};
use crate::envelope_state::AdsrParams;
use crate::error::RenderError;
use crate::machine::{Machine, MachineInfo, MachineType, Property};
use crate::voice::{Voice, VoiceState};
use crate::voice_pool::{VoicePool, MAX_VOICES};

static INFO: MachineInfo = MachineInfo {
    name: "Oscillator Synth",
    short_name: "Synth",
    machine_type: MachineType::Instrument,
};

/// Headroom so a handful of full-velocity voices do not clip.
const MASTER_GAIN: f32 = 0.25;

pub struct SynthMachine {
    sample_rate: Option<u32>,
    max_frames: usize,
    cpu_load: f32,
    offline: bool,
    adsr: AdsrParams,
    channels: [ChannelState; 16],
    pool: VoicePool,
    pending: Vec<(usize, EventKind)>,
    notes_started: u64,
}

impl SynthMachine {
    pub fn new() -> Self {
        Self::with_envelope(AdsrParams::default())
    }

    pub fn with_envelope(adsr: AdsrParams) -> Self {
        Self {
            sample_rate: None,
            max_frames: ms_ir::BLOCK_SIZE,
            cpu_load: 1.0,
            offline: false,
            adsr,
            channels: core::array::from_fn(|_| ChannelState::new()),
            pool: VoicePool::new(),
            pending: Vec::new(),
            notes_started: 0,
        }
    }

    pub fn cpu_load(&self) -> f32 {
        self.cpu_load
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Polyphony allowed under the current CPU-load budget.
    pub fn voice_limit(&self) -> usize {
        self.pool.limit()
    }

    pub fn active_voices(&self) -> usize {
        self.pool.active_count()
    }

    fn apply_event(&mut self, event: &EventKind, sample_rate: u32) {
        match *event {
            EventKind::NoteOn { channel, note, velocity } if velocity > 0 => {
                let ch = (channel & 0x0F) as usize;
                let mut voice =
                    Voice::new(ch as u8, note, velocity, self.notes_started, &self.adsr, sample_rate);
                voice.set_bend(self.channels[ch].bend, sample_rate);
                self.notes_started += 1;
                self.pool.allocate(voice);
            }
            EventKind::NoteOn { channel, note, .. } | EventKind::NoteOff { channel, note, .. } => {
                self.note_off(channel & 0x0F, note);
            }
            EventKind::Channel { status, ref data } => {
                let channel = status & 0x0F;
                let first = data.first().copied().unwrap_or(0);
                let second = data.get(1).copied().unwrap_or(0);
                match status & 0xF0 {
                    0xB0 => self.controller(channel, first, second),
                    0xC0 => self.channels[channel as usize].program = first,
                    0xE0 => {
                        self.channels[channel as usize].pitch_bend(first, second);
                        let bend = self.channels[channel as usize].bend;
                        for voice in self.pool.voices_mut().filter(|v| v.channel == channel) {
                            voice.set_bend(bend, sample_rate);
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    fn note_off(&mut self, channel: u8, note: u8) {
        let sustain = self.channels[channel as usize].sustain;
        for voice in self
            .pool
            .voices_mut()
            .filter(|v| v.channel == channel && v.note == note && v.state == VoiceState::Active)
        {
            if sustain {
                voice.hold();
            } else {
                voice.release();
            }
        }
    }

    fn controller(&mut self, channel: u8, controller: u8, value: u8) {
        let on_channel = |v: &&mut Voice| v.channel == channel;
        match controller {
            cc::ALL_SOUND_OFF => self.pool.kill_channel(channel),
            cc::ALL_NOTES_OFF => {
                for voice in self.pool.voices_mut().filter(on_channel) {
                    voice.release();
                }
            }
            cc::SUSTAIN if value < 64 => {
                self.channels[channel as usize].controller(controller, value);
                for voice in self
                    .pool
                    .voices_mut()
                    .filter(|v| v.channel == channel && v.state == VoiceState::Sustained)
                {
                    voice.release();
                }
            }
            _ => self.channels[channel as usize].controller(controller, value),
        }
    }

    fn render_span(&mut self, buffer: &mut AudioBuffer, start: usize, end: usize) {
        if start >= end {
            return;
        }
        let channels = &self.channels;
        self.pool.render_all(buffer, start, end, |ch| {
            let (l, r) = channels[ch as usize & 0x0F].gains();
            (l * MASTER_GAIN, r * MASTER_GAIN)
        });
    }
}

impl Default for SynthMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for SynthMachine {
    fn info(&self) -> &MachineInfo {
        &INFO
    }

    fn set_property(&mut self, property: Property) -> Result<(), RenderError> {
        let reject = |reason: &str| RenderError::Property {
            machine: INFO.name,
            property: property.name(),
            reason: reason.to_string(),
        };
        match property {
            Property::SampleRate(0) => return Err(reject("sample rate must be non-zero")),
            Property::SampleRate(rate) => self.sample_rate = Some(rate),
            Property::MaxFramesPerSlice(0) => return Err(reject("slice size must be non-zero")),
            Property::MaxFramesPerSlice(frames) => self.max_frames = frames,
            Property::CpuLoad(load) if !(load > 0.0 && load <= 1.0) => {
                return Err(reject("CPU load must be in (0, 1]"));
            }
            Property::CpuLoad(load) => {
                self.cpu_load = load;
                self.pool
                    .set_limit((MAX_VOICES as f32 * load).ceil() as usize);
            }
            Property::OfflineRender(offline) => self.offline = offline,
        }
        Ok(())
    }

    fn handle_event(&mut self, offset: usize, event: &EventKind) {
        self.pending.push((offset, event.clone()));
    }

    fn work(&mut self, buffer: &mut AudioBuffer) -> Result<(), RenderError> {
        let sample_rate = self.sample_rate.ok_or(RenderError::NotInitialized(INFO.name))?;
        if !self.offline {
            return Err(RenderError::NotOffline(INFO.name));
        }
        let frames = buffer.frames();
        if frames > self.max_frames {
            return Err(RenderError::SliceTooLarge {
                requested: frames,
                max: self.max_frames,
            });
        }

        buffer.silence();
        let mut pending = core::mem::take(&mut self.pending);
        pending.sort_by_key(|(offset, _)| *offset);

        let mut cursor = 0;
        for (offset, event) in &pending {
            let offset = (*offset).min(frames);
            self.render_span(buffer, cursor, offset);
            cursor = offset;
            self.apply_event(event, sample_rate);
        }
        self.render_span(buffer, cursor, frames);

        pending.clear();
        self.pending = pending;
        self.pool.reap_finished();
        Ok(())
    }

    fn stop(&mut self) {
        self.pool.clear();
        self.pending.clear();
    }
}
