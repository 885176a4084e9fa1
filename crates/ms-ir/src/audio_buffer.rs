//! Multichannel f32 audio buffer with planar layout.

/// Maximum number of audio channels per buffer.
pub const MAX_CHANNELS: u16 = 2;

/// Default number of frames rendered per pull.
pub const BLOCK_SIZE: usize = 512;

/// A multichannel f32 audio buffer in planar layout.
///
/// `data[ch * frames + frame]` gives the sample for channel `ch` at `frame`.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    data: Vec<f32>,
    channels: u16,
    frames: usize,
}

impl AudioBuffer {
    /// Create a new silent buffer. Channel count is capped at `MAX_CHANNELS`.
    pub fn new(channels: u16, frames: usize) -> Self {
        let channels = channels.clamp(1, MAX_CHANNELS);
        Self {
            data: vec![0.0; channels as usize * frames],
            channels,
            frames,
        }
    }

    /// Stereo buffer of `frames` frames.
    pub fn stereo(frames: usize) -> Self {
        Self::new(2, frames)
    }

    pub fn silence(&mut self) {
        self.data.fill(0.0);
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Resize to `frames`, silencing the contents.
    pub fn resize(&mut self, frames: usize) {
        self.frames = frames;
        self.data.clear();
        self.data.resize(self.channels as usize * frames, 0.0);
    }

    pub fn channel(&self, ch: u16) -> &[f32] {
        let start = ch as usize * self.frames;
        &self.data[start..start + self.frames]
    }

    pub fn channel_mut(&mut self, ch: u16) -> &mut [f32] {
        let start = ch as usize * self.frames;
        let len = self.frames;
        &mut self.data[start..start + len]
    }

    /// Add a stereo sample pair at `frame`. Mono buffers receive the average.
    pub fn add_frame(&mut self, frame: usize, left: f32, right: f32) {
        if frame >= self.frames {
            return;
        }
        if self.channels == 1 {
            self.data[frame] += (left + right) * 0.5;
        } else {
            self.data[frame] += left;
            self.data[self.frames + frame] += right;
        }
    }

    /// Sum overlapping channels and frames from `source` into this buffer.
    pub fn mix_from(&mut self, source: &AudioBuffer) {
        let chs = self.channels.min(source.channels);
        let frs = self.frames.min(source.frames);
        for ch in 0..chs {
            let src = source.channel(ch);
            let dst = self.channel_mut(ch);
            for i in 0..frs {
                dst[i] += src[i];
            }
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.data.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}
