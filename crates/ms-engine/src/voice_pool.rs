//! VoicePool: voice allocation and lifecycle management.

use ms_ir::AudioBuffer;

use crate::voice::{Voice, VoiceState};

/// Identifier for a voice slot in the pool.
pub type VoiceId = usize;

/// Upper bound on simultaneous voices at full CPU budget.
pub const MAX_VOICES: usize = 64;

/// Pool of voice slots with a configurable polyphony limit.
pub struct VoicePool {
    slots: Vec<Option<Voice>>,
    limit: usize,
}

impl VoicePool {
    pub fn new() -> Self {
        Self {
            slots: (0..MAX_VOICES).map(|_| None).collect(),
            limit: MAX_VOICES,
        }
    }

    /// Restrict polyphony to `limit` voices (at least one).
    ///
    /// Voices above the new limit are dropped.
    pub fn set_limit(&mut self, limit: usize) {
        self.limit = limit.clamp(1, MAX_VOICES);
        for slot in &mut self.slots[self.limit..] {
            *slot = None;
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Allocate a voice slot, stealing one if the pool is full
    /// (priority: Released > Sustained > Active, oldest first).
    pub fn allocate(&mut self, voice: Voice) -> VoiceId {
        if let Some(id) = self.slots[..self.limit].iter().position(|s| s.is_none()) {
            self.slots[id] = Some(voice);
            return id;
        }
        let id = self.find_steal_candidate();
        self.slots[id] = Some(voice);
        id
    }

    fn find_steal_candidate(&self) -> VoiceId {
        let priority = |state: VoiceState| match state {
            VoiceState::Released => 0,
            VoiceState::Sustained => 1,
            VoiceState::Active => 2,
        };
        self.slots[..self.limit]
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i, priority(v.state), v.started)))
            .min_by_key(|&(_, p, started)| (p, started))
            .map(|(i, _, _)| i)
            .unwrap_or(0)
    }

    pub fn get(&self, id: VoiceId) -> Option<&Voice> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    /// Iterate over occupied slots mutably.
    pub fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.slots.iter_mut().flatten()
    }

    /// Remove every voice immediately.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
    }

    /// Remove every voice on `channel` immediately.
    pub fn kill_channel(&mut self, channel: u8) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(|v| v.channel == channel) {
                *slot = None;
            }
        }
    }

    /// Remove voices whose envelopes have finished.
    pub fn reap_finished(&mut self) {
        for slot in &mut self.slots {
            if slot.as_ref().is_some_and(Voice::is_finished) {
                *slot = None;
            }
        }
    }

    /// Count of occupied voice slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Render frames `start..end` of every voice, with gain chosen per channel.
    pub fn render_all<F>(&mut self, output: &mut AudioBuffer, start: usize, end: usize, gain: F)
    where
        F: Fn(u8) -> (f32, f32),
    {
        for voice in self.slots.iter_mut().flatten() {
            voice.render(output, start, end, gain(voice.channel));
        }
    }
}

impl Default for VoicePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope_state::AdsrParams;

    fn voice(note: u8, started: u64) -> Voice {
        Voice::new(0, note, 100, started, &AdsrParams::default(), 8000)
    }

    #[test]
    fn allocate_fills_free_slots() {
        let mut pool = VoicePool::new();
        let a = pool.allocate(voice(60, 0));
        let b = pool.allocate(voice(62, 1));
        assert_ne!(a, b);
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn full_pool_steals_released_before_active() {
        let mut pool = VoicePool::new();
        pool.set_limit(2);
        let a = pool.allocate(voice(60, 0));
        let b = pool.allocate(voice(62, 1));
        for v in pool.voices_mut() {
            if v.note == 62 {
                v.release();
            }
        }
        let c = pool.allocate(voice(64, 2));
        assert_eq!(c, b);
        assert_eq!(pool.get(a).map(|v| v.note), Some(60));
        assert_eq!(pool.active_count(), 2);
    }

    #[test]
    fn full_pool_steals_oldest_active() {
        let mut pool = VoicePool::new();
        pool.set_limit(2);
        let a = pool.allocate(voice(60, 0));
        pool.allocate(voice(62, 1));
        let c = pool.allocate(voice(64, 2));
        assert_eq!(c, a);
    }

    #[test]
    fn lowering_limit_drops_excess_voices() {
        let mut pool = VoicePool::new();
        for n in 0..4 {
            pool.allocate(voice(60 + n, n as u64));
        }
        pool.set_limit(2);
        assert_eq!(pool.active_count(), 2);
        assert_eq!(pool.limit(), 2);
    }

    #[test]
    fn reap_removes_finished_voices() {
        let mut pool = VoicePool::new();
        pool.allocate(voice(60, 0));
        for v in pool.voices_mut() {
            v.release();
        }
        let mut buf = AudioBuffer::stereo(16);
        pool.render_all(&mut buf, 0, 16, |_| (1.0, 1.0));
        pool.reap_finished();
        assert_eq!(pool.active_count(), 0);
    }
}
