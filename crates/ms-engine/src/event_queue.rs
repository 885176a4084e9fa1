//! Queue of MIDI events scheduled at absolute sample positions.

use ms_ir::EventKind;

/// An event due at an absolute sample position.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledEvent {
    pub sample: u64,
    pub kind: EventKind,
}

/// Events sorted by sample position.
///
/// During rendering, events are consumed via a cursor that advances forward
/// without removing elements, so the queue can be replayed after a seek.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    events: Vec<ScheduledEvent>,
    /// Next event index to process.
    cursor: usize,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { events: Vec::new(), cursor: 0 }
    }

    /// Insert an event, keeping equal-time events in insertion order.
    pub fn push(&mut self, sample: u64, kind: EventKind) {
        let pos = self.events.partition_point(|e| e.sample <= sample);
        self.events.insert(pos, ScheduledEvent { sample, kind });
    }

    /// Peek at the next unconsumed event.
    pub fn peek(&self) -> Option<&ScheduledEvent> {
        self.events.get(self.cursor)
    }

    /// Return the index range of events strictly before `sample`.
    ///
    /// Advances the cursor past every returned event. The range indexes
    /// the queue through [`EventQueue::get`].
    pub fn drain_until(&mut self, sample: u64) -> core::ops::Range<usize> {
        let start = self.cursor;
        while self.cursor < self.events.len() && self.events[self.cursor].sample < sample {
            self.cursor += 1;
        }
        start..self.cursor
    }

    pub fn get(&self, index: usize) -> Option<&ScheduledEvent> {
        self.events.get(index)
    }

    /// Move the cursor to the first event at or after `sample`.
    pub fn seek(&mut self, sample: u64) {
        self.cursor = self.events.partition_point(|e| e.sample < sample);
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.cursor = 0;
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Number of events not yet consumed.
    pub fn remaining(&self) -> usize {
        self.events.len() - self.cursor
    }
}
