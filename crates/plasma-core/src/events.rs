// crates/plasma-core/src/events.rs
//
// Append-only event log. Mutating calls return the events they emitted and
// the owning ledger appends the same events here; observers poll with a
// cursor instead of registering callbacks.

use serde::{Deserialize, Serialize};

/// An ordered, append-only sequence of events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLog<E> {
    entries: Vec<E>,
}

impl<E: Clone> EventLog<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append a batch of events, preserving their order.
    pub fn extend(&mut self, events: &[E]) {
        self.entries.extend_from_slice(events);
    }

    /// Events recorded at or after `cursor`. The returned cursor is the
    /// position to poll from next time.
    pub fn since(&self, cursor: usize) -> (&[E], usize) {
        let start = cursor.min(self.entries.len());
        (&self.entries[start..], self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[E] {
        &self.entries
    }
}

impl<E: Clone> Default for EventLog<E> {
    fn default() -> Self {
        Self::new()
    }
}
