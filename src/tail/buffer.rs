//! Bounded, ordered entry buffer. Oldest entries are evicted first.

use std::collections::VecDeque;

use super::entry::DisplayEntry;

/// Insertion order equals arrival order equals display order.
#[derive(Debug, Clone)]
pub struct EntryBuffer {
    entries: VecDeque<DisplayEntry>,
    max_entries: usize,
    evicted_total: u64,
}

impl EntryBuffer {
    /// `max_entries` is clamped to at least one.
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            entries: VecDeque::with_capacity(max_entries.min(4096)),
            max_entries,
            evicted_total: 0,
        }
    }

    /// Append a batch in order, then evict from the front until the bound
    /// holds again. Returns the number of evicted entries.
    pub fn append(&mut self, batch: impl IntoIterator<Item = DisplayEntry>) -> usize {
        self.entries.extend(batch);
        let overflow = self.entries.len().saturating_sub(self.max_entries);
        self.entries.drain(..overflow);
        self.evicted_total += overflow as u64;
        overflow
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries evicted over the buffer's lifetime; also the history index of
    /// the current front entry.
    #[must_use]
    pub const fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &DisplayEntry> + ExactSizeIterator {
        self.entries.iter()
    }
}
