use crate::{lookup, range_table::BufferId};
use indexmap::IndexMap;
use std::collections::VecDeque;

/// Miss status handling entry.
///
/// Requests waiting for the same range entry, in arrival order.
#[derive(Debug, Default)]
pub struct Entry {
    requests: VecDeque<lookup::Request>,
}

impl Entry {
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

impl IntoIterator for Entry {
    type Item = lookup::Request;
    type IntoIter = std::collections::vec_deque::IntoIter<lookup::Request>;

    fn into_iter(self) -> Self::IntoIter {
        self.requests.into_iter()
    }
}

/// Miss status handling table.
///
/// At most one downstream request is outstanding per buffer id, later
/// misses for the same id are merged into its entry.
#[derive(Debug, Default)]
pub struct Table {
    entries: IndexMap<BufferId, Entry>,
}

impl Table {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a miss for `buffer_id` is outstanding.
    #[must_use]
    pub fn contains(&self, buffer_id: BufferId) -> bool {
        self.entries.contains_key(&buffer_id)
    }

    #[must_use]
    pub fn get(&self, buffer_id: BufferId) -> Option<&Entry> {
        self.entries.get(&buffer_id)
    }

    /// Add or merge a miss.
    ///
    /// # Returns
    /// `true` if the request was merged into an outstanding miss.
    pub fn add(&mut self, req: lookup::Request) -> bool {
        let entry = self.entries.entry(req.buffer_id).or_default();
        let merged = !entry.is_empty();
        entry.requests.push_back(req);
        merged
    }

    /// Remove and return all requests waiting for `buffer_id`.
    pub fn take(&mut self, buffer_id: BufferId) -> Option<Entry> {
        self.entries.shift_remove(&buffer_id)
    }

    /// Number of buffer ids with an outstanding miss.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of requests waiting across all entries.
    #[must_use]
    pub fn num_waiting(&self) -> usize {
        self.entries.values().map(Entry::len).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
