use crate::{
    config::CacheReplacementPolicy,
    range_table::{BufferId, RangeEntry},
};
use indexmap::IndexMap;
use std::sync::Arc;

/// Capacity bounded, ordered set of cached range entries.
///
/// The front entry is the next victim. With FIFO replacement that is the
/// oldest inserted entry, with LRU the least recently touched one.
#[derive(Debug)]
pub struct EntrySet {
    entries: IndexMap<BufferId, Arc<RangeEntry>>,
    capacity: usize,
    policy: CacheReplacementPolicy,
}

impl EntrySet {
    #[must_use]
    pub fn new(capacity: usize, policy: CacheReplacementPolicy) -> Self {
        assert!(capacity > 0, "entry set: zero capacity");
        Self {
            entries: IndexMap::with_capacity(capacity.min(1024)),
            capacity,
            policy,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.capacity
    }

    #[must_use]
    pub fn contains(&self, buffer_id: BufferId) -> bool {
        self.entries.contains_key(&buffer_id)
    }

    /// Look up an entry, marking it as most recently used under LRU.
    pub fn access(&mut self, buffer_id: BufferId) -> Option<Arc<RangeEntry>> {
        match self.policy {
            CacheReplacementPolicy::FIFO => self.entries.get(&buffer_id).cloned(),
            CacheReplacementPolicy::LRU => {
                let entry = self.entries.shift_remove(&buffer_id)?;
                self.entries.insert(buffer_id, Arc::clone(&entry));
                Some(entry)
            }
        }
    }

    /// Insert at the back, evicting the front entry when full.
    ///
    /// # Returns
    /// The evicted entry.
    pub fn insert(&mut self, entry: Arc<RangeEntry>) -> Option<Arc<RangeEntry>> {
        if self.entries.contains_key(&entry.buffer_id) {
            return None;
        }
        let evicted = if self.is_full() {
            self.entries.shift_remove_index(0).map(|(_, victim)| victim)
        } else {
            None
        };
        self.entries.insert(entry.buffer_id, entry);
        debug_assert!(self.entries.len() <= self.capacity);
        evicted
    }

    /// Buffer ids from the next victim to the most recent entry.
    pub fn buffer_ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.entries.keys().copied()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::EntrySet;
    use crate::{config::CacheReplacementPolicy, range_table::RangeEntry};
    use pretty_assertions_sorted::assert_eq;
    use std::sync::Arc;

    fn entry(buffer_id: u16) -> Arc<RangeEntry> {
        Arc::new(RangeEntry::new(
            buffer_id,
            u64::from(buffer_id) * 0x1000,
            0x100,
            false,
        ))
    }

    #[test]
    fn test_fifo_evicts_oldest() {
        let mut set = EntrySet::new(2, CacheReplacementPolicy::FIFO);
        assert!(set.insert(entry(1)).is_none());
        assert!(set.insert(entry(2)).is_none());
        assert!(set.access(1).is_some());
        let evicted = set.insert(entry(3));
        assert_eq!(evicted.map(|e| e.buffer_id), Some(1));
        assert_eq!(set.buffer_ids().collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_lru_evicts_least_recently_used() {
        let mut set = EntrySet::new(2, CacheReplacementPolicy::LRU);
        set.insert(entry(1));
        set.insert(entry(2));
        assert!(set.access(1).is_some());
        let evicted = set.insert(entry(3));
        assert_eq!(evicted.map(|e| e.buffer_id), Some(2));
        assert_eq!(set.buffer_ids().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn test_bounded() {
        let mut set = EntrySet::new(3, CacheReplacementPolicy::FIFO);
        for buffer_id in 1..=10 {
            set.insert(entry(buffer_id));
            assert!(set.len() <= 3);
        }
        assert_eq!(set.buffer_ids().collect::<Vec<_>>(), vec![8, 9, 10]);
        // duplicate insert is ignored
        assert!(set.insert(entry(9)).is_none());
        assert_eq!(set.len(), 3);
    }
}
