use serde::{Deserialize, Serialize};

/// Range table backing store counters.
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackingStore {
    pub lookups: u64,
    /// Lookups answered with the invalid sentinel entry.
    pub unknown_buffer_ids: u64,
    /// Cycles requests spent queued before being served.
    pub queueing_cycles: u64,
}

impl std::ops::AddAssign for BackingStore {
    fn add_assign(&mut self, other: Self) {
        self.lookups += other.lookups;
        self.unknown_buffer_ids += other.unknown_buffer_ids;
        self.queueing_cycles += other.queueing_cycles;
    }
}
