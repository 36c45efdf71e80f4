use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Range entry cache counters.
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cache {
    /// Requests dequeued from the upstream port (hits and misses).
    pub reads: u64,
    /// Misses that issued a new downstream lookup.
    pub read_misses: u64,
    /// Misses merged into an already outstanding downstream lookup.
    pub merged_misses: u64,
    pub hits: u64,
    pub evictions: u64,
    /// Cycles requests spent queued before being dequeued.
    pub pipeline_stalls: u64,
    /// Outstanding downstream lookups, summed over every cycle.
    pub mem_latency: u64,
}

impl Cache {
    #[must_use]
    pub fn misses(&self) -> u64 {
        self.read_misses + self.merged_misses
    }

    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        if self.reads == 0 {
            None
        } else {
            Some(self.hits as f64 / self.reads as f64)
        }
    }
}

impl std::ops::AddAssign for Cache {
    fn add_assign(&mut self, other: Self) {
        self.reads += other.reads;
        self.read_misses += other.read_misses;
        self.merged_misses += other.merged_misses;
        self.hits += other.hits;
        self.evictions += other.evictions;
        self.pipeline_stalls += other.pipeline_stalls;
        self.mem_latency += other.mem_latency;
    }
}

/// Cache stats keyed by the id of the core owning the cache.
#[allow(clippy::module_name_repetitions)]
#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerCache(pub HashMap<usize, Cache>);

impl PerCache {
    pub fn into_inner(self) -> HashMap<usize, Cache> {
        self.0
    }

    #[must_use]
    pub fn reduce(&self) -> Cache {
        let mut out = Cache::default();
        for stats in self.0.values() {
            out += stats.clone();
        }
        out
    }
}

impl FromIterator<(usize, Cache)> for PerCache {
    fn from_iter<I: IntoIterator<Item = (usize, Cache)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl std::ops::Deref for PerCache {
    type Target = HashMap<usize, Cache>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for PerCache {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}
