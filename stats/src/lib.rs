pub mod bcu;
pub mod cache;
pub mod interconn;
pub mod mem;
pub mod sim;

pub use bcu::{Bcu, Violation};
pub use cache::{Cache, PerCache};
pub use interconn::Switch;
pub use mem::BackingStore;
pub use sim::Sim;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    pub sim: Sim,
    /// Bounds checking units, keyed by core id.
    pub bcu: HashMap<usize, Bcu>,
    /// Private L1 range caches, keyed by core id.
    pub l1_rcache: PerCache,
    pub l2_rcache: Cache,
    pub rbt_mem: BackingStore,
    pub switch: Switch,
}

impl Stats {
    #[must_use]
    pub fn new(num_cores: usize) -> Self {
        Self {
            sim: Sim::default(),
            bcu: (0..num_cores).map(|id| (id, Bcu::default())).collect(),
            l1_rcache: (0..num_cores).map(|id| (id, Cache::default())).collect(),
            l2_rcache: Cache::default(),
            rbt_mem: BackingStore::default(),
            switch: Switch::new(num_cores),
        }
    }

    /// Bounds checking counters summed over all cores.
    #[must_use]
    pub fn total_bcu(&self) -> Bcu {
        let mut out = Bcu::default();
        for stats in self.bcu.values() {
            out += stats.clone();
        }
        out
    }
}
