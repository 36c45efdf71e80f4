use crate::{
    address,
    arbitration,
    range_table::{BufferId, RangeEntry},
};
use color_eyre::eyre::{self, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound for the number of switch inputs.
pub const MAX_SWITCH_INPUTS: usize = 32;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("{component}: capacity must be at least one")]
    ZeroCapacity { component: &'static str },

    #[error("{component}: latency must be at least one cycle")]
    ZeroLatency { component: &'static str },

    #[error("buffer id 0 is reserved for the invalid range entry")]
    ReservedBufferId,

    #[error("duplicate range entry for buffer id {buffer_id}")]
    DuplicateBufferId { buffer_id: BufferId },

    #[error("switch supports 1 to {max} inputs (got {num_inputs})")]
    InvalidSwitchInputs { num_inputs: usize, max: usize },
}

/// A cache replacement policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CacheReplacementPolicy {
    LRU,
    #[default]
    FIFO,
}

/// What to do with traces whose address has no buffer id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Drop the trace without a lookup and without emitting it.
    #[default]
    Drop,
    /// Emit the trace unchecked.
    Forward,
}

/// Address to buffer id resolution strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverKind {
    /// Only the listed addresses resolve.
    #[default]
    Exact,
    /// Any address inside a known allocation resolves.
    Range,
}

/// Bounds checking unit configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Bcu {
    /// Maximum number of in-flight lookups per unit.
    pub queue_size: usize,
    pub unresolved: UnresolvedPolicy,
}

impl Default for Bcu {
    fn default() -> Self {
        Self {
            queue_size: 16,
            unresolved: UnresolvedPolicy::Drop,
        }
    }
}

/// Range entry cache configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Cache {
    /// Maximum number of cached range entries.
    pub capacity: usize,
    /// Latency of responses sent upstream.
    pub hit_latency: u64,
    /// Latency of misses forwarded downstream.
    pub forwarding_latency: u64,
    pub replacement_policy: CacheReplacementPolicy,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            capacity: 16384,
            hit_latency: 1,
            forwarding_latency: 1,
            replacement_policy: CacheReplacementPolicy::FIFO,
        }
    }
}

impl Cache {
    pub fn validate(&self, component: &'static str) -> Result<(), Error> {
        if self.capacity == 0 {
            return Err(Error::ZeroCapacity { component });
        }
        if self.hit_latency == 0 || self.forwarding_latency == 0 {
            return Err(Error::ZeroLatency { component });
        }
        Ok(())
    }
}

/// Range table backing store configuration.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct BackingStore {
    pub latency: u64,
    pub entries: Vec<RangeEntry>,
}

impl Default for BackingStore {
    fn default() -> Self {
        Self {
            latency: 4,
            entries: benchmark_entries(),
        }
    }
}

/// Buffer layout of the bounds checking regression kernel.
///
/// ```text
/// id | base       | size | read-only
/// 1  | 0xFEFFFFC8 | 0x28 | no
/// 2  | 0xFEFFFFBC | 0xA  | no
/// 3  | 0x8000A820 | 0xD  | yes
/// 4  | 0x8000BA5C | 0xC8 | no
/// ```
#[must_use]
pub fn benchmark_entries() -> Vec<RangeEntry> {
    vec![
        RangeEntry::new(1, 0xFEFF_FFC8, 0x28, false),
        RangeEntry::new(2, 0xFEFF_FFBC, 0xA, false),
        RangeEntry::new(3, 0x8000_A820, 0xD, true),
        RangeEntry::new(4, 0x8000_BA5C, 0xC8, false),
    ]
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AddressMapping {
    pub addr: address,
    pub buffer_id: BufferId,
}

/// Address resolver configuration.
///
/// Allocations are taken from the range table entries, `addresses` adds
/// exact mappings on top.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Resolver {
    pub kind: ResolverKind,
    pub addresses: Vec<AddressMapping>,
}

/// Switch between the private L1 and the shared L2 range caches.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Switch {
    pub policy: arbitration::Policy,
    pub delay: u64,
}

impl Default for Switch {
    fn default() -> Self {
        Self {
            policy: arbitration::Policy::RoundRobin,
            delay: 1,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of cores, each with its own bounds checking unit and L1.
    pub num_cores: usize,
    pub bcu: Bcu,
    pub l1_rcache: Cache,
    pub l2_rcache: Cache,
    pub rbt_mem: BackingStore,
    pub resolver: Resolver,
    pub switch: Switch,
}

impl Default for Config {
    fn default() -> Self {
        let rbt_mem = BackingStore::default();
        Self {
            num_cores: 1,
            bcu: Bcu::default(),
            l1_rcache: Cache::default(),
            // misses travel to the range table with its latency
            l2_rcache: Cache {
                forwarding_latency: rbt_mem.latency,
                ..Cache::default()
            },
            rbt_mem,
            resolver: Resolver::default(),
            switch: Switch::default(),
        }
    }
}

impl Config {
    pub fn from_yaml(path: &Path) -> eyre::Result<Self> {
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("failed to open config {}", path.display()))?;
        let config: Self = serde_yaml::from_reader(std::io::BufReader::new(file))
            .wrap_err_with(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.num_cores == 0 || self.num_cores > MAX_SWITCH_INPUTS {
            return Err(Error::InvalidSwitchInputs {
                num_inputs: self.num_cores,
                max: MAX_SWITCH_INPUTS,
            });
        }
        if self.bcu.queue_size == 0 {
            return Err(Error::ZeroCapacity { component: "bcu" });
        }
        self.l1_rcache.validate("l1_rcache")?;
        self.l2_rcache.validate("l2_rcache")?;
        if self.rbt_mem.latency == 0 {
            return Err(Error::ZeroLatency {
                component: "rbt_mem",
            });
        }
        if self.switch.delay == 0 {
            return Err(Error::ZeroLatency {
                component: "switch",
            });
        }
        Ok(())
    }
}
