use crate::{address, config, lookup};
use console::style;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Identifier of a logical allocation.
///
/// Zero is reserved for the invalid sentinel entry.
pub type BufferId = u16;

pub const INVALID_BUFFER_ID: BufferId = 0;

/// Bounds and permissions of a buffer.
///
/// Entries are immutable and owned by the [`RangeTable`], caches and
/// responses only hold shared references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RangeEntry {
    pub buffer_id: BufferId,
    pub base_addr: address,
    pub size: u64,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub kernel_id: u64,
}

impl RangeEntry {
    #[must_use]
    pub fn new(buffer_id: BufferId, base_addr: address, size: u64, read_only: bool) -> Self {
        Self {
            buffer_id,
            base_addr,
            size,
            read_only,
            kernel_id: 0,
        }
    }

    #[must_use]
    pub fn sentinel() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.buffer_id == INVALID_BUFFER_ID
    }

    #[must_use]
    pub fn contains(&self, addr: address) -> bool {
        self.base_addr <= addr && addr - self.base_addr < self.size
    }

    #[must_use]
    pub fn end_addr(&self) -> address {
        self.base_addr.saturating_add(self.size)
    }
}

impl std::fmt::Display for RangeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "(buffer_id={:x}, base_addr={:#x}, size={:#x}, read_only={}, kernel_id={})",
            self.buffer_id, self.base_addr, self.size, self.read_only, self.kernel_id
        )
    }
}

/// Backing store of the range-bound table (RBT).
///
/// Answers every lookup after a fixed latency. Unknown buffer ids are
/// answered with the invalid sentinel entry.
#[derive(Debug)]
pub struct RangeTable {
    entries: IndexMap<BufferId, Arc<RangeEntry>>,
    sentinel: Arc<RangeEntry>,
    latency: u64,
    /// Lookups from the lowest cache level.
    pub port: lookup::Link,
    pub stats: stats::BackingStore,
}

impl RangeTable {
    pub fn new(
        entries: impl IntoIterator<Item = RangeEntry>,
        latency: u64,
    ) -> Result<Self, config::Error> {
        if latency == 0 {
            return Err(config::Error::ZeroLatency {
                component: "rbt_mem",
            });
        }
        let mut table = IndexMap::new();
        for entry in entries {
            let buffer_id = entry.buffer_id;
            if buffer_id == INVALID_BUFFER_ID {
                return Err(config::Error::ReservedBufferId);
            }
            if table.insert(buffer_id, Arc::new(entry)).is_some() {
                return Err(config::Error::DuplicateBufferId { buffer_id });
            }
        }
        Ok(Self {
            entries: table,
            sentinel: Arc::new(RangeEntry::sentinel()),
            latency,
            port: lookup::Link::new(),
            stats: stats::BackingStore::default(),
        })
    }

    pub fn from_config(config: &config::BackingStore) -> Result<Self, config::Error> {
        Self::new(config.entries.iter().cloned(), config.latency)
    }

    #[must_use]
    pub fn latency(&self) -> u64 {
        self.latency
    }

    #[must_use]
    pub fn get(&self, buffer_id: BufferId) -> Option<&Arc<RangeEntry>> {
        self.entries.get(&buffer_id)
    }

    #[must_use]
    pub fn sentinel(&self) -> &Arc<RangeEntry> {
        &self.sentinel
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<RangeEntry>> + '_ {
        self.entries.values()
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.port.has_pending()
    }

    pub fn cycle(&mut self, cycle: u64) {
        while let Some((req, sent)) = self.port.req.pop(cycle) {
            log::debug!(
                "{}: {} buffer_id={}",
                style("RBT-MEM RECEIVE").bold(),
                req,
                req.buffer_id
            );
            self.stats.lookups += 1;
            self.stats.queueing_cycles += cycle - sent;

            let entry = if let Some(entry) = self.entries.get(&req.buffer_id) {
                Arc::clone(entry)
            } else {
                log::warn!(
                    "rbt-mem: invalid buffer id {} (#{})",
                    req.buffer_id,
                    req.uuid
                );
                self.stats.unknown_buffer_ids += 1;
                Arc::clone(&self.sentinel)
            };
            let rsp = lookup::Response::new(&req, entry);
            log::debug!("{}: {}", style("RBT-MEM SEND").bold(), rsp);
            self.port.rsp.send(rsp, self.latency, cycle);
        }
    }

    pub fn reset(&mut self) {
        self.port.req.clear();
        self.port.rsp.clear();
        self.stats = stats::BackingStore::default();
    }
}
