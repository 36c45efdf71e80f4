pub mod entry_set;

pub use entry_set::EntrySet;

use crate::{config, lookup, mshr};
use console::style;
use std::sync::Arc;

/// Cache of range entries in front of a slower lookup server.
///
/// Each cycle handles at most one response from below and then at most one
/// request from above. Misses for the same buffer id are coalesced into a
/// single downstream lookup. Sentinel fills are answered to every waiter
/// but bypass the entry set, so they are never cached and never evict.
#[derive(Debug)]
pub struct RangeCache {
    pub name: String,
    pub id: usize,
    config: config::Cache,
    entries: EntrySet,
    mshr: mshr::Table,
    /// Requests from the upper level and responses back to it.
    pub port: lookup::Link,
    pub stats: stats::Cache,
}

impl RangeCache {
    #[must_use]
    pub fn new(name: impl Into<String>, id: usize, config: &config::Cache) -> Self {
        Self {
            name: name.into(),
            id,
            entries: EntrySet::new(config.capacity, config.replacement_policy),
            mshr: mshr::Table::new(),
            config: config.clone(),
            port: lookup::Link::new(),
            stats: stats::Cache::default(),
        }
    }

    #[must_use]
    pub fn config(&self) -> &config::Cache {
        &self.config
    }

    #[must_use]
    pub fn entries(&self) -> &EntrySet {
        &self.entries
    }

    #[must_use]
    pub fn mshr(&self) -> &mshr::Table {
        &self.mshr
    }

    /// Check for queued requests or outstanding misses.
    #[must_use]
    pub fn busy(&self) -> bool {
        self.port.has_pending() || !self.mshr.is_empty()
    }

    pub fn cycle(&mut self, cycle: u64, lower: &mut lookup::Link) {
        self.stats.mem_latency += self.mshr.len() as u64;

        if let Some((rsp, _)) = lower.rsp.pop(cycle) {
            self.fill(cycle, rsp);
        }

        if let Some((req, sent)) = self.port.req.pop(cycle) {
            self.access(cycle, req, sent, lower);
        }
    }

    fn fill(&mut self, cycle: u64, rsp: lookup::Response) {
        log::debug!(
            "{}: {}",
            style(format!("{} FILL", self.name.to_uppercase())).bold(),
            rsp
        );
        let entry = rsp.entry;

        // the invalid entry is answered but never cached
        if !entry.is_sentinel() && entry.buffer_id == rsp.buffer_id {
            if let Some(victim) = self.entries.insert(Arc::clone(&entry)) {
                log::trace!("{}: evicted {}", self.name, victim);
                self.stats.evictions += 1;
            }
        }

        let Some(waiting) = self.mshr.take(rsp.buffer_id) else {
            log::warn!(
                "{}: response for buffer id {} without pending miss (#{})",
                self.name,
                rsp.buffer_id,
                rsp.uuid
            );
            return;
        };
        for req in waiting {
            let rsp = lookup::Response::new(&req, Arc::clone(&entry));
            log::trace!("{}: respond {}", self.name, rsp);
            self.port.rsp.send(rsp, self.config.hit_latency, cycle);
        }
    }

    fn access(&mut self, cycle: u64, req: lookup::Request, sent: u64, lower: &mut lookup::Link) {
        self.stats.reads += 1;
        self.stats.pipeline_stalls += cycle - sent;

        if let Some(entry) = self.entries.access(req.buffer_id) {
            log::debug!(
                "{}: {}",
                style(format!("{} HIT", self.name.to_uppercase())).green(),
                req
            );
            self.stats.hits += 1;
            let rsp = lookup::Response::new(&req, entry);
            self.port.rsp.send(rsp, self.config.hit_latency, cycle);
            return;
        }

        let merged = self.mshr.add(req.clone());
        if merged {
            log::debug!(
                "{}: {}",
                style(format!("{} MERGED MISS", self.name.to_uppercase())).yellow(),
                req
            );
            self.stats.merged_misses += 1;
        } else {
            log::debug!(
                "{}: {}",
                style(format!("{} MISS", self.name.to_uppercase())).red(),
                req
            );
            self.stats.read_misses += 1;
            lower.req.send(req, self.config.forwarding_latency, cycle);
        }
    }

    /// Drop all cached entries, pending misses and stats.
    pub fn reset(&mut self) {
        self.entries.clear();
        self.mshr.clear();
        self.port.req.clear();
        self.port.rsp.clear();
        self.stats = stats::Cache::default();
    }
}

#[cfg(test)]
mod tests {
    use super::RangeCache;
    use crate::{
        config::{self, CacheReplacementPolicy},
        lookup::{Request, Response},
        range_table::{RangeEntry, RangeTable},
        testing,
    };
    use color_eyre::eyre;
    use pretty_assertions_sorted::assert_eq;

    fn request(buffer_id: u16, tag: u32) -> Request {
        Request {
            addr: u64::from(buffer_id) * 0x1000,
            buffer_id,
            tag,
            uuid: u64::from(tag),
        }
    }

    fn backing_store(latency: u64) -> eyre::Result<RangeTable> {
        let entries = (1..=4).map(|id| RangeEntry::new(id, u64::from(id) * 0x1000, 0x100, false));
        Ok(RangeTable::new(entries, latency)?)
    }

    fn cache(capacity: usize, replacement_policy: CacheReplacementPolicy) -> RangeCache {
        let config = config::Cache {
            capacity,
            replacement_policy,
            ..config::Cache::default()
        };
        RangeCache::new("l1", 0, &config)
    }

    /// Run cache and backing store until both are idle.
    fn run(
        cache: &mut RangeCache,
        rbt: &mut RangeTable,
        start: u64,
    ) -> (u64, Vec<(u64, Response)>) {
        let mut responses = Vec::new();
        let mut cycle = start;
        while cache.busy() || rbt.busy() {
            rbt.cycle(cycle);
            cache.cycle(cycle, &mut rbt.port);
            responses.extend(testing::drain(&mut cache.port.rsp, cycle));
            cycle += 1;
            assert!(cycle < start + 1000, "cache did not drain");
        }
        (cycle, responses)
    }

    #[test]
    fn test_miss_coalescing() -> eyre::Result<()> {
        testing::init_logging();
        let mut rbt = backing_store(4)?;
        let mut l1 = cache(16, CacheReplacementPolicy::FIFO);
        for (tag, addr) in [(0, 0x1000), (1, 0x1004), (2, 0x10f0)] {
            let req = Request {
                addr,
                ..request(1, tag)
            };
            l1.port.req.send(req, 1, 0);
        }

        let (cycle, responses) = run(&mut l1, &mut rbt, 0);
        assert_eq!(rbt.stats.lookups, 1);
        // every waiter gets the shared entry with its own address
        assert_eq!(
            responses
                .iter()
                .map(|(_, rsp)| (rsp.tag, rsp.req_addr))
                .collect::<Vec<_>>(),
            vec![(0, 0x1000), (1, 0x1004), (2, 0x10f0)]
        );
        assert!(responses.iter().all(|(_, rsp)| rsp.entry.buffer_id == 1));
        // request at 1, store sees it at 2 and answers at 6, l1 answers at 7
        assert!(responses.iter().all(|(ready, _)| *ready == 7));
        assert_eq!(l1.stats.reads, 3);
        assert_eq!(l1.stats.read_misses, 1);
        assert_eq!(l1.stats.merged_misses, 2);
        assert!(l1.mshr().is_empty());

        // cached now
        l1.port.req.send(request(1, 5), 1, cycle);
        let (_, responses) = run(&mut l1, &mut rbt, cycle);
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].0, cycle + 2);
        assert_eq!(l1.stats.hits, 1);
        assert_eq!(rbt.stats.lookups, 1);
        Ok(())
    }

    fn access_pattern(policy: CacheReplacementPolicy) -> eyre::Result<Vec<u16>> {
        let mut rbt = backing_store(1)?;
        let mut l1 = cache(2, policy);
        let mut cycle = 0;
        for buffer_id in [1, 2, 1, 3] {
            l1.port.req.send(request(buffer_id, 0), 1, cycle);
            (cycle, _) = run(&mut l1, &mut rbt, cycle);
            assert!(l1.entries().len() <= 2);
        }
        assert_eq!(l1.stats.evictions, 1);
        Ok(l1.entries().buffer_ids().collect())
    }

    #[test]
    fn test_fifo_eviction() -> eyre::Result<()> {
        assert_eq!(access_pattern(CacheReplacementPolicy::FIFO)?, vec![2, 3]);
        Ok(())
    }

    #[test]
    fn test_lru_eviction() -> eyre::Result<()> {
        assert_eq!(access_pattern(CacheReplacementPolicy::LRU)?, vec![1, 3]);
        Ok(())
    }

    #[test]
    fn test_sentinel_is_not_cached() -> eyre::Result<()> {
        let mut rbt = backing_store(1)?;
        let mut l1 = cache(1, CacheReplacementPolicy::FIFO);
        l1.port.req.send(request(1, 0), 1, 0);
        let (cycle, _) = run(&mut l1, &mut rbt, 0);

        l1.port.req.send(request(9, 1), 1, cycle);
        l1.port.req.send(request(9, 2), 1, cycle);
        let (cycle, responses) = run(&mut l1, &mut rbt, cycle);
        assert_eq!(responses.len(), 2);
        assert!(responses.iter().all(|(_, rsp)| rsp.entry.is_sentinel()));
        assert!(responses.iter().all(|(_, rsp)| rsp.buffer_id == 9));
        assert_eq!(l1.entries().buffer_ids().collect::<Vec<_>>(), vec![1]);
        assert_eq!(l1.stats.evictions, 0);

        l1.port.req.send(request(9, 3), 1, cycle);
        run(&mut l1, &mut rbt, cycle);
        assert_eq!(rbt.stats.lookups, 3);
        assert_eq!(l1.stats.hits, 0);
        Ok(())
    }

    #[test]
    fn test_reset() -> eyre::Result<()> {
        let mut rbt = backing_store(1)?;
        let mut l1 = cache(4, CacheReplacementPolicy::LRU);
        l1.port.req.send(request(2, 0), 1, 0);
        run(&mut l1, &mut rbt, 0);
        assert_eq!(l1.entries().len(), 1);
        l1.reset();
        assert!(l1.entries().is_empty());
        assert_eq!(l1.stats, stats::Cache::default());
        assert!(!l1.busy());
        Ok(())
    }
}
