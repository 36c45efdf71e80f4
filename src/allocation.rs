use crate::{
    address, config,
    range_table::{BufferId, RangeEntry},
};
use std::collections::HashMap;

/// Maps an accessed address to the id of the buffer it belongs to.
pub trait ResolveBufferId: std::fmt::Debug {
    #[must_use]
    fn resolve(&self, addr: address) -> Option<BufferId>;
}

/// Resolves only addresses that were registered exactly.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExactResolver(HashMap<address, BufferId>);

impl ExactResolver {
    pub fn insert(&mut self, addr: address, buffer_id: BufferId) -> Option<BufferId> {
        self.0.insert(addr, buffer_id)
    }
}

impl FromIterator<(address, BufferId)> for ExactResolver {
    fn from_iter<I: IntoIterator<Item = (address, BufferId)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl ResolveBufferId for ExactResolver {
    fn resolve(&self, addr: address) -> Option<BufferId> {
        self.0.get(&addr).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Allocation {
    pub buffer_id: BufferId,
    pub start_addr: address,
    pub end_addr: address,
}

impl Allocation {
    #[must_use]
    pub fn num_bytes(&self) -> u64 {
        self.end_addr.saturating_sub(self.start_addr)
    }
}

impl std::fmt::Display for Allocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Allocation")
            .field("buffer_id", &self.buffer_id)
            .field("start_addr", &format_args!("{:#x}", self.start_addr))
            .field("end_addr", &format_args!("{:#x}", self.end_addr))
            .field("num_bytes", &self.num_bytes())
            .finish()
    }
}

/// Resolves any address inside a known allocation.
///
/// Exact addresses registered on top take precedence.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Allocations {
    ranges: rangemap::RangeMap<address, Allocation>,
    exact: ExactResolver,
}

impl std::ops::Deref for Allocations {
    type Target = rangemap::RangeMap<address, Allocation>;

    fn deref(&self) -> &Self::Target {
        &self.ranges
    }
}

impl Allocations {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: &RangeEntry) {
        if entry.size == 0 {
            log::warn!("allocation: ignoring empty buffer {}", entry.buffer_id);
            return;
        }
        let range = entry.base_addr..entry.end_addr();
        if self.ranges.overlaps(&range) {
            log::warn!(
                "allocation: buffer {} overlaps an existing allocation",
                entry.buffer_id
            );
        }
        self.ranges.insert(
            range.clone(),
            Allocation {
                buffer_id: entry.buffer_id,
                start_addr: range.start,
                end_addr: range.end,
            },
        );
    }

    pub fn insert_exact(&mut self, addr: address, buffer_id: BufferId) {
        self.exact.insert(addr, buffer_id);
    }
}

impl ResolveBufferId for Allocations {
    fn resolve(&self, addr: address) -> Option<BufferId> {
        self.exact
            .resolve(addr)
            .or_else(|| Some(self.ranges.get(&addr)?.buffer_id))
    }
}

/// Build the resolver described by `config`.
#[must_use]
pub fn resolver(config: &config::Config) -> Box<dyn ResolveBufferId> {
    let extra = config
        .resolver
        .addresses
        .iter()
        .map(|mapping| (mapping.addr, mapping.buffer_id));
    match config.resolver.kind {
        config::ResolverKind::Exact => Box::new(
            config
                .rbt_mem
                .entries
                .iter()
                .map(|entry| (entry.base_addr, entry.buffer_id))
                .chain(extra)
                .collect::<ExactResolver>(),
        ),
        config::ResolverKind::Range => {
            let mut allocations = Allocations::new();
            for entry in &config.rbt_mem.entries {
                allocations.insert(entry);
            }
            for (addr, buffer_id) in extra {
                allocations.insert_exact(addr, buffer_id);
            }
            Box::new(allocations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolver, Allocations, ExactResolver, ResolveBufferId};
    use crate::{
        config::{self, AddressMapping, ResolverKind},
        range_table::RangeEntry,
    };
    use pretty_assertions_sorted::assert_eq;

    #[test]
    fn test_exact() {
        let resolver: ExactResolver = [(0x1000, 1), (0x2000, 2)].into_iter().collect();
        assert_eq!(resolver.resolve(0x1000), Some(1));
        assert_eq!(resolver.resolve(0x1004), None);
        assert_eq!(resolver.resolve(0x2000), Some(2));
    }

    #[test]
    fn test_allocations() {
        let mut allocations = Allocations::new();
        allocations.insert(&RangeEntry::new(1, 0x1000, 0x10, false));
        allocations.insert(&RangeEntry::new(2, 0x2000, 0, false));
        allocations.insert_exact(0x9000, 7);
        assert_eq!(allocations.resolve(0x1000), Some(1));
        assert_eq!(allocations.resolve(0x100F), Some(1));
        assert_eq!(allocations.resolve(0x1010), None);
        assert_eq!(allocations.resolve(0x2000), None);
        assert_eq!(allocations.resolve(0x9000), Some(7));
        assert_eq!(allocations.iter().count(), 1);
    }

    #[test]
    fn test_from_config() {
        let mut config = config::Config::default();
        config.resolver.addresses.push(AddressMapping {
            addr: 0x4000,
            buffer_id: 9,
        });
        let exact = resolver(&config);
        assert_eq!(exact.resolve(0xFEFF_FFC8), Some(1));
        assert_eq!(exact.resolve(0xFEFF_FFCC), None);
        assert_eq!(exact.resolve(0x4000), Some(9));

        config.resolver.kind = ResolverKind::Range;
        let range = resolver(&config);
        assert_eq!(range.resolve(0xFEFF_FFCC), Some(1));
        assert_eq!(range.resolve(0x8000_A82C), Some(3));
        assert_eq!(range.resolve(0x8000_A82D), None);
        assert_eq!(range.resolve(0x4000), Some(9));
    }
}
