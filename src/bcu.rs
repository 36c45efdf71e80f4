use crate::{
    address,
    allocation::ResolveBufferId,
    config, lookup,
    port::Port,
    range_table::{BufferId, RangeEntry},
    slot_table::{self, SlotTable},
    trace::MemoryTrace,
};
use console::style;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Why an access failed the bounds check.
#[derive(
    Debug, strum::Display, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum FailureReason {
    #[strum(serialize = "out of bounds")]
    OutOfBounds,
    #[strum(serialize = "write to read-only")]
    WriteToReadOnly,
}

impl From<FailureReason> for stats::Violation {
    fn from(reason: FailureReason) -> Self {
        match reason {
            FailureReason::OutOfBounds => Self::OutOfBounds,
            FailureReason::WriteToReadOnly => Self::WriteToReadOnly,
        }
    }
}

/// Outcome of checking one access against its range entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Evaluation {
    /// Cycle the response was evaluated in.
    pub cycle: u64,
    pub uuid: u64,
    pub addr: address,
    /// Buffer id the address resolved to.
    pub buffer_id: BufferId,
    pub base_addr: address,
    pub size: u64,
    pub is_store: bool,
    pub in_bounds: bool,
    pub permitted: bool,
    pub valid: bool,
    /// False if the range table had no entry for the buffer id.
    pub tracked: bool,
    pub reason: Option<FailureReason>,
}

impl Evaluation {
    #[must_use]
    pub fn new(addr: address, buffer_id: BufferId, is_store: bool, entry: &RangeEntry) -> Self {
        let in_bounds = entry.contains(addr);
        let permitted = !(entry.read_only && is_store);
        let reason = if !in_bounds {
            Some(FailureReason::OutOfBounds)
        } else if !permitted {
            Some(FailureReason::WriteToReadOnly)
        } else {
            None
        };
        Self {
            cycle: 0,
            uuid: 0,
            addr,
            buffer_id,
            base_addr: entry.base_addr,
            size: entry.size,
            is_store,
            in_bounds,
            permitted,
            valid: in_bounds && permitted,
            tracked: !entry.is_sentinel(),
            reason,
        }
    }

    #[must_use]
    pub fn at(mut self, cycle: u64, uuid: u64) -> Self {
        self.cycle = cycle;
        self.uuid = uuid;
        self
    }

    /// Returns true if the access is a tracked bounds violation.
    #[must_use]
    pub fn is_violation(&self) -> bool {
        self.tracked && !self.valid
    }
}

impl std::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {:#x} buffer_id={} range=[{:#x}, {:#x}) in_bounds={} permitted={} valid={}",
            if self.is_store { "store" } else { "load" },
            self.addr,
            self.buffer_id,
            self.base_addr,
            self.base_addr.saturating_add(self.size),
            self.in_bounds,
            self.permitted,
            self.valid,
        )?;
        if let Some(reason) = self.reason {
            write!(f, " ({reason})")?;
        }
        if !self.tracked {
            write!(f, " [untracked]")?;
        }
        write!(f, " (#{})", self.uuid)
    }
}

/// Trace waiting for its range entries.
#[derive(Debug, Clone)]
struct Pending {
    trace: Arc<MemoryTrace>,
    remaining_blocks: usize,
}

/// Bounds checking unit in front of a core's memory pipeline.
///
/// Looks up the range entry of every memory trace, records whether the
/// access stays inside its buffer and passes the trace on once checked.
#[derive(Debug)]
pub struct BoundsCheckUnit {
    pub id: usize,
    config: config::Bcu,
    /// Traces from the memory pipeline.
    pub input: Port<Arc<MemoryTrace>>,
    /// Checked traces.
    pub output: Port<Arc<MemoryTrace>>,
    slots: SlotTable<Pending>,
    resolver: Arc<dyn ResolveBufferId>,
    /// Unbounded until drained with [`BoundsCheckUnit::take_evaluations`].
    evaluations: Vec<Evaluation>,
    pub stats: stats::Bcu,
}

impl BoundsCheckUnit {
    #[must_use]
    pub fn new(id: usize, config: &config::Bcu, resolver: Arc<dyn ResolveBufferId>) -> Self {
        Self {
            id,
            config: config.clone(),
            input: Port::new(),
            output: Port::new(),
            slots: SlotTable::new(config.queue_size),
            resolver,
            evaluations: Vec::new(),
            stats: stats::Bcu::default(),
        }
    }

    /// Number of traces waiting for a range entry.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.input.has_pending() || !self.slots.is_empty()
    }

    /// All evaluations so far, in completion order.
    #[must_use]
    pub fn evaluations(&self) -> &[Evaluation] {
        &self.evaluations
    }

    pub fn take_evaluations(&mut self) -> Vec<Evaluation> {
        std::mem::take(&mut self.evaluations)
    }

    pub fn cycle(&mut self, cycle: u64, l1: &mut lookup::Link) -> Result<(), slot_table::Error> {
        if let Some((rsp, _)) = l1.rsp.pop(cycle) {
            self.complete(cycle, &rsp)?;
        }
        self.issue(cycle, l1)
    }

    fn complete(&mut self, cycle: u64, rsp: &lookup::Response) -> Result<(), slot_table::Error> {
        self.stats.responses += 1;
        let pending = self.slots.get_mut(rsp.tag)?;
        let evaluation = Evaluation::new(
            rsp.req_addr,
            rsp.buffer_id,
            pending.trace.is_store(),
            &rsp.entry,
        )
        .at(cycle, rsp.uuid);
        pending.remaining_blocks -= 1;
        let done = pending.remaining_blocks == 0;
        self.record(evaluation);

        if done {
            let pending = self.slots.release(rsp.tag)?;
            log::debug!(
                "{}: {} (tag={})",
                style(format!("BCU[{}] EMIT", self.id)).bold(),
                pending.trace,
                rsp.tag
            );
            self.output.send(pending.trace, 1, cycle);
            self.stats.emitted += 1;
        }
        Ok(())
    }

    fn record(&mut self, evaluation: Evaluation) {
        if !evaluation.tracked {
            log::debug!("bcu[{}]: no range entry: {}", self.id, evaluation);
            self.stats.untracked += 1;
        } else if evaluation.valid {
            log::trace!("bcu[{}]: {}", self.id, evaluation);
            self.stats.valid += 1;
        } else {
            log::warn!(
                "{}: {}",
                style(format!("BCU[{}] BOUNDS VIOLATION", self.id)).red(),
                evaluation
            );
            if let Some(reason) = evaluation.reason {
                self.stats.inc_violation(reason.into());
            }
        }
        self.evaluations.push(evaluation);
    }

    fn issue(&mut self, cycle: u64, l1: &mut lookup::Link) -> Result<(), slot_table::Error> {
        let Some(trace) = self.input.front(cycle) else {
            return Ok(());
        };
        let Some(access) = trace.first_access() else {
            // fences and the like block the input until removed upstream
            log::trace!("bcu[{}]: stall on empty trace {}", self.id, trace);
            self.stats.empty_trace_stalls += 1;
            return Ok(());
        };
        let addr = access.addr;

        let Some(buffer_id) = self.resolver.resolve(addr) else {
            if let Some((trace, _)) = self.input.pop(cycle) {
                self.stats.traces += 1;
                self.stats.unresolved += 1;
                match self.config.unresolved {
                    config::UnresolvedPolicy::Drop => {
                        log::debug!("bcu[{}]: drop unresolved {}", self.id, trace);
                    }
                    config::UnresolvedPolicy::Forward => {
                        log::debug!("bcu[{}]: forward unresolved {}", self.id, trace);
                        self.output.send(trace, 1, cycle);
                        self.stats.emitted += 1;
                    }
                }
            }
            return Ok(());
        };

        let uuid = trace.uuid;
        let tag = self.slots.allocate(Pending {
            trace: Arc::clone(trace),
            remaining_blocks: 1,
        })?;
        self.input.pop(cycle);
        self.stats.traces += 1;

        let req = lookup::Request {
            addr,
            buffer_id,
            tag,
            uuid,
        };
        log::debug!(
            "{}: {}",
            style(format!("BCU[{}] LOOKUP", self.id)).bold(),
            req
        );
        l1.req.send(req, 1, cycle);
        self.stats.lookups += 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.input.clear();
        self.output.clear();
        self.slots.clear();
        self.evaluations.clear();
        self.stats = stats::Bcu::default();
    }
}

#[cfg(test)]
mod tests {
    use super::{BoundsCheckUnit, Evaluation, FailureReason};
    use crate::{
        allocation::{ExactResolver, ResolveBufferId},
        config,
        lookup::{self, Response},
        range_table::RangeEntry,
        slot_table,
        testing,
        trace::{AccessKind, MemoryTrace},
    };
    use color_eyre::eyre;
    use pretty_assertions_sorted::assert_eq;
    use std::sync::Arc;

    #[test]
    fn test_evaluation_truth_table() {
        let rw = RangeEntry::new(1, 0x1000, 0x10, false);
        let ro = RangeEntry::new(2, 0x1000, 0x10, true);
        let check = |addr, is_store, entry: &RangeEntry| {
            let eval = Evaluation::new(addr, entry.buffer_id, is_store, entry);
            (eval.in_bounds, eval.permitted, eval.valid, eval.reason)
        };
        assert_eq!(check(0x1000, false, &rw), (true, true, true, None));
        assert_eq!(check(0x100F, true, &rw), (true, true, true, None));
        assert_eq!(
            check(0x1010, false, &rw),
            (false, true, false, Some(FailureReason::OutOfBounds))
        );
        assert_eq!(
            check(0x0FFF, false, &rw),
            (false, true, false, Some(FailureReason::OutOfBounds))
        );
        assert_eq!(check(0x1004, false, &ro), (true, true, true, None));
        assert_eq!(
            check(0x1004, true, &ro),
            (true, false, false, Some(FailureReason::WriteToReadOnly))
        );
        // out of bounds is reported first
        assert_eq!(
            check(0x2000, true, &ro),
            (false, false, false, Some(FailureReason::OutOfBounds))
        );
    }

    #[test]
    fn test_sentinel_is_untracked() {
        let eval = Evaluation::new(0x1000, 7, false, &RangeEntry::sentinel());
        assert!(!eval.tracked);
        assert!(!eval.valid);
        assert!(!eval.is_violation());
    }

    fn resolver() -> Arc<dyn ResolveBufferId> {
        Arc::new([(0x1000, 1), (0x2000, 2)].into_iter().collect::<ExactResolver>())
    }

    fn bcu(queue_size: usize, unresolved: config::UnresolvedPolicy) -> BoundsCheckUnit {
        let config = config::Bcu {
            queue_size,
            unresolved,
        };
        BoundsCheckUnit::new(0, &config, resolver())
    }

    fn respond(l1: &mut lookup::Link, entry: RangeEntry, cycle: u64) {
        let (req, _) = l1.req.pop(cycle).unwrap();
        l1.rsp.send(Response::new(&req, Arc::new(entry)), 1, cycle);
    }

    #[test]
    fn test_lookup_and_emit() -> eyre::Result<()> {
        testing::init_logging();
        let mut bcu = bcu(4, config::UnresolvedPolicy::Drop);
        let mut l1 = lookup::Link::new();
        let trace = Arc::new(MemoryTrace::store(1, 0x1000, 4));
        bcu.input.send(Arc::clone(&trace), 1, 0);

        bcu.cycle(1, &mut l1)?;
        assert_eq!(bcu.in_flight(), 1);
        let req = l1.req.front(2).unwrap();
        assert_eq!((req.addr, req.buffer_id, req.tag, req.uuid), (0x1000, 1, 0, 1));

        respond(&mut l1, RangeEntry::new(1, 0x1000, 0x10, true), 2);
        bcu.cycle(3, &mut l1)?;
        assert_eq!(bcu.in_flight(), 0);
        let (emitted, _) = bcu.output.pop(4).unwrap();
        assert!(Arc::ptr_eq(&emitted, &trace));
        assert!(bcu.output.pop(100).is_none());

        let evaluations = bcu.evaluations();
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].reason, Some(FailureReason::WriteToReadOnly));
        assert_eq!(evaluations[0].cycle, 3);
        assert_eq!(bcu.stats.emitted, 1);
        assert_eq!(
            bcu.stats.violations[&stats::Violation::WriteToReadOnly],
            1
        );
        assert!(!bcu.busy());
        Ok(())
    }

    #[test]
    fn test_empty_trace_stalls() -> eyre::Result<()> {
        let mut bcu = bcu(4, config::UnresolvedPolicy::Drop);
        let mut l1 = lookup::Link::new();
        bcu.input
            .send(Arc::new(MemoryTrace::new(1, AccessKind::Fence)), 1, 0);
        bcu.input.send(Arc::new(MemoryTrace::load(2, 0x1000, 4)), 1, 0);
        for cycle in 1..4 {
            bcu.cycle(cycle, &mut l1)?;
        }
        assert_eq!(bcu.stats.empty_trace_stalls, 3);
        assert_eq!(bcu.input.len(), 2);
        assert!(!l1.req.has_pending());
        Ok(())
    }

    #[test]
    fn test_unresolved_policy() -> eyre::Result<()> {
        let mut l1 = lookup::Link::new();
        let mut drop = bcu(4, config::UnresolvedPolicy::Drop);
        drop.input.send(Arc::new(MemoryTrace::load(1, 0x1004, 4)), 1, 0);
        drop.cycle(1, &mut l1)?;
        assert!(!drop.busy());
        assert!(!drop.output.has_pending());
        assert_eq!(drop.stats.unresolved, 1);

        let mut forward = bcu(4, config::UnresolvedPolicy::Forward);
        forward
            .input
            .send(Arc::new(MemoryTrace::load(2, 0x1004, 4)), 1, 0);
        forward.cycle(1, &mut l1)?;
        assert_eq!(forward.output.pop(2).map(|(trace, _)| trace.uuid), Some(2));
        assert!(!l1.req.has_pending());
        assert!(forward.evaluations().is_empty());
        Ok(())
    }

    #[test]
    fn test_slot_exhaustion_is_fatal() -> eyre::Result<()> {
        let mut bcu = bcu(2, config::UnresolvedPolicy::Drop);
        let mut l1 = lookup::Link::new();
        for uuid in 0..3 {
            bcu.input
                .send(Arc::new(MemoryTrace::load(uuid, 0x2000, 4)), 1, 0);
        }
        bcu.cycle(1, &mut l1)?;
        bcu.cycle(2, &mut l1)?;
        assert_eq!(
            bcu.cycle(3, &mut l1),
            Err(slot_table::Error::Exhausted { capacity: 2 })
        );
        Ok(())
    }

    #[test]
    fn test_unknown_tag_is_fatal() {
        let mut bcu = bcu(2, config::UnresolvedPolicy::Drop);
        let mut l1 = lookup::Link::new();
        let req = lookup::Request {
            addr: 0x1000,
            buffer_id: 1,
            tag: 1,
            uuid: 0,
        };
        let entry = Arc::new(RangeEntry::new(1, 0x1000, 0x10, false));
        l1.rsp.send(Response::new(&req, entry), 1, 0);
        assert_eq!(
            bcu.cycle(1, &mut l1),
            Err(slot_table::Error::UnknownTag { tag: 1 })
        );
    }

    #[test]
    fn test_tags_are_reused() -> eyre::Result<()> {
        let mut bcu = bcu(1, config::UnresolvedPolicy::Drop);
        let mut l1 = lookup::Link::new();
        bcu.input.send(Arc::new(MemoryTrace::load(1, 0x1000, 4)), 1, 0);
        bcu.cycle(1, &mut l1)?;
        respond(&mut l1, RangeEntry::new(1, 0x1000, 0x10, false), 2);
        bcu.cycle(3, &mut l1)?;

        bcu.input.send(Arc::new(MemoryTrace::store(2, 0x2000, 4)), 1, 3);
        bcu.cycle(4, &mut l1)?;
        let req = l1.req.front(5).unwrap();
        assert_eq!((req.tag, req.uuid, req.buffer_id), (0, 2, 2));
        respond(&mut l1, RangeEntry::new(2, 0x2000, 0x4, false), 5);
        bcu.cycle(6, &mut l1)?;

        let uuids: Vec<_> = testing::drain(&mut bcu.output, 100)
            .into_iter()
            .map(|(_, trace)| trace.uuid)
            .collect();
        assert_eq!(uuids, vec![1, 2]);
        assert!(bcu.evaluations().iter().all(|eval| eval.valid));
        Ok(())
    }
}
