use crate::{
    allocation,
    bcu::{BoundsCheckUnit, Evaluation},
    cache::RangeCache,
    config, interconn, lookup,
    range_table::RangeTable,
    slot_table,
    trace::MemoryTrace,
};
use console::style;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] config::Error),

    #[error(transparent)]
    Slot(#[from] slot_table::Error),

    #[error(transparent)]
    Switch(#[from] interconn::Error),

    #[error("trace for core {core_id} but only {num_cores} cores are simulated")]
    InvalidCore { core_id: usize, num_cores: usize },

    #[error("simulation still busy after {cycle} cycles")]
    Deadlock { cycle: u64 },
}

/// Bounds checking units of all cores with their range cache hierarchy.
///
/// ```text
/// bcu[i] -> l1_rcache[i] -> switch -> l2_rcache -> rbt_mem
/// ```
///
/// Components are ticked once per cycle from the backing store towards
/// the cores, each handling responses before new requests.
#[derive(Debug)]
pub struct Simulator {
    config: config::Config,
    cycle: u64,
    pub bcus: Vec<BoundsCheckUnit>,
    pub l1_rcaches: Vec<RangeCache>,
    pub switch: interconn::Switch<lookup::Request, lookup::Response>,
    pub l2_rcache: RangeCache,
    pub rbt_mem: RangeTable,
    /// Traces not yet issued to the bounds checking units.
    issue_queues: Vec<VecDeque<Arc<MemoryTrace>>>,
    /// Checked traces per core, in emission order.
    ///
    /// Grows until drained with [`Simulator::take_completed`].
    completed: Vec<Vec<Arc<MemoryTrace>>>,
    stats: stats::Sim,
}

impl Simulator {
    pub fn new(config: config::Config) -> Result<Self, Error> {
        config.validate()?;
        let num_cores = config.num_cores;
        let resolver: Arc<dyn allocation::ResolveBufferId> =
            Arc::from(allocation::resolver(&config));

        let bcus = (0..num_cores)
            .map(|id| BoundsCheckUnit::new(id, &config.bcu, Arc::clone(&resolver)))
            .collect();
        let l1_rcaches = (0..num_cores)
            .map(|id| RangeCache::new(format!("l1_rcache[{id}]"), id, &config.l1_rcache))
            .collect();
        let switch = interconn::Switch::new(num_cores, &config.switch)?;
        let l2_rcache = RangeCache::new("l2_rcache", 0, &config.l2_rcache);
        let rbt_mem = RangeTable::from_config(&config.rbt_mem)?;

        log::info!(
            "simulating {} core(s) with {} range entries ({:?} resolver, {})",
            num_cores,
            rbt_mem.len(),
            config.resolver.kind,
            if switch.is_bypass() {
                "bypass switch"
            } else {
                "arbitrated switch"
            }
        );

        Ok(Self {
            cycle: 0,
            bcus,
            l1_rcaches,
            switch,
            l2_rcache,
            rbt_mem,
            issue_queues: vec![VecDeque::new(); num_cores],
            completed: vec![Vec::new(); num_cores],
            stats: stats::Sim::default(),
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &config::Config {
        &self.config
    }

    #[must_use]
    pub fn cycle_count(&self) -> u64 {
        self.cycle
    }

    /// Queue a trace for the core named by its `core_id`.
    pub fn push_trace(&mut self, trace: impl Into<Arc<MemoryTrace>>) -> Result<(), Error> {
        let trace = trace.into();
        let num_cores = self.issue_queues.len();
        let queue = self
            .issue_queues
            .get_mut(trace.core_id)
            .ok_or(Error::InvalidCore {
                core_id: trace.core_id,
                num_cores,
            })?;
        queue.push_back(trace);
        Ok(())
    }

    #[must_use]
    pub fn busy(&self) -> bool {
        self.issue_queues.iter().any(|queue| !queue.is_empty())
            || self
                .bcus
                .iter()
                .any(|bcu| bcu.busy() || bcu.output.has_pending())
            || self.l1_rcaches.iter().any(RangeCache::busy)
            || self.switch.busy()
            || self.l2_rcache.busy()
            || self.rbt_mem.busy()
    }

    /// Advance all components by one cycle.
    pub fn cycle(&mut self) -> Result<(), Error> {
        let cycle = self.cycle;
        log::trace!("{}", style(format!("======== cycle {cycle} ========")).blue());

        self.rbt_mem.cycle(cycle);
        self.l2_rcache.cycle(cycle, &mut self.rbt_mem.port);
        for (l1, lower) in self
            .l1_rcaches
            .iter_mut()
            .zip(self.switch.inputs.iter_mut())
        {
            l1.cycle(cycle, lower);
        }
        self.switch.cycle(cycle, &mut self.l2_rcache.port)?;

        for (bcu, l1) in self.bcus.iter_mut().zip(self.l1_rcaches.iter_mut()) {
            bcu.cycle(cycle, &mut l1.port)?;
        }

        for ((bcu, queue), completed) in self
            .bcus
            .iter_mut()
            .zip(self.issue_queues.iter_mut())
            .zip(self.completed.iter_mut())
        {
            while let Some((trace, _)) = bcu.output.pop(cycle) {
                self.stats.traces_out += 1;
                completed.push(trace);
            }

            // never issue more traces than the unit can track
            let has_room = bcu.in_flight() + bcu.input.len() < bcu.capacity();
            if has_room {
                if let Some(trace) = queue.pop_front() {
                    log::debug!(
                        "{}: {}",
                        style(format!("ISSUE CORE[{}]", bcu.id)).bold(),
                        trace
                    );
                    bcu.input.send(trace, 1, cycle);
                    self.stats.traces_in += 1;
                }
            }
        }

        self.cycle += 1;
        self.stats.cycles = self.cycle;
        Ok(())
    }

    /// Run until all traces are checked.
    ///
    /// # Errors
    /// Fails with [`Error::Deadlock`] if work is still in flight after
    /// `max_cycles`.
    pub fn run_to_completion(&mut self, max_cycles: u64) -> Result<u64, Error> {
        while self.busy() {
            if self.cycle >= max_cycles {
                return Err(Error::Deadlock { cycle: self.cycle });
            }
            self.cycle()?;
        }
        log::info!("simulation done in {} cycles", self.cycle);
        Ok(self.cycle)
    }

    /// Checked traces of a core, in emission order.
    #[must_use]
    pub fn completed(&self, core_id: usize) -> &[Arc<MemoryTrace>] {
        self.completed
            .get(core_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Remove and return the checked traces of all cores.
    pub fn take_completed(&mut self) -> Vec<Vec<Arc<MemoryTrace>>> {
        self.completed
            .iter_mut()
            .map(std::mem::take)
            .collect()
    }

    /// All evaluations so far, with the id of the evaluating core.
    pub fn evaluations(&self) -> impl Iterator<Item = (usize, &Evaluation)> + '_ {
        self.bcus
            .iter()
            .flat_map(|bcu| bcu.evaluations().iter().map(move |eval| (bcu.id, eval)))
    }

    /// Remove and return all evaluations, with the id of the evaluating core.
    ///
    /// Long running drivers should call this periodically, the per unit
    /// logs are unbounded otherwise.
    pub fn take_evaluations(&mut self) -> Vec<(usize, Evaluation)> {
        self.bcus
            .iter_mut()
            .flat_map(|bcu| {
                let id = bcu.id;
                bcu.take_evaluations()
                    .into_iter()
                    .map(move |eval| (id, eval))
            })
            .collect()
    }

    #[must_use]
    pub fn stats(&self) -> stats::Stats {
        let mut stats = stats::Stats::new(self.bcus.len());
        stats.sim = self.stats.clone();
        for bcu in &self.bcus {
            stats.bcu.insert(bcu.id, bcu.stats.clone());
        }
        for l1 in &self.l1_rcaches {
            stats.l1_rcache.insert(l1.id, l1.stats.clone());
        }
        stats.l2_rcache = self.l2_rcache.stats.clone();
        stats.rbt_mem = self.rbt_mem.stats.clone();
        stats.switch = self.switch.stats.clone();
        stats
    }

    /// Drop all in-flight work, cached entries and stats.
    pub fn reset(&mut self) {
        for bcu in &mut self.bcus {
            bcu.reset();
        }
        for l1 in &mut self.l1_rcaches {
            l1.reset();
        }
        self.switch.reset();
        self.l2_rcache.reset();
        self.rbt_mem.reset();
        for queue in &mut self.issue_queues {
            queue.clear();
        }
        for completed in &mut self.completed {
            completed.clear();
        }
        self.stats = stats::Sim::default();
        self.cycle = 0;
    }
}
