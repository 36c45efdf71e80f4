use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum::IntoEnumIterator;

#[derive(
    Debug,
    strum::EnumIter,
    strum::Display,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
)]
pub enum Violation {
    #[strum(serialize = "out of bounds")]
    OutOfBounds,
    #[strum(serialize = "write to read-only")]
    WriteToReadOnly,
}

/// Bounds checking front end counters.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bcu {
    /// Traces dequeued from the input port.
    pub traces: u64,
    /// Lookups sent to the range entry cache.
    pub lookups: u64,
    /// Responses received from the range entry cache.
    pub responses: u64,
    /// Traces emitted on the output port.
    pub emitted: u64,
    /// Traces whose address did not resolve to a buffer id.
    pub unresolved: u64,
    /// Cycles the input was blocked by a trace without memory accesses.
    pub empty_trace_stalls: u64,
    pub valid: u64,
    /// Evaluations against the invalid sentinel entry.
    pub untracked: u64,
    pub violations: HashMap<Violation, u64>,
}

impl Bcu {
    #[must_use]
    pub fn num_violations(&self) -> u64 {
        self.violations.values().sum()
    }

    pub fn inc_violation(&mut self, violation: Violation) {
        *self.violations.entry(violation).or_insert(0) += 1;
    }
}

impl Default for Bcu {
    fn default() -> Self {
        Self {
            traces: 0,
            lookups: 0,
            responses: 0,
            emitted: 0,
            unresolved: 0,
            empty_trace_stalls: 0,
            valid: 0,
            untracked: 0,
            violations: Violation::iter().map(|violation| (violation, 0)).collect(),
        }
    }
}

impl std::ops::AddAssign for Bcu {
    fn add_assign(&mut self, other: Self) {
        self.traces += other.traces;
        self.lookups += other.lookups;
        self.responses += other.responses;
        self.emitted += other.emitted;
        self.unresolved += other.unresolved;
        self.empty_trace_stalls += other.empty_trace_stalls;
        self.valid += other.valid;
        self.untracked += other.untracked;
        for (k, v) in other.violations {
            *self.violations.entry(k).or_insert(0) += v;
        }
    }
}

impl std::fmt::Debug for Bcu {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut violations: Vec<_> = self
            .violations
            .iter()
            .filter(|(_, &count)| count > 0)
            .collect();
        violations.sort_by_key(|(violation, _)| **violation);

        let mut out = f.debug_struct("BcuStats");
        out.field("traces", &self.traces)
            .field("lookups", &self.lookups)
            .field("responses", &self.responses)
            .field("emitted", &self.emitted)
            .field("unresolved", &self.unresolved)
            .field("empty_trace_stalls", &self.empty_trace_stalls)
            .field("valid", &self.valid)
            .field("untracked", &self.untracked);
        for (violation, count) in violations {
            out.field(&violation.to_string(), count);
        }
        out.finish_non_exhaustive()
    }
}
