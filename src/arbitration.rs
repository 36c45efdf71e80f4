use serde::{Deserialize, Serialize};

/// Arbitration policy of a switch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Policy {
    /// Lowest ready input always wins.
    Priority,
    /// Search starts after the previous winner.
    #[default]
    RoundRobin,
}

/// Picks one winner among a fixed number of inputs per cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arbiter {
    policy: Policy,
    num_inputs: usize,
    /// Input the next search starts at.
    cursor: usize,
}

impl Arbiter {
    #[must_use]
    pub fn new(policy: Policy, num_inputs: usize) -> Self {
        assert!(num_inputs > 0, "arbiter: no inputs");
        Self {
            policy,
            num_inputs,
            cursor: 0,
        }
    }

    #[must_use]
    pub fn policy(&self) -> Policy {
        self.policy
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Inputs in the order they are considered this cycle.
    pub fn order(&self) -> impl Iterator<Item = usize> {
        let (cursor, n) = (self.cursor, self.num_inputs);
        (0..n).map(move |i| (cursor + i) % n)
    }

    /// Grant the first input for which `ready` holds.
    pub fn select(&mut self, mut ready: impl FnMut(usize) -> bool) -> Option<usize> {
        let winner = self.order().find(|&input| ready(input))?;
        if self.policy == Policy::RoundRobin {
            self.cursor = (winner + 1) % self.num_inputs;
        }
        Some(winner)
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }
}
