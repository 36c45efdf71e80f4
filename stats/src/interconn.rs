use serde::{Deserialize, Serialize};

/// Switch counters.
#[derive(Clone, Default, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Switch {
    /// Requests granted per input.
    pub grants: Vec<u64>,
    /// Responses routed back per input.
    pub responses: Vec<u64>,
}

impl Switch {
    #[must_use]
    pub fn new(num_inputs: usize) -> Self {
        Self {
            grants: vec![0; num_inputs],
            responses: vec![0; num_inputs],
        }
    }
}
