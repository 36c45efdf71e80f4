use serde::{Deserialize, Serialize};

#[derive(Clone, Default, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sim {
    pub cycles: u64,
    pub traces_in: u64,
    pub traces_out: u64,
}

impl std::ops::AddAssign for Sim {
    fn add_assign(&mut self, other: Self) {
        self.cycles = self.cycles.max(other.cycles);
        self.traces_in += other.traces_in;
        self.traces_out += other.traces_out;
    }
}
