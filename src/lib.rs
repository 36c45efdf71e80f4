#![allow(
    clippy::upper_case_acronyms,
    non_camel_case_types,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod allocation;
pub mod arbitration;
pub mod bcu;
pub mod cache;
pub mod config;
pub mod interconn;
pub mod lookup;
pub mod mshr;
pub mod port;
pub mod range_table;
pub mod sim;
pub mod slot_table;
pub mod trace;

#[cfg(test)]
pub mod testing;

pub use bcu::BoundsCheckUnit;
pub use sim::Simulator;

pub type address = u64;
