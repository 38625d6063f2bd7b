//! Routing passes for inserting SWAP gates.

mod check_map;
mod sabre;

pub use check_map::{CheckMap, IS_SWAP_MAPPED};
pub use sabre::SabreRouting;

pub(crate) use sabre::{RoutedCircuit, SabreRouter, trial_seeds};
