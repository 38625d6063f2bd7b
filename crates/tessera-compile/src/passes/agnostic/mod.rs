//! Target-agnostic compilation passes.
//!
//! These passes work on the DAG structure without consulting the coupling
//! map. Some of them read the target when one is set, to pick an output
//! basis, but run without one.

pub mod optimization;
pub mod synthesis;

pub use optimization::{CancelCX, MergeAdjacentBarriers, Optimize1qGates, RemoveDiagonalGatesBeforeMeasure};
pub use synthesis::{HighLevelSynthesis, SynthesisDispatcher};
