//! Optimization passes.

mod barriers;
mod cancel;
mod diagonal;
mod optimize_1q;

#[cfg(test)]
mod tests;

pub use barriers::MergeAdjacentBarriers;
pub use cancel::CancelCX;
pub use diagonal::RemoveDiagonalGatesBeforeMeasure;
pub use optimize_1q::Optimize1qGates;

/// Bound on sweeps inside a single pass.
pub(super) const MAX_SWEEPS: usize = 100;
