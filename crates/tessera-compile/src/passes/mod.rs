//! Built-in compilation passes.
//!
//! Passes are organized into two categories:
//! - [`agnostic`]: passes that operate on DAG structure alone
//! - [`target`]: passes that need the target, the layout or both

pub mod agnostic;
pub mod target;

pub use agnostic::{
    CancelCX, HighLevelSynthesis, MergeAdjacentBarriers, Optimize1qGates,
    RemoveDiagonalGatesBeforeMeasure, SynthesisDispatcher,
};
pub use target::{
    ApplyLayout, BasisTranslation, CheckMap, GateDirection, InteractionLayout, SabreLayout, SabreRouting,
    ScheduleAnalysis, SetLayout, TrivialLayout, Unroll3qOrMore,
};
