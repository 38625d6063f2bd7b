//! Target-specific compilation passes.
//!
//! These passes read the target from the property set (coupling map,
//! supported operations, calibrations) and, after layout, the chosen
//! mapping. They produce circuits that can run on the device.

pub mod direction;
pub mod equivalence;
pub mod layout;
pub mod routing;
pub mod scheduling;
pub mod translation;

pub use direction::GateDirection;
pub use equivalence::EquivalenceLibrary;
pub use layout::{ApplyLayout, InteractionLayout, SabreLayout, SetLayout, TrivialLayout};
pub use routing::{CheckMap, IS_SWAP_MAPPED, SabreRouting};
pub use scheduling::{SCHEDULE, Schedule, ScheduleAnalysis};
pub use translation::{BasisTranslation, Unroll3qOrMore};
