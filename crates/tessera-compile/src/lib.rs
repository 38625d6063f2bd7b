//! Tessera compilation and transpilation framework.
//!
//! This crate turns a logical circuit into one that runs on a given device.
//! It follows a pass-based design: each step is a [`Pass`] over a
//! [`CircuitDag`](tessera_ir::CircuitDag), and a [`PassManager`] runs groups of
//! passes against a run-scoped [`PropertySet`].
//!
//! # Pipeline
//!
//! ```text
//! Logical circuit
//!       │
//!       ▼
//! ┌─────────────┐
//! │ PassManager │ ◄── PropertySet (target, layout, analyses)
//! └─────────────┘
//!       │
//!       ├── init:         HighLevelSynthesis / Unroll3qOrMore
//!       ├── layout:       TrivialLayout / InteractionLayout / SabreLayout
//!       ├── routing:      CheckMap → SabreRouting or ApplyLayout
//!       ├── translation:  BasisTranslation → GateDirection → BasisTranslation
//!       ├── optimization: Optimize1qGates / CancelCX / ...
//!       └── scheduling:   ScheduleAnalysis
//!       │
//!       ▼
//! Physical circuit (one wire per device qubit)
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use tessera_compile::{BasisGates, CouplingMap, Target, TranspileConfig, transpile};
//! use tessera_ir::Circuit;
//!
//! let target = Arc::new(Target::from_coupling(CouplingMap::linear(5), &BasisGates::ibm()));
//! let dag = Circuit::ghz(3)?.into_dag();
//!
//! let out = transpile(dag, target.clone(), &TranspileConfig::with_optimization_level(2))?;
//! assert_eq!(out.dag.num_qubits(), 5);
//! assert!(out.dag.topological_ops().all(|(_, inst)| target.supports(inst.name())));
//! # Ok::<(), tessera_compile::CompileError>(())
//! ```
//!
//! # Optimization Levels
//!
//! | Level | Passes Included |
//! |-------|-----------------|
//! | 0 | Synthesis, trivial layout, routing, translation |
//! | 1 | + configured layout, 1q merging and CX cancellation |
//! | 2-3 | + diagonal-before-measure removal, barrier merging |
//!
//! # Extension points
//!
//! - Implement [`Pass`] for custom passes and add them to a [`PassGroup`].
//! - Implement [`SynthesisMethod`] and register it in a [`PluginRegistry`]
//!   (or any [`SynthesisRegistry`]).
//! - Implement [`StageRegistry`] to replace whole stages.

pub mod config;
pub mod error;
pub mod manager;
pub mod matrix;
pub mod pass;
pub mod preset;
pub mod property;
pub mod registry;
pub mod target;
pub mod transpile;
pub mod unitary;

// Built-in passes
pub mod passes;

pub use config::{
    Heuristic, LayoutMethod, LayoutObjective, LayoutSearchConfig, RoutingMethod, SabreConfig, SchedulingMethod,
    SynthesisConfig, TranspileConfig,
};
pub use error::{CompileError, CompileResult};
pub use manager::{
    CancellationToken, PassGroup, PassManager, PassManagerBuilder, PassRecord, PassStatus, RunReport, Step,
};
pub use pass::{Pass, PassKind, PassOutcome};
pub use preset::{PresetStages, Stage, StageRegistry};
pub use property::{Invalidation, Layout, PropertySet};
pub use registry::{PluginRegistry, SynthesisContext, SynthesisMethod, SynthesisRegistry};
pub use target::{BasisGates, CouplingMap, InstructionProperties, Target, TargetBuilder};
pub use transpile::{TranspileOutput, transpile, transpile_batch, transpile_with};
