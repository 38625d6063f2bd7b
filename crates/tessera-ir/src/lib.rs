//! Tessera circuit intermediate representation.
//!
//! This crate holds the data structures every compiler pass works on.
//!
//! # Core Components
//!
//! - [`CircuitDag`]: the circuit as a directed acyclic graph. Every wire has an
//!   `In` and an `Out` node, and each operation node sits on one edge per wire it
//!   touches. Node indices stay valid across removals and substitutions.
//! - [`Instruction`] / [`InstructionKind`]: gates, measurement, reset, barrier,
//!   delay, high-level operations and named compound blocks, optionally under a
//!   classical [`Condition`].
//! - [`StandardGate`] / [`CustomGate`]: gate definitions.
//! - [`HighLevelOp`]: operations that synthesis still has to decompose
//!   (unitaries, multi-controlled gates, linear functions, Pauli evolutions,
//!   permutations).
//! - [`ParameterExpression`]: symbolic angles.
//! - [`Circuit`]: a builder on top of the DAG.
//!
//! # Example
//!
//! ```rust
//! use tessera_ir::{Circuit, QubitId, WireId};
//!
//! let mut circuit = Circuit::with_size("bell_state", 2, 0);
//! circuit.h(QubitId(0))?.cx(QubitId(0), QubitId(1))?;
//! circuit.measure_all()?;
//!
//! let dag = circuit.into_dag();
//! assert_eq!(dag.depth(), 3);
//! assert_eq!(dag.wire_sequence(WireId::Qubit(QubitId(1))).len(), 2);
//! # Ok::<(), tessera_ir::IrError>(())
//! ```

pub mod circuit;
pub mod dag;
pub mod error;
pub mod gate;
pub mod instruction;
pub mod operation;
pub mod parameter;
pub mod qubit;

pub use circuit::Circuit;
pub use dag::{CircuitDag, CircuitLevel, DagEdge, DagNode, NodeIndex, TopologicalOpNodes};
pub use error::{IrError, IrResult};
pub use gate::{CustomGate, Gate, GateKind, StandardGate};
pub use instruction::{Condition, Instruction, InstructionKind};
pub use operation::HighLevelOp;
pub use parameter::ParameterExpression;
pub use qubit::{ClbitId, QubitId, WireId};
