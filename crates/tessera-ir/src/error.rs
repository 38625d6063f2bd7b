//! Error types for the IR crate.

use crate::qubit::{ClbitId, QubitId};
use thiserror::Error;

/// Errors raised by structural DAG operations.
///
/// These are always fatal to a transpilation run: they mean the caller (or a
/// pass) handed the DAG an inconsistent request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IrError {
    /// The operation's declared arity does not match the supplied wires.
    #[error("Operation '{operation}' expects {expected} {wire_kind} wire(s), got {got}")]
    WireArity {
        /// Name of the operation.
        operation: String,
        /// Either `"qubit"` or `"clbit"`.
        wire_kind: &'static str,
        /// Declared arity.
        expected: usize,
        /// Number of wires supplied.
        got: usize,
    },

    /// The node does not exist or is not an operation node.
    #[error("Unknown operation node {0}")]
    UnknownNode(usize),

    /// A replacement sub-DAG does not match the wires of the node it replaces.
    #[error(
        "Cannot substitute node {node}: it has {node_qubits} qubit / {node_clbits} clbit wires, \
         replacement has {sub_qubits} / {sub_clbits}"
    )]
    WireMismatch {
        /// The node being replaced.
        node: usize,
        /// Qubit wires on the node.
        node_qubits: usize,
        /// Clbit wires on the node.
        node_clbits: usize,
        /// Qubit wires on the replacement.
        sub_qubits: usize,
        /// Clbit wires on the replacement.
        sub_clbits: usize,
    },

    /// Qubit not found in circuit.
    #[error("Qubit {qubit} not found in circuit{}", format_context(.operation))]
    QubitNotFound {
        /// The qubit that was not found.
        qubit: QubitId,
        /// Operation being applied, if any.
        operation: Option<String>,
    },

    /// Classical bit not found in circuit.
    #[error("Classical bit {clbit} not found in circuit{}", format_context(.operation))]
    ClbitNotFound {
        /// The classical bit that was not found.
        clbit: ClbitId,
        /// Operation being applied, if any.
        operation: Option<String>,
    },

    /// The same qubit appears twice in one operation.
    #[error("Duplicate qubit {qubit} in operation '{operation}'")]
    DuplicateQubit {
        /// The repeated qubit.
        qubit: QubitId,
        /// Operation name.
        operation: String,
    },

    /// The same classical bit appears twice in one operation.
    #[error("Duplicate classical bit {clbit} in operation '{operation}'")]
    DuplicateClbit {
        /// The repeated bit.
        clbit: ClbitId,
        /// Operation name.
        operation: String,
    },

    /// Invalid DAG structure.
    #[error("Invalid DAG structure: {0}")]
    InvalidDag(String),

    /// Invalid operation payload (e.g. a non-unitary matrix).
    #[error("Invalid operation '{operation}': {reason}")]
    InvalidOperation {
        /// Operation name.
        operation: String,
        /// What is wrong with it.
        reason: String,
    },

    /// Parameter is unbound.
    #[error("Parameter '{0}' is unbound")]
    UnboundParameter(String),
}

#[allow(clippy::ref_option)]
fn format_context(operation: &Option<String>) -> String {
    match operation {
        Some(name) => format!(" (operation: {name})"),
        None => String::new(),
    }
}

/// Result type for IR operations.
pub type IrResult<T> = Result<T, IrError>;
