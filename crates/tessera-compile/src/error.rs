//! Error types for compilation.

use tessera_ir::IrError;
use thiserror::Error;

/// Errors raised while transpiling a circuit.
///
/// Structural DAG errors propagate unchanged through [`CompileError::Ir`].
/// Pass precondition failures and other pass-local problems are reported as
/// [`CompileError::Transpiler`] and always name the pass.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CompileError {
    /// Structural error from the IR.
    #[error(transparent)]
    Ir(#[from] IrError),

    /// A pass could not run on its input.
    #[error("Pass '{pass}' failed: {cause}")]
    Transpiler {
        /// Name of the failing pass.
        pass: String,
        /// What went wrong.
        cause: String,
    },

    /// No synthesis method produced a decomposition.
    #[error(
        "No synthesis method available for '{operation}' (tried: {})",
        format_tried(.tried)
    )]
    SynthesisUnavailable {
        /// Operation class.
        operation: String,
        /// Methods asked, in order.
        tried: Vec<String>,
    },

    /// A synthesized circuit does not reproduce the requested operator.
    #[error("Synthesis of '{operation}' by '{method}' is off by {distance:.3e}")]
    SynthesisInaccurate {
        /// Operation class.
        operation: String,
        /// Method that produced the circuit.
        method: String,
        /// Distance from the requested operator, up to global phase.
        distance: f64,
    },

    /// The router could not make progress.
    #[error("Routing stalled: {0}")]
    RoutingStall(String),

    /// Circuit has more qubits than the target.
    #[error("Circuit has {required} qubits but target only has {available}")]
    CircuitTooLarge {
        /// Number of qubits required.
        required: usize,
        /// Number of qubits available.
        available: usize,
    },

    /// A pass needs a target and none was supplied.
    #[error("Pass '{0}' requires a target")]
    MissingTarget(String),

    /// A pass needs a layout and none has been chosen.
    #[error("Pass '{0}' requires a layout")]
    MissingLayout(String),

    /// Layout is not an injective map into the device.
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    /// Gate cannot be expressed in the target basis.
    #[error("Gate '{gate}' cannot be translated to the target basis")]
    GateNotInBasis {
        /// Gate name.
        gate: String,
    },

    /// Configuration value out of range or unreadable.
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The run was cancelled between groups.
    #[error("Transpilation cancelled")]
    Cancelled,
}

impl CompileError {
    /// Build a [`CompileError::Transpiler`] for `pass`.
    pub fn pass(pass: impl Into<String>, cause: impl Into<String>) -> Self {
        CompileError::Transpiler {
            pass: pass.into(),
            cause: cause.into(),
        }
    }
}

fn format_tried(tried: &[String]) -> String {
    if tried.is_empty() {
        "none registered".to_string()
    } else {
        tried.join(", ")
    }
}

/// Result type for compilation operations.
pub type CompileResult<T> = Result<T, CompileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unavailable_message_names_operation() {
        let err = CompileError::SynthesisUnavailable {
            operation: "unitary".into(),
            tried: vec![],
        };
        let msg = err.to_string();
        assert!(msg.contains("unitary"));
        assert!(msg.contains("none registered"));
    }

    #[test]
    fn test_ir_error_converts() {
        let err: CompileError = IrError::UnknownNode(7).into();
        assert!(matches!(err, CompileError::Ir(IrError::UnknownNode(7))));
    }
}
