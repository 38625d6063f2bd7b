//! High-level operations that need synthesis before they can run.
//!
//! A [`HighLevelOp`] describes *what* should happen on its qubits, not how.
//! The compiler's synthesis dispatcher looks up a decomposition method by
//! the operation's [`class_name`](HighLevelOp::class_name).

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::gate::StandardGate;
use crate::parameter::ParameterExpression;

/// An abstract operation resolved by synthesis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HighLevelOp {
    /// Arbitrary unitary. Row-major, dimension `2^num_qubits`, first qubit most significant.
    Unitary {
        /// Number of qubits.
        num_qubits: usize,
        /// Matrix entries.
        matrix: Vec<Complex64>,
    },
    /// X on the last qubit, controlled on all `num_ctrl` preceding qubits being one.
    MultiControlledX {
        /// Number of control qubits.
        num_ctrl: usize,
    },
    /// A single-qubit standard gate controlled on `num_ctrl` preceding qubits.
    MultiControlled {
        /// The controlled gate.
        base: StandardGate,
        /// Number of control qubits.
        num_ctrl: usize,
    },
    /// Reversible linear map `|x⟩ → |A·x mod 2⟩` where `x[i]` is the value of qubit `i`.
    LinearFunction {
        /// Square matrix `A`, row-major.
        matrix: Vec<Vec<bool>>,
    },
    /// `exp(-i·t·P)` for a Pauli string `P`; character `k` acts on qubit `k`.
    PauliEvolution {
        /// Pauli letters from `{I, X, Y, Z}`.
        pauli: String,
        /// Evolution time.
        time: ParameterExpression,
    },
    /// Qubit permutation: after the operation, position `k` holds the state of qubit `pattern[k]`.
    Permutation {
        /// Permutation of `0..n`.
        pattern: Vec<usize>,
    },
}

impl HighLevelOp {
    /// Create a unitary operation, checking the matrix dimension.
    pub fn unitary(num_qubits: usize, matrix: Vec<Complex64>) -> IrResult<Self> {
        let op = HighLevelOp::Unitary { num_qubits, matrix };
        op.validate()?;
        Ok(op)
    }

    /// Synthesis class used as the dispatch key.
    pub fn class_name(&self) -> &'static str {
        match self {
            HighLevelOp::Unitary { .. } => "unitary",
            HighLevelOp::MultiControlledX { .. } => "mcx",
            HighLevelOp::MultiControlled { .. } => "mcu",
            HighLevelOp::LinearFunction { .. } => "linear_function",
            HighLevelOp::PauliEvolution { .. } => "pauli_evolution",
            HighLevelOp::Permutation { .. } => "permutation",
        }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        match self {
            HighLevelOp::Unitary { num_qubits, .. } => *num_qubits,
            HighLevelOp::MultiControlledX { num_ctrl }
            | HighLevelOp::MultiControlled { num_ctrl, .. } => num_ctrl + 1,
            HighLevelOp::LinearFunction { matrix } => matrix.len(),
            HighLevelOp::PauliEvolution { pauli, .. } => pauli.chars().count(),
            HighLevelOp::Permutation { pattern } => pattern.len(),
        }
    }

    /// Check the payload is well-formed.
    pub fn validate(&self) -> IrResult<()> {
        let invalid = |reason: String| IrError::InvalidOperation {
            operation: self.class_name().to_string(),
            reason,
        };
        match self {
            HighLevelOp::Unitary { num_qubits, matrix } => {
                let dim = 1usize << num_qubits;
                if *num_qubits == 0 || matrix.len() != dim * dim {
                    return Err(invalid(format!(
                        "{num_qubits}-qubit unitary needs {} entries, got {}",
                        dim * dim,
                        matrix.len()
                    )));
                }
            }
            HighLevelOp::MultiControlled { base, .. } => {
                if base.num_qubits() != 1 {
                    return Err(invalid(format!("base gate '{}' is not single-qubit", base.name())));
                }
            }
            HighLevelOp::LinearFunction { matrix } => {
                let n = matrix.len();
                if n == 0 || matrix.iter().any(|row| row.len() != n) {
                    return Err(invalid("matrix must be square and non-empty".into()));
                }
            }
            HighLevelOp::PauliEvolution { pauli, .. } => {
                if pauli.is_empty() || pauli.chars().any(|c| !matches!(c, 'I' | 'X' | 'Y' | 'Z')) {
                    return Err(invalid(format!("'{pauli}' is not a Pauli string")));
                }
            }
            HighLevelOp::Permutation { pattern } => {
                let mut seen = vec![false; pattern.len()];
                for &p in pattern {
                    if p >= pattern.len() || std::mem::replace(&mut seen[p], true) {
                        return Err(invalid(format!("{pattern:?} is not a permutation")));
                    }
                }
            }
            HighLevelOp::MultiControlledX { .. } => {}
        }
        Ok(())
    }
}
