//! Gate definitions.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

use crate::parameter::ParameterExpression;

/// Gates with fixed, well-known semantics.
///
/// Matrix conventions follow the usual ones: `Rz(θ) = diag(e^{-iθ/2}, e^{iθ/2})`,
/// `P(λ) = diag(1, e^{iλ})`, `U(θ, φ, λ)` the generic Euler gate,
/// `Rxx(θ) = exp(-iθ/2 X⊗X)` and likewise for `Ryy` and `Rzz`.
/// For controlled gates the first qubit is the control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StandardGate {
    /// Identity.
    I,
    /// Pauli-X.
    X,
    /// Pauli-Y.
    Y,
    /// Pauli-Z.
    Z,
    /// Hadamard.
    H,
    /// sqrt(Z).
    S,
    /// S-dagger.
    Sdg,
    /// Fourth root of Z.
    T,
    /// T-dagger.
    Tdg,
    /// sqrt(X).
    SX,
    /// sqrt(X)-dagger.
    SXdg,
    /// Rotation about X.
    Rx(ParameterExpression),
    /// Rotation about Y.
    Ry(ParameterExpression),
    /// Rotation about Z.
    Rz(ParameterExpression),
    /// Phase gate.
    P(ParameterExpression),
    /// Generic single-qubit gate U(θ, φ, λ).
    U(
        ParameterExpression,
        ParameterExpression,
        ParameterExpression,
    ),
    /// Phased X rotation: PRX(θ, φ) = Rz(φ)·Rx(θ)·Rz(-φ).
    PRX(ParameterExpression, ParameterExpression),
    /// Controlled-X.
    CX,
    /// Controlled-Y.
    CY,
    /// Controlled-Z.
    CZ,
    /// Controlled-Hadamard.
    CH,
    /// SWAP.
    Swap,
    /// iSWAP.
    ISwap,
    /// Controlled Rx.
    CRx(ParameterExpression),
    /// Controlled Ry.
    CRy(ParameterExpression),
    /// Controlled Rz.
    CRz(ParameterExpression),
    /// Controlled phase.
    CP(ParameterExpression),
    /// XX interaction.
    RXX(ParameterExpression),
    /// YY interaction.
    RYY(ParameterExpression),
    /// ZZ interaction.
    RZZ(ParameterExpression),
    /// Toffoli.
    CCX,
    /// Fredkin.
    CSwap,
}

impl StandardGate {
    /// Canonical lower-case name, as used in target basis sets.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            StandardGate::I => "id",
            StandardGate::X => "x",
            StandardGate::Y => "y",
            StandardGate::Z => "z",
            StandardGate::H => "h",
            StandardGate::S => "s",
            StandardGate::Sdg => "sdg",
            StandardGate::T => "t",
            StandardGate::Tdg => "tdg",
            StandardGate::SX => "sx",
            StandardGate::SXdg => "sxdg",
            StandardGate::Rx(_) => "rx",
            StandardGate::Ry(_) => "ry",
            StandardGate::Rz(_) => "rz",
            StandardGate::P(_) => "p",
            StandardGate::U(..) => "u",
            StandardGate::PRX(..) => "prx",
            StandardGate::CX => "cx",
            StandardGate::CY => "cy",
            StandardGate::CZ => "cz",
            StandardGate::CH => "ch",
            StandardGate::Swap => "swap",
            StandardGate::ISwap => "iswap",
            StandardGate::CRx(_) => "crx",
            StandardGate::CRy(_) => "cry",
            StandardGate::CRz(_) => "crz",
            StandardGate::CP(_) => "cp",
            StandardGate::RXX(_) => "rxx",
            StandardGate::RYY(_) => "ryy",
            StandardGate::RZZ(_) => "rzz",
            StandardGate::CCX => "ccx",
            StandardGate::CSwap => "cswap",
        }
    }

    /// Number of qubits the gate acts on.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        match self {
            StandardGate::CX
            | StandardGate::CY
            | StandardGate::CZ
            | StandardGate::CH
            | StandardGate::Swap
            | StandardGate::ISwap
            | StandardGate::CRx(_)
            | StandardGate::CRy(_)
            | StandardGate::CRz(_)
            | StandardGate::CP(_)
            | StandardGate::RXX(_)
            | StandardGate::RYY(_)
            | StandardGate::RZZ(_) => 2,
            StandardGate::CCX | StandardGate::CSwap => 3,
            _ => 1,
        }
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> Vec<&ParameterExpression> {
        match self {
            StandardGate::Rx(p)
            | StandardGate::Ry(p)
            | StandardGate::Rz(p)
            | StandardGate::P(p)
            | StandardGate::CRx(p)
            | StandardGate::CRy(p)
            | StandardGate::CRz(p)
            | StandardGate::CP(p)
            | StandardGate::RXX(p)
            | StandardGate::RYY(p)
            | StandardGate::RZZ(p) => vec![p],
            StandardGate::U(a, b, c) => vec![a, b, c],
            StandardGate::PRX(theta, phi) => vec![theta, phi],
            _ => vec![],
        }
    }

    /// Whether any parameter is still symbolic.
    pub fn is_parameterized(&self) -> bool {
        self.parameters().iter().any(|p| p.is_symbolic())
    }

    /// Gates equal to their own inverse.
    pub fn is_self_inverse(&self) -> bool {
        matches!(
            self,
            StandardGate::I
                | StandardGate::X
                | StandardGate::Y
                | StandardGate::Z
                | StandardGate::H
                | StandardGate::CX
                | StandardGate::CY
                | StandardGate::CZ
                | StandardGate::CH
                | StandardGate::Swap
                | StandardGate::CCX
                | StandardGate::CSwap
        )
    }

    /// Gates whose matrix is diagonal in the computational basis.
    pub fn is_diagonal(&self) -> bool {
        matches!(
            self,
            StandardGate::I
                | StandardGate::Z
                | StandardGate::S
                | StandardGate::Sdg
                | StandardGate::T
                | StandardGate::Tdg
                | StandardGate::Rz(_)
                | StandardGate::P(_)
                | StandardGate::CZ
                | StandardGate::CRz(_)
                | StandardGate::CP(_)
                | StandardGate::RZZ(_)
        )
    }

    /// The inverse gate, when it is itself a standard gate.
    pub fn inverse(&self) -> Option<StandardGate> {
        use StandardGate as G;
        let neg = |p: &ParameterExpression| -p.clone();
        let inv = match self {
            g if g.is_self_inverse() => g.clone(),
            G::S => G::Sdg,
            G::Sdg => G::S,
            G::T => G::Tdg,
            G::Tdg => G::T,
            G::SX => G::SXdg,
            G::SXdg => G::SX,
            G::Rx(p) => G::Rx(neg(p)),
            G::Ry(p) => G::Ry(neg(p)),
            G::Rz(p) => G::Rz(neg(p)),
            G::P(p) => G::P(neg(p)),
            G::U(theta, phi, lambda) => G::U(neg(theta), neg(lambda), neg(phi)),
            G::PRX(theta, phi) => G::PRX(neg(theta), phi.clone()),
            G::CRx(p) => G::CRx(neg(p)),
            G::CRy(p) => G::CRy(neg(p)),
            G::CRz(p) => G::CRz(neg(p)),
            G::CP(p) => G::CP(neg(p)),
            G::RXX(p) => G::RXX(neg(p)),
            G::RYY(p) => G::RYY(neg(p)),
            G::RZZ(p) => G::RZZ(neg(p)),
            _ => return None,
        };
        Some(inv)
    }
}

/// A user-defined gate, optionally carrying its unitary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomGate {
    /// Gate name.
    pub name: String,
    /// Number of qubits.
    pub num_qubits: usize,
    /// Gate parameters.
    pub params: Vec<ParameterExpression>,
    /// Row-major unitary of dimension `2^num_qubits`, first qubit most significant.
    pub matrix: Option<Vec<Complex64>>,
}

impl CustomGate {
    /// Create a custom gate with no parameters and no matrix.
    pub fn new(name: impl Into<String>, num_qubits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            params: vec![],
            matrix: None,
        }
    }

    /// Attach parameters.
    #[must_use]
    pub fn with_params(mut self, params: Vec<ParameterExpression>) -> Self {
        self.params = params;
        self
    }

    /// Attach a unitary matrix.
    #[must_use]
    pub fn with_matrix(mut self, matrix: Vec<Complex64>) -> Self {
        self.matrix = Some(matrix);
        self
    }
}

/// Either a standard or a custom gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GateKind {
    /// A gate with known semantics.
    Standard(StandardGate),
    /// A user-defined gate.
    Custom(CustomGate),
}

/// A gate plus an optional display label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gate {
    /// What the gate is.
    pub kind: GateKind,
    /// Optional label carried through transformations.
    pub label: Option<String>,
}

impl Gate {
    /// Wrap a standard gate.
    pub fn standard(gate: StandardGate) -> Self {
        Self {
            kind: GateKind::Standard(gate),
            label: None,
        }
    }

    /// Wrap a custom gate.
    pub fn custom(gate: CustomGate) -> Self {
        Self {
            kind: GateKind::Custom(gate),
            label: None,
        }
    }

    /// Attach a label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Gate name.
    pub fn name(&self) -> &str {
        match &self.kind {
            GateKind::Standard(g) => g.name(),
            GateKind::Custom(g) => &g.name,
        }
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        match &self.kind {
            GateKind::Standard(g) => g.num_qubits(),
            GateKind::Custom(g) => g.num_qubits,
        }
    }

    /// The standard gate, if this is one.
    pub fn as_standard(&self) -> Option<&StandardGate> {
        match &self.kind {
            GateKind::Standard(g) => Some(g),
            GateKind::Custom(_) => None,
        }
    }
}

impl From<StandardGate> for Gate {
    fn from(gate: StandardGate) -> Self {
        Gate::standard(gate)
    }
}

impl From<CustomGate> for Gate {
    fn from(gate: CustomGate) -> Self {
        Gate::custom(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_gate_properties() {
        assert_eq!(StandardGate::H.name(), "h");
        assert_eq!(StandardGate::CX.num_qubits(), 2);
        assert_eq!(StandardGate::CCX.num_qubits(), 3);
        assert!(StandardGate::Rz(ParameterExpression::symbol("t")).is_parameterized());
        assert!(!StandardGate::Rz(0.5.into()).is_parameterized());
    }

    #[test]
    fn test_inverse() {
        assert_eq!(StandardGate::S.inverse(), Some(StandardGate::Sdg));
        assert_eq!(StandardGate::CX.inverse(), Some(StandardGate::CX));
        assert_eq!(StandardGate::ISwap.inverse(), None);
        let inv = StandardGate::Rz(0.3.into()).inverse().unwrap();
        assert_eq!(inv.parameters()[0].as_f64(), Some(-0.3));
    }

    #[test]
    fn test_diagonal_classification() {
        assert!(StandardGate::CZ.is_diagonal());
        assert!(StandardGate::T.is_diagonal());
        assert!(!StandardGate::H.is_diagonal());
    }

    #[test]
    fn test_custom_gate() {
        let gate = Gate::custom(CustomGate::new("oracle", 3)).with_label("f");
        assert_eq!(gate.name(), "oracle");
        assert_eq!(gate.num_qubits(), 3);
        assert!(gate.as_standard().is_none());
    }
}
