//! Single-qubit unitary utilities.
//!
//! [`Unitary2x2`] is a small fixed-size matrix type used wherever single-qubit
//! gates are merged or re-synthesised. [`OneQubitBasis`] turns a unitary back
//! into gates of a given Euler basis, tracking the global phase exactly.

use std::f64::consts::PI;

use num_complex::Complex64;
use tessera_ir::{ParameterExpression, StandardGate};

/// Tolerance for floating point comparisons.
pub(crate) const EPSILON: f64 = 1e-10;

/// A 2x2 unitary matrix in row-major order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Unitary2x2 {
    /// The matrix elements in row-major order: [[a, b], [c, d]].
    pub data: [Complex64; 4],
}

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

impl Unitary2x2 {
    /// Create a new 2x2 matrix.
    pub fn new(a: Complex64, b: Complex64, c: Complex64, d: Complex64) -> Self {
        Self { data: [a, b, c, d] }
    }

    /// The identity.
    pub fn identity() -> Self {
        Self::new(ONE, ZERO, ZERO, ONE)
    }

    /// Hadamard.
    pub fn h() -> Self {
        let s = Complex64::new(std::f64::consts::FRAC_1_SQRT_2, 0.0);
        Self::new(s, s, s, -s)
    }

    /// Pauli-X.
    pub fn x() -> Self {
        Self::new(ZERO, ONE, ONE, ZERO)
    }

    /// Pauli-Y.
    pub fn y() -> Self {
        Self::new(ZERO, -Complex64::i(), Complex64::i(), ZERO)
    }

    /// Pauli-Z.
    pub fn z() -> Self {
        Self::new(ONE, ZERO, ZERO, -ONE)
    }

    /// sqrt(X).
    pub fn sx() -> Self {
        let p = Complex64::new(0.5, 0.5);
        let m = Complex64::new(0.5, -0.5);
        Self::new(p, m, m, p)
    }

    /// X rotation.
    pub fn rx(theta: f64) -> Self {
        let c = Complex64::new((theta / 2.0).cos(), 0.0);
        let s = Complex64::new(0.0, -(theta / 2.0).sin());
        Self::new(c, s, s, c)
    }

    /// Y rotation.
    pub fn ry(theta: f64) -> Self {
        let c = Complex64::new((theta / 2.0).cos(), 0.0);
        let s = Complex64::new((theta / 2.0).sin(), 0.0);
        Self::new(c, -s, s, c)
    }

    /// Z rotation.
    pub fn rz(theta: f64) -> Self {
        Self::new(
            Complex64::from_polar(1.0, -theta / 2.0),
            ZERO,
            ZERO,
            Complex64::from_polar(1.0, theta / 2.0),
        )
    }

    /// Phase gate P(λ).
    pub fn p(lambda: f64) -> Self {
        Self::new(ONE, ZERO, ZERO, Complex64::from_polar(1.0, lambda))
    }

    /// U(θ, φ, λ).
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Self {
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        Self::new(
            Complex64::new(c, 0.0),
            -Complex64::from_polar(s, lambda),
            Complex64::from_polar(s, phi),
            Complex64::from_polar(c, phi + lambda),
        )
    }

    /// PRX(θ, φ) = Rz(φ)·Rx(θ)·Rz(-φ).
    pub fn prx(theta: f64, phi: f64) -> Self {
        Self::rz(phi) * Self::rx(theta) * Self::rz(-phi)
    }

    /// Matrix of a single-qubit standard gate with bound parameters.
    pub fn from_standard(gate: &StandardGate) -> Option<Self> {
        use StandardGate as G;
        let u = match gate {
            G::I => Self::identity(),
            G::X => Self::x(),
            G::Y => Self::y(),
            G::Z => Self::z(),
            G::H => Self::h(),
            G::S => Self::p(PI / 2.0),
            G::Sdg => Self::p(-PI / 2.0),
            G::T => Self::p(PI / 4.0),
            G::Tdg => Self::p(-PI / 4.0),
            G::SX => Self::sx(),
            G::SXdg => Self::sx().dagger(),
            G::Rx(p) => Self::rx(p.as_f64()?),
            G::Ry(p) => Self::ry(p.as_f64()?),
            G::Rz(p) => Self::rz(p.as_f64()?),
            G::P(p) => Self::p(p.as_f64()?),
            G::U(theta, phi, lambda) => Self::u(theta.as_f64()?, phi.as_f64()?, lambda.as_f64()?),
            G::PRX(theta, phi) => Self::prx(theta.as_f64()?, phi.as_f64()?),
            _ => return None,
        };
        Some(u)
    }

    /// Multiply: `self * other`.
    #[allow(clippy::many_single_char_names)]
    pub fn mul(&self, other: &Self) -> Self {
        let [a, b, c, d] = self.data;
        let [e, f, g, h] = other.data;
        Self::new(a * e + b * g, a * f + b * h, c * e + d * g, c * f + d * h)
    }

    /// Conjugate transpose.
    pub fn dagger(&self) -> Self {
        Self::new(
            self.data[0].conj(),
            self.data[2].conj(),
            self.data[1].conj(),
            self.data[3].conj(),
        )
    }

    /// Multiply every entry by `e^{iφ}`.
    pub fn scaled(&self, phase: f64) -> Self {
        let f = Complex64::from_polar(1.0, phase);
        Self::new(self.data[0] * f, self.data[1] * f, self.data[2] * f, self.data[3] * f)
    }

    /// Whether this is the identity up to global phase.
    pub fn is_identity(&self) -> bool {
        let [a, b, c, d] = self.data;
        b.norm() < EPSILON && c.norm() < EPSILON && (a - d).norm() < EPSILON
    }

    /// The phase `φ` with `self ≈ e^{iφ}·other`, taken from the largest entry.
    pub fn phase_relative_to(&self, other: &Self) -> f64 {
        let k = (0..4)
            .max_by(|&i, &j| other.data[i].norm().total_cmp(&other.data[j].norm()))
            .unwrap_or(0);
        (self.data[k] / other.data[k]).arg()
    }

    /// Frobenius distance to `other` after the best global phase.
    pub fn distance_up_to_phase(&self, other: &Self) -> f64 {
        let overlap: Complex64 = (0..4).map(|i| other.data[i].conj() * self.data[i]).sum();
        let aligned = other.scaled(overlap.arg());
        (0..4)
            .map(|i| (self.data[i] - aligned.data[i]).norm_sqr())
            .sum::<f64>()
            .sqrt()
    }

    /// ZYZ Euler angles: `self = e^{iφ}·Rz(α)·Ry(β)·Rz(γ)`.
    ///
    /// Returns `(α, β, γ, φ)`.
    pub fn zyz_decomposition(&self) -> (f64, f64, f64, f64) {
        let [a, b, c, d] = self.data;
        let det_phase = (a * d - b * c).arg() / 2.0;
        let v = self.scaled(-det_phase);
        let [v00, _, v10, v11] = v.data;

        // In SU(2), v11 = conj(v00) and v10 = -conj(v01).
        let beta = 2.0 * v10.norm().atan2(v00.norm());
        let half_sum = if v11.norm() < EPSILON { 0.0 } else { v11.arg() };
        let half_diff = if v10.norm() < EPSILON { 0.0 } else { v10.arg() };
        let (alpha, gamma) = (half_sum + half_diff, half_sum - half_diff);
        let rebuilt = Self::rz(alpha) * Self::ry(beta) * Self::rz(gamma);
        (alpha, beta, gamma, self.phase_relative_to(&rebuilt))
    }

    /// Normalize an angle to (-π, π].
    pub fn normalize_angle(angle: f64) -> f64 {
        if !angle.is_finite() {
            return 0.0;
        }
        let mut a = angle.rem_euclid(2.0 * PI);
        if a > PI {
            a -= 2.0 * PI;
        }
        a
    }
}

impl Default for Unitary2x2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Unitary2x2 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Unitary2x2::mul(&self, &rhs)
    }
}

/// Euler basis for single-qubit re-synthesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OneQubitBasis {
    /// `rz`, `ry`, `rz`.
    #[default]
    ZYZ,
    /// A single `u`.
    U,
    /// `rz`, `sx`, `rz`, `sx`, `rz`.
    ZSX,
    /// Up to three `prx`.
    PRX,
}

impl OneQubitBasis {
    /// Pick a basis the given gate names can express, preferring the shortest.
    pub fn for_gates<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let names: Vec<&str> = names.into_iter().collect();
        let has = |name: &str| names.contains(&name);
        if has("u") {
            Some(OneQubitBasis::U)
        } else if has("rz") && has("ry") {
            Some(OneQubitBasis::ZYZ)
        } else if has("rz") && has("sx") {
            Some(OneQubitBasis::ZSX)
        } else if has("prx") {
            Some(OneQubitBasis::PRX)
        } else {
            None
        }
    }

    /// Gate names this basis emits.
    pub fn gate_names(self) -> &'static [&'static str] {
        match self {
            OneQubitBasis::ZYZ => &["rz", "ry"],
            OneQubitBasis::U => &["u"],
            OneQubitBasis::ZSX => &["rz", "sx"],
            OneQubitBasis::PRX => &["prx"],
        }
    }

    /// Gates in circuit order and the global phase `φ` such that
    /// `e^{iφ}·(product of gates) = u`.
    pub fn synthesize(self, u: &Unitary2x2) -> (Vec<StandardGate>, f64) {
        let (alpha, beta, gamma, _) = u.zyz_decomposition();
        let c = ParameterExpression::constant;
        let nonzero = |angle: f64| Unitary2x2::normalize_angle(angle).abs() > EPSILON;
        let mut gates = Vec::new();
        match self {
            OneQubitBasis::ZYZ => {
                if nonzero(beta) {
                    if nonzero(gamma) {
                        gates.push(StandardGate::Rz(c(Unitary2x2::normalize_angle(gamma))));
                    }
                    gates.push(StandardGate::Ry(c(beta)));
                    if nonzero(alpha) {
                        gates.push(StandardGate::Rz(c(Unitary2x2::normalize_angle(alpha))));
                    }
                } else if nonzero(alpha + gamma) {
                    gates.push(StandardGate::Rz(c(Unitary2x2::normalize_angle(alpha + gamma))));
                }
            }
            OneQubitBasis::U => {
                if !u.is_identity() {
                    gates.push(StandardGate::U(
                        c(beta),
                        c(Unitary2x2::normalize_angle(alpha)),
                        c(Unitary2x2::normalize_angle(gamma)),
                    ));
                }
            }
            OneQubitBasis::ZSX => {
                if nonzero(beta) {
                    // U(θ, φ, λ) ∝ Rz(φ + π)·SX·Rz(θ + π)·SX·Rz(λ)
                    for (i, angle) in [gamma, beta + PI, alpha + PI].into_iter().enumerate() {
                        if nonzero(angle) {
                            gates.push(StandardGate::Rz(c(Unitary2x2::normalize_angle(angle))));
                        }
                        if i < 2 {
                            gates.push(StandardGate::SX);
                        }
                    }
                } else if nonzero(alpha + gamma) {
                    gates.push(StandardGate::Rz(c(Unitary2x2::normalize_angle(alpha + gamma))));
                }
            }
            OneQubitBasis::PRX => {
                // Rz(λ) ∝ PRX(π, λ/2)·PRX(π, 0)
                let lambda = Unitary2x2::normalize_angle(alpha + gamma);
                if nonzero(lambda) {
                    gates.push(StandardGate::PRX(c(PI), c(0.0)));
                    gates.push(StandardGate::PRX(c(PI), c(lambda / 2.0)));
                }
                if nonzero(beta) {
                    gates.push(StandardGate::PRX(
                        c(beta),
                        c(Unitary2x2::normalize_angle(alpha + PI / 2.0)),
                    ));
                }
            }
        }
        let product = sequence_unitary(&gates);
        (gates, u.phase_relative_to(&product))
    }
}

/// Product of a gate sequence in circuit order. Unknown gates count as identity.
pub fn sequence_unitary(gates: &[StandardGate]) -> Unitary2x2 {
    gates.iter().fold(Unitary2x2::identity(), |acc, g| {
        Unitary2x2::from_standard(g).map_or(acc, |m| m * acc)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_rebuilds(u: &Unitary2x2) {
        let (alpha, beta, gamma, phase) = u.zyz_decomposition();
        let rebuilt = (Unitary2x2::rz(alpha) * Unitary2x2::ry(beta) * Unitary2x2::rz(gamma)).scaled(phase);
        for i in 0..4 {
            assert!((rebuilt.data[i] - u.data[i]).norm() < 1e-12, "entry {i}: {rebuilt:?} vs {u:?}");
        }
    }

    #[test]
    fn test_identity() {
        assert!(Unitary2x2::identity().is_identity());
        assert!((Unitary2x2::h() * Unitary2x2::h()).is_identity());
    }

    #[test]
    fn test_pauli_squared() {
        for p in [Unitary2x2::x(), Unitary2x2::y(), Unitary2x2::z()] {
            assert!((p * p).is_identity());
        }
    }

    #[test]
    fn test_zyz_rebuilds_exactly() {
        assert_rebuilds(&Unitary2x2::h());
        assert_rebuilds(&Unitary2x2::x());
        assert_rebuilds(&Unitary2x2::identity());
        assert_rebuilds(&Unitary2x2::sx());
        assert_rebuilds(&Unitary2x2::rz(0.3));
        assert_rebuilds(&Unitary2x2::u(0.4, -1.2, 2.9).scaled(0.77));
        assert_rebuilds(&Unitary2x2::prx(PI, 0.6));
    }

    #[test]
    fn test_basis_synthesis_reproduces_unitary() {
        let targets = [
            Unitary2x2::h(),
            Unitary2x2::y(),
            Unitary2x2::rz(1.1),
            Unitary2x2::u(2.1, 0.3, -0.8).scaled(-0.4),
            Unitary2x2::identity().scaled(1.0),
        ];
        for basis in [OneQubitBasis::ZYZ, OneQubitBasis::U, OneQubitBasis::ZSX, OneQubitBasis::PRX] {
            for u in &targets {
                let (gates, phase) = basis.synthesize(u);
                let got = sequence_unitary(&gates).scaled(phase);
                assert!(got.distance_up_to_phase(u) < 1e-12, "{basis:?}");
                for i in 0..4 {
                    assert!((got.data[i] - u.data[i]).norm() < 1e-12, "{basis:?} phase");
                }
                assert!(gates.iter().all(|g| basis.gate_names().contains(&g.name())));
            }
        }
    }

    #[test]
    fn test_identity_needs_no_gates() {
        for basis in [OneQubitBasis::ZYZ, OneQubitBasis::U, OneQubitBasis::ZSX, OneQubitBasis::PRX] {
            assert!(basis.synthesize(&Unitary2x2::identity()).0.is_empty());
        }
    }

    #[test]
    fn test_basis_for_gates() {
        assert_eq!(OneQubitBasis::for_gates(["rz", "sx", "x", "cx"]), Some(OneQubitBasis::ZSX));
        assert_eq!(OneQubitBasis::for_gates(["prx", "cz"]), Some(OneQubitBasis::PRX));
        assert_eq!(OneQubitBasis::for_gates(["cz"]), None);
    }
}
