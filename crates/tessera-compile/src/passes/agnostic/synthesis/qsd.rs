//! Quantum Shannon decomposition for unitaries on any number of qubits.
//!
//! An `n`-qubit unitary is split on its first qubit with the block ZXZ
//! factorisation
//!
//! ```text
//! U = (A1 ⊕ A2) · (H ⊗ I) · (I ⊕ B) · (H ⊗ I) · (I ⊕ C)
//! ```
//!
//! and every block-diagonal factor `X0 ⊕ X1` is demultiplexed into
//! `(I ⊗ V) · (D ⊕ D†) · (I ⊗ W)`, where `D ⊕ D†` is a multiplexed `rz` on
//! the first qubit. `V` and `W` recurse on the remaining qubits until two
//! are left, which go to the KAK decomposition.

use nalgebra::{DMatrix, DVector, QR, Schur};
use num_complex::Complex64;
use tessera_ir::{CircuitDag, HighLevelOp, Instruction, ParameterExpression, QubitId, StandardGate};
use tracing::trace;

use crate::error::{CompileError, CompileResult};
use crate::matrix::{self, Operator};
use crate::registry::{SynthesisContext, SynthesisMethod};
use crate::unitary::{EPSILON, OneQubitBasis, Unitary2x2};

use super::two_qubit::synthesize_two_qubit;
use super::{align_phase, append_1q};

/// Entry-wise tolerance for treating a product as Hermitian or identity.
const MATRIX_ATOL: f64 = 1e-12;

/// Schur iteration budget per eigen-solve.
const SCHUR_MAX_ITERATIONS: usize = 100_000;

type Matrix = DMatrix<Complex64>;

/// `unitary/qsd`: Shannon decomposition into `u`, `rxx`/`ryy`/`rzz`, `rz`,
/// `h` and `cx` for a unitary of any size.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShannonUnitary;

impl SynthesisMethod for ShannonUnitary {
    fn name(&self) -> &str {
        "qsd"
    }

    fn synthesize(
        &self,
        op: &HighLevelOp,
        context: &SynthesisContext<'_>,
    ) -> CompileResult<Option<CircuitDag>> {
        let HighLevelOp::Unitary { num_qubits, matrix } = op else {
            return Ok(None);
        };
        let Some(u) = matrix::from_row_major(matrix) else {
            return Ok(None);
        };
        if *num_qubits == 0 {
            return Ok(None);
        }
        let mut dag = decompose(&to_nalgebra(&u), context.tolerance)?;
        if *num_qubits <= matrix::MAX_DENSE_QUBITS {
            align_phase(&mut dag, &u);
        }
        Ok(Some(dag))
    }
}

fn to_nalgebra(u: &Operator) -> Matrix {
    DMatrix::from_fn(u.nrows(), u.ncols(), |i, j| u[[i, j]])
}

fn to_operator(m: &Matrix) -> Operator {
    Operator::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

fn is_close(a: &Matrix, b: &Matrix) -> bool {
    a.iter().zip(b.iter()).all(|(x, y)| (x - y).norm() < MATRIX_ATOL)
}

fn failure(cause: impl Into<String>) -> CompileError {
    CompileError::pass("HighLevelSynthesis", cause)
}

/// Circuit for `m` on qubits `0..log2(dim)`, exact including global phase
/// up to floating point.
fn decompose(m: &Matrix, tolerance: f64) -> CompileResult<CircuitDag> {
    let dim = m.nrows();
    let num_qubits = dim.trailing_zeros() as usize;
    match num_qubits {
        1 => {
            let mut dag = CircuitDag::with_size(1, 0);
            let u = Unitary2x2::new(m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]);
            append_1q(&mut dag, QubitId(0), &u, OneQubitBasis::ZYZ)?;
            Ok(dag)
        }
        2 => synthesize_two_qubit(&to_operator(m), tolerance),
        _ if is_close(m, &Matrix::identity(dim, dim)) => Ok(CircuitDag::with_size(num_qubits, 0)),
        _ => {
            trace!("Shannon decomposition of a {num_qubits}-qubit unitary");
            let (a1, a2, b, c) = block_zxz(m)?;
            let half = dim / 2;
            let identity = Matrix::identity(half, half);
            let top = QubitId(0);

            let mut dag = CircuitDag::with_size(num_qubits, 0);
            demultiplex(&mut dag, &identity, &c, tolerance)?;
            dag.apply(Instruction::single_qubit_gate(StandardGate::H, top))?;
            demultiplex(&mut dag, &identity, &b, tolerance)?;
            dag.apply(Instruction::single_qubit_gate(StandardGate::H, top))?;
            demultiplex(&mut dag, &a1, &a2, tolerance)?;
            Ok(dag)
        }
    }
}

/// Polar decomposition `a = s · u` with `s` Hermitian and `u` unitary.
fn polar(a: Matrix) -> CompileResult<(Matrix, Matrix)> {
    let svd = a.svd(true, true);
    let (Some(left), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(failure("singular value decomposition did not converge"));
    };
    let sigma = Matrix::from_diagonal(&svd.singular_values.map(|s| Complex64::new(s, 0.0)));
    let s = &left * sigma * left.adjoint();
    Ok((s, left * v_t))
}

/// Nearest unitary to `m` in the Frobenius norm.
fn closest_unitary(m: &Matrix) -> CompileResult<Matrix> {
    polar(m.clone()).map(|(_, u)| u)
}

/// Factors `(A1, A2, B, C)` with
/// `U = ½ (A1 ⊕ A2) · [[I + B, I - B], [I - B, I + B]] · (I ⊕ C)`.
fn block_zxz(m: &Matrix) -> CompileResult<(Matrix, Matrix, Matrix, Matrix)> {
    let i = Complex64::i();
    let n = m.nrows() / 2;
    let x = m.view((0, 0), (n, n)).into_owned();
    let y = m.view((0, n), (n, n)).into_owned();
    let u21 = m.view((n, 0), (n, n)).into_owned();
    let u22 = m.view((n, n), (n, n)).into_owned();

    let (sx, ux) = polar(x.clone())?;
    let (sy, uy) = polar(y)?;
    let c = (uy.adjoint() * &ux * i).adjoint();
    let a1 = (sx + sy * i) * &ux;
    let a2 = u21 + u22 * (uy.adjoint() * &ux) * i;
    let b = (a1.adjoint() * x) * Complex64::new(2.0, 0.0) - Matrix::identity(n, n);
    Ok((a1, a2, b, c))
}

/// Eigen-decomposition of a normal matrix as unitary eigenvectors and
/// eigenvalues.
fn normal_eigen(m: Matrix) -> CompileResult<(Matrix, DVector<Complex64>)> {
    if is_close(&m, &m.adjoint()) {
        let eigen = m.symmetric_eigen();
        let values = eigen.eigenvalues.map(|v| Complex64::new(v, 0.0));
        return Ok((QR::new(eigen.eigenvectors).q(), values));
    }
    let schur = Schur::try_new(m, MATRIX_ATOL, SCHUR_MAX_ITERATIONS)
        .ok_or_else(|| failure("Schur decomposition did not converge"))?;
    let (vectors, triangular) = schur.unpack();
    Ok((vectors, triangular.diagonal()))
}

/// Append `x0 ⊕ x1`, controlled on qubit 0, as `W`, a multiplexed `rz`, then
/// `V` on the remaining qubits.
fn demultiplex(dag: &mut CircuitDag, x0: &Matrix, x1: &Matrix, tolerance: f64) -> CompileResult<()> {
    let x0 = closest_unitary(x0)?;
    let x1 = closest_unitary(x1)?;
    let (v, eigenvalues) = normal_eigen(&x0 * x1.adjoint())?;
    let d = eigenvalues.map(|e| e.sqrt());
    let w = Matrix::from_diagonal(&d) * v.adjoint() * &x1;

    let lower: Vec<QubitId> = (1..dag.num_qubits() as u32).map(QubitId).collect();
    dag.compose(&decompose(&w, tolerance)?, &lower, &[])?;
    // D ⊕ D† is rz(-2·arg d_j) on qubit 0 for each state j of the rest.
    let angles: Vec<f64> = d.iter().map(|dj| -2.0 * dj.arg()).collect();
    multiplexed_rz(dag, &angles, QubitId(0), &lower)?;
    dag.compose(&decompose(&v, tolerance)?, &lower, &[])?;
    Ok(())
}

/// Uniformly controlled `rz` on `target`: `angles[j]` applies when the
/// `controls`, read with the first as the most significant bit, are in
/// state `j`.
fn multiplexed_rz(
    dag: &mut CircuitDag,
    angles: &[f64],
    target: QubitId,
    controls: &[QubitId],
) -> CompileResult<()> {
    let Some((&first, rest)) = controls.split_first() else {
        if angles[0].abs() > EPSILON {
            dag.apply(Instruction::single_qubit_gate(
                StandardGate::Rz(ParameterExpression::constant(angles[0])),
                target,
            ))?;
        }
        return Ok(());
    };
    let (off, on) = angles.split_at(angles.len() / 2);
    let sum: Vec<f64> = off.iter().zip(on).map(|(a, b)| (a + b) / 2.0).collect();
    let difference: Vec<f64> = off.iter().zip(on).map(|(a, b)| (a - b) / 2.0).collect();
    // X·rz(θ)·X = rz(-θ), so the conjugated half subtracts when `first` is set.
    multiplexed_rz(dag, &sum, target, rest)?;
    if difference.iter().all(|a| a.abs() <= EPSILON) {
        return Ok(());
    }
    dag.apply(Instruction::two_qubit_gate(StandardGate::CX, first, target))?;
    multiplexed_rz(dag, &difference, target, rest)?;
    dag.apply(Instruction::two_qubit_gate(StandardGate::CX, first, target))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;
    use tessera_ir::Circuit;

    fn random_unitary(num_qubits: usize, seed: u64) -> Operator {
        let mut rng = Pcg64Mcg::seed_from_u64(seed);
        let mut c = Circuit::with_size("rand", num_qubits, 0);
        for layer in 0..4 * num_qubits {
            for q in 0..num_qubits as u32 {
                c.u(rng.gen_range(0.0..3.0), rng.gen_range(-3.0..3.0), rng.gen_range(-3.0..3.0), QubitId(q))
                    .unwrap();
            }
            let a = (layer % num_qubits) as u32;
            let b = ((layer + 1) % num_qubits) as u32;
            c.cx(QubitId(a), QubitId(b)).unwrap();
        }
        matrix::dag_unitary(c.dag()).unwrap()
    }

    fn synthesize(u: &Operator) -> CircuitDag {
        let op = HighLevelOp::Unitary {
            num_qubits: u.nrows().trailing_zeros() as usize,
            matrix: u.iter().copied().collect(),
        };
        ShannonUnitary
            .synthesize(&op, &SynthesisContext::default())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_three_qubit_unitaries() {
        for seed in 0..4 {
            let u = random_unitary(3, seed);
            let dag = synthesize(&u);
            let got = matrix::dag_unitary(&dag).unwrap();
            assert!(matrix::distance(&u, &got) < 1e-8, "seed {seed}: {}", matrix::distance(&u, &got));
        }
    }

    #[test]
    fn test_four_qubit_unitary() {
        let u = random_unitary(4, 9);
        let got = matrix::dag_unitary(&synthesize(&u)).unwrap();
        assert!(matrix::distance_up_to_phase(&u, &got) < 1e-8);
    }

    #[test]
    fn test_multiplexed_rz_per_control_state() {
        let angles = [0.3, -1.1, 2.0, 0.7];
        let mut dag = CircuitDag::with_size(3, 0);
        multiplexed_rz(&mut dag, &angles, QubitId(0), &[QubitId(1), QubitId(2)]).unwrap();
        let got = matrix::dag_unitary(&dag).unwrap();

        for (j, &theta) in angles.iter().enumerate() {
            let half = Complex64::from_polar(1.0, theta / 2.0);
            assert!((got[[j, j]] - half.conj()).norm() < 1e-12);
            assert!((got[[4 + j, 4 + j]] - half).norm() < 1e-12);
        }
        assert_eq!(dag.count_ops().get("cx"), Some(&6));
    }

    #[test]
    fn test_identity_is_empty() {
        let dag = synthesize(&matrix::identity(8));
        assert_eq!(dag.num_ops(), 0);
        assert_eq!(dag.num_qubits(), 3);
    }

    #[test]
    fn test_other_operations_declined() {
        let op = HighLevelOp::MultiControlledX { num_ctrl: 2 };
        assert!(ShannonUnitary.synthesize(&op, &SynthesisContext::default()).unwrap().is_none());
    }
}
