//! Dense operators for gates, high-level operations and whole circuits.
//!
//! Qubit order is big-endian: the first qubit of an operation (or of a DAG,
//! in insertion order) is the most significant bit of the basis index.
//! These operators back synthesis verification and the unitary-equivalence
//! tests; they are not a simulator.

use ndarray::{Array2, ArrayView2};
use num_complex::Complex64;
use rustc_hash::FxHashMap;
use tessera_ir::{
    CircuitDag, GateKind, HighLevelOp, Instruction, InstructionKind, QubitId, StandardGate,
};

use crate::unitary::Unitary2x2;

/// Dense complex matrix.
pub type Operator = Array2<Complex64>;

/// Largest circuit [`dag_unitary`] will expand.
pub const MAX_DENSE_QUBITS: usize = 10;

const ZERO: Complex64 = Complex64::new(0.0, 0.0);
const ONE: Complex64 = Complex64::new(1.0, 0.0);

/// Identity of dimension `dim`.
pub fn identity(dim: usize) -> Operator {
    Array2::from_diag_elem(dim, ONE)
}

/// Row-major entries to a square operator. `None` if the length is not `dim²`.
pub fn from_row_major(entries: &[Complex64]) -> Option<Operator> {
    let dim = entries.len().isqrt();
    if dim * dim != entries.len() {
        return None;
    }
    Array2::from_shape_vec((dim, dim), entries.to_vec()).ok()
}

/// Convert a [`Unitary2x2`].
pub fn from_2x2(u: &Unitary2x2) -> Operator {
    Array2::from_shape_fn((2, 2), |(r, c)| u.data[2 * r + c])
}

/// Convert a 2x2 operator.
pub fn to_2x2(op: ArrayView2<'_, Complex64>) -> Unitary2x2 {
    Unitary2x2::new(op[[0, 0]], op[[0, 1]], op[[1, 0]], op[[1, 1]])
}

/// `base` controlled on `num_ctrl` leading qubits being one.
pub fn controlled(base: &Operator, num_ctrl: usize) -> Operator {
    let b = base.nrows();
    let dim = b << num_ctrl;
    let mut op = identity(dim);
    let offset = dim - b;
    op.slice_mut(ndarray::s![offset.., offset..]).assign(base);
    op
}

fn diag(entries: &[Complex64]) -> Operator {
    Array2::from_diag(&ndarray::Array1::from(entries.to_vec()))
}

fn pauli(c: char) -> Operator {
    let u = match c {
        'X' => Unitary2x2::x(),
        'Y' => Unitary2x2::y(),
        'Z' => Unitary2x2::z(),
        _ => Unitary2x2::identity(),
    };
    from_2x2(&u)
}

fn kron(a: &Operator, b: &Operator) -> Operator {
    let (ra, ca) = a.dim();
    let (rb, cb) = b.dim();
    Array2::from_shape_fn((ra * rb, ca * cb), |(r, c)| a[[r / rb, c / cb]] * b[[r % rb, c % cb]])
}

/// `cos(t)·I − i·sin(t)·P` for a Hermitian involution `P`.
fn rotation(p: &Operator, t: f64) -> Operator {
    identity(p.nrows()).mapv(|x| x * t.cos()) - p.mapv(|x| x * Complex64::new(0.0, t.sin()))
}

/// Matrix of a standard gate with bound parameters.
pub fn standard_matrix(gate: &StandardGate) -> Option<Operator> {
    use StandardGate as G;
    if let Some(u) = Unitary2x2::from_standard(gate) {
        return Some(from_2x2(&u));
    }
    let param = |p: &tessera_ir::ParameterExpression| p.as_f64();
    let op = match gate {
        G::CX => controlled(&pauli('X'), 1),
        G::CY => controlled(&pauli('Y'), 1),
        G::CZ => diag(&[ONE, ONE, ONE, -ONE]),
        G::CH => controlled(&from_2x2(&Unitary2x2::h()), 1),
        G::Swap => swap_matrix(),
        G::ISwap => {
            let mut m = swap_matrix().mapv(|x| x * Complex64::i());
            m[[0, 0]] = ONE;
            m[[3, 3]] = ONE;
            m
        }
        G::CRx(t) => controlled(&from_2x2(&Unitary2x2::rx(param(t)?)), 1),
        G::CRy(t) => controlled(&from_2x2(&Unitary2x2::ry(param(t)?)), 1),
        G::CRz(t) => controlled(&from_2x2(&Unitary2x2::rz(param(t)?)), 1),
        G::CP(t) => controlled(&from_2x2(&Unitary2x2::p(param(t)?)), 1),
        G::RXX(t) => rotation(&kron(&pauli('X'), &pauli('X')), param(t)? / 2.0),
        G::RYY(t) => rotation(&kron(&pauli('Y'), &pauli('Y')), param(t)? / 2.0),
        G::RZZ(t) => rotation(&kron(&pauli('Z'), &pauli('Z')), param(t)? / 2.0),
        G::CCX => controlled(&pauli('X'), 2),
        G::CSwap => controlled(&swap_matrix(), 1),
        _ => return None,
    };
    Some(op)
}

fn swap_matrix() -> Operator {
    let mut m = Array2::zeros((4, 4));
    m[[0, 0]] = ONE;
    m[[1, 2]] = ONE;
    m[[2, 1]] = ONE;
    m[[3, 3]] = ONE;
    m
}

/// Bit of qubit `k` in basis index `index` of an `n`-qubit register.
fn bit(index: usize, k: usize, n: usize) -> bool {
    (index >> (n - 1 - k)) & 1 == 1
}

/// Exact operator of a high-level operation, when its parameters are bound.
pub fn high_level_matrix(op: &HighLevelOp) -> Option<Operator> {
    let op = match op {
        HighLevelOp::Unitary { matrix, .. } => from_row_major(matrix)?,
        HighLevelOp::MultiControlledX { num_ctrl } => controlled(&pauli('X'), *num_ctrl),
        HighLevelOp::MultiControlled { base, num_ctrl } => controlled(&standard_matrix(base)?, *num_ctrl),
        HighLevelOp::LinearFunction { matrix } => {
            let n = matrix.len();
            let mut m = Array2::zeros((1 << n, 1 << n));
            for x in 0..1usize << n {
                let mut y = 0usize;
                for (row, coeffs) in matrix.iter().enumerate() {
                    let parity = coeffs
                        .iter()
                        .enumerate()
                        .filter(|&(col, &a)| a && bit(x, col, n))
                        .count()
                        % 2;
                    if parity == 1 {
                        y |= 1 << (n - 1 - row);
                    }
                }
                m[[y, x]] = ONE;
            }
            m
        }
        HighLevelOp::PauliEvolution { pauli: word, time } => {
            let p = word
                .chars()
                .map(pauli)
                .reduce(|acc, m| kron(&acc, &m))?;
            rotation(&p, time.as_f64()?)
        }
        HighLevelOp::Permutation { pattern } => {
            let n = pattern.len();
            let mut m = Array2::zeros((1 << n, 1 << n));
            for x in 0..1usize << n {
                let y = (0..n)
                    .filter(|&k| bit(x, pattern[k], n))
                    .fold(0usize, |acc, k| acc | 1 << (n - 1 - k));
                m[[y, x]] = ONE;
            }
            m
        }
    };
    Some(op)
}

/// Operator of a unitary instruction on its own qubits, in operand order.
///
/// `None` for non-unitary instructions, unbound parameters, custom gates
/// without a matrix, and compound bodies that are too large.
pub fn instruction_matrix(inst: &Instruction) -> Option<Operator> {
    if inst.condition.is_some() {
        return None;
    }
    match &inst.kind {
        InstructionKind::Gate(gate) => match &gate.kind {
            GateKind::Standard(g) => standard_matrix(g),
            GateKind::Custom(c) => c.matrix.as_deref().and_then(from_row_major),
        },
        InstructionKind::HighLevel(op) => high_level_matrix(op),
        InstructionKind::Compound { body, .. } => dag_unitary(body),
        _ => None,
    }
}

/// Left-multiply `state` by `op` acting on `positions` of an `n`-qubit register.
pub fn apply_operator(state: &mut Operator, op: &Operator, positions: &[usize], n: usize) {
    let k = positions.len();
    let sub = 1usize << k;
    let masks: Vec<usize> = positions.iter().map(|&p| 1 << (n - 1 - p)).collect();
    let offsets: Vec<usize> = (0..sub)
        .map(|s| {
            (0..k)
                .filter(|&j| (s >> (k - 1 - j)) & 1 == 1)
                .fold(0, |acc, j| acc | masks[j])
        })
        .collect();
    let all_mask: usize = masks.iter().sum();
    let mut buffer = vec![ZERO; sub];
    for base in (0..state.nrows()).filter(|b| b & all_mask == 0) {
        for col in 0..state.ncols() {
            for (s, slot) in buffer.iter_mut().enumerate() {
                *slot = (0..sub).map(|t| op[[s, t]] * state[[base | offsets[t], col]]).sum();
            }
            for (s, value) in buffer.iter().enumerate() {
                state[[base | offsets[s], col]] = *value;
            }
        }
    }
}

/// Unitary of a whole DAG, global phase included, over its qubits in
/// insertion order.
///
/// `None` if the DAG holds a non-unitary operation, an unbound parameter,
/// or more than [`MAX_DENSE_QUBITS`] qubits.
pub fn dag_unitary(dag: &CircuitDag) -> Option<Operator> {
    let n = dag.num_qubits();
    if n > MAX_DENSE_QUBITS {
        return None;
    }
    let position: FxHashMap<QubitId, usize> = dag.qubits().enumerate().map(|(i, q)| (q, i)).collect();
    let mut state = identity(1 << n);
    for (_, inst) in dag.topological_ops() {
        if inst.is_barrier() {
            continue;
        }
        let op = instruction_matrix(inst)?;
        let positions: Vec<usize> = inst.qubits.iter().map(|q| position[q]).collect();
        apply_operator(&mut state, &op, &positions, n);
    }
    let phase = Complex64::from_polar(1.0, dag.global_phase());
    Some(state.mapv(|x| x * phase))
}

/// Frobenius distance between `a` and `e^{iφ}·b` for the best `φ`.
pub fn distance_up_to_phase(a: &Operator, b: &Operator) -> f64 {
    if a.dim() != b.dim() {
        return f64::INFINITY;
    }
    let overlap: Complex64 = a.iter().zip(b.iter()).map(|(x, y)| y.conj() * x).sum();
    let phase = if overlap.norm() < 1e-15 {
        ONE
    } else {
        overlap / overlap.norm()
    };
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y * phase).norm_sqr())
        .sum::<f64>()
        .sqrt()
}

/// Frobenius distance without phase freedom.
pub fn distance(a: &Operator, b: &Operator) -> f64 {
    if a.dim() != b.dim() {
        return f64::INFINITY;
    }
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).norm_sqr()).sum::<f64>().sqrt()
}

/// Whether `u·u† ≈ I` within `tol`.
pub fn is_unitary(u: &Operator, tol: f64) -> bool {
    u.is_square() && distance(&u.dot(&u.t().mapv(|x| x.conj())), &identity(u.nrows())) < tol
}

/// The global phase that makes `e^{iφ}·b` closest to `a`.
pub fn relative_phase(a: &Operator, b: &Operator) -> f64 {
    let overlap: Complex64 = a.iter().zip(b.iter()).map(|(x, y)| y.conj() * x).sum();
    overlap.arg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_ir::{Circuit, ParameterExpression};

    #[test]
    fn test_cx_is_big_endian() {
        let cx = standard_matrix(&StandardGate::CX).unwrap();
        assert_eq!(cx[[3, 2]], ONE);
        assert_eq!(cx[[1, 1]], ONE);
    }

    #[test]
    fn test_bell_unitary_columns() {
        let mut circuit = Circuit::with_size("bell", 2, 0);
        circuit.h(QubitId(0)).unwrap().cx(QubitId(0), QubitId(1)).unwrap();
        let u = dag_unitary(circuit.dag()).unwrap();
        let amp = std::f64::consts::FRAC_1_SQRT_2;
        assert!((u[[0, 0]].re - amp).abs() < 1e-12);
        assert!((u[[3, 0]].re - amp).abs() < 1e-12);
        assert!(u[[1, 0]].norm() < 1e-12);
    }

    #[test]
    fn test_measurement_is_not_unitary() {
        assert!(dag_unitary(Circuit::bell().unwrap().dag()).is_none());
    }

    #[test]
    fn test_apply_on_second_qubit() {
        let mut state = identity(4);
        apply_operator(&mut state, &pauli('X'), &[1], 2);
        assert_eq!(state, kron(&identity(2), &pauli('X')));
    }

    #[test]
    fn test_swap_from_three_cx() {
        let mut c = Circuit::with_size("swap", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.cx(QubitId(1), QubitId(0)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        let u = dag_unitary(c.dag()).unwrap();
        assert!(distance(&u, &swap_matrix()) < 1e-12);
    }

    #[test]
    fn test_high_level_matrices_are_unitary() {
        let ops = [
            HighLevelOp::MultiControlledX { num_ctrl: 2 },
            HighLevelOp::LinearFunction {
                matrix: vec![vec![true, false], vec![true, true]],
            },
            HighLevelOp::PauliEvolution {
                pauli: "XZY".into(),
                time: ParameterExpression::constant(0.3),
            },
            HighLevelOp::Permutation { pattern: vec![2, 0, 1] },
        ];
        for op in &ops {
            assert!(is_unitary(&high_level_matrix(op).unwrap(), 1e-12), "{op:?}");
        }
    }

    #[test]
    fn test_linear_function_is_cx() {
        // Row 1 = x0 + x1: the CX with control 0 and target 1.
        let lf = high_level_matrix(&HighLevelOp::LinearFunction {
            matrix: vec![vec![true, false], vec![true, true]],
        })
        .unwrap();
        assert!(distance(&lf, &standard_matrix(&StandardGate::CX).unwrap()) < 1e-12);
    }

    #[test]
    fn test_phase_insensitive_distance() {
        let a = standard_matrix(&StandardGate::H).unwrap();
        let b = a.mapv(|x| x * Complex64::from_polar(1.0, 0.4));
        assert!(distance_up_to_phase(&a, &b) < 1e-12);
        assert!(distance(&a, &b) > 0.1);
        assert!((relative_phase(&b, &a) - 0.4).abs() < 1e-12);
    }
}
