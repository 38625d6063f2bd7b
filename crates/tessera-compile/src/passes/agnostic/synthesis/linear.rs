//! Linear reversible functions over GF(2).

use tessera_ir::{CircuitDag, HighLevelOp, Instruction, QubitId, StandardGate};

use crate::error::CompileResult;
use crate::registry::{SynthesisContext, SynthesisMethod};

/// `linear_function/gauss`: Gaussian elimination into a CX network.
///
/// Reduces the matrix to the identity with row additions only; each
/// addition of row `j` into row `i` is a `cx` from qubit `j` to qubit `i`,
/// and the circuit is the reduction read backwards. Singular matrices are
/// declined.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianLinear;

/// Row additions `(source, destination)` that reduce `matrix` to the
/// identity, or `None` if it is singular.
fn eliminate(matrix: &[Vec<bool>]) -> Option<Vec<(usize, usize)>> {
    let n = matrix.len();
    let mut rows: Vec<Vec<bool>> = matrix.to_vec();
    let mut ops = Vec::new();
    let mut add = |rows: &mut Vec<Vec<bool>>, src: usize, dst: usize| {
        for k in 0..n {
            let bit = rows[src][k];
            rows[dst][k] ^= bit;
        }
        ops.push((src, dst));
    };
    for col in 0..n {
        if !rows[col][col] {
            let pivot = (col + 1..n).find(|&r| rows[r][col])?;
            add(&mut rows, pivot, col);
        }
        for r in 0..n {
            if r != col && rows[r][col] {
                add(&mut rows, col, r);
            }
        }
    }
    Some(ops)
}

impl SynthesisMethod for GaussianLinear {
    fn name(&self) -> &str {
        "gauss"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn synthesize(
        &self,
        op: &HighLevelOp,
        _context: &SynthesisContext<'_>,
    ) -> CompileResult<Option<CircuitDag>> {
        let HighLevelOp::LinearFunction { matrix } = op else {
            return Ok(None);
        };
        let Some(ops) = eliminate(matrix) else {
            return Ok(None);
        };
        let mut dag = CircuitDag::with_size(matrix.len(), 0);
        for (src, dst) in ops.into_iter().rev() {
            dag.apply(Instruction::two_qubit_gate(
                StandardGate::CX,
                QubitId(src as u32),
                QubitId(dst as u32),
            ))?;
        }
        Ok(Some(dag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;

    fn synth(rows: Vec<Vec<bool>>) -> Option<CircuitDag> {
        GaussianLinear
            .synthesize(&HighLevelOp::LinearFunction { matrix: rows }, &SynthesisContext::default())
            .unwrap()
    }

    #[test]
    fn test_single_cx() {
        let dag = synth(vec![vec![true, true], vec![false, true]]).unwrap();
        let ops: Vec<_> = dag.topological_ops().map(|(_, i)| i.qubits.clone()).collect();
        assert_eq!(ops, vec![vec![QubitId(1), QubitId(0)]]);
    }

    #[test]
    fn test_identity_is_empty() {
        let dag = synth(vec![vec![true, false], vec![false, true]]).unwrap();
        assert_eq!(dag.num_ops(), 0);
    }

    #[test]
    fn test_dense_matrix_matches() {
        let rows = vec![
            vec![false, true, true],
            vec![true, true, false],
            vec![true, false, false],
        ];
        let op = HighLevelOp::LinearFunction { matrix: rows.clone() };
        let dag = synth(rows).unwrap();
        let got = matrix::dag_unitary(&dag).unwrap();
        let expected = matrix::high_level_matrix(&op).unwrap();
        assert!(matrix::distance(&expected, &got) < 1e-12);
    }

    #[test]
    fn test_singular_declined() {
        assert!(synth(vec![vec![true, true], vec![true, true]]).is_none());
    }
}
