//! Pauli evolution `exp(-i·t·P)`.

use tessera_ir::{CircuitDag, HighLevelOp, Instruction, QubitId, StandardGate};

use crate::error::CompileResult;
use crate::registry::{SynthesisContext, SynthesisMethod};

/// `pauli_evolution/default`: basis change, CX parity ladder, one `rz`.
///
/// Symbolic evolution times are kept symbolic. The all-identity word is only
/// a global phase and is declined when the time is symbolic.
#[derive(Debug, Clone, Copy, Default)]
pub struct PauliLadder;

impl SynthesisMethod for PauliLadder {
    fn name(&self) -> &str {
        "default"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn synthesize(
        &self,
        op: &HighLevelOp,
        _context: &SynthesisContext<'_>,
    ) -> CompileResult<Option<CircuitDag>> {
        let HighLevelOp::PauliEvolution { pauli, time } = op else {
            return Ok(None);
        };
        let letters: Vec<char> = pauli.chars().collect();
        if letters.iter().any(|c| !matches!(c, 'I' | 'X' | 'Y' | 'Z')) {
            return Ok(None);
        }
        let mut dag = CircuitDag::with_size(letters.len(), 0);
        let support: Vec<(QubitId, char)> = letters
            .iter()
            .enumerate()
            .filter(|(_, c)| **c != 'I')
            .map(|(i, c)| (QubitId(i as u32), *c))
            .collect();

        let Some(&(last, _)) = support.last() else {
            return Ok(time.as_f64().map(|t| {
                dag.add_global_phase(-t);
                dag
            }));
        };

        for &(q, letter) in &support {
            match letter {
                'X' => {
                    dag.apply(Instruction::single_qubit_gate(StandardGate::H, q))?;
                }
                'Y' => {
                    dag.apply(Instruction::single_qubit_gate(StandardGate::Sdg, q))?;
                    dag.apply(Instruction::single_qubit_gate(StandardGate::H, q))?;
                }
                _ => {}
            }
        }
        for pair in support.windows(2) {
            dag.apply(Instruction::two_qubit_gate(StandardGate::CX, pair[0].0, pair[1].0))?;
        }
        dag.apply(Instruction::single_qubit_gate(
            StandardGate::Rz(time.clone() * 2.0),
            last,
        ))?;
        for pair in support.windows(2).rev() {
            dag.apply(Instruction::two_qubit_gate(StandardGate::CX, pair[0].0, pair[1].0))?;
        }
        for &(q, letter) in &support {
            match letter {
                'X' => {
                    dag.apply(Instruction::single_qubit_gate(StandardGate::H, q))?;
                }
                'Y' => {
                    dag.apply(Instruction::single_qubit_gate(StandardGate::H, q))?;
                    dag.apply(Instruction::single_qubit_gate(StandardGate::S, q))?;
                }
                _ => {}
            }
        }
        Ok(Some(dag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix;
    use tessera_ir::ParameterExpression;

    fn evolution(pauli: &str, time: ParameterExpression) -> HighLevelOp {
        HighLevelOp::PauliEvolution {
            pauli: pauli.into(),
            time,
        }
    }

    #[test]
    fn test_words_are_exact() {
        for word in ["Z", "X", "Y", "ZZ", "XY", "YIZX", "IIX"] {
            let op = evolution(word, ParameterExpression::constant(0.37));
            let dag = PauliLadder.synthesize(&op, &SynthesisContext::default()).unwrap().unwrap();
            let got = matrix::dag_unitary(&dag).unwrap();
            let expected = matrix::high_level_matrix(&op).unwrap();
            assert!(matrix::distance(&expected, &got) < 1e-9, "{word}");
        }
    }

    #[test]
    fn test_identity_word_is_phase() {
        let op = evolution("II", ParameterExpression::constant(0.5));
        let dag = PauliLadder.synthesize(&op, &SynthesisContext::default()).unwrap().unwrap();
        assert_eq!(dag.num_ops(), 0);
        assert!((dag.global_phase() + 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_symbolic_time_kept() {
        let op = evolution("XZ", ParameterExpression::symbol("t"));
        let dag = PauliLadder.synthesize(&op, &SynthesisContext::default()).unwrap().unwrap();
        let rz = dag
            .topological_ops()
            .find_map(|(_, i)| match i.as_standard() {
                Some(StandardGate::Rz(angle)) => Some(angle.clone()),
                _ => None,
            })
            .unwrap();
        assert!(rz.is_symbolic());
        assert_eq!(dag.two_qubit_ops().len(), 2);
    }
}
