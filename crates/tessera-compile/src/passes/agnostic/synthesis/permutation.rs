//! Qubit permutations as SWAP networks.

use tessera_ir::{CircuitDag, HighLevelOp, Instruction, QubitId, StandardGate};

use crate::error::CompileResult;
use crate::registry::{SynthesisContext, SynthesisMethod};

/// `permutation/default`: one SWAP per misplaced position, `n - cycles` in total.
#[derive(Debug, Clone, Copy, Default)]
pub struct CycleSwapNetwork;

impl SynthesisMethod for CycleSwapNetwork {
    fn name(&self) -> &str {
        "default"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn synthesize(
        &self,
        op: &HighLevelOp,
        _context: &SynthesisContext<'_>,
    ) -> CompileResult<Option<CircuitDag>> {
        let HighLevelOp::Permutation { pattern } = op else {
            return Ok(None);
        };
        let n = pattern.len();
        let mut dag = CircuitDag::with_size(n, 0);
        // current[k]: original qubit whose state sits at position k
        let mut current: Vec<usize> = (0..n).collect();
        for k in 0..n {
            if current[k] == pattern[k] {
                continue;
            }
            let Some(j) = (k + 1..n).find(|&j| current[j] == pattern[k]) else {
                return Ok(None);
            };
            dag.apply(Instruction::two_qubit_gate(
                StandardGate::Swap,
                QubitId(k as u32),
                QubitId(j as u32),
            ))?;
            current.swap(k, j);
        }
        Ok(Some(dag))
    }
}
