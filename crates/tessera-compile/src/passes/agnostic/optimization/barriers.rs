//! Merging of adjacent barriers.

use tessera_ir::{CircuitDag, Instruction, NodeIndex, WireId};

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;

use super::MAX_SWEEPS;

/// Merges a barrier into the barrier directly before it.
///
/// Barrier `b` merges into barrier `a` when every wire of `b` is either
/// preceded by `a` or starts at `b`, and at least one is preceded by `a`.
/// Nothing else can then lie between the two, so the union barrier keeps
/// the circuit order.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeAdjacentBarriers;

impl MergeAdjacentBarriers {
    fn find_pair(dag: &CircuitDag) -> Option<(NodeIndex, NodeIndex)> {
        dag.topological_ops()
            .filter(|(_, inst)| inst.is_barrier())
            .find_map(|(node, inst)| {
                let preds: Vec<Option<NodeIndex>> = inst
                    .qubits
                    .iter()
                    .map(|&q| dag.predecessor_on_wire(node, WireId::Qubit(q)))
                    .collect();
                let first = preds.iter().flatten().next().copied()?;
                let adjacent = preds.iter().all(|p| p.is_none_or(|p| p == first))
                    && dag.get_instruction(first).is_some_and(Instruction::is_barrier);
                adjacent.then_some((first, node))
            })
    }

    /// Rebuild `dag` with `second` folded into `first`.
    fn merge(dag: &CircuitDag, first: NodeIndex, second: NodeIndex) -> CompileResult<CircuitDag> {
        let mut merged = dag.copy_empty_like();
        for (node, inst) in dag.topological_ops() {
            if node == second {
                continue;
            }
            if node == first {
                let mut qubits = inst.qubits.clone();
                if let Some(other) = dag.get_instruction(second) {
                    qubits.extend(other.qubits.iter().filter(|q| !inst.qubits.contains(q)));
                }
                merged.apply(Instruction::barrier(qubits))?;
            } else {
                merged.apply(inst.clone())?;
            }
        }
        Ok(merged)
    }
}

impl Pass for MergeAdjacentBarriers {
    fn name(&self) -> &str {
        "MergeAdjacentBarriers"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let mut changed = false;
        for _ in 0..MAX_SWEEPS {
            let Some((first, second)) = Self::find_pair(dag) else {
                break;
            };
            *dag = Self::merge(dag, first, second)?;
            changed = true;
        }
        Ok(PassOutcome::from_changed(changed))
    }

    fn should_run(&self, dag: &CircuitDag, _properties: &PropertySet) -> bool {
        dag.topological_ops().filter(|(_, inst)| inst.is_barrier()).nth(1).is_some()
    }
}
