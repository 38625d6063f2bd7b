//! Removal of diagonal gates that only precede measurements.

use tessera_ir::{CircuitDag, InstructionKind, NodeIndex, WireId};

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;

use super::MAX_SWEEPS;

/// Drops diagonal gates whose every qubit is measured next.
///
/// A diagonal gate only changes phases in the computational basis, which a
/// measurement cannot observe. Chains such as `rz; t; measure` are removed
/// over repeated sweeps.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoveDiagonalGatesBeforeMeasure;

impl RemoveDiagonalGatesBeforeMeasure {
    fn removable(dag: &CircuitDag) -> Vec<NodeIndex> {
        dag.topological_ops()
            .filter(|(_, inst)| {
                inst.condition.is_none() && inst.as_standard().is_some_and(|g| g.is_diagonal())
            })
            .filter(|(node, inst)| {
                inst.qubits.iter().all(|&q| {
                    dag.successor_on_wire(*node, WireId::Qubit(q))
                        .and_then(|succ| dag.get_instruction(succ))
                        .is_some_and(|succ| matches!(succ.kind, InstructionKind::Measure))
                })
            })
            .map(|(node, _)| node)
            .collect()
    }
}

impl Pass for RemoveDiagonalGatesBeforeMeasure {
    fn name(&self) -> &str {
        "RemoveDiagonalGatesBeforeMeasure"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let mut changed = false;
        for _ in 0..MAX_SWEEPS {
            let nodes = Self::removable(dag);
            if nodes.is_empty() {
                break;
            }
            for node in nodes {
                dag.remove_operation(node)?;
            }
            changed = true;
        }
        Ok(PassOutcome::from_changed(changed))
    }

    fn should_run(&self, dag: &CircuitDag, _properties: &PropertySet) -> bool {
        dag.topological_ops().any(|(_, inst)| inst.is_measure())
    }
}
