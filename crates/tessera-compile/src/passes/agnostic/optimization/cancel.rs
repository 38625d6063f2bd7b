//! Cancellation of adjacent self-inverse two-qubit gates.

use rustc_hash::FxHashSet;
use tessera_ir::{CircuitDag, Instruction, NodeIndex, StandardGate, WireId};

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;

use super::MAX_SWEEPS;

/// CX cancellation pass.
///
/// Cancels pairs of adjacent `cx`, `cy`, `cz` and `swap` gates acting on the
/// same qubits: `G · G = I`. The symmetric gates (`cz`, `swap`) cancel in
/// either operand order.
#[derive(Debug, Clone, Copy, Default)]
pub struct CancelCX;

impl CancelCX {
    /// Create a new CX cancellation pass.
    pub fn new() -> Self {
        Self
    }

    fn cancellable(inst: &Instruction) -> Option<&StandardGate> {
        if inst.condition.is_some() || inst.qubits.len() != 2 {
            return None;
        }
        inst.as_standard().filter(|g| {
            matches!(g, StandardGate::CX | StandardGate::CY | StandardGate::CZ | StandardGate::Swap)
        })
    }

    fn is_inverse_pair(first: &Instruction, second: &Instruction) -> bool {
        let (Some(a), Some(b)) = (Self::cancellable(first), Self::cancellable(second)) else {
            return false;
        };
        if a != b {
            return false;
        }
        let symmetric = matches!(a, StandardGate::CZ | StandardGate::Swap);
        first.qubits == second.qubits
            || (symmetric && first.qubits[0] == second.qubits[1] && first.qubits[1] == second.qubits[0])
    }

    /// Adjacent pairs: the second gate directly follows the first on both wires.
    fn find_cancellable_pairs(dag: &CircuitDag) -> Vec<(NodeIndex, NodeIndex)> {
        let mut pairs = Vec::new();
        let mut processed: FxHashSet<NodeIndex> = FxHashSet::default();
        for (node, inst) in dag.topological_ops() {
            if processed.contains(&node) || Self::cancellable(inst).is_none() {
                continue;
            }
            let next = dag.successor_on_wire(node, WireId::Qubit(inst.qubits[0]));
            let Some(succ) = next else {
                continue;
            };
            if processed.contains(&succ)
                || dag.successor_on_wire(node, WireId::Qubit(inst.qubits[1])) != Some(succ)
            {
                continue;
            }
            if dag
                .get_instruction(succ)
                .is_some_and(|other| Self::is_inverse_pair(inst, other))
            {
                processed.insert(node);
                processed.insert(succ);
                pairs.push((node, succ));
            }
        }
        pairs
    }
}

impl Pass for CancelCX {
    fn name(&self) -> &str {
        "CancelCX"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let mut changed = false;
        for _ in 0..MAX_SWEEPS {
            let pairs = Self::find_cancellable_pairs(dag);
            if pairs.is_empty() {
                break;
            }
            for (first, second) in pairs {
                dag.remove_operation(second)?;
                dag.remove_operation(first)?;
            }
            changed = true;
        }
        Ok(PassOutcome::from_changed(changed))
    }
}
