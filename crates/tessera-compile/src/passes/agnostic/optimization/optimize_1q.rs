//! Single-qubit gate optimization pass.

use tessera_ir::{CircuitDag, Instruction, NodeIndex, QubitId, WireId};
use tracing::trace;

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;
use crate::unitary::{OneQubitBasis, Unitary2x2};

/// Single-qubit gate optimization pass.
///
/// Merges runs of consecutive single-qubit gates on the same qubit and
/// re-synthesises them in an Euler basis. The basis is the one given to
/// [`with_basis`](Self::with_basis), else the one the target supports, else
/// ZYZ. A run is replaced when the result is shorter, or when the run holds
/// a gate outside the basis and a basis was requested or a target is set.
///
/// Gates with symbolic parameters or a condition end a run.
#[derive(Debug, Clone, Default)]
pub struct Optimize1qGates {
    basis: Option<OneQubitBasis>,
}

impl Optimize1qGates {
    /// Optimizer that picks its basis from the target.
    pub fn new() -> Self {
        Self::default()
    }

    /// Optimizer with a fixed basis.
    pub fn with_basis(basis: OneQubitBasis) -> Self {
        Self { basis: Some(basis) }
    }

    fn basis(&self, properties: &PropertySet) -> Option<OneQubitBasis> {
        match (self.basis, &properties.target) {
            (Some(basis), _) => Some(basis),
            (None, Some(target)) => OneQubitBasis::for_gates(target.operation_names()),
            (None, None) => Some(OneQubitBasis::ZYZ),
        }
    }

    /// Matrix of a gate that can join a run.
    fn mergeable(inst: &Instruction) -> Option<Unitary2x2> {
        if inst.qubits.len() != 1 || inst.condition.is_some() {
            return None;
        }
        inst.as_standard().and_then(Unitary2x2::from_standard)
    }

    /// Maximal runs of mergeable gates on each qubit, in wire order.
    fn find_runs(dag: &CircuitDag) -> Vec<(QubitId, Vec<NodeIndex>)> {
        let mut runs = Vec::new();
        for qubit in dag.qubits() {
            let mut current: Vec<NodeIndex> = Vec::new();
            for node in dag.wire_sequence(WireId::Qubit(qubit)) {
                let joins = dag
                    .get_instruction(node)
                    .and_then(Self::mergeable)
                    .is_some();
                if joins {
                    current.push(node);
                } else if !current.is_empty() {
                    runs.push((qubit, std::mem::take(&mut current)));
                }
            }
            if !current.is_empty() {
                runs.push((qubit, current));
            }
        }
        runs
    }
}

impl Pass for Optimize1qGates {
    fn name(&self) -> &str {
        "Optimize1qGates"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let Some(basis) = self.basis(properties) else {
            return Ok(PassOutcome::Unchanged);
        };
        let enforce = self.basis.is_some() || properties.target.is_some();
        let target = properties.target.as_deref();
        let in_basis = |name: &str| match target {
            Some(t) => t.supports(name),
            None => basis.gate_names().contains(&name),
        };

        let mut changed = false;
        for (qubit, run) in Self::find_runs(dag) {
            let mut combined = Unitary2x2::identity();
            let mut out_of_basis = false;
            for &node in &run {
                let Some(inst) = dag.get_instruction(node) else {
                    continue;
                };
                if let Some(u) = Self::mergeable(inst) {
                    combined = u * combined;
                }
                out_of_basis |= !in_basis(inst.name());
            }

            let (gates, phase) = basis.synthesize(&combined);
            if gates.len() >= run.len() && !(enforce && out_of_basis) {
                continue;
            }
            trace!("Re-synthesising {} gates on {qubit} as {}", run.len(), gates.len());

            let mut replacement = CircuitDag::with_size(1, 0);
            for gate in gates {
                replacement.apply(Instruction::single_qubit_gate(gate, QubitId(0)))?;
            }
            replacement.set_global_phase(phase);
            let (first, rest) = run.split_at(1);
            dag.substitute(first[0], &replacement)?;
            for &node in rest {
                dag.remove_operation(node)?;
            }
            changed = true;
        }
        Ok(PassOutcome::from_changed(changed))
    }
}
