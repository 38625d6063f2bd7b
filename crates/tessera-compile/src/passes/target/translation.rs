//! Basis translation passes.

use tessera_ir::{
    CircuitDag, CircuitLevel, Instruction, InstructionKind, ParameterExpression, QubitId, StandardGate,
};
use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::matrix;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;
use crate::target::Target;

use super::equivalence::{EquivalenceLibrary, TranslationPlan};

/// Longest chain of rule applications for one gate.
const MAX_DEPTH: usize = 32;

/// Basis translation pass.
///
/// Rewrites every gate the target does not support through the cheapest
/// path in an [`EquivalenceLibrary`]. On a physical circuit support is
/// checked on the gate's own qubits; a two-qubit gate the target only has
/// in the other direction is kept for [`GateDirection`](super::GateDirection). Bound gates keep the circuit's global
/// phase exact; symbolic gates are translated up to global phase.
///
/// Measurements, resets, delays and barriers pass through. A custom gate
/// without a matrix or an unsynthesised high-level operation that the
/// target does not support fails with [`CompileError::GateNotInBasis`].
#[derive(Debug, Clone)]
pub struct BasisTranslation {
    library: EquivalenceLibrary,
}

impl Default for BasisTranslation {
    fn default() -> Self {
        Self::new()
    }
}

impl BasisTranslation {
    /// Translation through the built-in library.
    pub fn new() -> Self {
        Self::with_library(EquivalenceLibrary::standard())
    }

    /// Translation through a custom library.
    pub fn with_library(library: EquivalenceLibrary) -> Self {
        Self { library }
    }

    /// Append the translation of `gate` on `qubits` to `out`.
    fn expand_into(
        &self,
        gate: &StandardGate,
        qubits: &[QubitId],
        plan: &TranslationPlan,
        supported: &dyn Fn(&str, &[QubitId]) -> bool,
        depth: usize,
        out: &mut CircuitDag,
    ) -> CompileResult<()> {
        if supported(gate.name(), qubits) {
            out.apply(Instruction::gate(gate.clone(), qubits.iter().copied()))?;
            return Ok(());
        }
        let not_in_basis = || CompileError::GateNotInBasis {
            gate: gate.name().to_string(),
        };
        if depth >= MAX_DEPTH {
            return Err(not_in_basis());
        }
        let rule = plan
            .choice(gate.name())
            .and_then(|index| self.library.rule(gate.name(), index))
            .ok_or_else(not_in_basis)?;
        let params: Vec<ParameterExpression> = gate.parameters().into_iter().cloned().collect();
        for (inner, inner_qubits) in rule.expand(&params, qubits) {
            self.expand_into(&inner, &inner_qubits, plan, supported, depth + 1, out)?;
        }
        Ok(())
    }

    /// Translation of one gate on local qubits `0..k`, with its phase fixed
    /// so the unitary matches exactly when the gate is bound. `supported`
    /// sees the gate's own `qubits`.
    fn translate_gate(
        &self,
        gate: &StandardGate,
        qubits: &[QubitId],
        plan: &TranslationPlan,
        supported: &dyn Fn(&str, &[QubitId]) -> bool,
    ) -> CompileResult<CircuitDag> {
        let k = gate.num_qubits();
        let local: Vec<QubitId> = (0..k).map(|i| QubitId(i as u32)).collect();
        let on_operands = |name: &str, inner: &[QubitId]| {
            let mapped: Vec<QubitId> = inner.iter().map(|q| qubits[q.0 as usize]).collect();
            supported(name, &mapped)
        };
        let mut out = CircuitDag::with_size(k, 0);
        self.expand_into(gate, &local, plan, &on_operands, 0, &mut out)?;
        if let (Some(expected), Some(got)) = (matrix::standard_matrix(gate), matrix::dag_unitary(&out)) {
            out.add_global_phase(matrix::relative_phase(&expected, &got));
        }
        Ok(out)
    }
}

impl Pass for BasisTranslation {
    fn name(&self) -> &str {
        "BasisTranslation"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?.clone();
        let physical = dag.level() == CircuitLevel::Physical;
        let supported = |name: &str, qubits: &[QubitId]| runs_natively(&target, physical, name, qubits);
        let plan = self.library.plan(|name| target.supports(name));

        // Rebuild in topological order so replacements land where the
        // original gate stood.
        let mut new_dag = dag.copy_empty_like();
        let mut translated = 0usize;
        for (_, inst) in dag.topological_ops() {
            if !needs_translation(&inst.kind) || supported(inst.name(), &inst.qubits) {
                new_dag.apply(inst.clone())?;
                continue;
            }
            let Some(gate) = inst.as_standard() else {
                return Err(CompileError::GateNotInBasis {
                    gate: inst.name().to_string(),
                });
            };
            let replacement = self.translate_gate(gate, &inst.qubits, &plan, &supported)?;
            trace!("Translated {} into {} ops", gate.name(), replacement.num_ops());
            // A conditioned block is a classical branch, so its global
            // phase is unobservable.
            if inst.condition.is_none() {
                new_dag.add_global_phase(replacement.global_phase());
            }
            for (_, sub) in replacement.topological_ops() {
                let mut sub = sub.clone();
                sub.remap(|q| inst.qubits[q.0 as usize], |c| c);
                sub.condition.clone_from(&inst.condition);
                new_dag.apply(sub)?;
            }
            translated += 1;
        }

        if translated > 0 {
            debug!("BasisTranslation: rewrote {translated} gates");
            *dag = new_dag;
        }
        Ok(PassOutcome::from_changed(translated > 0))
    }

    fn should_run(&self, dag: &CircuitDag, properties: &PropertySet) -> bool {
        let physical = dag.level() == CircuitLevel::Physical;
        properties.target.as_ref().is_some_and(|target| {
            dag.topological_ops().any(|(_, inst)| {
                needs_translation(&inst.kind) && !runs_natively(target, physical, inst.name(), &inst.qubits)
            })
        })
    }

    fn check_preconditions(&self, _dag: &CircuitDag, properties: &PropertySet) -> Result<(), String> {
        if properties.target.is_none() {
            return Err("no target set".into());
        }
        Ok(())
    }
}

/// Whether `target` runs `name` on `qubits`. Logical circuits only need the
/// name; two-qubit gates count in either direction.
fn runs_natively(target: &Target, physical: bool, name: &str, qubits: &[QubitId]) -> bool {
    if !physical {
        return target.supports(name);
    }
    let qargs: Vec<u32> = qubits.iter().map(|q| q.0).collect();
    target.instruction_supported(name, &qargs)
        || matches!(qargs[..], [a, b] if target.instruction_supported(name, &[b, a]))
}

/// Whether an instruction is a gate-like operation that must be in the basis.
fn needs_translation(kind: &InstructionKind) -> bool {
    matches!(
        kind,
        InstructionKind::Gate(_) | InstructionKind::HighLevel(_) | InstructionKind::Compound { .. }
    )
}

/// Decomposes standard gates on three or more qubits into one- and
/// two-qubit gates, so routing only sees pairs.
#[derive(Debug, Clone)]
pub struct Unroll3qOrMore {
    library: EquivalenceLibrary,
}

impl Default for Unroll3qOrMore {
    fn default() -> Self {
        Self {
            library: EquivalenceLibrary::standard(),
        }
    }
}

impl Unroll3qOrMore {
    /// Unroll through the built-in library.
    pub fn new() -> Self {
        Self::default()
    }

    fn unroll(
        &self,
        gate: &StandardGate,
        qubits: &[QubitId],
        depth: usize,
        out: &mut Vec<Instruction>,
    ) -> CompileResult<()> {
        if gate.num_qubits() < 3 {
            out.push(Instruction::gate(gate.clone(), qubits.iter().copied()));
            return Ok(());
        }
        let rule = self
            .library
            .rules_for(gate.name())
            .first()
            .filter(|_| depth < MAX_DEPTH)
            .ok_or_else(|| {
                CompileError::pass("Unroll3qOrMore", format!("no decomposition for '{}'", gate.name()))
            })?;
        let params: Vec<ParameterExpression> = gate.parameters().into_iter().cloned().collect();
        for (inner, inner_qubits) in rule.expand(&params, qubits) {
            self.unroll(&inner, &inner_qubits, depth + 1, out)?;
        }
        Ok(())
    }

    fn is_wide_standard(inst: &Instruction) -> bool {
        inst.as_standard().is_some_and(|g| g.num_qubits() >= 3)
    }
}

impl Pass for Unroll3qOrMore {
    fn name(&self) -> &str {
        "Unroll3qOrMore"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let mut new_dag = dag.copy_empty_like();
        let mut changed = false;
        for (_, inst) in dag.topological_ops() {
            let Some(gate) = inst.as_standard().filter(|_| Self::is_wide_standard(inst)) else {
                new_dag.apply(inst.clone())?;
                continue;
            };
            let mut pieces = Vec::new();
            self.unroll(gate, &inst.qubits, 0, &mut pieces)?;
            let mut replacement = CircuitDag::new();
            for &q in &inst.qubits {
                replacement.add_qubit(q);
            }
            for piece in &pieces {
                replacement.apply(piece.clone())?;
            }
            if inst.condition.is_none() {
                if let (Some(expected), Some(got)) =
                    (matrix::standard_matrix(gate), matrix::dag_unitary(&replacement))
                {
                    new_dag.add_global_phase(matrix::relative_phase(&expected, &got));
                }
            }
            for mut piece in pieces {
                piece.condition.clone_from(&inst.condition);
                new_dag.apply(piece)?;
            }
            changed = true;
        }
        if changed {
            *dag = new_dag;
        }
        Ok(PassOutcome::from_changed(changed))
    }

    fn should_run(&self, dag: &CircuitDag, _properties: &PropertySet) -> bool {
        dag.topological_ops().any(|(_, inst)| Self::is_wide_standard(inst))
    }
}

#[cfg(test)]
mod tests {
    use std::f64::consts::PI;
    use std::sync::Arc;

    use super::*;
    use crate::target::{BasisGates, CouplingMap, Target};
    use tessera_ir::{Circuit, ClbitId, Condition, CustomGate};

    fn props_for(basis: &BasisGates, n: u32) -> PropertySet {
        PropertySet::new().with_target(Arc::new(Target::from_coupling(CouplingMap::full(n), basis)))
    }

    fn mixed_circuit() -> CircuitDag {
        let mut c = Circuit::with_size("mixed", 3, 0);
        c.h(QubitId(0)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.ry(0.3, QubitId(2)).unwrap();
        c.cp(PI / 5.0, QubitId(1), QubitId(2)).unwrap();
        c.swap(QubitId(0), QubitId(2)).unwrap();
        c.u(0.1, 0.2, 0.3, QubitId(1)).unwrap();
        c.ryy(0.7, QubitId(0), QubitId(1)).unwrap();
        c.iswap(QubitId(2), QubitId(0)).unwrap();
        c.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        c.into_dag()
    }

    fn assert_translates_exactly(basis: &BasisGates) {
        let before = mixed_circuit();
        let mut dag = before.clone();
        let mut props = props_for(basis, 3);
        BasisTranslation::new().run(&mut dag, &mut props).unwrap();

        for (_, inst) in dag.topological_ops() {
            assert!(basis.contains(inst.name()), "{} left untranslated", inst.name());
        }
        let (ua, ub) = (matrix::dag_unitary(&before).unwrap(), matrix::dag_unitary(&dag).unwrap());
        assert!(matrix::distance(&ua, &ub) < 1e-9, "off by {}", matrix::distance(&ua, &ub));
    }

    #[test]
    fn test_translate_to_ibm() {
        assert_translates_exactly(&BasisGates::ibm());
    }

    #[test]
    fn test_translate_to_iqm() {
        assert_translates_exactly(&BasisGates::iqm());
    }

    #[test]
    fn test_translate_to_zyz_cz() {
        assert_translates_exactly(&BasisGates::new(["rz", "ry", "cz"]));
    }

    #[test]
    fn test_supported_gates_untouched() {
        let mut dag = mixed_circuit();
        let mut props = props_for(&BasisGates::universal(), 3);
        let pass = BasisTranslation::new();
        assert!(!pass.should_run(&dag, &props));
        assert!(!pass.run(&mut dag, &mut props).unwrap().is_changed());
    }

    #[test]
    fn test_no_path_is_reported() {
        let mut c = Circuit::with_size("test", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        let mut dag = c.into_dag();
        let mut props = props_for(&BasisGates::new(["rz", "sx"]), 2);
        match BasisTranslation::new().run(&mut dag, &mut props) {
            Err(CompileError::GateNotInBasis { gate }) => assert_eq!(gate, "cx"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_custom_gate_without_matrix_is_reported() {
        let mut c = Circuit::with_size("test", 1, 0);
        c.gate(CustomGate::new("mystery", 1), [QubitId(0)]).unwrap();
        let mut dag = c.into_dag();
        let mut props = props_for(&BasisGates::ibm(), 1);
        assert!(matches!(
            BasisTranslation::new().run(&mut dag, &mut props),
            Err(CompileError::GateNotInBasis { .. })
        ));
    }

    #[test]
    fn test_symbolic_parameters_flow_through() {
        let mut c = Circuit::with_size("test", 1, 0);
        c.rx(ParameterExpression::symbol("theta"), QubitId(0)).unwrap();
        let mut dag = c.into_dag();
        let mut props = props_for(&BasisGates::iqm(), 1);
        BasisTranslation::new().run(&mut dag, &mut props).unwrap();

        let ops: Vec<_> = dag.topological_ops().map(|(_, i)| i.clone()).collect();
        assert_eq!(ops.len(), 1);
        let gate = ops[0].as_standard().unwrap();
        assert_eq!(gate.name(), "prx");
        assert!(gate.parameters()[0].symbols().contains("theta"));
    }

    #[test]
    fn test_condition_and_measure_survive() {
        let mut c = Circuit::with_size("test", 1, 1);
        c.measure(QubitId(0), ClbitId(0)).unwrap();
        c.append_conditional(
            Instruction::single_qubit_gate(StandardGate::H, QubitId(0)),
            Condition::bit(ClbitId(0), true),
        )
        .unwrap();
        let mut dag = c.into_dag();
        let mut props = props_for(&BasisGates::ibm(), 1);
        BasisTranslation::new().run(&mut dag, &mut props).unwrap();

        let ops: Vec<_> = dag.topological_ops().map(|(_, i)| i.clone()).collect();
        assert!(ops[0].is_measure());
        assert_eq!(ops.len(), 4);
        assert!(ops[1..].iter().all(|i| i.condition.is_some()));
    }

    #[test]
    fn test_unroll_three_qubit_gates() {
        let mut c = Circuit::with_size("test", 3, 0);
        c.h(QubitId(1)).unwrap();
        c.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        c.cswap(QubitId(2), QubitId(0), QubitId(1)).unwrap();
        let before = c.into_dag();
        let mut dag = before.clone();

        assert!(Unroll3qOrMore::new().run(&mut dag, &mut PropertySet::new()).unwrap().is_changed());
        assert!(dag.topological_ops().all(|(_, i)| i.qubits.len() <= 2));
        let (ua, ub) = (matrix::dag_unitary(&before).unwrap(), matrix::dag_unitary(&dag).unwrap());
        assert!(matrix::distance(&ua, &ub) < 1e-9);
    }
}
