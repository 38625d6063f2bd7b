//! Two-qubit gate orientation.

use tessera_ir::{CircuitDag, CircuitLevel, Instruction, QubitId, StandardGate};
use tracing::debug;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;
use crate::target::Target;

/// Flips two-qubit gates the target only supports in the other direction.
///
/// Symmetric gates (`cz`, `swap`, `iswap`, `cp`, `rxx`, `ryy`, `rzz`) swap
/// their operands. `cx` is conjugated by Hadamards on both qubits, so a
/// basis translation should follow. Any other reversed gate, or a gate the
/// target supports in neither direction, is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateDirection;

enum Fix {
    Swap,
    Conjugate,
}

impl GateDirection {
    /// Operands of `inst` if it is a two-qubit gate `target` rejects as placed.
    fn misdirected(target: &Target, inst: &Instruction) -> Option<[u32; 2]> {
        inst.as_standard()?;
        let &[a, b] = inst.qubits.as_slice() else {
            return None;
        };
        (!target.instruction_supported(inst.name(), &[a.0, b.0])).then_some([a.0, b.0])
    }

    fn fix_for(target: &Target, inst: &Instruction, [a, b]: [u32; 2]) -> CompileResult<Fix> {
        if !target.instruction_supported(inst.name(), &[b, a]) {
            return Err(CompileError::pass(
                "GateDirection",
                format!("{} is not supported on qubits ({a}, {b}) in either direction", inst.name()),
            ));
        }
        match inst.as_standard() {
            Some(
                StandardGate::CZ
                | StandardGate::Swap
                | StandardGate::ISwap
                | StandardGate::CP(_)
                | StandardGate::RXX(_)
                | StandardGate::RYY(_)
                | StandardGate::RZZ(_),
            ) => Ok(Fix::Swap),
            Some(StandardGate::CX) => Ok(Fix::Conjugate),
            _ => Err(CompileError::pass(
                "GateDirection",
                format!("no rule flips {} from ({a}, {b}) to ({b}, {a})", inst.name()),
            )),
        }
    }
}

fn hadamard_sandwich() -> CompileResult<CircuitDag> {
    let (c, t) = (QubitId(0), QubitId(1));
    let mut dag = CircuitDag::with_size(2, 0);
    dag.apply(Instruction::single_qubit_gate(StandardGate::H, c))?;
    dag.apply(Instruction::single_qubit_gate(StandardGate::H, t))?;
    dag.apply(Instruction::two_qubit_gate(StandardGate::CX, t, c))?;
    dag.apply(Instruction::single_qubit_gate(StandardGate::H, c))?;
    dag.apply(Instruction::single_qubit_gate(StandardGate::H, t))?;
    Ok(dag)
}

impl Pass for GateDirection {
    fn name(&self) -> &str {
        "GateDirection"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?.clone();
        let pending: Vec<_> = dag
            .topological_ops()
            .filter_map(|(node, inst)| {
                let qargs = Self::misdirected(&target, inst)?;
                Some(Self::fix_for(&target, inst, qargs).map(|fix| (node, fix)))
            })
            .collect::<CompileResult<_>>()?;

        for (node, fix) in &pending {
            match fix {
                Fix::Swap => {
                    let Some(inst) = dag.get_instruction(*node) else {
                        continue;
                    };
                    let mut flipped = inst.clone();
                    flipped.qubits.reverse();
                    dag.replace_instruction(*node, flipped)?;
                }
                Fix::Conjugate => {
                    dag.substitute(*node, &hadamard_sandwich()?)?;
                }
            }
        }
        if !pending.is_empty() {
            debug!("GateDirection: flipped {} gates", pending.len());
        }
        Ok(PassOutcome::from_changed(!pending.is_empty()))
    }

    fn should_run(&self, dag: &CircuitDag, properties: &PropertySet) -> bool {
        dag.level() == CircuitLevel::Physical
            && properties.target.as_deref().is_some_and(|target| {
                dag.topological_ops()
                    .any(|(_, inst)| Self::misdirected(target, inst).is_some())
            })
    }

    fn check_preconditions(&self, dag: &CircuitDag, properties: &PropertySet) -> Result<(), String> {
        if properties.target.is_none() {
            return Err("no target set".into());
        }
        if dag.level() != CircuitLevel::Physical {
            return Err("gate direction is fixed on physical circuits only".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::matrix;
    use crate::target::InstructionProperties;
    use tessera_ir::Circuit;

    /// `cx` and `cz` only from lower to higher qubit on a line of three.
    fn one_way_line() -> Arc<Target> {
        let mut builder = Target::builder(3).add_global("h").add_global("rz");
        for pair in [[0, 1], [1, 2]] {
            builder = builder
                .add_instruction("cx", Some(pair.to_vec()), InstructionProperties::default())
                .add_instruction("cz", Some(pair.to_vec()), InstructionProperties::default());
        }
        Arc::new(builder.build().unwrap())
    }

    fn physical(circuit: Circuit) -> CircuitDag {
        let mut dag = circuit.into_dag();
        dag.set_level(CircuitLevel::Physical);
        dag
    }

    #[test]
    fn test_cx_flipped_with_hadamards() {
        let mut c = Circuit::with_size("rev", 3, 0);
        c.cx(QubitId(1), QubitId(0)).unwrap();
        let before = physical(c);
        let mut dag = before.clone();
        let mut props = PropertySet::new().with_target(one_way_line());

        assert!(GateDirection.run(&mut dag, &mut props).unwrap().is_changed());
        assert_eq!(dag.count_ops().get("h"), Some(&4));
        let target = one_way_line();
        for (_, a, b) in dag.two_qubit_ops() {
            assert!(target.instruction_supported("cx", &[a.0, b.0]));
        }
        let (u0, u1) = (matrix::dag_unitary(&before).unwrap(), matrix::dag_unitary(&dag).unwrap());
        assert!(matrix::distance_up_to_phase(&u0, &u1) < 1e-9);
    }

    #[test]
    fn test_symmetric_gate_swaps_operands() {
        let mut c = Circuit::with_size("rev", 3, 0);
        c.cz(QubitId(2), QubitId(1)).unwrap();
        let mut dag = physical(c);
        let mut props = PropertySet::new().with_target(one_way_line());

        GateDirection.run(&mut dag, &mut props).unwrap();
        assert_eq!(dag.num_ops(), 1);
        let ops = dag.two_qubit_ops();
        assert_eq!((ops[0].1, ops[0].2), (QubitId(1), QubitId(2)));
    }

    #[test]
    fn test_uncoupled_pair_rejected() {
        let mut c = Circuit::with_size("far", 3, 0);
        c.cx(QubitId(0), QubitId(2)).unwrap();
        let mut dag = physical(c);
        let mut props = PropertySet::new().with_target(one_way_line());

        let err = GateDirection.run(&mut dag, &mut props).unwrap_err();
        assert!(matches!(err, CompileError::Transpiler { ref pass, .. } if pass == "GateDirection"));
    }

    #[test]
    fn test_supported_gates_untouched() {
        let mut c = Circuit::with_size("fwd", 3, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap().cz(QubitId(1), QubitId(2)).unwrap();
        let dag = physical(c);
        let props = PropertySet::new().with_target(one_way_line());
        assert!(!GateDirection.should_run(&dag, &props));
    }

    #[test]
    fn test_logical_circuit_skipped() {
        let mut c = Circuit::with_size("virtual", 3, 0);
        c.cx(QubitId(2), QubitId(0)).unwrap();
        let props = PropertySet::new().with_target(one_way_line());
        assert!(!GateDirection.should_run(&c.into_dag(), &props));
    }
}
