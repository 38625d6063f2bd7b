//! Property-based tests for DAG structural operations.

use proptest::prelude::*;
use tessera_ir::{
    Circuit, CircuitDag, ClbitId, Instruction, QubitId, StandardGate, WireId,
};

/// A random operation on a circuit of `n` qubits.
#[derive(Debug, Clone)]
enum Op {
    One(u8, u32),
    Cx(u32, u32),
    Measure(u32),
}

impl Op {
    fn instruction(&self) -> Instruction {
        match *self {
            Op::One(kind, q) => {
                let gate = match kind % 4 {
                    0 => StandardGate::H,
                    1 => StandardGate::X,
                    2 => StandardGate::T,
                    _ => StandardGate::Rz(0.25.into()),
                };
                Instruction::single_qubit_gate(gate, QubitId(q))
            }
            Op::Cx(a, b) => Instruction::two_qubit_gate(StandardGate::CX, QubitId(a), QubitId(b)),
            Op::Measure(q) => Instruction::measure(QubitId(q), ClbitId(q)),
        }
    }
}

fn arb_op(n: u32) -> impl Strategy<Value = Op> {
    let one = (any::<u8>(), 0..n).prop_map(|(k, q)| Op::One(k, q));
    let meas = (0..n).prop_map(Op::Measure);
    if n < 2 {
        prop_oneof![one, meas].boxed()
    } else {
        let cx = (0..n, 1..n).prop_map(move |(a, off)| Op::Cx(a, (a + off) % n));
        prop_oneof![3 => one, 3 => cx, 1 => meas].boxed()
    }
}

fn arb_dag() -> impl Strategy<Value = CircuitDag> {
    (1_u32..=5).prop_flat_map(|n| {
        prop::collection::vec(arb_op(n), 0..=25).prop_map(move |ops| {
            let size = n as usize;
            CircuitDag::from_instructions(size, size, ops.iter().map(Op::instruction))
                .expect("generated ops are valid")
        })
    })
}

fn names_on(dag: &CircuitDag, wire: WireId) -> Vec<String> {
    dag.wire_sequence(wire)
        .into_iter()
        .map(|n| dag.get_instruction(n).unwrap().name().to_string())
        .collect()
}

proptest! {
    #[test]
    fn generated_dags_are_well_formed(dag in arb_dag()) {
        prop_assert!(dag.verify_integrity().is_ok());
        prop_assert_eq!(dag.topological_op_nodes().count(), dag.num_ops());
    }

    #[test]
    fn topological_order_respects_every_wire(dag in arb_dag()) {
        let order: Vec<_> = dag.topological_op_nodes().collect();
        let position = |n| order.iter().position(|&m| m == n).unwrap();
        for q in dag.qubits() {
            let seq = dag.wire_sequence(WireId::Qubit(q));
            for pair in seq.windows(2) {
                prop_assert!(position(pair[0]) < position(pair[1]));
            }
        }
    }

    #[test]
    fn remove_keeps_integrity(dag in arb_dag(), pick in any::<prop::sample::Index>()) {
        prop_assume!(dag.num_ops() > 0);
        let mut dag = dag;
        let nodes: Vec<_> = dag.topological_op_nodes().collect();
        let victim = nodes[pick.index(nodes.len())];
        let survivors: Vec<_> = nodes.iter().copied().filter(|&n| n != victim).collect();
        dag.remove_operation(victim).unwrap();
        prop_assert!(dag.verify_integrity().is_ok());
        prop_assert_eq!(dag.num_ops(), nodes.len() - 1);
        for n in survivors {
            prop_assert!(dag.contains_op(n));
        }
    }

    #[test]
    fn substitute_with_own_copy_is_identity(dag in arb_dag(), pick in any::<prop::sample::Index>()) {
        prop_assume!(dag.num_ops() > 0);
        let original = dag.clone();
        let mut dag = dag;
        let nodes: Vec<_> = dag.topological_op_nodes().collect();
        let node = nodes[pick.index(nodes.len())];
        let inst = dag.get_instruction(node).unwrap().clone();

        // A one-op sub-DAG over local wires 0..k standing for the node's operands.
        let mut local = inst.clone();
        let qpos = |q: QubitId| QubitId(inst.qubits.iter().position(|&x| x == q).unwrap() as u32);
        let cpos = |c: ClbitId| ClbitId(inst.clbits.iter().position(|&x| x == c).unwrap() as u32);
        local.remap(qpos, cpos);
        let sub = CircuitDag::from_instructions(inst.qubits.len(), inst.clbits.len(), [local]).unwrap();

        dag.substitute(node, &sub).unwrap();
        prop_assert!(dag.verify_integrity().is_ok());
        prop_assert_eq!(&dag, &original);
    }

    #[test]
    fn circuit_round_trip(dag in arb_dag()) {
        let back = Circuit::from_dag(dag.clone()).into_dag();
        prop_assert_eq!(&back, &dag);
        for q in dag.qubits() {
            prop_assert_eq!(names_on(&back, WireId::Qubit(q)), names_on(&dag, WireId::Qubit(q)));
        }
    }

    #[test]
    fn reversing_twice_restores(dag in arb_dag()) {
        let twice = dag.reversed().unwrap().reversed().unwrap();
        prop_assert_eq!(&twice, &dag);
    }
}
