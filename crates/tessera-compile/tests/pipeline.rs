//! End-to-end tests for the preset pipeline.

mod common;

use std::sync::Arc;

use proptest::prelude::*;
use tessera_compile::passes::target::{SCHEDULE, Schedule};
use tessera_compile::{
    BasisGates, CancellationToken, CompileError, CouplingMap, InstructionProperties, LayoutMethod, PassManager,
    PassManagerBuilder, PresetStages, SchedulingMethod, Stage, StageRegistry, Target, TranspileConfig, matrix,
    transpile,
};
use tessera_ir::{Circuit, CircuitDag, QubitId};

use common::{placed, undo_permutation};

fn ibm(coupling: CouplingMap) -> Arc<Target> {
    Arc::new(Target::from_coupling(coupling, &BasisGates::ibm()))
}

#[derive(Debug, Clone)]
enum Op {
    H(u32),
    T(u32),
    Rx(u32, f64),
    Cx(u32, u32),
    Cz(u32, u32),
    Ccx(u32, u32, u32),
}

fn arb_circuit() -> impl Strategy<Value = CircuitDag> {
    (3u32..=5).prop_flat_map(|n| {
        let op = prop_oneof![
            (0..n).prop_map(Op::H),
            (0..n).prop_map(Op::T),
            ((0..n), -3.0..3.0f64).prop_map(|(q, t)| Op::Rx(q, t)),
            (0..n, 1..n).prop_map(move |(a, d)| Op::Cx(a, (a + d) % n)),
            (0..n, 1..n).prop_map(move |(a, d)| Op::Cz(a, (a + d) % n)),
            (0..n).prop_map(move |a| Op::Ccx(a, (a + 1) % n, (a + 2) % n)),
        ];
        prop::collection::vec(op, 1..12).prop_map(move |ops| {
            let mut circuit = Circuit::with_size("random", n as usize, 0);
            for op in ops {
                match op {
                    Op::H(q) => circuit.h(QubitId(q)),
                    Op::T(q) => circuit.t(QubitId(q)),
                    Op::Rx(q, t) => circuit.rx(t, QubitId(q)),
                    Op::Cx(a, b) => circuit.cx(QubitId(a), QubitId(b)),
                    Op::Cz(a, b) => circuit.cz(QubitId(a), QubitId(b)),
                    Op::Ccx(a, b, c) => circuit.ccx(QubitId(a), QubitId(b), QubitId(c)),
                }
                .unwrap();
            }
            circuit.into_dag()
        })
    })
}

#[derive(Debug, Clone)]
enum NativeOp {
    Rz(u32, f64),
    Sx(u32),
    X(u32),
    Cx(u32, bool),
}

/// Circuits on a line of four already in the IBM basis and on coupled pairs.
fn arb_native_circuit() -> impl Strategy<Value = CircuitDag> {
    let op = prop_oneof![
        ((0u32..4), -3.0..3.0f64).prop_map(|(q, t)| NativeOp::Rz(q, t)),
        (0u32..4).prop_map(NativeOp::Sx),
        (0u32..4).prop_map(NativeOp::X),
        ((0u32..3), any::<bool>()).prop_map(|(q, up)| NativeOp::Cx(q, up)),
    ];
    prop::collection::vec(op, 1..16).prop_map(|ops| {
        let mut circuit = Circuit::with_size("native", 4, 0);
        for op in ops {
            match op {
                NativeOp::Rz(q, t) => circuit.rz(t, QubitId(q)),
                NativeOp::Sx(q) => circuit.sx(QubitId(q)),
                NativeOp::X(q) => circuit.x(QubitId(q)),
                NativeOp::Cx(q, true) => circuit.cx(QubitId(q), QubitId(q + 1)),
                NativeOp::Cx(q, false) => circuit.cx(QubitId(q + 1), QubitId(q)),
            }
            .unwrap();
        }
        circuit.into_dag()
    })
}

/// Operations along each wire, which node indices do not affect.
fn wire_ops(dag: &CircuitDag) -> Vec<(String, Vec<u32>)> {
    dag.topological_ops()
        .map(|(_, inst)| (inst.name().to_string(), inst.qubits.iter().map(|q| q.0).collect()))
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn transpile_is_idempotent(dag in arb_circuit(), level in 0u8..=3) {
        let target = ibm(CouplingMap::grid(2, 3));
        let config = TranspileConfig { seed: 11, ..TranspileConfig::with_optimization_level(level) };
        let once = transpile(dag, target.clone(), &config).unwrap();
        let twice = transpile(once.dag.clone(), target, &config).unwrap();
        prop_assert_eq!(&twice.dag, &once.dag);
    }

    #[test]
    fn native_circuit_comes_back_unchanged(dag in arb_native_circuit()) {
        let config = TranspileConfig {
            layout_method: LayoutMethod::Trivial,
            ..TranspileConfig::with_optimization_level(0)
        };
        let out = transpile(dag.clone(), ibm(CouplingMap::linear(4)), &config).unwrap();
        prop_assert_eq!(wire_ops(&out.dag), wire_ops(&dag));
        let distance = matrix::distance_up_to_phase(
            &matrix::dag_unitary(&dag).unwrap(),
            &matrix::dag_unitary(&out.dag).unwrap(),
        );
        prop_assert!(distance < 1e-9, "off by {}", distance);
    }

    #[test]
    fn transpiled_circuit_is_equivalent(dag in arb_circuit(), level in 0u8..=3) {
        let coupling = CouplingMap::grid(2, 3);
        let target = ibm(coupling.clone());
        let config = TranspileConfig { seed: 7, ..TranspileConfig::with_optimization_level(level) };
        let out = transpile(dag.clone(), target.clone(), &config).unwrap();

        for (_, inst) in out.dag.topological_ops() {
            prop_assert!(target.supports(inst.name()), "{} not in basis", inst.name());
        }
        for (_, a, b) in out.dag.two_qubit_ops() {
            prop_assert!(coupling.is_connected(a.0, b.0));
        }

        let p = coupling.num_qubits();
        let mut initial = out.initial_layout().unwrap().clone();
        initial.fill_ancillas(p);
        let expected = placed(&dag, &initial, p);
        let mut routed = out.dag.clone();
        undo_permutation(&mut routed, &initial, out.final_layout().unwrap());

        let distance = matrix::distance_up_to_phase(
            &matrix::dag_unitary(&expected).unwrap(),
            &matrix::dag_unitary(&routed).unwrap(),
        );
        prop_assert!(distance < 1e-6, "off by {}", distance);
    }
}

#[test]
fn test_optimization_is_idempotent() {
    common::init_tracing();
    let config = TranspileConfig::with_optimization_level(2);
    let dag = Circuit::qft(4).unwrap().into_dag();
    let out = transpile(dag, ibm(CouplingMap::linear(5)), &config).unwrap();

    let mut pm = PassManager::new();
    for group in PresetStages::new(config).resolve(Stage::Optimization).unwrap() {
        pm.add_group(group);
    }
    let mut again = out.dag.clone();
    let mut props = out.properties.clone();
    pm.run(&mut again, &mut props).unwrap();
    assert_eq!(again, out.dag);
}

#[test]
fn test_one_way_coupling_respected() {
    common::init_tracing();
    let mut builder = Target::builder(3);
    for name in ["rz", "sx", "x", "measure"] {
        builder = builder.add_global(name);
    }
    for pair in [[0, 1], [1, 2]] {
        builder = builder.add_instruction("cx", Some(pair.to_vec()), InstructionProperties::default());
    }
    let target = Arc::new(builder.build().unwrap());

    let mut circuit = Circuit::with_size("reversed", 3, 0);
    circuit.cx(QubitId(1), QubitId(0)).unwrap().cx(QubitId(0), QubitId(2)).unwrap();
    let dag = circuit.into_dag();
    let config = TranspileConfig {
        layout_method: LayoutMethod::Trivial,
        ..TranspileConfig::default()
    };
    let out = transpile(dag.clone(), target.clone(), &config).unwrap();

    for (_, inst) in out.dag.topological_ops() {
        let qargs: Vec<u32> = inst.qubits.iter().map(|q| q.0).collect();
        assert!(target.instruction_supported(inst.name(), &qargs), "{} on {qargs:?}", inst.name());
    }
    let mut initial = out.initial_layout().unwrap().clone();
    initial.fill_ancillas(3);
    let expected = placed(&dag, &initial, 3);
    let mut routed = out.dag.clone();
    undo_permutation(&mut routed, &initial, out.final_layout().unwrap());
    let distance = matrix::distance_up_to_phase(
        &matrix::dag_unitary(&expected).unwrap(),
        &matrix::dag_unitary(&routed).unwrap(),
    );
    assert!(distance < 1e-6, "off by {distance}");
}

#[test]
fn test_measurements_survive() {
    common::init_tracing();
    let mut circuit = Circuit::bell().unwrap();
    circuit.measure_all().unwrap();
    let out = transpile(circuit.into_dag(), ibm(CouplingMap::linear(3)), &TranspileConfig::default()).unwrap();

    let counts = out.dag.count_ops();
    assert_eq!(counts.get("measure"), Some(&2));
    assert_eq!(counts.get("cx"), Some(&1));
    assert_eq!(out.dag.num_clbits(), 2);
}

#[test]
fn test_scheduling_covers_every_operation() {
    common::init_tracing();
    let config = TranspileConfig {
        scheduling: Some(SchedulingMethod::Alap),
        ..TranspileConfig::default()
    };
    let out = transpile(Circuit::ghz(3).unwrap().into_dag(), ibm(CouplingMap::linear(3)), &config).unwrap();

    let schedule = out.properties.get::<Schedule>(SCHEDULE).unwrap();
    assert_eq!(schedule.method, SchedulingMethod::Alap);
    for node in out.dag.topological_op_nodes() {
        assert!(schedule.start(node).is_some());
    }
}

#[test]
fn test_cancelled_run_keeps_input() {
    common::init_tracing();
    let pm = PassManagerBuilder::new().build().unwrap();
    let before = Circuit::ghz(3).unwrap().into_dag();
    let mut dag = before.clone();
    let mut props = tessera_compile::PropertySet::new().with_target(ibm(CouplingMap::linear(3)));
    let token = CancellationToken::new();
    token.cancel();

    let result = pm.run_with_cancellation(&mut dag, &mut props, &token);
    assert!(matches!(result, Err(CompileError::Cancelled)));
    assert_eq!(dag, before);
    assert!(props.layout.is_none());
}
