//! Tests for optimization passes.

use std::f64::consts::PI;
use std::sync::Arc;

use tessera_ir::{Circuit, ClbitId, CircuitDag, QubitId};

use crate::matrix;
use crate::pass::Pass;
use crate::property::PropertySet;
use crate::target::{BasisGates, CouplingMap, Target};
use crate::unitary::OneQubitBasis;

use super::{CancelCX, MergeAdjacentBarriers, Optimize1qGates, RemoveDiagonalGatesBeforeMeasure};

fn run(pass: &dyn Pass, dag: &mut CircuitDag) -> bool {
    pass.run(dag, &mut PropertySet::new()).unwrap().is_changed()
}

fn assert_same_unitary(a: &CircuitDag, b: &CircuitDag) {
    let (ua, ub) = (matrix::dag_unitary(a).unwrap(), matrix::dag_unitary(b).unwrap());
    assert!(matrix::distance(&ua, &ub) < 1e-9, "off by {}", matrix::distance(&ua, &ub));
}

#[test]
fn test_optimize_1q_hh_cancels() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.h(QubitId(0)).unwrap();
    let mut dag = circuit.into_dag();

    assert!(run(&Optimize1qGates::new(), &mut dag));
    assert_eq!(dag.num_ops(), 0);
}

#[test]
fn test_optimize_1q_reduces_count_and_keeps_unitary() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.t(QubitId(0)).unwrap();
    circuit.t(QubitId(0)).unwrap();
    circuit.h(QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.s(QubitId(1)).unwrap();
    circuit.sx(QubitId(1)).unwrap();
    circuit.rz(0.4, QubitId(1)).unwrap();
    circuit.x(QubitId(1)).unwrap();
    let before = circuit.into_dag();
    let mut dag = before.clone();

    assert!(run(&Optimize1qGates::new(), &mut dag));
    assert!(dag.num_ops() <= 7, "got {}", dag.num_ops());
    assert_same_unitary(&before, &dag);
}

#[test]
fn test_optimize_1q_is_idempotent() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.t(QubitId(0)).unwrap();
    circuit.sx(QubitId(0)).unwrap();
    let mut dag = circuit.into_dag();

    let pass = Optimize1qGates::with_basis(OneQubitBasis::ZSX);
    pass.run(&mut dag, &mut PropertySet::new()).unwrap();
    let once = dag.clone();
    assert!(!run(&pass, &mut dag));
    assert_eq!(dag, once);
}

#[test]
fn test_optimize_1q_translates_into_target_basis() {
    let target = Arc::new(Target::from_coupling(CouplingMap::linear(1), &BasisGates::ibm()));
    let mut props = PropertySet::new().with_target(target);
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.h(QubitId(0)).unwrap();
    let before = circuit.into_dag();
    let mut dag = before.clone();

    Optimize1qGates::new().run(&mut dag, &mut props).unwrap();
    assert!(dag.topological_ops().all(|(_, i)| matches!(i.name(), "rz" | "sx")));
    assert_same_unitary(&before, &dag);
}

#[test]
fn test_optimize_1q_stops_at_symbolic() {
    let mut circuit = Circuit::with_size("test", 1, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.rz(tessera_ir::ParameterExpression::symbol("a"), QubitId(0)).unwrap();
    circuit.h(QubitId(0)).unwrap();
    let mut dag = circuit.into_dag();
    assert!(!run(&Optimize1qGates::new(), &mut dag));
    assert_eq!(dag.num_ops(), 3);
}

#[test]
fn test_cancel_cx_adjacent() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    let mut dag = circuit.into_dag();

    assert!(run(&CancelCX::new(), &mut dag));
    assert_eq!(dag.num_ops(), 0);
}

#[test]
fn test_cancel_cx_not_adjacent() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.h(QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    let mut dag = circuit.into_dag();

    assert!(!run(&CancelCX::new(), &mut dag));
    assert_eq!(dag.num_ops(), 3);
}

#[test]
fn test_cancel_cx_reversed_operands() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.cx(QubitId(1), QubitId(0)).unwrap();
    circuit.cz(QubitId(0), QubitId(1)).unwrap();
    circuit.cz(QubitId(1), QubitId(0)).unwrap();
    let mut dag = circuit.into_dag();

    CancelCX::new().run(&mut dag, &mut PropertySet::new()).unwrap();
    assert_eq!(dag.count_ops().get("cx"), Some(&2));
    assert_eq!(dag.count_ops().get("cz"), None);
}

#[test]
fn test_cancel_cx_nested_pairs() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    circuit.swap(QubitId(0), QubitId(1)).unwrap();
    circuit.swap(QubitId(1), QubitId(0)).unwrap();
    circuit.cx(QubitId(0), QubitId(1)).unwrap();
    let mut dag = circuit.into_dag();

    CancelCX::new().run(&mut dag, &mut PropertySet::new()).unwrap();
    assert_eq!(dag.num_ops(), 0);
}

#[test]
fn test_remove_diagonal_before_measure() {
    let mut circuit = Circuit::with_size("test", 2, 2);
    circuit.h(QubitId(0)).unwrap();
    circuit.rz(PI / 3.0, QubitId(0)).unwrap();
    circuit.t(QubitId(0)).unwrap();
    circuit.cz(QubitId(0), QubitId(1)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit.measure(QubitId(1), ClbitId(1)).unwrap();
    let mut dag = circuit.into_dag();

    assert!(run(&RemoveDiagonalGatesBeforeMeasure, &mut dag));
    let counts = dag.count_ops();
    assert_eq!(counts.get("h"), Some(&1));
    assert_eq!(counts.get("measure"), Some(&2));
    assert_eq!(dag.num_ops(), 3);
}

#[test]
fn test_diagonal_kept_when_not_measured() {
    let mut circuit = Circuit::with_size("test", 2, 1);
    circuit.cz(QubitId(0), QubitId(1)).unwrap();
    circuit.measure(QubitId(0), ClbitId(0)).unwrap();
    circuit.h(QubitId(1)).unwrap();
    let mut dag = circuit.into_dag();

    assert!(!run(&RemoveDiagonalGatesBeforeMeasure, &mut dag));
    assert_eq!(dag.num_ops(), 3);
}

#[test]
fn test_merge_adjacent_barriers() {
    let mut circuit = Circuit::with_size("test", 3, 0);
    circuit.h(QubitId(0)).unwrap();
    circuit.barrier([QubitId(0), QubitId(1)]).unwrap();
    circuit.barrier([QubitId(1), QubitId(2)]).unwrap();
    circuit.x(QubitId(2)).unwrap();
    let mut dag = circuit.into_dag();

    assert!(run(&MergeAdjacentBarriers, &mut dag));
    let barriers: Vec<_> = dag
        .topological_ops()
        .filter(|(_, i)| i.is_barrier())
        .map(|(_, i)| i.qubits.clone())
        .collect();
    assert_eq!(barriers, vec![vec![QubitId(0), QubitId(1), QubitId(2)]]);
    assert_eq!(dag.num_ops(), 3);
}

#[test]
fn test_barriers_with_gate_between_stay() {
    let mut circuit = Circuit::with_size("test", 2, 0);
    circuit.barrier([QubitId(0), QubitId(1)]).unwrap();
    circuit.h(QubitId(1)).unwrap();
    circuit.barrier([QubitId(1)]).unwrap();
    let mut dag = circuit.into_dag();

    assert!(!run(&MergeAdjacentBarriers, &mut dag));
    assert_eq!(dag.num_ops(), 3);
}
