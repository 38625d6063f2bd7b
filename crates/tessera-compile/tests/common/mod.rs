//! Helpers shared by the integration tests.

#![allow(dead_code)]

use tessera_compile::Layout;
use tessera_ir::{CircuitDag, Instruction, QubitId, StandardGate};
use tracing_subscriber::EnvFilter;

/// Route pass logs to the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// The input mapped onto physical wires through `layout`.
pub fn placed(dag: &CircuitDag, layout: &Layout, num_physical: u32) -> CircuitDag {
    let mut out = CircuitDag::new();
    for p in 0..num_physical {
        out.add_qubit(QubitId(p));
    }
    for (_, inst) in dag.topological_ops() {
        let mut mapped = inst.clone();
        mapped.qubits = inst.qubits.iter().map(|&q| QubitId(layout.get_physical(q).unwrap())).collect();
        out.apply(mapped).unwrap();
    }
    out.set_global_phase(dag.global_phase());
    out
}

/// Append swaps moving every qubit from its final position back to its
/// initial one.
pub fn undo_permutation(routed: &mut CircuitDag, initial: &Layout, final_layout: &Layout) {
    let mut current = final_layout.clone();
    for (logical, start) in initial.iter() {
        let now = current.get_physical(logical).unwrap();
        if now != start {
            routed
                .apply(Instruction::two_qubit_gate(StandardGate::Swap, QubitId(now), QubitId(start)))
                .unwrap();
            current.swap(now, start);
        }
    }
}
