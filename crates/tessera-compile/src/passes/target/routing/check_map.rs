//! Connectivity check.

use tessera_ir::{CircuitDag, CircuitLevel, QubitId};

use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;

/// Property key written by [`CheckMap`].
pub const IS_SWAP_MAPPED: &str = "is_swap_mapped";

/// Records under `is_swap_mapped` whether every two-qubit operation already
/// sits on a coupled pair.
///
/// Physical circuits are checked as they are. Logical circuits are checked
/// through the current layout, and count as unmapped when there is none.
/// An interaction on three or more qubits is never mapped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckMap;

impl CheckMap {
    /// Whether `dag` fits the target's coupling map in `properties`.
    pub fn is_mapped(dag: &CircuitDag, properties: &PropertySet) -> bool {
        let Some(target) = properties.target.as_deref() else {
            return false;
        };
        let physical = |q: QubitId| match dag.level() {
            CircuitLevel::Physical => Some(q.0),
            CircuitLevel::Logical => properties.layout.as_ref()?.get_physical(q),
        };
        dag.topological_ops()
            .filter(|(_, inst)| inst.is_interaction())
            .all(|(_, inst)| match inst.qubits.as_slice() {
                &[a, b] => match (physical(a), physical(b)) {
                    (Some(a), Some(b)) => target.coupling_map().is_connected(a, b),
                    _ => false,
                },
                _ => false,
            })
    }
}

impl Pass for CheckMap {
    fn name(&self) -> &str {
        "CheckMap"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let mapped = Self::is_mapped(dag, properties);
        properties.insert(IS_SWAP_MAPPED, mapped);
        Ok(PassOutcome::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::property::Layout;
    use crate::target::{BasisGates, CouplingMap, Target};
    use tessera_ir::Circuit;

    fn props(layout: Layout) -> PropertySet {
        let target = Arc::new(Target::from_coupling(CouplingMap::linear(3), &BasisGates::ibm()));
        PropertySet::new().with_target(target).with_layout(layout)
    }

    fn check(dag: &CircuitDag, mut properties: PropertySet) -> bool {
        let mut dag = dag.clone();
        CheckMap.run(&mut dag, &mut properties).unwrap();
        *properties.get::<bool>(IS_SWAP_MAPPED).unwrap()
    }

    #[test]
    fn test_check_map_through_layout() {
        let mut c = Circuit::with_size("test", 3, 0);
        c.cx(QubitId(0), QubitId(2)).unwrap();
        assert!(!check(c.dag(), props(Layout::trivial(3))));
        assert!(check(c.dag(), props(Layout::from_physical(&[0, 2, 1]))));
    }

    #[test]
    fn test_check_map_without_layout() {
        let mut c = Circuit::with_size("test", 2, 0);
        c.cx(QubitId(0), QubitId(1)).unwrap();
        let mut properties = props(Layout::trivial(2));
        properties.layout = None;
        assert!(!check(c.dag(), properties));
    }

    #[test]
    fn test_single_qubit_circuit_is_mapped() {
        let mut c = Circuit::with_size("test", 3, 0);
        c.h(QubitId(2)).unwrap();
        assert!(check(c.dag(), props(Layout::trivial(3))));
    }
}
