//! Layout passes for mapping logical qubits to physical qubits.
//!
//! Layout passes are analyses: they leave the DAG alone and store the chosen
//! mapping in [`PropertySet::layout`]. Each one skips when a layout is
//! already set. On a circuit that is already at physical level they install
//! the identity mapping of its qubit ids.

mod dense;
mod sabre;

pub use dense::InteractionLayout;
pub use sabre::SabreLayout;

pub(crate) use dense::dense_start;

use tessera_ir::{CircuitDag, CircuitLevel, QubitId};

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::{Layout, PropertySet};
use crate::target::Target;

/// Device size, or `CircuitTooLarge` when the circuit does not fit.
pub(crate) fn check_fits(dag: &CircuitDag, target: &Target) -> CompileResult<u32> {
    let available = target.num_qubits();
    if dag.num_qubits() > available as usize {
        return Err(CompileError::CircuitTooLarge {
            required: dag.num_qubits(),
            available: available as usize,
        });
    }
    Ok(available)
}

/// Identity mapping for a circuit whose qubit ids are already physical.
pub(crate) fn identity_layout(dag: &CircuitDag, num_physical: u32) -> CompileResult<Layout> {
    let mut layout = Layout::new();
    for q in dag.qubits() {
        if q.0 >= num_physical {
            return Err(CompileError::CircuitTooLarge {
                required: q.0 as usize + 1,
                available: num_physical as usize,
            });
        }
        layout.add(q, q.0);
    }
    Ok(layout)
}

/// `layout` restricted to `qubits`, dropping ancillas.
pub(crate) fn restrict(layout: &Layout, qubits: &[QubitId]) -> Layout {
    let mut restricted = Layout::new();
    for &q in qubits {
        if let Some(p) = layout.get_physical(q) {
            restricted.add(q, p);
        }
    }
    restricted
}

/// An empty physical circuit with one wire per device qubit and the
/// classical wires, name and phase of `dag`.
pub(crate) fn empty_physical_like(dag: &CircuitDag, num_physical: u32) -> CircuitDag {
    let mut out = CircuitDag::new();
    for p in 0..num_physical {
        out.add_qubit(QubitId(p));
    }
    for clbit in dag.clbits() {
        out.add_clbit(clbit);
    }
    if let Some(name) = dag.name() {
        out.set_name(name);
    }
    out.set_global_phase(dag.global_phase());
    out.set_level(CircuitLevel::Physical);
    out
}

/// Trivial layout pass.
///
/// Maps the i-th logical qubit to physical qubit i.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrivialLayout;

impl Pass for TrivialLayout {
    fn name(&self) -> &str {
        "TrivialLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    #[allow(clippy::cast_possible_truncation)]
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?;
        let num_physical = check_fits(dag, target)?;

        let layout = if dag.level() == CircuitLevel::Physical {
            identity_layout(dag, num_physical)?
        } else {
            let mut layout = Layout::new();
            for (i, q) in dag.qubits().enumerate() {
                layout.add(q, i as u32);
            }
            layout
        };
        properties.layout = Some(layout);
        Ok(PassOutcome::Unchanged)
    }

    fn should_run(&self, _dag: &CircuitDag, properties: &PropertySet) -> bool {
        properties.layout.is_none()
    }
}

/// Installs a user-supplied layout after checking it against the circuit
/// and the target.
#[derive(Debug, Clone)]
pub struct SetLayout {
    layout: Layout,
}

impl SetLayout {
    /// Pass installing `layout`.
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }
}

impl Pass for SetLayout {
    fn name(&self) -> &str {
        "SetLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?;
        let num_physical = check_fits(dag, target)?;
        self.layout.validate(dag.qubits(), num_physical)?;
        properties.layout = Some(self.layout.clone());
        Ok(PassOutcome::Unchanged)
    }
}

/// Rewrites the circuit onto physical qubits through the current layout,
/// without inserting swaps.
///
/// Used when routing is skipped. The output has one wire per device qubit,
/// and `final_layout` is the initial layout completed with ancillas. A strict
/// pass rejects two-qubit operations that land on uncoupled qubits.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyLayout {
    strict: bool,
}

impl ApplyLayout {
    /// Apply the layout as is.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the layout and require every interaction to be on a coupling.
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

impl Pass for ApplyLayout {
    fn name(&self) -> &str {
        "ApplyLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?.clone();
        let num_physical = target.num_qubits();
        let mut layout = properties.require_layout(self.name())?.clone();
        layout.validate(dag.qubits(), num_physical)?;
        layout.fill_ancillas(num_physical);

        let mut out = empty_physical_like(dag, num_physical);
        for (_, inst) in dag.topological_ops() {
            let mut mapped = inst.clone();
            mapped.qubits = inst
                .qubits
                .iter()
                .map(|&q| {
                    layout
                        .get_physical(q)
                        .map(QubitId)
                        .ok_or_else(|| CompileError::InvalidLayout(format!("{q} is not placed")))
                })
                .collect::<CompileResult<_>>()?;
            if let [a, b] = mapped.qubits[..] {
                if self.strict && mapped.is_interaction() && !target.coupling_map().is_connected(a.0, b.0) {
                    return Err(CompileError::pass(
                        self.name(),
                        format!("{} on uncoupled physical qubits {} and {}", mapped.name(), a.0, b.0),
                    ));
                }
            }
            out.apply(mapped)?;
        }

        let changed = out != *dag;
        *dag = out;
        properties.final_layout = Some(layout);
        Ok(PassOutcome::from_changed(changed))
    }

    fn check_preconditions(&self, _dag: &CircuitDag, properties: &PropertySet) -> Result<(), String> {
        if properties.layout.is_none() {
            return Err("no layout chosen; run a layout pass first".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::target::{BasisGates, CouplingMap};
    use tessera_ir::Circuit;

    fn props(n: u32) -> PropertySet {
        PropertySet::new().with_target(Arc::new(Target::from_coupling(CouplingMap::linear(n), &BasisGates::ibm())))
    }

    #[test]
    fn test_trivial_layout() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.h(QubitId(0)).unwrap();
        let mut dag = circuit.into_dag();
        let mut props = props(5);

        TrivialLayout.run(&mut dag, &mut props).unwrap();

        let layout = props.layout.as_ref().unwrap();
        assert_eq!(layout.len(), 3);
        for i in 0..3 {
            assert_eq!(layout.get_physical(QubitId(i)), Some(i));
        }
        assert_eq!(dag.level(), CircuitLevel::Logical);
    }

    #[test]
    fn test_trivial_layout_too_large() {
        let mut dag = Circuit::with_size("test", 4, 0).into_dag();
        match TrivialLayout.run(&mut dag, &mut props(3)) {
            Err(CompileError::CircuitTooLarge { required, available }) => {
                assert_eq!((required, available), (4, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_physical_circuit_gets_identity() {
        let mut dag = CircuitDag::new();
        dag.add_qubit(QubitId(2));
        dag.add_qubit(QubitId(4));
        dag.set_level(CircuitLevel::Physical);
        let mut props = props(5);

        TrivialLayout.run(&mut dag, &mut props).unwrap();
        let layout = props.layout.unwrap();
        assert_eq!(layout.get_physical(QubitId(2)), Some(2));
        assert_eq!(layout.get_physical(QubitId(4)), Some(4));
    }

    #[test]
    fn test_set_layout_validates() {
        let mut dag = Circuit::with_size("test", 2, 0).into_dag();
        let mut props = props(3);
        assert!(matches!(
            SetLayout::new(Layout::from_physical(&[1, 1])).run(&mut dag, &mut props),
            Err(CompileError::InvalidLayout(_))
        ));
        assert!(matches!(
            SetLayout::new(Layout::from_physical(&[0, 7])).run(&mut dag, &mut props),
            Err(CompileError::InvalidLayout(_))
        ));
        SetLayout::new(Layout::from_physical(&[2, 0])).run(&mut dag, &mut props).unwrap();
        assert_eq!(props.layout.unwrap().get_physical(QubitId(0)), Some(2));
    }

    #[test]
    fn test_apply_layout() {
        let mut circuit = Circuit::with_size("test", 2, 1);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        circuit.measure(QubitId(1), tessera_ir::ClbitId(0)).unwrap();
        let mut dag = circuit.into_dag();
        let mut props = props(3).with_layout(Layout::from_physical(&[2, 1]));

        ApplyLayout::new().run(&mut dag, &mut props).unwrap();
        assert_eq!(dag.num_qubits(), 3);
        assert_eq!(dag.level(), CircuitLevel::Physical);
        let ops: Vec<_> = dag.topological_ops().map(|(_, i)| i.qubits.clone()).collect();
        assert_eq!(ops, vec![vec![QubitId(2), QubitId(1)], vec![QubitId(1)]]);
        let final_layout = props.final_layout.unwrap();
        assert!(final_layout.is_injective());
        assert_eq!(final_layout.len(), 3);
    }

    #[test]
    fn test_strict_apply_layout_rejects_uncoupled() {
        let mut circuit = Circuit::with_size("test", 3, 0);
        circuit.cx(QubitId(0), QubitId(2)).unwrap();
        let dag = circuit.into_dag();
        let mut props = props(3).with_layout(Layout::trivial(3));

        assert!(ApplyLayout::new().run(&mut dag.clone(), &mut props.clone()).is_ok());
        match ApplyLayout::strict().run(&mut dag.clone(), &mut props) {
            Err(CompileError::Transpiler { pass, .. }) => assert_eq!(pass, "ApplyLayout"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
