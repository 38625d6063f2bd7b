//! High-level synthesis.
//!
//! [`HighLevelSynthesis`] replaces every abstract operation in a DAG by a
//! circuit of standard gates. Operations are dispatched by class through a
//! [`SynthesisRegistry`]; compound blocks are inlined.

mod linear;
mod mcx;
mod pauli;
mod permutation;
mod qsd;
mod two_qubit;

use std::collections::BTreeMap;
use std::sync::Arc;

use tessera_ir::{CircuitDag, GateKind, HighLevelOp, InstructionKind, NodeIndex, QubitId};
use tracing::{debug, trace};

use crate::error::{CompileError, CompileResult};
use crate::matrix::{self, Operator};
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;
use crate::registry::{PluginRegistry, SynthesisContext, SynthesisRegistry};
use crate::unitary::{OneQubitBasis, Unitary2x2};

pub use linear::GaussianLinear;
pub use mcx::RecursiveMultiControlled;
pub use pauli::PauliLadder;
pub use permutation::CycleSwapNetwork;
pub use qsd::ShannonUnitary;
pub use two_qubit::KakUnitary;

/// Bound on expansions in one run, so a method that emits what it was asked
/// to synthesise cannot loop forever.
const MAX_EXPANSIONS: usize = 100_000;

/// Resolves and runs synthesis methods for one operation.
#[derive(Clone)]
pub struct SynthesisDispatcher {
    registry: Arc<dyn SynthesisRegistry>,
    configured: BTreeMap<String, String>,
}

impl SynthesisDispatcher {
    /// Dispatch through `registry`.
    pub fn new(registry: Arc<dyn SynthesisRegistry>) -> Self {
        Self {
            registry,
            configured: BTreeMap::new(),
        }
    }

    /// Preferred method per class.
    #[must_use]
    pub fn with_methods(mut self, methods: BTreeMap<String, String>) -> Self {
        self.configured = methods;
        self
    }

    /// Method names to try for `class`, in order: the override, the
    /// configured method, `default`, then the rest in registration order.
    pub fn candidates(&self, class: &str, override_method: Option<&str>) -> Vec<String> {
        let mut order: Vec<String> = Vec::new();
        let preferred = override_method
            .into_iter()
            .chain(self.configured.get(class).map(String::as_str))
            .chain(std::iter::once("default"))
            .map(str::to_string);
        for name in preferred.chain(self.registry.methods(class)) {
            if !order.contains(&name) {
                order.push(name);
            }
        }
        order
    }

    /// Synthesise `op`, returning the method used and its circuit.
    ///
    /// Fails with [`CompileError::InvalidConfiguration`] when the override
    /// or the configured method for the class is not registered, and with
    /// [`CompileError::SynthesisUnavailable`] naming the class and every
    /// method asked when all decline.
    pub fn synthesize(
        &self,
        op: &HighLevelOp,
        context: &SynthesisContext<'_>,
        override_method: Option<&str>,
    ) -> CompileResult<(String, CircuitDag)> {
        let class = op.class_name();
        let explicit = override_method.into_iter().chain(self.configured.get(class).map(String::as_str));
        for name in explicit {
            if self.registry.resolve(class, name).is_none() {
                return Err(CompileError::InvalidConfiguration(format!(
                    "synthesis method {class}/{name} is not registered"
                )));
            }
        }
        let mut tried = Vec::new();
        for name in self.candidates(class, override_method) {
            let Some(method) = self.registry.resolve(class, &name) else {
                continue;
            };
            trace!("Trying synthesis method {class}/{name}");
            tried.push(name.clone());
            if let Some(dag) = method.synthesize(op, context)? {
                if dag.num_qubits() != op.num_qubits() {
                    return Err(CompileError::pass(
                        "HighLevelSynthesis",
                        format!(
                            "method {class}/{name} returned {} qubits for a {}-qubit operation",
                            dag.num_qubits(),
                            op.num_qubits()
                        ),
                    ));
                }
                return Ok((name, dag));
            }
        }
        Err(CompileError::SynthesisUnavailable {
            operation: class.to_string(),
            tried,
        })
    }
}

impl std::fmt::Debug for SynthesisDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SynthesisDispatcher")
            .field("configured", &self.configured)
            .finish_non_exhaustive()
    }
}

/// Replaces high-level operations, custom gates with a matrix, and compound
/// blocks by standard gates.
///
/// Every synthesised operator is checked against the original within the
/// tolerance, up to global phase; the circuit's global phase is kept exact.
#[derive(Debug, Clone)]
pub struct HighLevelSynthesis {
    dispatcher: SynthesisDispatcher,
    overrides: BTreeMap<String, String>,
    tolerance: f64,
}

impl Default for HighLevelSynthesis {
    fn default() -> Self {
        Self::new(Arc::new(PluginRegistry::with_builtin_methods()))
    }
}

impl HighLevelSynthesis {
    /// Synthesis through `registry` with a `1e-9` tolerance.
    pub fn new(registry: Arc<dyn SynthesisRegistry>) -> Self {
        Self {
            dispatcher: SynthesisDispatcher::new(registry),
            overrides: BTreeMap::new(),
            tolerance: 1e-9,
        }
    }

    /// Preferred method per class.
    #[must_use]
    pub fn with_methods(mut self, methods: BTreeMap<String, String>) -> Self {
        self.dispatcher = self.dispatcher.with_methods(methods);
        self
    }

    /// Force `method` for `class` ahead of any configured choice.
    #[must_use]
    pub fn with_override(mut self, class: impl Into<String>, method: impl Into<String>) -> Self {
        self.overrides.insert(class.into(), method.into());
        self
    }

    /// Accepted distance between an operator and its synthesis.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// What a node needs, if anything.
    fn expansion(kind: &InstructionKind) -> Option<Expansion> {
        match kind {
            InstructionKind::HighLevel(op) => Some(Expansion::Synthesize(op.clone())),
            InstructionKind::Gate(gate) => match &gate.kind {
                GateKind::Custom(custom) => custom.matrix.as_ref().map(|m| {
                    Expansion::Synthesize(HighLevelOp::Unitary {
                        num_qubits: custom.num_qubits,
                        matrix: m.clone(),
                    })
                }),
                GateKind::Standard(_) => None,
            },
            InstructionKind::Compound { body, .. } => Some(Expansion::Inline(body.as_ref().clone())),
            _ => None,
        }
    }

    fn synthesize(&self, op: &HighLevelOp, context: &SynthesisContext<'_>) -> CompileResult<CircuitDag> {
        op.validate()?;
        let class = op.class_name();
        let override_method = self.overrides.get(class).map(String::as_str);
        let (method, dag) = self.dispatcher.synthesize(op, context, override_method)?;
        if op.num_qubits() <= matrix::MAX_DENSE_QUBITS {
            if let (Some(expected), Some(got)) = (matrix::high_level_matrix(op), matrix::dag_unitary(&dag)) {
                let distance = matrix::distance_up_to_phase(&expected, &got);
                if distance > self.tolerance {
                    return Err(CompileError::SynthesisInaccurate {
                        operation: class.to_string(),
                        method,
                        distance,
                    });
                }
            }
        }
        debug!("Synthesised {class} with {method}: {} ops", dag.num_ops());
        Ok(dag)
    }
}

enum Expansion {
    Synthesize(HighLevelOp),
    Inline(CircuitDag),
}

impl Pass for HighLevelSynthesis {
    fn name(&self) -> &str {
        "HighLevelSynthesis"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let mut context = SynthesisContext::new(self.tolerance);
        if let Some(target) = properties.target.as_deref() {
            context = context.with_target(target);
        }

        let mut worklist: Vec<NodeIndex> = dag.topological_op_nodes().collect();
        worklist.reverse();
        let mut expansions = 0usize;
        while let Some(node) = worklist.pop() {
            let Some(inst) = dag.get_instruction(node) else {
                continue;
            };
            let Some(expansion) = Self::expansion(&inst.kind) else {
                continue;
            };
            expansions += 1;
            if expansions > MAX_EXPANSIONS {
                return Err(CompileError::pass(self.name(), "synthesis does not terminate"));
            }
            let replacement = match expansion {
                Expansion::Synthesize(op) => self.synthesize(&op, &context)?,
                Expansion::Inline(body) => body,
            };
            let new_nodes = dag.substitute(node, &replacement)?;
            worklist.extend(new_nodes.into_iter().rev());
        }
        Ok(PassOutcome::from_changed(expansions > 0))
    }

    fn should_run(&self, dag: &CircuitDag, _properties: &PropertySet) -> bool {
        dag.topological_ops()
            .any(|(_, inst)| Self::expansion(&inst.kind).is_some())
    }
}

/// Append `u` on `qubit` in `basis`, adding the phase difference to `dag`.
pub(crate) fn append_1q(
    dag: &mut CircuitDag,
    qubit: QubitId,
    u: &Unitary2x2,
    basis: OneQubitBasis,
) -> CompileResult<()> {
    let (gates, phase) = basis.synthesize(u);
    for gate in gates {
        dag.apply(tessera_ir::Instruction::single_qubit_gate(gate, qubit))?;
    }
    dag.add_global_phase(phase);
    Ok(())
}

/// Set the global phase of `dag` so that its unitary equals `expected` exactly.
pub(crate) fn align_phase(dag: &mut CircuitDag, expected: &Operator) {
    if let Some(got) = matrix::dag_unitary(dag) {
        dag.add_global_phase(matrix::relative_phase(expected, &got));
    }
}
