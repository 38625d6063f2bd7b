//! Instructions: an operation bound to the wires it acts on.

use crate::dag::CircuitDag;
use crate::error::{IrError, IrResult};
use crate::gate::{Gate, StandardGate};
use crate::operation::HighLevelOp;
use crate::qubit::{ClbitId, QubitId, WireId};

/// The kind of operation an instruction performs.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    /// A quantum gate.
    Gate(Gate),
    /// Measurement of each qubit into the matching classical bit.
    Measure,
    /// Reset qubit to |0⟩.
    Reset,
    /// Barrier (synchronization point, blocks optimization across it).
    Barrier,
    /// Idle for a fixed time.
    Delay {
        /// Duration in device-specific units.
        duration: u64,
    },
    /// Abstract operation resolved by synthesis.
    HighLevel(HighLevelOp),
    /// A named sub-circuit. The node owns its body exclusively.
    Compound {
        /// Name of the block.
        name: String,
        /// Body, over its own local wires.
        body: Box<CircuitDag>,
    },
}

/// Classical condition: run only if the bits read as `value`.
///
/// `clbits[0]` is the least significant bit of `value`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Condition {
    /// Bits compared.
    pub clbits: Vec<ClbitId>,
    /// Expected value.
    pub value: u64,
}

impl Condition {
    /// Condition on a single bit.
    pub fn bit(clbit: ClbitId, value: bool) -> Self {
        Self {
            clbits: vec![clbit],
            value: u64::from(value),
        }
    }
}

/// A complete instruction with operands.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// The kind of instruction.
    pub kind: InstructionKind,
    /// Qubits, in operand order.
    pub qubits: Vec<QubitId>,
    /// Classical bits written (measure) or used by a compound body.
    pub clbits: Vec<ClbitId>,
    /// Optional classical condition.
    pub condition: Option<Condition>,
}

impl Instruction {
    fn new(kind: InstructionKind, qubits: Vec<QubitId>, clbits: Vec<ClbitId>) -> Self {
        Self {
            kind,
            qubits,
            clbits,
            condition: None,
        }
    }

    /// Create a gate instruction.
    pub fn gate(gate: impl Into<Gate>, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self::new(
            InstructionKind::Gate(gate.into()),
            qubits.into_iter().collect(),
            vec![],
        )
    }

    /// Create a single-qubit gate instruction.
    pub fn single_qubit_gate(gate: StandardGate, qubit: QubitId) -> Self {
        Self::gate(gate, [qubit])
    }

    /// Create a two-qubit gate instruction.
    pub fn two_qubit_gate(gate: StandardGate, q1: QubitId, q2: QubitId) -> Self {
        Self::gate(gate, [q1, q2])
    }

    /// Create a measurement instruction.
    pub fn measure(qubit: QubitId, clbit: ClbitId) -> Self {
        Self::new(InstructionKind::Measure, vec![qubit], vec![clbit])
    }

    /// Create a reset instruction.
    pub fn reset(qubit: QubitId) -> Self {
        Self::new(InstructionKind::Reset, vec![qubit], vec![])
    }

    /// Create a barrier instruction.
    pub fn barrier(qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self::new(InstructionKind::Barrier, qubits.into_iter().collect(), vec![])
    }

    /// Create a delay instruction.
    pub fn delay(qubit: QubitId, duration: u64) -> Self {
        Self::new(InstructionKind::Delay { duration }, vec![qubit], vec![])
    }

    /// Create a high-level operation.
    pub fn high_level(op: HighLevelOp, qubits: impl IntoIterator<Item = QubitId>) -> Self {
        Self::new(
            InstructionKind::HighLevel(op),
            qubits.into_iter().collect(),
            vec![],
        )
    }

    /// Create a compound instruction whose body is mapped onto the given wires in order.
    pub fn compound(
        name: impl Into<String>,
        body: CircuitDag,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
    ) -> Self {
        Self::new(
            InstructionKind::Compound {
                name: name.into(),
                body: Box::new(body),
            },
            qubits.into_iter().collect(),
            clbits.into_iter().collect(),
        )
    }

    /// Attach a classical condition.
    #[must_use]
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Name of the instruction, as used in target and basis lookups.
    pub fn name(&self) -> &str {
        match &self.kind {
            InstructionKind::Gate(g) => g.name(),
            InstructionKind::Measure => "measure",
            InstructionKind::Reset => "reset",
            InstructionKind::Barrier => "barrier",
            InstructionKind::Delay { .. } => "delay",
            InstructionKind::HighLevel(op) => op.class_name(),
            InstructionKind::Compound { name, .. } => name,
        }
    }

    /// Every wire the instruction touches: qubits, clbits, then condition bits
    /// not already listed.
    pub fn wires(&self) -> Vec<WireId> {
        let mut wires: Vec<WireId> = self
            .qubits
            .iter()
            .copied()
            .map(WireId::Qubit)
            .chain(self.clbits.iter().copied().map(WireId::Clbit))
            .collect();
        if let Some(cond) = &self.condition {
            for &c in &cond.clbits {
                if !self.clbits.contains(&c) && !wires.contains(&WireId::Clbit(c)) {
                    wires.push(WireId::Clbit(c));
                }
            }
        }
        wires
    }

    /// Check the number of qubit and clbit operands against the kind's arity,
    /// and reject repeated operands.
    pub fn check_arity(&self) -> IrResult<()> {
        let name = self.name().to_string();
        let expect = |wire_kind: &'static str, expected: usize, got: usize| {
            if expected == got {
                Ok(())
            } else {
                Err(IrError::WireArity {
                    operation: name.clone(),
                    wire_kind,
                    expected,
                    got,
                })
            }
        };
        let nq = self.qubits.len();
        let nc = self.clbits.len();
        match &self.kind {
            InstructionKind::Gate(g) => {
                expect("qubit", g.num_qubits(), nq)?;
                expect("clbit", 0, nc)?;
            }
            InstructionKind::Measure => {
                expect("qubit", nq.max(1), nq)?;
                expect("clbit", nq, nc)?;
            }
            InstructionKind::Reset | InstructionKind::Delay { .. } => {
                expect("qubit", 1, nq)?;
                expect("clbit", 0, nc)?;
            }
            InstructionKind::Barrier => {
                expect("qubit", nq.max(1), nq)?;
                expect("clbit", 0, nc)?;
            }
            InstructionKind::HighLevel(op) => {
                op.validate()?;
                expect("qubit", op.num_qubits(), nq)?;
                expect("clbit", 0, nc)?;
            }
            InstructionKind::Compound { body, .. } => {
                expect("qubit", body.num_qubits(), nq)?;
                expect("clbit", body.num_clbits(), nc)?;
            }
        }

        for (i, q) in self.qubits.iter().enumerate() {
            if self.qubits[..i].contains(q) {
                return Err(IrError::DuplicateQubit {
                    qubit: *q,
                    operation: name,
                });
            }
        }
        for (i, c) in self.clbits.iter().enumerate() {
            if self.clbits[..i].contains(c) {
                return Err(IrError::DuplicateClbit {
                    clbit: *c,
                    operation: name,
                });
            }
        }
        Ok(())
    }

    /// Rename every wire through the given maps.
    pub fn remap(
        &mut self,
        qubit_map: impl Fn(QubitId) -> QubitId,
        clbit_map: impl Fn(ClbitId) -> ClbitId,
    ) {
        for q in &mut self.qubits {
            *q = qubit_map(*q);
        }
        for c in &mut self.clbits {
            *c = clbit_map(*c);
        }
        if let Some(cond) = &mut self.condition {
            for c in &mut cond.clbits {
                *c = clbit_map(*c);
            }
        }
    }

    /// Check if this is a gate instruction.
    pub fn is_gate(&self) -> bool {
        matches!(self.kind, InstructionKind::Gate(_))
    }

    /// Check if this is a measurement.
    pub fn is_measure(&self) -> bool {
        matches!(self.kind, InstructionKind::Measure)
    }

    /// Check if this is a reset.
    pub fn is_reset(&self) -> bool {
        matches!(self.kind, InstructionKind::Reset)
    }

    /// Check if this is a barrier.
    pub fn is_barrier(&self) -> bool {
        matches!(self.kind, InstructionKind::Barrier)
    }

    /// Whether the operation couples its qubits, so that a device must
    /// connect them. Measurements, resets, delays, barriers and compound
    /// blocks do not.
    pub fn is_interaction(&self) -> bool {
        matches!(
            self.kind,
            InstructionKind::Gate(_) | InstructionKind::HighLevel(_)
        ) && self.qubits.len() > 1
    }

    /// Whether the instruction is a pure unitary (no classical effects, no condition).
    pub fn is_unitary(&self) -> bool {
        if self.condition.is_some() {
            return false;
        }
        match &self.kind {
            InstructionKind::Gate(_) | InstructionKind::HighLevel(_) => true,
            InstructionKind::Compound { body, .. } => {
                body.topological_ops().all(|(_, inst)| inst.is_unitary())
            }
            _ => false,
        }
    }

    /// The gate, if this is a gate instruction.
    pub fn as_gate(&self) -> Option<&Gate> {
        match &self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }

    /// The standard gate, if this is one.
    pub fn as_standard(&self) -> Option<&StandardGate> {
        self.as_gate().and_then(Gate::as_standard)
    }

    /// Mutable access to the gate.
    pub fn gate_mut(&mut self) -> Option<&mut Gate> {
        match &mut self.kind {
            InstructionKind::Gate(g) => Some(g),
            _ => None,
        }
    }
}
