//! Builder API for assembling circuits.
//!
//! [`Circuit`] is a thin convenience layer over [`CircuitDag`]: every method
//! appends one instruction and returns `&mut Self` for chaining.
//!
//! ```
//! use tessera_ir::{Circuit, QubitId, ClbitId};
//!
//! let mut circuit = Circuit::with_size("bell", 2, 2);
//! circuit
//!     .h(QubitId(0))?
//!     .cx(QubitId(0), QubitId(1))?
//!     .measure(QubitId(0), ClbitId(0))?;
//! assert_eq!(circuit.dag().num_ops(), 3);
//! # Ok::<(), tessera_ir::IrError>(())
//! ```

use num_complex::Complex64;

use crate::dag::CircuitDag;
use crate::error::IrResult;
use crate::gate::{Gate, StandardGate};
use crate::instruction::{Condition, Instruction};
use crate::operation::HighLevelOp;
use crate::parameter::ParameterExpression;
use crate::qubit::{ClbitId, QubitId};

/// A quantum circuit under construction.
#[derive(Debug, Clone)]
pub struct Circuit {
    dag: CircuitDag,
}

macro_rules! fixed_gate {
    ($(#[$doc:meta] $method:ident => $gate:ident ($($q:ident),+);)*) => {
        $(
            #[$doc]
            pub fn $method(&mut self, $($q: QubitId),+) -> IrResult<&mut Self> {
                self.append(Instruction::gate(StandardGate::$gate, [$($q),+]))
            }
        )*
    };
}

macro_rules! rotation_gate {
    ($(#[$doc:meta] $method:ident => $gate:ident ($($q:ident),+);)*) => {
        $(
            #[$doc]
            pub fn $method(
                &mut self,
                theta: impl Into<ParameterExpression>,
                $($q: QubitId),+
            ) -> IrResult<&mut Self> {
                self.append(Instruction::gate(StandardGate::$gate(theta.into()), [$($q),+]))
            }
        )*
    };
}

impl Circuit {
    /// Create a new empty circuit.
    pub fn new(name: impl Into<String>) -> Self {
        let mut dag = CircuitDag::new();
        dag.set_name(name);
        Self { dag }
    }

    /// Create a circuit with qubits `0..num_qubits` and clbits `0..num_clbits`.
    pub fn with_size(name: impl Into<String>, num_qubits: usize, num_clbits: usize) -> Self {
        let mut dag = CircuitDag::with_size(num_qubits, num_clbits);
        dag.set_name(name);
        Self { dag }
    }

    /// Add the next qubit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_qubit(&mut self) -> QubitId {
        let id = QubitId(self.dag.num_qubits() as u32);
        self.dag.add_qubit(id);
        id
    }

    /// Add the next classical bit.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add_clbit(&mut self) -> ClbitId {
        let id = ClbitId(self.dag.num_clbits() as u32);
        self.dag.add_clbit(id);
        id
    }

    /// Append any instruction.
    pub fn append(&mut self, instruction: Instruction) -> IrResult<&mut Self> {
        self.dag.apply(instruction)?;
        Ok(self)
    }

    /// Append an instruction guarded by a classical condition.
    pub fn append_conditional(
        &mut self,
        instruction: Instruction,
        condition: Condition,
    ) -> IrResult<&mut Self> {
        self.append(instruction.with_condition(condition))
    }

    fixed_gate! {
        /// Hadamard.
        h => H(qubit);
        /// Pauli-X.
        x => X(qubit);
        /// Pauli-Y.
        y => Y(qubit);
        /// Pauli-Z.
        z => Z(qubit);
        /// S gate.
        s => S(qubit);
        /// S-dagger.
        sdg => Sdg(qubit);
        /// T gate.
        t => T(qubit);
        /// T-dagger.
        tdg => Tdg(qubit);
        /// sqrt(X).
        sx => SX(qubit);
        /// CNOT.
        cx => CX(control, target);
        /// Controlled-Y.
        cy => CY(control, target);
        /// Controlled-Z.
        cz => CZ(control, target);
        /// Controlled-Hadamard.
        ch => CH(control, target);
        /// SWAP.
        swap => Swap(a, b);
        /// iSWAP.
        iswap => ISwap(a, b);
        /// Toffoli.
        ccx => CCX(c1, c2, target);
        /// Fredkin.
        cswap => CSwap(control, t1, t2);
    }

    rotation_gate! {
        /// X rotation.
        rx => Rx(qubit);
        /// Y rotation.
        ry => Ry(qubit);
        /// Z rotation.
        rz => Rz(qubit);
        /// Phase gate.
        p => P(qubit);
        /// Controlled X rotation.
        crx => CRx(control, target);
        /// Controlled Y rotation.
        cry => CRy(control, target);
        /// Controlled Z rotation.
        crz => CRz(control, target);
        /// Controlled phase.
        cp => CP(control, target);
        /// XX interaction.
        rxx => RXX(a, b);
        /// YY interaction.
        ryy => RYY(a, b);
        /// ZZ interaction.
        rzz => RZZ(a, b);
    }

    /// Generic single-qubit gate.
    pub fn u(
        &mut self,
        theta: impl Into<ParameterExpression>,
        phi: impl Into<ParameterExpression>,
        lambda: impl Into<ParameterExpression>,
        qubit: QubitId,
    ) -> IrResult<&mut Self> {
        let gate = StandardGate::U(theta.into(), phi.into(), lambda.into());
        self.append(Instruction::single_qubit_gate(gate, qubit))
    }

    /// Any gate.
    pub fn gate(
        &mut self,
        gate: impl Into<Gate>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.append(Instruction::gate(gate, qubits))
    }

    /// Arbitrary unitary (row-major, first qubit most significant).
    pub fn unitary(
        &mut self,
        matrix: Vec<Complex64>,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        let qubits: Vec<QubitId> = qubits.into_iter().collect();
        let op = HighLevelOp::unitary(qubits.len(), matrix)?;
        self.append(Instruction::high_level(op, qubits))
    }

    /// Multi-controlled X.
    pub fn mcx(&mut self, controls: &[QubitId], target: QubitId) -> IrResult<&mut Self> {
        let op = HighLevelOp::MultiControlledX {
            num_ctrl: controls.len(),
        };
        let qubits = controls.iter().copied().chain(std::iter::once(target));
        self.append(Instruction::high_level(op, qubits))
    }

    /// Any high-level operation.
    pub fn high_level(
        &mut self,
        op: HighLevelOp,
        qubits: impl IntoIterator<Item = QubitId>,
    ) -> IrResult<&mut Self> {
        self.append(Instruction::high_level(op, qubits))
    }

    /// Measure a qubit to a classical bit.
    pub fn measure(&mut self, qubit: QubitId, clbit: ClbitId) -> IrResult<&mut Self> {
        self.append(Instruction::measure(qubit, clbit))
    }

    /// Measure every qubit into the clbit with the same index, adding clbits as needed.
    #[allow(clippy::cast_possible_truncation)]
    pub fn measure_all(&mut self) -> IrResult<&mut Self> {
        while self.dag.num_clbits() < self.dag.num_qubits() {
            self.add_clbit();
        }
        let qubits: Vec<QubitId> = self.dag.qubits().collect();
        let clbits: Vec<ClbitId> = self.dag.clbits().take(qubits.len()).collect();
        self.append(Instruction {
            kind: crate::instruction::InstructionKind::Measure,
            qubits,
            clbits,
            condition: None,
        })
    }

    /// Reset a qubit to |0⟩.
    pub fn reset(&mut self, qubit: QubitId) -> IrResult<&mut Self> {
        self.append(Instruction::reset(qubit))
    }

    /// Barrier on the given qubits.
    pub fn barrier(&mut self, qubits: impl IntoIterator<Item = QubitId>) -> IrResult<&mut Self> {
        self.append(Instruction::barrier(qubits))
    }

    /// Barrier on every qubit.
    pub fn barrier_all(&mut self) -> IrResult<&mut Self> {
        let qubits: Vec<QubitId> = self.dag.qubits().collect();
        self.barrier(qubits)
    }

    /// Delay on a qubit.
    pub fn delay(&mut self, qubit: QubitId, duration: u64) -> IrResult<&mut Self> {
        self.append(Instruction::delay(qubit, duration))
    }

    /// Circuit name.
    pub fn name(&self) -> &str {
        self.dag.name().unwrap_or("circuit")
    }

    /// Number of qubits.
    pub fn num_qubits(&self) -> usize {
        self.dag.num_qubits()
    }

    /// Number of classical bits.
    pub fn num_clbits(&self) -> usize {
        self.dag.num_clbits()
    }

    /// Circuit depth.
    pub fn depth(&self) -> usize {
        self.dag.depth()
    }

    /// The underlying DAG.
    pub fn dag(&self) -> &CircuitDag {
        &self.dag
    }

    /// Consume the circuit and return the DAG.
    pub fn into_dag(self) -> CircuitDag {
        self.dag
    }

    /// Wrap an existing DAG.
    pub fn from_dag(dag: CircuitDag) -> Self {
        Self { dag }
    }

    /// Bell pair with measurements.
    pub fn bell() -> IrResult<Self> {
        let mut circuit = Self::with_size("bell", 2, 2);
        circuit
            .h(QubitId(0))?
            .cx(QubitId(0), QubitId(1))?
            .measure(QubitId(0), ClbitId(0))?
            .measure(QubitId(1), ClbitId(1))?;
        Ok(circuit)
    }

    /// `n`-qubit GHZ state with measurements.
    #[allow(clippy::cast_possible_truncation)]
    pub fn ghz(n: usize) -> IrResult<Self> {
        let mut circuit = Self::with_size("ghz", n, n);
        if n == 0 {
            return Ok(circuit);
        }
        circuit.h(QubitId(0))?;
        for i in 1..n as u32 {
            circuit.cx(QubitId(i - 1), QubitId(i))?;
        }
        circuit.measure_all()?;
        Ok(circuit)
    }

    /// Quantum Fourier transform on `n` qubits, without measurements.
    #[allow(clippy::cast_possible_truncation)]
    pub fn qft(n: usize) -> IrResult<Self> {
        use std::f64::consts::PI;

        let n = n as u32;
        let mut circuit = Self::with_size("qft", n as usize, 0);
        for i in 0..n {
            circuit.h(QubitId(i))?;
            for j in (i + 1)..n {
                let angle = PI / f64::from(1u32 << (j - i));
                circuit.cp(angle, QubitId(j), QubitId(i))?;
            }
        }
        for i in 0..n / 2 {
            circuit.swap(QubitId(i), QubitId(n - 1 - i))?;
        }
        Ok(circuit)
    }
}
