//! DAG-based circuit representation.

use std::cmp::Reverse;
use std::collections::{BTreeMap, BinaryHeap};

use petgraph::Direction;
use petgraph::stable_graph::{EdgeIndex, NodeIndex as PetNodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::error::{IrError, IrResult};
use crate::instruction::{Condition, Instruction, InstructionKind};
use crate::qubit::{ClbitId, QubitId, WireId};

/// Node index type for the circuit DAG.
///
/// Indices are stable: removing or substituting a node never renumbers the
/// other nodes.
pub type NodeIndex = PetNodeIndex<u32>;

/// A node in the circuit DAG.
#[derive(Debug, Clone, PartialEq)]
pub enum DagNode {
    /// Input node for a wire.
    In(WireId),
    /// Output node for a wire.
    Out(WireId),
    /// Operation node containing an instruction.
    Op(Instruction),
}

impl DagNode {
    /// Check if this is an input node.
    #[inline]
    pub fn is_input(&self) -> bool {
        matches!(self, DagNode::In(_))
    }

    /// Check if this is an output node.
    #[inline]
    pub fn is_output(&self) -> bool {
        matches!(self, DagNode::Out(_))
    }

    /// Check if this is an operation node.
    #[inline]
    pub fn is_op(&self) -> bool {
        matches!(self, DagNode::Op(_))
    }

    /// Get the instruction if this is an operation node.
    #[inline]
    pub fn instruction(&self) -> Option<&Instruction> {
        match self {
            DagNode::Op(inst) => Some(inst),
            _ => None,
        }
    }
}

/// An edge in the circuit DAG, labelled with the wire it carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DagEdge {
    /// The wire this edge represents.
    pub wire: WireId,
}

/// The abstraction level of a circuit in the compilation pipeline.
///
/// Circuits start at the `Logical` level (abstract qubits) and are
/// lowered to the `Physical` level once a layout is applied; from then on
/// each qubit wire is a device qubit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CircuitLevel {
    /// Logical level: qubits are abstract, no physical mapping applied.
    #[default]
    Logical,
    /// Physical level: qubits are mapped to physical device positions.
    Physical,
}

/// DAG-based circuit representation.
///
/// - Every wire has exactly one `In` and one `Out` node.
/// - Each wire's edges form a single path from `In` to `Out` through the
///   operations that touch it, in program order.
/// - An operation has exactly one incoming and one outgoing edge per wire it
///   touches.
#[derive(Debug, Clone)]
pub struct CircuitDag {
    graph: StableDiGraph<DagNode, DagEdge, u32>,
    /// Wire to its (`In`, `Out`) node pair.
    wires: FxHashMap<WireId, (NodeIndex, NodeIndex)>,
    /// Qubits in insertion order.
    qubit_order: Vec<QubitId>,
    /// Classical bits in insertion order.
    clbit_order: Vec<ClbitId>,
    name: Option<String>,
    global_phase: f64,
    level: CircuitLevel,
    /// Bumped on every structural mutation.
    version: u64,
}

impl CircuitDag {
    /// Create a new empty circuit DAG.
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::default(),
            wires: FxHashMap::default(),
            qubit_order: vec![],
            clbit_order: vec![],
            name: None,
            global_phase: 0.0,
            level: CircuitLevel::Logical,
            version: 0,
        }
    }

    /// Create a DAG with qubits `0..num_qubits` and clbits `0..num_clbits`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_size(num_qubits: usize, num_clbits: usize) -> Self {
        let mut dag = Self::new();
        for i in 0..num_qubits {
            dag.add_qubit(QubitId(i as u32));
        }
        for i in 0..num_clbits {
            dag.add_clbit(ClbitId(i as u32));
        }
        dag
    }

    /// Build a DAG of the given size from a list of instructions.
    pub fn from_instructions(
        num_qubits: usize,
        num_clbits: usize,
        instructions: impl IntoIterator<Item = Instruction>,
    ) -> IrResult<Self> {
        let mut dag = Self::with_size(num_qubits, num_clbits);
        for inst in instructions {
            dag.apply(inst)?;
        }
        Ok(dag)
    }

    fn add_wire(&mut self, wire: WireId) -> bool {
        if self.wires.contains_key(&wire) {
            return false;
        }
        let in_node = self.graph.add_node(DagNode::In(wire));
        let out_node = self.graph.add_node(DagNode::Out(wire));
        self.graph.add_edge(in_node, out_node, DagEdge { wire });
        self.wires.insert(wire, (in_node, out_node));
        self.version += 1;
        true
    }

    /// Add a qubit to the circuit. Adding an existing qubit is a no-op.
    pub fn add_qubit(&mut self, qubit: QubitId) {
        if self.add_wire(WireId::Qubit(qubit)) {
            self.qubit_order.push(qubit);
        }
    }

    /// Add a classical bit to the circuit. Adding an existing bit is a no-op.
    pub fn add_clbit(&mut self, clbit: ClbitId) {
        if self.add_wire(WireId::Clbit(clbit)) {
            self.clbit_order.push(clbit);
        }
    }

    /// Check that every wire of `instruction` exists and its arity is right.
    fn validate(&self, instruction: &Instruction) -> IrResult<()> {
        instruction.check_arity()?;
        let operation = || Some(instruction.name().to_string());
        for &qubit in &instruction.qubits {
            if !self.wires.contains_key(&WireId::Qubit(qubit)) {
                return Err(IrError::QubitNotFound {
                    qubit,
                    operation: operation(),
                });
            }
        }
        let cond_bits = instruction.condition.iter().flat_map(|c| c.clbits.iter());
        for &clbit in instruction.clbits.iter().chain(cond_bits) {
            if !self.wires.contains_key(&WireId::Clbit(clbit)) {
                return Err(IrError::ClbitNotFound {
                    clbit,
                    operation: operation(),
                });
            }
        }
        Ok(())
    }

    /// The edge entering `node` on `wire`.
    fn in_edge(&self, node: NodeIndex, wire: WireId) -> IrResult<(NodeIndex, EdgeIndex<u32>)> {
        self.graph
            .edges_directed(node, Direction::Incoming)
            .find(|e| e.weight().wire == wire)
            .map(|e| (e.source(), e.id()))
            .ok_or_else(|| {
                IrError::InvalidDag(format!("no edge into node {} on wire {wire}", node.index()))
            })
    }

    /// The edge leaving `node` on `wire`.
    fn out_edge(&self, node: NodeIndex, wire: WireId) -> IrResult<NodeIndex> {
        self.graph
            .edges_directed(node, Direction::Outgoing)
            .find(|e| e.weight().wire == wire)
            .map(|e| e.target())
            .ok_or_else(|| {
                IrError::InvalidDag(format!("no edge out of node {} on wire {wire}", node.index()))
            })
    }

    /// Append an instruction at the end of its wires.
    pub fn apply(&mut self, instruction: Instruction) -> IrResult<NodeIndex> {
        self.validate(&instruction)?;
        let wires = instruction.wires();
        let op_node = self.graph.add_node(DagNode::Op(instruction));
        for wire in wires {
            let out_node = self.wires[&wire].1;
            let (prev, edge) = self.in_edge(out_node, wire)?;
            self.graph.remove_edge(edge);
            self.graph.add_edge(prev, op_node, DagEdge { wire });
            self.graph.add_edge(op_node, out_node, DagEdge { wire });
        }
        self.version += 1;
        Ok(op_node)
    }

    /// Append an operation built from its parts.
    pub fn add_operation(
        &mut self,
        kind: InstructionKind,
        qubits: impl IntoIterator<Item = QubitId>,
        clbits: impl IntoIterator<Item = ClbitId>,
        condition: Option<Condition>,
    ) -> IrResult<NodeIndex> {
        self.apply(Instruction {
            kind,
            qubits: qubits.into_iter().collect(),
            clbits: clbits.into_iter().collect(),
            condition,
        })
    }

    fn op_instruction(&self, node: NodeIndex) -> IrResult<&Instruction> {
        self.graph
            .node_weight(node)
            .and_then(DagNode::instruction)
            .ok_or(IrError::UnknownNode(node.index()))
    }

    /// Remove an operation, joining its predecessor and successor on every wire.
    pub fn remove_operation(&mut self, node: NodeIndex) -> IrResult<Instruction> {
        let wires = self.op_instruction(node)?.wires();
        let mut links = Vec::with_capacity(wires.len());
        for &wire in &wires {
            let (pred, _) = self.in_edge(node, wire)?;
            let succ = self.out_edge(node, wire)?;
            links.push((pred, succ, wire));
        }
        let Some(DagNode::Op(instruction)) = self.graph.remove_node(node) else {
            return Err(IrError::UnknownNode(node.index()));
        };
        for (pred, succ, wire) in links {
            self.graph.add_edge(pred, succ, DagEdge { wire });
        }
        self.version += 1;
        Ok(instruction)
    }

    /// Replace one operation node by the contents of `replacement`, in place.
    ///
    /// The replacement's qubits and clbits (in their insertion order) are
    /// bound to the node's qubits and clbits in operand order. A condition on
    /// the replaced node is carried by every inserted operation. The
    /// replacement's global phase is added to this circuit's.
    ///
    /// Returns the new operation nodes in topological order. Nothing is
    /// modified if an error is returned.
    pub fn substitute(
        &mut self,
        node: NodeIndex,
        replacement: &CircuitDag,
    ) -> IrResult<Vec<NodeIndex>> {
        let old = self.op_instruction(node)?;
        if replacement.num_qubits() != old.qubits.len()
            || replacement.num_clbits() != old.clbits.len()
        {
            return Err(IrError::WireMismatch {
                node: node.index(),
                node_qubits: old.qubits.len(),
                node_clbits: old.clbits.len(),
                sub_qubits: replacement.num_qubits(),
                sub_clbits: replacement.num_clbits(),
            });
        }

        let qubit_map: FxHashMap<QubitId, QubitId> = replacement
            .qubit_order
            .iter()
            .copied()
            .zip(old.qubits.iter().copied())
            .collect();
        let clbit_map: FxHashMap<ClbitId, ClbitId> = replacement
            .clbit_order
            .iter()
            .copied()
            .zip(old.clbits.iter().copied())
            .collect();

        let mut inserted = Vec::with_capacity(replacement.num_ops());
        for (_, inst) in replacement.topological_ops() {
            let mut inst = inst.clone();
            inst.remap(|q| qubit_map[&q], |c| clbit_map[&c]);
            if let Some(cond) = &old.condition {
                if inst.condition.is_some() {
                    return Err(IrError::InvalidOperation {
                        operation: inst.name().to_string(),
                        reason: "cannot nest a conditioned operation under a condition".into(),
                    });
                }
                inst.condition = Some(cond.clone());
            }
            inserted.push(inst);
        }

        let wires = old.wires();
        let mut front: FxHashMap<WireId, NodeIndex> = FxHashMap::default();
        let mut tails = Vec::with_capacity(wires.len());
        for &wire in &wires {
            front.insert(wire, self.in_edge(node, wire)?.0);
            tails.push((wire, self.out_edge(node, wire)?));
        }
        self.graph.remove_node(node);

        let mut new_nodes = Vec::with_capacity(inserted.len());
        for inst in inserted {
            let inst_wires = inst.wires();
            let new_node = self.graph.add_node(DagNode::Op(inst));
            for wire in inst_wires {
                let prev = front.insert(wire, new_node).ok_or_else(|| {
                    IrError::InvalidDag(format!("replacement touches wire {wire} outside the node"))
                })?;
                self.graph.add_edge(prev, new_node, DagEdge { wire });
            }
            new_nodes.push(new_node);
        }
        for (wire, succ) in tails {
            self.graph.add_edge(front[&wire], succ, DagEdge { wire });
        }
        self.global_phase += replacement.global_phase;
        self.version += 1;
        Ok(new_nodes)
    }

    /// Swap the instruction of a node for another on the same set of wires.
    pub fn replace_instruction(
        &mut self,
        node: NodeIndex,
        instruction: Instruction,
    ) -> IrResult<Instruction> {
        let old_wires: FxHashSet<WireId> = self.op_instruction(node)?.wires().into_iter().collect();
        let new_wires: FxHashSet<WireId> = instruction.wires().into_iter().collect();
        if old_wires != new_wires {
            return Err(IrError::InvalidDag(format!(
                "replacement for node {} acts on different wires",
                node.index()
            )));
        }
        self.validate(&instruction)?;
        let slot = self
            .graph
            .node_weight_mut(node)
            .ok_or(IrError::UnknownNode(node.index()))?;
        let DagNode::Op(old) = std::mem::replace(slot, DagNode::Op(instruction)) else {
            return Err(IrError::UnknownNode(node.index()));
        };
        self.version += 1;
        Ok(old)
    }

    /// Append every operation of `other`, binding its qubits and clbits (in
    /// insertion order) to the given wires of this circuit.
    pub fn compose(
        &mut self,
        other: &CircuitDag,
        qubits: &[QubitId],
        clbits: &[ClbitId],
    ) -> IrResult<()> {
        if qubits.len() != other.num_qubits() || clbits.len() != other.num_clbits() {
            return Err(IrError::InvalidDag(format!(
                "compose maps {} qubits / {} clbits onto {} / {}",
                other.num_qubits(),
                other.num_clbits(),
                qubits.len(),
                clbits.len()
            )));
        }
        let qmap: FxHashMap<QubitId, QubitId> =
            other.qubit_order.iter().copied().zip(qubits.iter().copied()).collect();
        let cmap: FxHashMap<ClbitId, ClbitId> =
            other.clbit_order.iter().copied().zip(clbits.iter().copied()).collect();
        for (_, inst) in other.topological_ops() {
            let mut inst = inst.clone();
            inst.remap(|q| qmap[&q], |c| cmap[&c]);
            self.apply(inst)?;
        }
        self.global_phase += other.global_phase;
        Ok(())
    }

    /// Lazily iterate over operation nodes in topological order.
    ///
    /// Among nodes that are ready at the same time the lowest index comes
    /// first, so the order is deterministic.
    pub fn topological_op_nodes(&self) -> TopologicalOpNodes<'_> {
        let ready = self
            .wires
            .values()
            .map(|&(in_node, _)| Reverse(in_node))
            .collect();
        TopologicalOpNodes {
            graph: &self.graph,
            remaining: FxHashMap::default(),
            ready,
        }
    }

    /// Iterate over operations in topological order.
    pub fn topological_ops(&self) -> impl Iterator<Item = (NodeIndex, &Instruction)> + '_ {
        self.topological_op_nodes()
            .filter_map(|idx| self.graph[idx].instruction().map(|inst| (idx, inst)))
    }

    /// Operation nodes in index order.
    pub fn op_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .node_indices()
            .filter(|&idx| self.graph[idx].is_op())
    }

    /// Get an instruction by node index.
    #[inline]
    pub fn get_instruction(&self, node: NodeIndex) -> Option<&Instruction> {
        self.graph.node_weight(node).and_then(DagNode::instruction)
    }

    /// Whether `node` is a live operation node.
    pub fn contains_op(&self, node: NodeIndex) -> bool {
        self.get_instruction(node).is_some()
    }

    /// The operation preceding `node` on `wire`, or `None` if `node` is first.
    pub fn predecessor_on_wire(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        let (pred, _) = self.in_edge(node, wire).ok()?;
        self.graph[pred].is_op().then_some(pred)
    }

    /// The operation following `node` on `wire`, or `None` if `node` is last.
    pub fn successor_on_wire(&self, node: NodeIndex, wire: WireId) -> Option<NodeIndex> {
        let succ = self.out_edge(node, wire).ok()?;
        self.graph[succ].is_op().then_some(succ)
    }

    /// Distinct operation nodes immediately after `node`.
    pub fn op_successors(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut succs: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, Direction::Outgoing)
            .map(|e| e.target())
            .filter(|&t| self.graph[t].is_op())
            .collect();
        succs.sort_unstable();
        succs.dedup();
        succs
    }

    /// Number of distinct operation nodes immediately before `node`.
    pub fn op_predecessor_count(&self, node: NodeIndex) -> usize {
        let mut preds: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.source())
            .filter(|&s| self.graph[s].is_op())
            .collect();
        preds.sort_unstable();
        preds.dedup();
        preds.len()
    }

    /// Operations with no operation predecessor, in index order.
    pub fn front_layer(&self) -> Vec<NodeIndex> {
        let mut front: Vec<NodeIndex> = self
            .wires
            .values()
            .filter_map(|&(in_node, _)| {
                let next = self.graph.neighbors_directed(in_node, Direction::Outgoing).next()?;
                self.graph[next].is_op().then_some(next)
            })
            .filter(|&n| self.op_predecessor_count(n) == 0)
            .collect();
        front.sort_unstable();
        front.dedup();
        front
    }

    /// Operation nodes along one wire, in program order.
    pub fn wire_sequence(&self, wire: WireId) -> Vec<NodeIndex> {
        let Some(&(in_node, out_node)) = self.wires.get(&wire) else {
            return vec![];
        };
        let mut seq = vec![];
        let mut current = in_node;
        while let Ok(next) = self.out_edge(current, wire) {
            if next == out_node {
                break;
            }
            seq.push(next);
            current = next;
        }
        seq
    }

    /// Number of qubits.
    #[inline]
    pub fn num_qubits(&self) -> usize {
        self.qubit_order.len()
    }

    /// Number of classical bits.
    #[inline]
    pub fn num_clbits(&self) -> usize {
        self.clbit_order.len()
    }

    /// Number of operation nodes.
    #[inline]
    pub fn num_ops(&self) -> usize {
        self.graph.node_count().saturating_sub(2 * self.wires.len())
    }

    /// Qubits in insertion order.
    pub fn qubits(&self) -> impl Iterator<Item = QubitId> + '_ {
        self.qubit_order.iter().copied()
    }

    /// Classical bits in insertion order.
    pub fn clbits(&self) -> impl Iterator<Item = ClbitId> + '_ {
        self.clbit_order.iter().copied()
    }

    /// Whether the circuit has the given qubit.
    pub fn has_qubit(&self, qubit: QubitId) -> bool {
        self.wires.contains_key(&WireId::Qubit(qubit))
    }

    /// Operation counts by name.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for (_, inst) in self.topological_ops() {
            *counts.entry(inst.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Length of the longest path of operations, ignoring barriers.
    pub fn depth(&self) -> usize {
        let mut wire_depth: FxHashMap<WireId, usize> = FxHashMap::default();
        let mut max_depth = 0;
        for (_, inst) in self.topological_ops() {
            let wires = inst.wires();
            let start = wires
                .iter()
                .map(|w| wire_depth.get(w).copied().unwrap_or(0))
                .max()
                .unwrap_or(0);
            let depth = if inst.is_barrier() { start } else { start + 1 };
            for w in wires {
                wire_depth.insert(w, depth);
            }
            max_depth = max_depth.max(depth);
        }
        max_depth
    }

    /// Two-qubit interactions with their qubits, in topological order.
    pub fn two_qubit_ops(&self) -> Vec<(NodeIndex, QubitId, QubitId)> {
        self.topological_ops()
            .filter(|(_, inst)| inst.qubits.len() == 2 && inst.is_interaction())
            .map(|(idx, inst)| (idx, inst.qubits[0], inst.qubits[1]))
            .collect()
    }

    /// How often each unordered qubit pair interacts, keyed `(low, high)`.
    pub fn interaction_counts(&self) -> BTreeMap<(QubitId, QubitId), usize> {
        let mut counts = BTreeMap::new();
        for (_, a, b) in self.two_qubit_ops() {
            *counts.entry((a.min(b), a.max(b))).or_insert(0) += 1;
        }
        counts
    }

    /// A DAG with the same wires, name, phase and level, but no operations.
    pub fn copy_empty_like(&self) -> Self {
        let mut dag = Self::new();
        for &q in &self.qubit_order {
            dag.add_qubit(q);
        }
        for &c in &self.clbit_order {
            dag.add_clbit(c);
        }
        dag.name.clone_from(&self.name);
        dag.global_phase = self.global_phase;
        dag.level = self.level;
        dag
    }

    /// The same operations applied in reverse order. Instructions are not inverted.
    pub fn reversed(&self) -> IrResult<Self> {
        let mut dag = self.copy_empty_like();
        let ops: Vec<Instruction> = self.topological_ops().map(|(_, i)| i.clone()).collect();
        for inst in ops.into_iter().rev() {
            dag.apply(inst)?;
        }
        Ok(dag)
    }

    /// Circuit name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Set the circuit name.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    /// Get the global phase.
    pub fn global_phase(&self) -> f64 {
        self.global_phase
    }

    /// Set the global phase.
    pub fn set_global_phase(&mut self, phase: f64) {
        self.global_phase = phase;
    }

    /// Add to the global phase.
    pub fn add_global_phase(&mut self, phase: f64) {
        self.global_phase += phase;
    }

    /// Get the abstraction level of this circuit.
    pub fn level(&self) -> CircuitLevel {
        self.level
    }

    /// Set the abstraction level of this circuit.
    pub fn set_level(&mut self, level: CircuitLevel) {
        self.level = level;
    }

    /// Structural version; changes whenever nodes or wires are added, removed
    /// or replaced.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Get a reference to the underlying graph.
    pub fn graph(&self) -> &StableDiGraph<DagNode, DagEdge, u32> {
        &self.graph
    }

    /// Verify the structural integrity of the DAG.
    ///
    /// Checks that every wire runs as one path from its `In` to its `Out`
    /// node, that each operation sits on exactly the wires it declares, and
    /// that the graph is acyclic.
    pub fn verify_integrity(&self) -> IrResult<()> {
        if petgraph::algo::is_cyclic_directed(&self.graph) {
            return Err(IrError::InvalidDag("Graph contains a cycle".into()));
        }

        let mut visits: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        for (&wire, &(in_node, out_node)) in &self.wires {
            let mut current = in_node;
            let mut steps = 0;
            while current != out_node {
                current = self.out_edge(current, wire).map_err(|_| {
                    IrError::InvalidDag(format!(
                        "Wire {wire} is broken at node {}",
                        current.index()
                    ))
                })?;
                if current != out_node {
                    let inst = self.op_instruction(current).map_err(|_| {
                        IrError::InvalidDag(format!("Wire {wire} passes through a non-op node"))
                    })?;
                    if !inst.wires().contains(&wire) {
                        return Err(IrError::InvalidDag(format!(
                            "Wire {wire} passes through '{}' which does not act on it",
                            inst.name()
                        )));
                    }
                    *visits.entry(current).or_insert(0) += 1;
                }
                steps += 1;
                if steps > self.graph.node_count() {
                    return Err(IrError::InvalidDag(format!("Wire {wire} does not terminate")));
                }
            }
        }

        for idx in self.graph.node_indices() {
            if let DagNode::Op(inst) = &self.graph[idx] {
                let expected = inst.wires().len();
                if visits.get(&idx).copied().unwrap_or(0) != expected
                    || self.graph.edges_directed(idx, Direction::Incoming).count() != expected
                {
                    return Err(IrError::InvalidDag(format!(
                        "Operation '{}' at node {} is not on all of its wires",
                        inst.name(),
                        idx.index()
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for CircuitDag {
    fn default() -> Self {
        Self::new()
    }
}

/// Structural equality: same wires, same level, and the same sequence of
/// instructions along every wire. Global phase and name are ignored.
impl PartialEq for CircuitDag {
    fn eq(&self, other: &Self) -> bool {
        if self.qubit_order != other.qubit_order
            || self.clbit_order != other.clbit_order
            || self.level != other.level
            || self.num_ops() != other.num_ops()
        {
            return false;
        }
        self.wires.keys().all(|&wire| {
            let lhs = self.wire_sequence(wire);
            let rhs = other.wire_sequence(wire);
            lhs.len() == rhs.len()
                && lhs
                    .iter()
                    .zip(&rhs)
                    .all(|(&a, &b)| self.get_instruction(a) == other.get_instruction(b))
        })
    }
}

/// Lazy topological iterator over operation nodes. See
/// [`CircuitDag::topological_op_nodes`].
pub struct TopologicalOpNodes<'a> {
    graph: &'a StableDiGraph<DagNode, DagEdge, u32>,
    remaining: FxHashMap<NodeIndex, usize>,
    ready: BinaryHeap<Reverse<NodeIndex>>,
}

impl Iterator for TopologicalOpNodes<'_> {
    type Item = NodeIndex;

    fn next(&mut self) -> Option<NodeIndex> {
        let graph = self.graph;
        while let Some(Reverse(node)) = self.ready.pop() {
            for edge in graph.edges_directed(node, Direction::Outgoing) {
                let target = edge.target();
                let count = self.remaining.entry(target).or_insert_with(|| {
                    graph.edges_directed(target, Direction::Incoming).count()
                });
                *count -= 1;
                if *count == 0 {
                    self.ready.push(Reverse(target));
                }
            }
            if graph[node].is_op() {
                return Some(node);
            }
        }
        None
    }
}
