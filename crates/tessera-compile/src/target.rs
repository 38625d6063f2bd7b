//! Target device model.
//!
//! A [`Target`] lists which operations the device supports, on which qubit
//! tuples, and with what duration and error. Connectivity is derived from the
//! qubit pairs of its two-qubit operations and exposed as a [`CouplingMap`].
//!
//! Targets are immutable once built and are shared between runs as
//! `Arc<Target>`.
//!
//! ```
//! use tessera_compile::{BasisGates, CouplingMap, Target};
//!
//! let target = Target::from_coupling(CouplingMap::linear(3), &BasisGates::ibm());
//! assert!(target.instruction_supported("cx", &[0, 1]));
//! assert!(!target.instruction_supported("cx", &[0, 2]));
//! assert!(target.instruction_supported("rz", &[2]));
//! ```

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// Names of standard operations acting on exactly two qubits.
const TWO_QUBIT_OPERATIONS: &[&str] = &[
    "cx", "cy", "cz", "ch", "swap", "iswap", "crx", "cry", "crz", "cp", "rxx", "ryy", "rzz",
];

/// Operations every target accepts regardless of its basis.
pub const DIRECTIVES: &[&str] = &["barrier"];

/// Serialized form of a [`CouplingMap`]: just the qubit count and the edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CouplingSpec {
    num_qubits: u32,
    edges: Vec<(u32, u32)>,
}

/// Undirected connectivity graph of a device.
///
/// All-pairs BFS distance and predecessor matrices are computed on
/// construction, so `distance()` is O(1) and `shortest_path()` is
/// O(distance).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "CouplingSpec", into = "CouplingSpec")]
pub struct CouplingMap {
    num_qubits: u32,
    /// Edges as given, each unordered pair once.
    edges: Vec<(u32, u32)>,
    adjacency: Vec<Vec<u32>>,
    /// `dist_matrix[from][to]`, or `u32::MAX` if unreachable.
    dist_matrix: Vec<Vec<u32>>,
    /// `pred_matrix[from][to]` is the node before `to` on a shortest path from `from`.
    pred_matrix: Vec<Vec<u32>>,
}

impl From<CouplingSpec> for CouplingMap {
    fn from(spec: CouplingSpec) -> Self {
        CouplingMap::from_edges(spec.num_qubits, spec.edges)
    }
}

impl From<CouplingMap> for CouplingSpec {
    fn from(map: CouplingMap) -> Self {
        CouplingSpec {
            num_qubits: map.num_qubits,
            edges: map.edges,
        }
    }
}

impl CouplingMap {
    /// Build a coupling map from an edge list. Duplicate, reversed and
    /// self-loop edges are ignored; edges out of range are dropped.
    pub fn from_edges(num_qubits: u32, edges: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let n = num_qubits as usize;
        let mut map = Self {
            num_qubits,
            edges: vec![],
            adjacency: vec![vec![]; n],
            dist_matrix: vec![],
            pred_matrix: vec![],
        };
        let mut seen = BTreeSet::new();
        for (a, b) in edges {
            if a == b || a >= num_qubits || b >= num_qubits || !seen.insert((a.min(b), a.max(b))) {
                continue;
            }
            map.edges.push((a, b));
            map.adjacency[a as usize].push(b);
            map.adjacency[b as usize].push(a);
        }
        for neighbors in &mut map.adjacency {
            neighbors.sort_unstable();
        }
        map.precompute_distances();
        map
    }

    fn precompute_distances(&mut self) {
        let n = self.num_qubits as usize;
        self.dist_matrix = vec![vec![u32::MAX; n]; n];
        self.pred_matrix = vec![vec![u32::MAX; n]; n];

        for src in 0..n {
            self.dist_matrix[src][src] = 0;
            let mut queue = VecDeque::from([src]);
            while let Some(cur) = queue.pop_front() {
                for &neighbor in &self.adjacency[cur] {
                    let nb = neighbor as usize;
                    if self.dist_matrix[src][nb] == u32::MAX {
                        self.dist_matrix[src][nb] = self.dist_matrix[src][cur] + 1;
                        #[allow(clippy::cast_possible_truncation)]
                        let pred = cur as u32;
                        self.pred_matrix[src][nb] = pred;
                        queue.push_back(nb);
                    }
                }
            }
        }
    }

    /// Chain 0-1-2-…-(n-1).
    pub fn linear(n: u32) -> Self {
        Self::from_edges(n, (1..n).map(|i| (i - 1, i)))
    }

    /// Chain closed into a cycle.
    pub fn ring(n: u32) -> Self {
        let closing = (n > 2).then(|| (n - 1, 0));
        Self::from_edges(n, (1..n).map(|i| (i - 1, i)).chain(closing))
    }

    /// Row-major `rows × cols` grid with nearest-neighbour couplings.
    pub fn grid(rows: u32, cols: u32) -> Self {
        let mut edges = vec![];
        for r in 0..rows {
            for c in 0..cols {
                let q = r * cols + c;
                if c + 1 < cols {
                    edges.push((q, q + 1));
                }
                if r + 1 < rows {
                    edges.push((q, q + cols));
                }
            }
        }
        Self::from_edges(rows * cols, edges)
    }

    /// Qubit 0 coupled to every other qubit.
    pub fn star(n: u32) -> Self {
        Self::from_edges(n, (1..n).map(|i| (0, i)))
    }

    /// All-to-all.
    pub fn full(n: u32) -> Self {
        Self::from_edges(n, (0..n).flat_map(|i| ((i + 1)..n).map(move |j| (i, j))))
    }

    /// Whether two qubits are directly coupled.
    #[inline]
    pub fn is_connected(&self, q1: u32, q2: u32) -> bool {
        self.adjacency
            .get(q1 as usize)
            .is_some_and(|neighbors| neighbors.binary_search(&q2).is_ok())
    }

    /// Number of physical qubits.
    #[inline]
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Edges, each unordered pair once.
    pub fn edges(&self) -> &[(u32, u32)] {
        &self.edges
    }

    /// Neighbours of a qubit, ascending.
    pub fn neighbors(&self, qubit: u32) -> &[u32] {
        self.adjacency.get(qubit as usize).map_or(&[], Vec::as_slice)
    }

    /// Shortest-path distance, or `None` if unreachable or out of range.
    #[inline]
    pub fn distance(&self, from: u32, to: u32) -> Option<u32> {
        let d = *self.dist_matrix.get(from as usize)?.get(to as usize)?;
        (d != u32::MAX).then_some(d)
    }

    /// Shortest path from `from` to `to`, both ends included.
    pub fn shortest_path(&self, from: u32, to: u32) -> Option<Vec<u32>> {
        self.distance(from, to)?;
        let row = &self.pred_matrix[from as usize];
        let mut path = vec![to];
        let mut current = to;
        while current != from {
            current = row[current as usize];
            path.push(current);
        }
        path.reverse();
        Some(path)
    }

    /// Whether every qubit can reach every other.
    pub fn is_connected_graph(&self) -> bool {
        let mut graph = petgraph::graph::UnGraph::<(), ()>::new_undirected();
        let nodes: Vec<_> = (0..self.num_qubits).map(|_| graph.add_node(())).collect();
        for &(a, b) in &self.edges {
            graph.add_edge(nodes[a as usize], nodes[b as usize], ());
        }
        petgraph::algo::connected_components(&graph) <= 1
    }
}

/// Set of operation names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasisGates {
    gates: BTreeSet<String>,
}

impl BasisGates {
    /// Create a basis from gate names.
    pub fn new(gates: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            gates: gates.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether the basis contains a gate.
    pub fn contains(&self, gate: &str) -> bool {
        self.gates.contains(gate)
    }

    /// Gate names, sorted.
    pub fn gates(&self) -> impl Iterator<Item = &str> {
        self.gates.iter().map(String::as_str)
    }

    /// IQM native gates (PRX + CZ).
    pub fn iqm() -> Self {
        Self::new(["prx", "cz", "measure", "reset", "barrier", "delay"])
    }

    /// IBM native gates (RZ + SX + X + CX).
    pub fn ibm() -> Self {
        Self::new(["rz", "sx", "x", "cx", "id", "measure", "reset", "barrier", "delay"])
    }

    /// Every standard gate.
    pub fn universal() -> Self {
        Self::new([
            "id", "x", "y", "z", "h", "s", "sdg", "t", "tdg", "sx", "sxdg", "rx", "ry", "rz", "p",
            "u", "prx", "cx", "cy", "cz", "ch", "swap", "iswap", "crx", "cry", "crz", "cp", "rxx",
            "ryy", "rzz", "ccx", "cswap", "measure", "reset", "barrier", "delay",
        ])
    }
}

/// Calibration data for one operation on one qubit tuple.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InstructionProperties {
    /// Duration in seconds.
    pub duration: Option<f64>,
    /// Error rate in `[0, 1]`.
    pub error: Option<f64>,
}

impl InstructionProperties {
    /// Properties with both fields set.
    pub fn new(duration: f64, error: f64) -> Self {
        Self {
            duration: Some(duration),
            error: Some(error),
        }
    }
}

type QargMap = BTreeMap<Option<Vec<u32>>, InstructionProperties>;

/// A device description.
#[derive(Debug, Clone)]
pub struct Target {
    name: Option<String>,
    num_qubits: u32,
    /// Operation name → (qargs → properties). `None` qargs: any tuple.
    operations: BTreeMap<String, QargMap>,
    coupling: CouplingMap,
}

impl Target {
    /// Start building a target with `num_qubits` qubits.
    pub fn builder(num_qubits: u32) -> TargetBuilder {
        TargetBuilder::new(num_qubits)
    }

    /// A target supporting `basis` everywhere, with two-qubit operations
    /// available on both directions of every coupling edge.
    pub fn from_coupling(coupling: CouplingMap, basis: &BasisGates) -> Self {
        let mut operations: BTreeMap<String, QargMap> = BTreeMap::new();
        for gate in basis.gates() {
            let qargs = operations.entry(gate.to_string()).or_default();
            if TWO_QUBIT_OPERATIONS.contains(&gate) {
                for &(a, b) in coupling.edges() {
                    qargs.insert(Some(vec![a, b]), InstructionProperties::default());
                    qargs.insert(Some(vec![b, a]), InstructionProperties::default());
                }
            } else {
                qargs.insert(None, InstructionProperties::default());
            }
        }
        Self {
            name: None,
            num_qubits: coupling.num_qubits(),
            operations,
            coupling,
        }
    }

    /// Target name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of physical qubits.
    pub fn num_qubits(&self) -> u32 {
        self.num_qubits
    }

    /// Undirected connectivity.
    pub fn coupling_map(&self) -> &CouplingMap {
        &self.coupling
    }

    /// Supported operation names.
    pub fn operation_names(&self) -> impl Iterator<Item = &str> {
        self.operations.keys().map(String::as_str)
    }

    /// Supported operations as a basis set.
    pub fn basis_gates(&self) -> BasisGates {
        BasisGates::new(self.operation_names())
    }

    /// Whether the operation is supported on some qubits.
    pub fn supports(&self, name: &str) -> bool {
        DIRECTIVES.contains(&name) || self.operations.contains_key(name)
    }

    /// Whether the operation is supported on exactly these physical qubits.
    pub fn instruction_supported(&self, name: &str, qargs: &[u32]) -> bool {
        if DIRECTIVES.contains(&name) {
            return true;
        }
        self.operations.get(name).is_some_and(|map| {
            map.contains_key(&None) || map.keys().any(|k| k.as_deref() == Some(qargs))
        })
    }

    /// Calibration for an operation on these qubits, falling back to the
    /// any-tuple entry.
    pub fn properties(&self, name: &str, qargs: &[u32]) -> Option<&InstructionProperties> {
        let map = self.operations.get(name)?;
        map.iter()
            .find(|(k, _)| k.as_deref() == Some(qargs))
            .map(|(_, v)| v)
            .or_else(|| map.get(&None))
    }

    /// Duration of an operation on these qubits, in seconds.
    pub fn duration(&self, name: &str, qargs: &[u32]) -> Option<f64> {
        self.properties(name, qargs).and_then(|p| p.duration)
    }

    /// Error rate of an operation on these qubits.
    pub fn error(&self, name: &str, qargs: &[u32]) -> Option<f64> {
        self.properties(name, qargs).and_then(|p| p.error)
    }

    /// Lowest error of any two-qubit operation on the pair, in either
    /// direction; zero when uncalibrated.
    pub fn pair_error(&self, a: u32, b: u32) -> f64 {
        self.operations
            .iter()
            .filter(|(name, _)| TWO_QUBIT_OPERATIONS.contains(&name.as_str()))
            .flat_map(|(_, map)| {
                map.iter().filter_map(move |(k, props)| match k.as_deref() {
                    Some([x, y]) if (*x, *y) == (a, b) || (*x, *y) == (b, a) => props.error,
                    _ => None,
                })
            })
            .fold(None, |best: Option<f64>, e| Some(best.map_or(e, |b| b.min(e))))
            .unwrap_or(0.0)
    }
}

/// Builder for [`Target`].
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    name: Option<String>,
    num_qubits: u32,
    operations: BTreeMap<String, QargMap>,
}

impl TargetBuilder {
    /// Create a builder for a device with `num_qubits` qubits.
    pub fn new(num_qubits: u32) -> Self {
        Self {
            name: None,
            num_qubits,
            operations: BTreeMap::new(),
        }
    }

    /// Set the device name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add an operation on a specific qubit tuple, or on any tuple if `qargs` is `None`.
    #[must_use]
    pub fn add_instruction(
        mut self,
        name: impl Into<String>,
        qargs: Option<Vec<u32>>,
        properties: InstructionProperties,
    ) -> Self {
        self.operations
            .entry(name.into())
            .or_default()
            .insert(qargs, properties);
        self
    }

    /// Add an operation available on every qubit tuple.
    #[must_use]
    pub fn add_global(self, name: impl Into<String>) -> Self {
        self.add_instruction(name, None, InstructionProperties::default())
    }

    /// Add a two-qubit operation on both directions of every edge of `coupling`.
    #[must_use]
    pub fn add_coupled(mut self, name: impl Into<String>, coupling: &CouplingMap) -> Self {
        let name = name.into();
        for &(a, b) in coupling.edges() {
            self = self
                .add_instruction(name.clone(), Some(vec![a, b]), InstructionProperties::default())
                .add_instruction(name.clone(), Some(vec![b, a]), InstructionProperties::default());
        }
        self
    }

    /// Validate qubit indices and derive connectivity.
    pub fn build(self) -> CompileResult<Target> {
        let mut edges = vec![];
        for (name, map) in &self.operations {
            for qargs in map.keys().flatten() {
                if let Some(&q) = qargs.iter().find(|&&q| q >= self.num_qubits) {
                    return Err(CompileError::InvalidConfiguration(format!(
                        "operation '{name}' references qubit {q} on a {}-qubit target",
                        self.num_qubits
                    )));
                }
                if let [a, b] = qargs.as_slice() {
                    edges.push((*a, *b));
                }
            }
        }
        Ok(Target {
            name: self.name,
            num_qubits: self.num_qubits,
            operations: self.operations,
            coupling: CouplingMap::from_edges(self.num_qubits, edges),
        })
    }
}
