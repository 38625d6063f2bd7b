//! Interaction-weighted layout search.

use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tessera_ir::{CircuitDag, CircuitLevel, QubitId};
use tracing::{debug, instrument};

use super::{check_fits, identity_layout};
use crate::config::{LayoutObjective, LayoutSearchConfig};
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::passes::target::routing::trial_seeds;
use crate::property::{Layout, PropertySet};
use crate::target::{CouplingMap, Target};

/// Costs closer than this compare equal.
const COST_EPSILON: f64 = 1e-9;

/// Greedy dense placement of `qubits` on `coupling`.
///
/// Physical qubits are taken in breadth-first order from the best-connected
/// one (lowest index on ties), and logical qubits in order of decreasing
/// interaction weight. Returns the physical qubit of each entry of `qubits`.
pub(crate) fn dense_start(
    qubits: &[QubitId],
    counts: &BTreeMap<(QubitId, QubitId), usize>,
    coupling: &CouplingMap,
) -> Vec<u32> {
    let num_physical = coupling.num_qubits();
    let hub = (0..num_physical)
        .max_by(|&a, &b| {
            coupling
                .neighbors(a)
                .len()
                .cmp(&coupling.neighbors(b).len())
                .then(b.cmp(&a))
        })
        .unwrap_or(0);

    let mut visited = vec![false; num_physical as usize];
    let mut physical_order = Vec::with_capacity(num_physical as usize);
    let mut queue = VecDeque::new();
    if num_physical > 0 {
        visited[hub as usize] = true;
        queue.push_back(hub);
    }
    while let Some(p) = queue.pop_front() {
        physical_order.push(p);
        for &n in coupling.neighbors(p) {
            if !visited[n as usize] {
                visited[n as usize] = true;
                queue.push_back(n);
            }
        }
    }
    physical_order.extend((0..num_physical).filter(|&p| !visited[p as usize]));

    let mut weight: FxHashMap<QubitId, usize> = FxHashMap::default();
    for (&(a, b), &w) in counts {
        *weight.entry(a).or_default() += w;
        *weight.entry(b).or_default() += w;
    }
    let mut logical_order: Vec<usize> = (0..qubits.len()).collect();
    logical_order.sort_by_key(|&i| (std::cmp::Reverse(weight.get(&qubits[i]).copied().unwrap_or(0)), i));

    let mut mapping = vec![0; qubits.len()];
    for (&logical, &physical) in logical_order.iter().zip(&physical_order) {
        mapping[logical] = physical;
    }
    mapping
}

fn cmp_cost(a: f64, b: f64) -> Ordering {
    if (a - b).abs() < COST_EPSILON {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    objective: f64,
    swaps: f64,
    mapping: Vec<u32>,
}

impl Candidate {
    /// Objective, then estimated swaps, then the mapping itself.
    fn cmp_key(&self, other: &Self) -> Ordering {
        cmp_cost(self.objective, other.objective)
            .then_with(|| cmp_cost(self.swaps, other.swaps))
            .then_with(|| self.mapping.cmp(&other.mapping))
    }
}

/// Weighted interaction graph against a device.
struct SearchProblem<'a> {
    num_physical: u32,
    edges: Vec<(usize, usize, f64)>,
    coupling: &'a CouplingMap,
    /// Pair error per physical pair, present for the error-weighted objective.
    pair_error: Option<Vec<Vec<f64>>>,
}

impl<'a> SearchProblem<'a> {
    fn new(
        qubits: &[QubitId],
        counts: &BTreeMap<(QubitId, QubitId), usize>,
        target: &'a Target,
        objective: LayoutObjective,
    ) -> Self {
        let index: FxHashMap<QubitId, usize> = qubits.iter().enumerate().map(|(i, &q)| (q, i)).collect();
        #[allow(clippy::cast_precision_loss)]
        let edges = counts
            .iter()
            .filter_map(|(&(a, b), &w)| Some((*index.get(&a)?, *index.get(&b)?, w as f64)))
            .collect();
        let num_physical = target.num_qubits();
        let pair_error = (objective == LayoutObjective::ErrorWeighted).then(|| {
            (0..num_physical)
                .map(|a| (0..num_physical).map(|b| target.pair_error(a, b)).collect())
                .collect()
        });
        Self {
            num_physical,
            edges,
            coupling: target.coupling_map(),
            pair_error,
        }
    }

    fn distance(&self, a: u32, b: u32) -> f64 {
        f64::from(self.coupling.distance(a, b).unwrap_or(self.num_physical))
    }

    fn evaluate(&self, mapping: Vec<u32>) -> Candidate {
        let mut objective = 0.0;
        let mut swaps = 0.0;
        for &(a, b, w) in &self.edges {
            let (pa, pb) = (mapping[a], mapping[b]);
            let d = self.distance(pa, pb);
            swaps += w * (d - 1.0);
            if let Some(errors) = &self.pair_error {
                objective += w * d * (1.0 + errors[pa as usize][pb as usize]);
            }
        }
        if self.pair_error.is_none() {
            objective = swaps;
        }
        Candidate {
            objective,
            swaps,
            mapping,
        }
    }

    /// Best-improvement local search over swap and move neighbourhoods.
    fn refine(&self, mut current: Candidate, iterations: usize) -> Candidate {
        let n = current.mapping.len();
        for _ in 0..iterations {
            let mut occupied = vec![false; self.num_physical as usize];
            for &p in &current.mapping {
                occupied[p as usize] = true;
            }

            let mut best: Option<Candidate> = None;
            let mut consider = |mapping: Vec<u32>| {
                let candidate = self.evaluate(mapping);
                if best
                    .as_ref()
                    .is_none_or(|b| candidate.cmp_key(b) == Ordering::Less)
                {
                    best = Some(candidate);
                }
            };
            for i in 0..n {
                for j in i + 1..n {
                    let mut mapping = current.mapping.clone();
                    mapping.swap(i, j);
                    consider(mapping);
                }
                for p in (0..self.num_physical).filter(|&p| !occupied[p as usize]) {
                    let mut mapping = current.mapping.clone();
                    mapping[i] = p;
                    consider(mapping);
                }
            }

            match best {
                Some(candidate) if candidate.cmp_key(&current) == Ordering::Less => current = candidate,
                _ => break,
            }
        }
        current
    }
}

/// Layout search driven by the circuit's two-qubit interaction counts.
///
/// Starts from a greedy dense placement plus `trials` seeded random
/// placements, refines each by local search, and keeps the best under
/// (objective, estimated swaps, lexicographic mapping).
#[derive(Debug, Clone, Default)]
pub struct InteractionLayout {
    config: LayoutSearchConfig,
    seed: u64,
    parallel: bool,
}

impl InteractionLayout {
    /// Search with the given settings, seed zero, sequential.
    pub fn new(config: LayoutSearchConfig) -> Self {
        Self {
            config,
            seed: 0,
            parallel: false,
        }
    }

    /// Seed for the random starts.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Refine starts on the rayon pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    fn search(&self, dag: &CircuitDag, target: &Target) -> Vec<u32> {
        let qubits: Vec<QubitId> = dag.qubits().collect();
        let counts = dag.interaction_counts();
        if counts.is_empty() {
            #[allow(clippy::cast_possible_truncation)]
            return (0..qubits.len() as u32).collect();
        }

        let problem = SearchProblem::new(&qubits, &counts, target, self.config.objective);
        let mut starts = vec![dense_start(&qubits, &counts, target.coupling_map())];
        for seed in trial_seeds(self.seed, self.config.trials) {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            let mut physical: Vec<u32> = (0..problem.num_physical).collect();
            physical.shuffle(&mut rng);
            physical.truncate(qubits.len());
            starts.push(physical);
        }

        let refine = |mapping: Vec<u32>| problem.refine(problem.evaluate(mapping), self.config.iterations);
        let candidates: Vec<Candidate> = if self.parallel {
            starts.into_par_iter().map(refine).collect()
        } else {
            starts.into_iter().map(refine).collect()
        };
        let best = candidates
            .into_iter()
            .min_by(Candidate::cmp_key)
            .map(|c| {
                debug!("InteractionLayout: objective {:.3}, estimated swaps {:.1}", c.objective, c.swaps);
                c.mapping
            });
        best.unwrap_or_default()
    }
}

impl Pass for InteractionLayout {
    fn name(&self) -> &str {
        "InteractionLayout"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    #[instrument(skip_all, fields(qubits = dag.num_qubits()))]
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?.clone();
        let num_physical = check_fits(dag, &target)?;

        let layout = if dag.level() == CircuitLevel::Physical {
            identity_layout(dag, num_physical)?
        } else {
            let mapping = self.search(dag, &target);
            let mut layout = Layout::new();
            for (q, p) in dag.qubits().zip(mapping) {
                layout.add(q, p);
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::target::{BasisGates, InstructionProperties};
    use tessera_ir::Circuit;

    fn run(pass: &InteractionLayout, dag: &mut CircuitDag, target: Target) -> Layout {
        let mut props = PropertySet::new().with_target(Arc::new(target));
        pass.run(dag, &mut props).unwrap();
        props.layout.unwrap()
    }

    fn star_interactions(n: u32) -> CircuitDag {
        let mut circuit = Circuit::with_size("star", n as usize, 0);
        for q in 1..n {
            circuit.cx(QubitId(0), QubitId(q)).unwrap();
        }
        circuit.into_dag()
    }

    #[test]
    fn test_hub_qubit_lands_on_hub() {
        // Logical 0 talks to everyone; physical 2 is the centre of a star.
        let coupling = CouplingMap::from_edges(5, [(2, 0), (2, 1), (2, 3), (2, 4)]);
        let target = Target::from_coupling(coupling, &BasisGates::ibm());
        let mut dag = star_interactions(5);

        let layout = run(&InteractionLayout::default(), &mut dag, target);
        assert_eq!(layout.get_physical(QubitId(0)), Some(2));
        assert!(layout.is_injective());
        assert_eq!(layout.len(), 5);
    }

    #[test]
    fn test_chain_placed_without_swaps() {
        let mut circuit = Circuit::with_size("chain", 4, 0);
        circuit.cx(QubitId(0), QubitId(2)).unwrap();
        circuit.cx(QubitId(2), QubitId(1)).unwrap();
        circuit.cx(QubitId(1), QubitId(3)).unwrap();
        let mut dag = circuit.into_dag();
        let target = Target::from_coupling(CouplingMap::linear(6), &BasisGates::ibm());

        let layout = run(&InteractionLayout::default(), &mut dag, target.clone());
        let problem_cost: u32 = [(0, 2), (2, 1), (1, 3)]
            .iter()
            .map(|&(a, b)| {
                let (pa, pb) = (
                    layout.get_physical(QubitId(a)).unwrap(),
                    layout.get_physical(QubitId(b)).unwrap(),
                );
                target.coupling_map().distance(pa, pb).unwrap() - 1
            })
            .sum();
        assert_eq!(problem_cost, 0);
    }

    #[test]
    fn test_error_weighted_avoids_noisy_pair() {
        let target = Target::builder(3)
            .add_global("rz")
            .add_global("sx")
            .add_instruction("cx", Some(vec![0, 1]), InstructionProperties::new(300e-9, 0.2))
            .add_instruction("cx", Some(vec![1, 2]), InstructionProperties::new(300e-9, 0.01))
            .build()
            .unwrap();
        let mut circuit = Circuit::with_size("pair", 2, 0);
        circuit.cx(QubitId(0), QubitId(1)).unwrap();
        let mut dag = circuit.into_dag();

        let config = LayoutSearchConfig {
            objective: LayoutObjective::ErrorWeighted,
            ..LayoutSearchConfig::default()
        };
        let layout = run(&InteractionLayout::new(config), &mut dag, target);
        let mut placed = [layout.get_physical(QubitId(0)).unwrap(), layout.get_physical(QubitId(1)).unwrap()];
        placed.sort_unstable();
        assert_eq!(placed, [1, 2]);
    }

    #[test]
    fn test_no_interactions_is_trivial() {
        let mut dag = Circuit::with_size("idle", 3, 0).into_dag();
        let target = Target::from_coupling(CouplingMap::ring(5), &BasisGates::ibm());
        let layout = run(&InteractionLayout::default(), &mut dag, target);
        assert_eq!(layout, Layout::trivial(3));
    }

    #[test]
    fn test_seeded_search_is_deterministic() {
        let mut circuit = Circuit::with_size("mix", 6, 0);
        for (a, b) in [(0, 5), (1, 4), (2, 3), (0, 3), (5, 2), (1, 0)] {
            circuit.cx(QubitId(a), QubitId(b)).unwrap();
        }
        let dag = circuit.into_dag();
        let target = Target::from_coupling(CouplingMap::grid(3, 3), &BasisGates::ibm());

        let pass = InteractionLayout::default().with_seed(11);
        let a = run(&pass, &mut dag.clone(), target.clone());
        let b = run(&pass.clone().with_parallel(true), &mut dag.clone(), target);
        assert_eq!(a, b);
        assert!(a.is_injective());
    }

    #[test]
    fn test_dense_start_orders_by_weight() {
        let qubits = [QubitId(0), QubitId(1), QubitId(2)];
        let counts = BTreeMap::from([((QubitId(1), QubitId(2)), 3), ((QubitId(0), QubitId(1)), 1)]);
        let mapping = dense_start(&qubits, &counts, &CouplingMap::star(4));
        // Qubit 1 carries the most weight and takes the hub.
        assert_eq!(mapping[1], 0);
        assert_eq!(mapping, vec![2, 0, 1]);
    }
}
