//! Sabre swap insertion.
//!
//! The router walks the circuit front layer by front layer. Operations whose
//! qubits are adjacent under the current layout are emitted; when none are,
//! it scores every swap on a coupling that touches a blocked qubit and
//! applies the cheapest. The score is the mean front-layer distance after
//! the swap, optionally plus the weighted mean distance of an extended set of
//! upcoming two-qubit operations, optionally scaled by a per-qubit decay that
//! discourages swapping the same qubits repeatedly.
//!
//! When `stall_factor · Q` swaps pass without an operation being emitted,
//! the release valve undoes them and walks the closest blocked pair together
//! along a shortest path, moving both ends.

use std::collections::{BTreeSet, VecDeque};

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tessera_ir::{CircuitDag, Instruction, IrError, NodeIndex, QubitId, StandardGate};
use tracing::{debug, instrument, trace};

use crate::config::{Heuristic, SabreConfig};
use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::passes::target::layout::{check_fits, empty_physical_like};
use crate::property::{Layout, PropertySet};
use crate::target::CouplingMap;

/// Scores closer than this are ties.
const SCORE_EPSILON: f64 = 1e-10;

/// Seeds for `trials` independent trials, derived from one outer seed.
pub(crate) fn trial_seeds(seed: u64, trials: usize) -> Vec<u64> {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    (0..trials).map(|_| rng.r#gen()).collect()
}

/// Result of one routing run.
#[derive(Debug, Clone)]
pub(crate) struct RoutedCircuit {
    /// Circuit on physical qubits `0..Q`.
    pub dag: CircuitDag,
    /// Where each logical qubit (and ancilla) ends up.
    pub final_layout: Layout,
    /// Number of swaps inserted.
    pub swaps: usize,
}

/// Routing engine shared by the routing pass and Sabre layout.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SabreRouter<'a> {
    coupling: &'a CouplingMap,
    config: &'a SabreConfig,
}

impl<'a> SabreRouter<'a> {
    pub(crate) fn new(coupling: &'a CouplingMap, config: &'a SabreConfig) -> Self {
        Self { coupling, config }
    }

    /// Fail on operations the router cannot place.
    pub(crate) fn check_routable(dag: &CircuitDag) -> CompileResult<()> {
        match dag
            .topological_ops()
            .find(|(_, inst)| inst.is_interaction() && inst.qubits.len() > 2)
        {
            Some((_, inst)) => Err(CompileError::pass(
                "SabreRouting",
                format!(
                    "operation '{}' acts on {} qubits; decompose it before routing",
                    inst.name(),
                    inst.qubits.len()
                ),
            )),
            None => Ok(()),
        }
    }

    /// Route `dag` starting from `initial`.
    ///
    /// With `rng`, score ties are broken by a random choice; without, the
    /// lowest physical pair wins.
    pub(crate) fn route(
        &self,
        dag: &CircuitDag,
        initial: &Layout,
        mut rng: Option<&mut Pcg64Mcg>,
    ) -> CompileResult<RoutedCircuit> {
        let num_physical = self.coupling.num_qubits();
        let mut layout = initial.clone();
        layout.fill_ancillas(num_physical);

        let out = empty_physical_like(dag, num_physical);

        let mut state = RoutingState {
            dag,
            coupling: self.coupling,
            config: self.config,
            layout,
            pending: dag.op_nodes().map(|n| (n, dag.op_predecessor_count(n))).collect(),
            front: dag.front_layer(),
            out,
            decay: vec![1.0; num_physical as usize],
            swaps: 0,
            swaps_since_decay_reset: 0,
            since_progress: Vec::new(),
        };
        let stall_limit = (self.config.stall_factor * num_physical as usize).max(1);

        loop {
            if state.execute_ready()? {
                state.since_progress.clear();
                state.reset_decay();
            }
            if state.front.is_empty() {
                break;
            }
            let front_pairs = state.front_pairs()?;
            if let Some(&(a, b)) = front_pairs
                .iter()
                .find(|&&(a, b)| self.coupling.distance(a, b).is_none())
            {
                return Err(CompileError::RoutingStall(format!(
                    "physical qubits {a} and {b} are not connected"
                )));
            }
            if state.since_progress.len() >= stall_limit {
                state.release_valve()?;
                continue;
            }
            let extended = state.extended_pairs()?;
            let (a, b) = state
                .choose_swap(&front_pairs, &extended, rng.as_deref_mut())
                .ok_or_else(|| CompileError::RoutingStall("no swap candidates".into()))?;
            state.apply_swap(a, b)?;
        }

        Ok(RoutedCircuit {
            dag: state.out,
            final_layout: state.layout,
            swaps: state.swaps,
        })
    }
}

struct RoutingState<'a> {
    dag: &'a CircuitDag,
    coupling: &'a CouplingMap,
    config: &'a SabreConfig,
    layout: Layout,
    /// Unrouted operation predecessors per node.
    pending: FxHashMap<NodeIndex, usize>,
    /// Operations whose predecessors are all routed, in node order.
    front: Vec<NodeIndex>,
    out: CircuitDag,
    decay: Vec<f64>,
    swaps: usize,
    swaps_since_decay_reset: usize,
    /// Swaps placed since an operation was last emitted.
    since_progress: Vec<(NodeIndex, u32, u32)>,
}

impl RoutingState<'_> {
    fn instruction(&self, node: NodeIndex) -> CompileResult<&Instruction> {
        self.dag
            .get_instruction(node)
            .ok_or_else(|| IrError::UnknownNode(node.index()).into())
    }

    fn physical(&self, qubit: QubitId) -> CompileResult<u32> {
        self.layout
            .get_physical(qubit)
            .ok_or_else(|| CompileError::InvalidLayout(format!("{qubit} is not placed")))
    }

    /// Physical pair of a two-qubit interaction.
    fn physical_pair(&self, node: NodeIndex) -> CompileResult<Option<(u32, u32)>> {
        let inst = self.instruction(node)?;
        if !inst.is_interaction() || inst.qubits.len() != 2 {
            return Ok(None);
        }
        Ok(Some((self.physical(inst.qubits[0])?, self.physical(inst.qubits[1])?)))
    }

    fn is_executable(&self, node: NodeIndex) -> CompileResult<bool> {
        Ok(self
            .physical_pair(node)?
            .is_none_or(|(a, b)| self.coupling.is_connected(a, b)))
    }

    /// Emit every executable front operation until none is left.
    fn execute_ready(&mut self) -> CompileResult<bool> {
        let dag = self.dag;
        let mut executed = false;
        loop {
            let mut ready = Vec::new();
            for &node in &self.front {
                if self.is_executable(node)? {
                    ready.push(node);
                }
            }
            if ready.is_empty() {
                return Ok(executed);
            }
            self.front.retain(|n| !ready.contains(n));
            for node in ready {
                let inst = dag
                    .get_instruction(node)
                    .ok_or(IrError::UnknownNode(node.index()))?;
                let mut mapped = inst.clone();
                mapped.qubits = inst
                    .qubits
                    .iter()
                    .map(|&q| self.physical(q).map(QubitId))
                    .collect::<CompileResult<_>>()?;
                self.out.apply(mapped)?;

                for succ in dag.op_successors(node) {
                    if let Some(count) = self.pending.get_mut(&succ) {
                        *count = count.saturating_sub(1);
                        if *count == 0 {
                            self.front.push(succ);
                        }
                    }
                }
            }
            self.front.sort_unstable();
            executed = true;
        }
    }

    fn front_pairs(&self) -> CompileResult<Vec<(u32, u32)>> {
        let mut pairs = Vec::with_capacity(self.front.len());
        for &node in &self.front {
            if let Some(pair) = self.physical_pair(node)? {
                pairs.push(pair);
            }
        }
        Ok(pairs)
    }

    /// Up to `extended_set_size` two-qubit operations that become ready once
    /// the front layer is routed, in breadth-first order.
    fn extended_pairs(&self) -> CompileResult<Vec<(u32, u32)>> {
        let limit = self.config.extended_set_size;
        if limit == 0 || self.config.heuristic == Heuristic::Basic {
            return Ok(Vec::new());
        }
        let mut remaining: FxHashMap<NodeIndex, usize> = FxHashMap::default();
        let mut queue: VecDeque<NodeIndex> = self.front.iter().copied().collect();
        let mut pairs = Vec::new();
        while let Some(node) = queue.pop_front() {
            for succ in self.dag.op_successors(node) {
                let count = remaining
                    .entry(succ)
                    .or_insert_with(|| self.pending.get(&succ).copied().unwrap_or(0));
                *count = count.saturating_sub(1);
                if *count > 0 {
                    continue;
                }
                if let Some((a, b)) = self.physical_pair(succ)? {
                    if self.coupling.distance(a, b).is_some() {
                        pairs.push((a, b));
                        if pairs.len() >= limit {
                            return Ok(pairs);
                        }
                    }
                }
                queue.push_back(succ);
            }
        }
        Ok(pairs)
    }

    fn distance(&self, a: u32, b: u32) -> f64 {
        self.coupling.distance(a, b).map_or(f64::INFINITY, f64::from)
    }

    fn score(&self, swap: (u32, u32), front: &[(u32, u32)], extended: &[(u32, u32)]) -> f64 {
        let moved = |p: u32| {
            if p == swap.0 {
                swap.1
            } else if p == swap.1 {
                swap.0
            } else {
                p
            }
        };
        let total = |pairs: &[(u32, u32)]| -> f64 {
            pairs.iter().map(|&(a, b)| self.distance(moved(a), moved(b))).sum()
        };

        let mut score = self.config.basic_weight * total(front) / front.len().max(1) as f64;
        if self.config.heuristic == Heuristic::Basic {
            return score;
        }
        if !extended.is_empty() {
            score += self.config.extended_set_weight * total(extended) / extended.len() as f64;
        }
        if self.config.heuristic == Heuristic::Decay {
            score *= self.decay[swap.0 as usize].max(self.decay[swap.1 as usize]);
        }
        score
    }

    /// Best-scoring swap on a coupling touching a blocked qubit.
    fn choose_swap(
        &self,
        front: &[(u32, u32)],
        extended: &[(u32, u32)],
        rng: Option<&mut Pcg64Mcg>,
    ) -> Option<(u32, u32)> {
        let candidates: BTreeSet<(u32, u32)> = front
            .iter()
            .flat_map(|&(a, b)| [a, b])
            .flat_map(|p| self.coupling.neighbors(p).iter().map(move |&n| (p.min(n), p.max(n))))
            .collect();
        let scored: Vec<((u32, u32), f64)> = candidates
            .into_iter()
            .map(|swap| (swap, self.score(swap, front, extended)))
            .collect();
        let best = scored.iter().map(|&(_, s)| s).fold(f64::INFINITY, f64::min);
        let ties: Vec<(u32, u32)> = scored
            .into_iter()
            .filter(|&(_, s)| s <= best + SCORE_EPSILON)
            .map(|(swap, _)| swap)
            .collect();
        trace!("best swap score {best:.4}, {} tied", ties.len());
        match rng {
            Some(rng) if ties.len() > 1 => Some(ties[rng.gen_range(0..ties.len())]),
            _ => ties.first().copied(),
        }
    }

    fn apply_swap(&mut self, a: u32, b: u32) -> CompileResult<()> {
        let node = self
            .out
            .apply(Instruction::two_qubit_gate(StandardGate::Swap, QubitId(a), QubitId(b)))?;
        self.layout.swap(a, b);
        self.swaps += 1;
        self.since_progress.push((node, a, b));

        self.decay[a as usize] += self.config.decay_increment;
        self.decay[b as usize] += self.config.decay_increment;
        self.swaps_since_decay_reset += 1;
        if self.swaps_since_decay_reset >= self.config.decay_reset.max(1) {
            self.reset_decay();
        }
        Ok(())
    }

    fn reset_decay(&mut self) {
        self.decay.fill(1.0);
        self.swaps_since_decay_reset = 0;
    }

    /// Undo the swaps since the last emitted operation, then bring the
    /// closest blocked pair together along a shortest path.
    fn release_valve(&mut self) -> CompileResult<()> {
        for (node, a, b) in std::mem::take(&mut self.since_progress).into_iter().rev() {
            self.out.remove_operation(node)?;
            self.layout.swap(a, b);
            self.swaps -= 1;
        }

        let front = self.front_pairs()?;
        let (a, b) = front
            .iter()
            .copied()
            .min_by_key(|&(a, b)| self.coupling.distance(a, b).unwrap_or(u32::MAX))
            .ok_or_else(|| CompileError::RoutingStall("release valve found no blocked pair".into()))?;
        let path = self
            .coupling
            .shortest_path(a, b)
            .filter(|path| path.len() >= 3)
            .ok_or_else(|| CompileError::RoutingStall(format!("no path between physical qubits {a} and {b}")))?;
        debug!("Release valve: walking {a} and {b} together over {} swaps", path.len() - 2);

        let needed = path.len() - 2;
        let from_start = needed.div_ceil(2);
        for i in 0..from_start {
            self.apply_swap(path[i], path[i + 1])?;
        }
        let last = path.len() - 1;
        for j in 0..needed - from_start {
            self.apply_swap(path[last - j], path[last - j - 1])?;
        }
        self.since_progress.clear();
        self.reset_decay();
        Ok(())
    }
}

/// Sabre routing pass.
///
/// Needs a target and a layout. Replaces the DAG by one with a wire per
/// physical qubit, records the permuted layout as `final_layout` and the
/// number of inserted swaps under `swap_count`.
///
/// With `seeded_tie_break`, `swap_trials` independent trials run (on the
/// rayon pool when parallel) and the one with the fewest swaps wins, lowest
/// trial index first.
#[derive(Debug, Clone, Default)]
pub struct SabreRouting {
    config: SabreConfig,
    seed: u64,
    parallel: bool,
}

impl SabreRouting {
    /// Routing with the given settings, seed zero, sequential trials.
    pub fn new(config: SabreConfig) -> Self {
        Self {
            config,
            seed: 0,
            parallel: false,
        }
    }

    /// Seed for trial derivation.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Run trials on the rayon pool.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }
}

impl Pass for SabreRouting {
    fn name(&self) -> &str {
        "SabreRouting"
    }

    fn kind(&self) -> PassKind {
        PassKind::Transformation
    }

    #[instrument(skip_all, fields(ops = dag.num_ops(), qubits = dag.num_qubits()))]
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?.clone();
        let layout = properties.require_layout(self.name())?.clone();
        let num_physical = check_fits(dag, &target)?;
        layout.validate(dag.qubits(), num_physical)?;
        SabreRouter::check_routable(dag)?;

        let router = SabreRouter::new(target.coupling_map(), &self.config);
        let trials = if self.config.seeded_tie_break {
            self.config.swap_trials.max(1)
        } else {
            1
        };
        let seeds = trial_seeds(self.seed, trials);
        let source: &CircuitDag = dag;
        let run_trial = |(index, seed): (usize, u64)| {
            let mut rng = Pcg64Mcg::seed_from_u64(seed);
            let tie_rng = self.config.seeded_tie_break.then_some(&mut rng);
            router.route(source, &layout, tie_rng).map(|routed| (index, routed))
        };
        let results: Vec<CompileResult<(usize, RoutedCircuit)>> = if self.parallel && trials > 1 {
            seeds.into_par_iter().enumerate().map(run_trial).collect()
        } else {
            seeds.into_iter().enumerate().map(run_trial).collect()
        };

        let mut best: Option<(usize, RoutedCircuit)> = None;
        let mut first_error = None;
        for result in results {
            match result {
                Ok((index, routed)) => {
                    let better = best
                        .as_ref()
                        .is_none_or(|(i, b)| (routed.swaps, index) < (b.swaps, *i));
                    if better {
                        best = Some((index, routed));
                    }
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        let Some((index, routed)) = best else {
            return Err(first_error
                .unwrap_or_else(|| CompileError::RoutingStall("no routing trial completed".into())));
        };
        debug!("SabreRouting: {} swaps (trial {index} of {trials})", routed.swaps);

        let changed = routed.dag != *dag;
        *dag = routed.dag;
        properties.final_layout = Some(routed.final_layout);
        properties.insert("swap_count", routed.swaps);
        Ok(PassOutcome::from_changed(changed))
    }

    fn check_preconditions(&self, _dag: &CircuitDag, properties: &PropertySet) -> Result<(), String> {
        if properties.target.is_none() {
            return Err("no target set".into());
        }
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
    use crate::target::{BasisGates, Target};
    use tessera_ir::{Circuit, CircuitLevel};

    fn route(dag: &CircuitDag, coupling: &CouplingMap, config: &SabreConfig) -> CompileResult<RoutedCircuit> {
        SabreRouter::new(coupling, config).route(dag, &Layout::trivial(dag.num_qubits() as u32), None)
    }

    fn assert_connected(dag: &CircuitDag, coupling: &CouplingMap) {
        for (_, a, b) in dag.two_qubit_ops() {
            assert!(coupling.is_connected(a.0, b.0), "{a}-{b} not coupled");
        }
    }

    #[test]
    fn test_single_swap_on_line() {
        let mut c = Circuit::with_size("test", 3, 0);
        c.cx(QubitId(0), QubitId(2)).unwrap();
        let coupling = CouplingMap::linear(3);
        let routed = route(c.dag(), &coupling, &SabreConfig::default()).unwrap();

        assert_eq!(routed.swaps, 1);
        assert_eq!(routed.dag.count_ops().get("swap"), Some(&1));
        assert_eq!(routed.final_layout.get_physical(QubitId(0)), Some(1));
        assert_eq!(routed.final_layout.get_physical(QubitId(1)), Some(0));
        assert_eq!(routed.final_layout.get_physical(QubitId(2)), Some(2));
        assert_eq!(routed.dag.level(), CircuitLevel::Physical);
        assert_connected(&routed.dag, &coupling);
    }

    #[test]
    fn test_adjacent_ops_pass_through() {
        let mut c = Circuit::with_size("test", 3, 1);
        c.h(QubitId(0)).unwrap();
        c.cx(QubitId(0), QubitId(1)).unwrap();
        c.cx(QubitId(1), QubitId(2)).unwrap();
        c.measure(QubitId(2), tessera_ir::ClbitId(0)).unwrap();
        let routed = route(c.dag(), &CouplingMap::linear(4), &SabreConfig::default()).unwrap();

        assert_eq!(routed.swaps, 0);
        assert_eq!(routed.dag.num_qubits(), 4);
        assert_eq!(routed.dag.num_ops(), 4);
    }

    #[test]
    fn test_all_to_all_on_grid() {
        let mut c = Circuit::with_size("test", 6, 0);
        for a in 0..6 {
            for b in 0..6 {
                if a != b {
                    c.cx(QubitId(a), QubitId(b)).unwrap();
                }
            }
        }
        let coupling = CouplingMap::grid(2, 3);
        for heuristic in [Heuristic::Basic, Heuristic::Lookahead, Heuristic::Decay] {
            let config = SabreConfig {
                heuristic,
                ..SabreConfig::default()
            };
            let routed = route(c.dag(), &coupling, &config).unwrap();
            assert_connected(&routed.dag, &coupling);
            assert_eq!(routed.dag.count_ops().get("cx"), Some(&30));
            assert!(routed.final_layout.is_injective());
        }
    }

    #[test]
    fn test_release_valve_walks_both_ends() {
        let mut c = Circuit::with_size("test", 6, 0);
        c.cx(QubitId(0), QubitId(5)).unwrap();
        let coupling = CouplingMap::linear(6);
        let config = SabreConfig {
            stall_factor: 0,
            ..SabreConfig::default()
        };
        let routed = route(c.dag(), &coupling, &config).unwrap();

        assert_eq!(routed.swaps, 4);
        assert_eq!(routed.final_layout.get_physical(QubitId(0)), Some(2));
        assert_eq!(routed.final_layout.get_physical(QubitId(5)), Some(3));
        assert_connected(&routed.dag, &coupling);
    }

    #[test]
    fn test_disconnected_pair_stalls() {
        let mut c = Circuit::with_size("test", 4, 0);
        c.cx(QubitId(0), QubitId(2)).unwrap();
        let coupling = CouplingMap::from_edges(4, [(0, 1), (2, 3)]);
        assert!(matches!(
            route(c.dag(), &coupling, &SabreConfig::default()),
            Err(CompileError::RoutingStall(_))
        ));
    }

    #[test]
    fn test_three_qubit_ops_rejected() {
        let mut c = Circuit::with_size("test", 3, 0);
        c.ccx(QubitId(0), QubitId(1), QubitId(2)).unwrap();
        match SabreRouter::check_routable(c.dag()) {
            Err(CompileError::Transpiler { pass, .. }) => assert_eq!(pass, "SabreRouting"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_pass_records_final_layout_and_swaps() {
        let target = Arc::new(Target::from_coupling(CouplingMap::linear(3), &BasisGates::ibm()));
        let mut props = PropertySet::new().with_target(target).with_layout(Layout::trivial(3));
        let mut c = Circuit::with_size("test", 3, 0);
        c.cx(QubitId(0), QubitId(2)).unwrap();
        let mut dag = c.into_dag();

        let outcome = SabreRouting::default().run(&mut dag, &mut props).unwrap();
        assert!(outcome.is_changed());
        assert_eq!(props.get::<usize>("swap_count"), Some(&1));
        assert_eq!(props.final_layout.as_ref().unwrap().get_physical(QubitId(0)), Some(1));
    }

    #[test]
    fn test_seeded_trials_are_reproducible() {
        let target = Arc::new(Target::from_coupling(CouplingMap::ring(8), &BasisGates::ibm()));
        let mut c = Circuit::with_size("test", 8, 0);
        for i in 0..8u32 {
            c.cx(QubitId(i), QubitId((i * 3 + 4) % 8)).unwrap();
        }
        let config = SabreConfig {
            seeded_tie_break: true,
            swap_trials: 6,
            ..SabreConfig::default()
        };

        let run = |parallel: bool| {
            let mut props = PropertySet::new()
                .with_target(target.clone())
                .with_layout(Layout::trivial(8));
            let mut dag = c.dag().clone();
            SabreRouting::new(config.clone())
                .with_seed(11)
                .with_parallel(parallel)
                .run(&mut dag, &mut props)
                .unwrap();
            (dag, props.final_layout)
        };
        assert_eq!(run(false), run(true));
    }

    #[test]
    fn test_trial_seeds_depend_on_seed() {
        assert_eq!(trial_seeds(3, 4), trial_seeds(3, 4));
        assert_ne!(trial_seeds(3, 4), trial_seeds(4, 4));
        assert_eq!(trial_seeds(3, 4)[..2], trial_seeds(3, 2)[..]);
    }
}
