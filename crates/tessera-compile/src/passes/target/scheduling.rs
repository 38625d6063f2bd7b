//! Timing analysis from target durations.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tessera_ir::{CircuitDag, CircuitLevel, Instruction, NodeIndex, WireId};
use tracing::debug;

use crate::config::SchedulingMethod;
use crate::error::CompileResult;
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::property::PropertySet;
use crate::target::Target;

/// Property key the schedule is stored under.
pub const SCHEDULE: &str = "schedule";

/// Start time of every operation, in seconds from the start of the circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// How the operations were packed.
    pub method: SchedulingMethod,
    /// Start time per operation node.
    pub start_times: BTreeMap<NodeIndex, f64>,
    /// Time at which the last operation ends.
    pub duration: f64,
}

impl Schedule {
    /// Start time of `node`, if it was scheduled.
    pub fn start(&self, node: NodeIndex) -> Option<f64> {
        self.start_times.get(&node).copied()
    }
}

/// Duration of `inst` on the device; directives and uncalibrated
/// operations take no time.
fn op_duration(target: &Target, inst: &Instruction) -> f64 {
    if inst.is_barrier() {
        return 0.0;
    }
    let qargs: Vec<u32> = inst.qubits.iter().map(|q| q.0).collect();
    target.duration(inst.name(), &qargs).unwrap_or(0.0)
}

/// Pack operations against their wires in the given order. Returns each
/// node's interval `(t0, t1)` measured from the side the packing starts at.
fn pack(
    dag: &CircuitDag,
    target: &Target,
    order: impl Iterator<Item = NodeIndex>,
) -> (Vec<(NodeIndex, f64, f64)>, f64) {
    let mut idle: FxHashMap<WireId, f64> = FxHashMap::default();
    let mut intervals = Vec::new();
    let mut total: f64 = 0.0;
    for node in order {
        let Some(inst) = dag.get_instruction(node) else {
            continue;
        };
        let wires = inst.wires();
        let t0 = wires
            .iter()
            .map(|w| idle.get(w).copied().unwrap_or(0.0))
            .fold(0.0, f64::max);
        let t1 = t0 + op_duration(target, inst);
        for w in wires {
            idle.insert(w, t1);
        }
        total = total.max(t1);
        intervals.push((node, t0, t1));
    }
    (intervals, total)
}

/// ASAP or ALAP schedule of a physical circuit.
///
/// ALAP packs from the end of the circuit, so every operation starts as late
/// as its successors allow while the total duration stays the ASAP one.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleAnalysis {
    method: SchedulingMethod,
}

impl ScheduleAnalysis {
    /// Analysis packing in the given order.
    pub fn new(method: SchedulingMethod) -> Self {
        Self { method }
    }

    /// Compute the schedule without storing it.
    pub fn schedule(&self, dag: &CircuitDag, target: &Target) -> Schedule {
        let forward = dag.topological_op_nodes();
        let (intervals, duration) = match self.method {
            SchedulingMethod::Asap => {
                let (intervals, total) = pack(dag, target, forward);
                (intervals.into_iter().map(|(n, t0, _)| (n, t0)).collect(), total)
            }
            SchedulingMethod::Alap => {
                let order: Vec<NodeIndex> = forward.collect();
                let (intervals, total) = pack(dag, target, order.into_iter().rev());
                (intervals.into_iter().map(|(n, _, t1)| (n, total - t1)).collect(), total)
            }
        };
        Schedule {
            method: self.method,
            start_times: intervals,
            duration,
        }
    }
}

impl Pass for ScheduleAnalysis {
    fn name(&self) -> &str {
        "ScheduleAnalysis"
    }

    fn kind(&self) -> PassKind {
        PassKind::Analysis
    }

    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<PassOutcome> {
        let target = properties.require_target(self.name())?.clone();
        let schedule = self.schedule(dag, &target);
        debug!("{:?} schedule: {} ops over {:.3e} s", self.method, schedule.start_times.len(), schedule.duration);
        properties.insert(SCHEDULE, schedule);
        Ok(PassOutcome::Unchanged)
    }

    fn check_preconditions(&self, dag: &CircuitDag, properties: &PropertySet) -> Result<(), String> {
        if properties.target.is_none() {
            return Err("no target set".into());
        }
        if dag.level() != CircuitLevel::Physical {
            return Err("scheduling runs on physical circuits only".into());
        }
        Ok(())
    }
}
