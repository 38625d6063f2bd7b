//! Pass manager for orchestrating compilation.
//!
//! A [`PassManager`] runs an ordered list of [`PassGroup`]s. Groups come in
//! three flavours:
//!
//! - [`PassGroup::Sequence`] runs its steps once, in order.
//! - [`PassGroup::FixedPoint`] repeats its steps until an iteration changes
//!   nothing, or stops silently at `max_iterations`.
//! - [`PassGroup::Conditional`] evaluates a predicate over the property set
//!   and runs one of two branches.
//!
//! Groups nest. A run works on private copies of the DAG and property set and
//! only writes them back when every group succeeded, so on error or
//! cancellation the caller's state is untouched.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, instrument, warn};

use tessera_ir::CircuitDag;

use crate::error::{CompileError, CompileResult};
use crate::pass::{Pass, PassKind, PassOutcome};
use crate::preset::{PresetStages, Stage, StageRegistry};
use crate::property::PropertySet;

/// Predicate deciding a conditional group.
pub type Predicate = Arc<dyn Fn(&PropertySet) -> bool + Send + Sync>;

/// One entry of a group: a pass or a nested group.
#[derive(Clone)]
pub enum Step {
    /// A single pass.
    Pass(Arc<dyn Pass>),
    /// A nested group.
    Group(PassGroup),
}

impl Step {
    /// Wrap a pass.
    pub fn pass(pass: impl Pass + 'static) -> Self {
        Step::Pass(Arc::new(pass))
    }
}

impl From<PassGroup> for Step {
    fn from(group: PassGroup) -> Self {
        Step::Group(group)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Pass(p) => write!(f, "Pass({})", p.name()),
            Step::Group(g) => g.fmt(f),
        }
    }
}

/// A group of steps with a control-flow rule.
#[derive(Clone)]
pub enum PassGroup {
    /// Run once, in order.
    Sequence(Vec<Step>),
    /// Repeat until nothing changes, at most `max_iterations` times.
    FixedPoint {
        /// Steps of one iteration.
        steps: Vec<Step>,
        /// Iteration bound.
        max_iterations: usize,
    },
    /// Branch on the property set.
    Conditional {
        /// Decides the branch.
        predicate: Predicate,
        /// Steps when the predicate holds.
        then: Vec<Step>,
        /// Steps otherwise.
        otherwise: Vec<Step>,
    },
}

impl PassGroup {
    /// A sequence of passes.
    pub fn sequence(steps: impl IntoIterator<Item = Step>) -> Self {
        PassGroup::Sequence(steps.into_iter().collect())
    }

    /// A fixed-point loop.
    pub fn fixed_point(steps: impl IntoIterator<Item = Step>, max_iterations: usize) -> Self {
        PassGroup::FixedPoint {
            steps: steps.into_iter().collect(),
            max_iterations,
        }
    }

    /// A conditional with an empty `otherwise` branch.
    pub fn conditional(
        predicate: impl Fn(&PropertySet) -> bool + Send + Sync + 'static,
        then: impl IntoIterator<Item = Step>,
    ) -> Self {
        PassGroup::Conditional {
            predicate: Arc::new(predicate),
            then: then.into_iter().collect(),
            otherwise: vec![],
        }
    }

    /// Set the `otherwise` branch of a conditional. No effect on other groups.
    #[must_use]
    pub fn otherwise(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        if let PassGroup::Conditional { otherwise, .. } = &mut self {
            *otherwise = steps.into_iter().collect();
        }
        self
    }

    fn collect_names(&self, out: &mut Vec<String>) {
        let steps: Box<dyn Iterator<Item = &Step>> = match self {
            PassGroup::Sequence(steps) | PassGroup::FixedPoint { steps, .. } => Box::new(steps.iter()),
            PassGroup::Conditional { then, otherwise, .. } => Box::new(then.iter().chain(otherwise)),
        };
        for step in steps {
            match step {
                Step::Pass(p) => out.push(p.name().to_string()),
                Step::Group(g) => g.collect_names(out),
            }
        }
    }
}

impl fmt::Debug for PassGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassGroup::Sequence(steps) => f.debug_tuple("Sequence").field(steps).finish(),
            PassGroup::FixedPoint {
                steps,
                max_iterations,
            } => f
                .debug_struct("FixedPoint")
                .field("steps", steps)
                .field("max_iterations", max_iterations)
                .finish(),
            PassGroup::Conditional {
                then, otherwise, ..
            } => f
                .debug_struct("Conditional")
                .field("then", then)
                .field("otherwise", otherwise)
                .finish_non_exhaustive(),
        }
    }
}

/// Shared flag for cancelling a run between groups.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Lifecycle of a pass within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStatus {
    /// Scheduled, not reached yet.
    Pending,
    /// Currently executing.
    Running,
    /// Finished.
    Done,
    /// `should_run` returned false.
    Skipped,
}

/// What happened to one pass execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassRecord {
    /// Pass name.
    pub name: String,
    /// Final status.
    pub status: PassStatus,
    /// Whether the pass changed the DAG.
    pub changed: bool,
    /// Analysis keys the pass wrote.
    pub registered: Vec<String>,
    /// Iteration of the enclosing fixed-point loop (0 outside loops).
    pub iteration: usize,
}

/// Diagnostics of a pass-manager run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// One record per pass execution, in execution order.
    pub records: Vec<PassRecord>,
}

impl RunReport {
    /// Records of passes that ran.
    pub fn executed(&self) -> impl Iterator<Item = &PassRecord> {
        self.records.iter().filter(|r| r.status == PassStatus::Done)
    }

    /// Names of skipped passes.
    pub fn skipped(&self) -> Vec<&str> {
        self.records
            .iter()
            .filter(|r| r.status == PassStatus::Skipped)
            .map(|r| r.name.as_str())
            .collect()
    }

    /// All records of a pass.
    pub fn records_for<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a PassRecord> + 'a {
        self.records.iter().filter(move |r| r.name == name)
    }

    /// Whether any pass changed the DAG.
    pub fn changed_any(&self) -> bool {
        self.records.iter().any(|r| r.changed)
    }
}

/// Manages and executes groups of compilation passes.
#[derive(Debug, Clone, Default)]
pub struct PassManager {
    groups: Vec<PassGroup>,
}

impl PassManager {
    /// Create an empty pass manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single pass as its own sequence group.
    pub fn add_pass(&mut self, pass: impl Pass + 'static) {
        self.groups.push(PassGroup::sequence([Step::pass(pass)]));
    }

    /// Append a group.
    pub fn add_group(&mut self, group: PassGroup) {
        self.groups.push(group);
    }

    /// Number of top-level groups.
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Whether the manager has no groups.
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Every pass that could run, in schedule order, all pending.
    pub fn plan(&self) -> RunReport {
        let mut names = vec![];
        for group in &self.groups {
            group.collect_names(&mut names);
        }
        RunReport {
            records: names
                .into_iter()
                .map(|name| PassRecord {
                    name,
                    status: PassStatus::Pending,
                    changed: false,
                    registered: vec![],
                    iteration: 0,
                })
                .collect(),
        }
    }

    /// Run all groups on the DAG.
    pub fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet) -> CompileResult<RunReport> {
        self.run_with_cancellation(dag, properties, &CancellationToken::new())
    }

    /// Run all groups, checking `token` before each top-level group.
    #[instrument(skip_all, fields(groups = self.groups.len(), qubits = dag.num_qubits()))]
    pub fn run_with_cancellation(
        &self,
        dag: &mut CircuitDag,
        properties: &mut PropertySet,
        token: &CancellationToken,
    ) -> CompileResult<RunReport> {
        info!(
            "Running pass manager with {} groups on circuit with {} qubits, {} ops",
            self.groups.len(),
            dag.num_qubits(),
            dag.num_ops()
        );

        let mut work_dag = dag.clone();
        let mut work_props = properties.clone();
        let mut report = RunReport::default();

        for group in &self.groups {
            if token.is_cancelled() {
                warn!("Pass manager cancelled, discarding work");
                return Err(CompileError::Cancelled);
            }
            run_group(group, &mut work_dag, &mut work_props, &mut report, 0)?;
        }

        info!(
            "Pass manager completed, final depth: {}, ops: {}",
            work_dag.depth(),
            work_dag.num_ops()
        );
        *dag = work_dag;
        *properties = work_props;
        Ok(report)
    }
}

/// Run one group; returns whether any pass in it changed the DAG.
fn run_group(
    group: &PassGroup,
    dag: &mut CircuitDag,
    props: &mut PropertySet,
    report: &mut RunReport,
    iteration: usize,
) -> CompileResult<bool> {
    match group {
        PassGroup::Sequence(steps) => run_steps(steps, dag, props, report, iteration),
        PassGroup::FixedPoint {
            steps,
            max_iterations,
        } => {
            let mut changed_any = false;
            for i in 0..*max_iterations {
                let changed = run_steps(steps, dag, props, report, i)?;
                changed_any |= changed;
                if !changed {
                    debug!("Fixed point reached after {} iteration(s)", i + 1);
                    return Ok(changed_any);
                }
            }
            debug!("Fixed-point loop stopped at bound {max_iterations}");
            Ok(changed_any)
        }
        PassGroup::Conditional {
            predicate,
            then,
            otherwise,
        } => {
            let branch = if predicate(props) { then } else { otherwise };
            run_steps(branch, dag, props, report, iteration)
        }
    }
}

fn run_steps(
    steps: &[Step],
    dag: &mut CircuitDag,
    props: &mut PropertySet,
    report: &mut RunReport,
    iteration: usize,
) -> CompileResult<bool> {
    let mut changed = false;
    for step in steps {
        changed |= match step {
            Step::Pass(pass) => run_pass(pass.as_ref(), dag, props, report, iteration)?,
            Step::Group(group) => run_group(group, dag, props, report, iteration)?,
        };
    }
    Ok(changed)
}

fn run_pass(
    pass: &dyn Pass,
    dag: &mut CircuitDag,
    props: &mut PropertySet,
    report: &mut RunReport,
    iteration: usize,
) -> CompileResult<bool> {
    let name = pass.name().to_string();
    if !pass.should_run(dag, props) {
        debug!("Skipping pass: {name}");
        report.records.push(PassRecord {
            name,
            status: PassStatus::Skipped,
            changed: false,
            registered: vec![],
            iteration,
        });
        return Ok(false);
    }

    pass.check_preconditions(dag, props)
        .map_err(|cause| CompileError::pass(&name, cause))?;

    debug!("Running pass: {name}");
    let index = report.records.len();
    report.records.push(PassRecord {
        name: name.clone(),
        status: PassStatus::Running,
        changed: false,
        registered: vec![],
        iteration,
    });

    props.take_written();
    let version = dag.version();
    let outcome = pass.run(dag, props)?;
    if pass.kind() == PassKind::Analysis && dag.version() != version {
        return Err(CompileError::pass(&name, "analysis pass modified the DAG"));
    }
    let registered = props.take_written();
    if outcome == PassOutcome::Changed {
        props.invalidate(&pass.invalidates(), &registered);
    }

    debug!("Pass {name} completed, changed: {}, ops: {}", outcome.is_changed(), dag.num_ops());
    let record = &mut report.records[index];
    record.status = PassStatus::Done;
    record.changed = outcome.is_changed();
    record.registered = registered;
    Ok(outcome.is_changed())
}

/// Builds a pass manager from a target and optimization level using a
/// [`StageRegistry`].
pub struct PassManagerBuilder {
    config: crate::config::TranspileConfig,
    registry: Option<Arc<dyn StageRegistry>>,
}

impl PassManagerBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: crate::config::TranspileConfig::default(),
            registry: None,
        }
    }

    /// Use a full configuration.
    #[must_use]
    pub fn with_config(mut self, config: crate::config::TranspileConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the optimization level (clamped to 0-3).
    #[must_use]
    pub fn with_optimization_level(mut self, level: u8) -> Self {
        self.config.optimization_level = level.min(3);
        self
    }

    /// Resolve stages through a custom registry instead of the presets.
    #[must_use]
    pub fn with_stage_registry(mut self, registry: Arc<dyn StageRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Assemble the stages in pipeline order.
    pub fn build(self) -> CompileResult<PassManager> {
        self.config.validate()?;
        let registry: Arc<dyn StageRegistry> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(PresetStages::new(self.config.clone())),
        };
        let mut pm = PassManager::new();
        for stage in Stage::ALL {
            for group in registry.resolve(stage)? {
                pm.add_group(group);
            }
        }
        Ok(pm)
    }
}

impl Default for PassManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
