//! Preset compilation stages.
//!
//! A pipeline is six stages in a fixed order. Each stage resolves to a list
//! of pass groups through a [`StageRegistry`]; [`PresetStages`] is the
//! built-in registry for optimization levels 0-3.
//!
//! | Stage | Level 0 | Level 1 | Levels 2-3 |
//! |-------|---------|---------|------------|
//! | `init` | synthesis, 3+ qubit unrolling | same | same |
//! | `layout` | trivial | configured method | configured method |
//! | `routing` | configured method | same | same |
//! | `translation` | basis translation, gate direction | same | same |
//! | `optimization` | none | 1q merging, cancellation (fixed point) | + diagonal removal, barrier merging |
//! | `scheduling` | when configured | same | same |

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::{LayoutMethod, RoutingMethod, TranspileConfig};
use crate::error::{CompileError, CompileResult};
use crate::manager::{PassGroup, Step};
use crate::passes::agnostic::{
    CancelCX, HighLevelSynthesis, MergeAdjacentBarriers, Optimize1qGates, RemoveDiagonalGatesBeforeMeasure,
};
use crate::passes::target::{
    ApplyLayout, BasisTranslation, CheckMap, GateDirection, IS_SWAP_MAPPED, InteractionLayout, SabreLayout,
    SabreRouting, ScheduleAnalysis, TrivialLayout, Unroll3qOrMore,
};
use crate::property::PropertySet;
use crate::registry::{PluginRegistry, SynthesisRegistry};

/// A stage of the compilation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Synthesis of abstract operations.
    Init,
    /// Initial layout selection.
    Layout,
    /// Swap insertion.
    Routing,
    /// Rewriting into the target's operations.
    Translation,
    /// Gate-count reduction.
    Optimization,
    /// Timing analysis.
    Scheduling,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 6] = [
        Stage::Init,
        Stage::Layout,
        Stage::Routing,
        Stage::Translation,
        Stage::Optimization,
        Stage::Scheduling,
    ];

    /// Lowercase stage name.
    pub fn name(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::Layout => "layout",
            Stage::Routing => "routing",
            Stage::Translation => "translation",
            Stage::Optimization => "optimization",
            Stage::Scheduling => "scheduling",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| CompileError::InvalidConfiguration(format!("unknown stage '{s}'")))
    }
}

/// Lookup of the pass groups making up each stage.
pub trait StageRegistry: Send + Sync {
    /// Groups for `stage`, in order. An empty list skips the stage.
    fn resolve(&self, stage: Stage) -> CompileResult<Vec<PassGroup>>;
}

/// Built-in stages driven by a [`TranspileConfig`].
///
/// Individual stages can be replaced with [`PresetStages::with_stage`].
#[derive(Clone)]
pub struct PresetStages {
    config: TranspileConfig,
    synthesis: Arc<dyn SynthesisRegistry>,
    overrides: BTreeMap<Stage, Vec<PassGroup>>,
}

impl PresetStages {
    /// Presets for `config` with the built-in synthesis methods.
    pub fn new(config: TranspileConfig) -> Self {
        Self {
            config,
            synthesis: Arc::new(PluginRegistry::with_builtin_methods()),
            overrides: BTreeMap::new(),
        }
    }

    /// Use another synthesis registry in the `init` stage.
    #[must_use]
    pub fn with_synthesis_registry(mut self, registry: Arc<dyn SynthesisRegistry>) -> Self {
        self.synthesis = registry;
        self
    }

    /// Replace one stage by the given groups.
    #[must_use]
    pub fn with_stage(mut self, stage: Stage, groups: Vec<PassGroup>) -> Self {
        self.overrides.insert(stage, groups);
        self
    }

    /// The configuration the presets are built from.
    pub fn config(&self) -> &TranspileConfig {
        &self.config
    }

    fn init(&self) -> Vec<PassGroup> {
        let synthesis = HighLevelSynthesis::new(self.synthesis.clone())
            .with_methods(self.config.synthesis.methods.clone())
            .with_tolerance(self.config.synthesis.tolerance);
        vec![PassGroup::sequence([
            Step::pass(synthesis),
            Step::pass(Unroll3qOrMore::new()),
        ])]
    }

    fn layout(&self) -> Vec<PassGroup> {
        let config = &self.config;
        let method = if config.optimization_level == 0 {
            LayoutMethod::Trivial
        } else {
            config.layout_method
        };
        let step = match method {
            LayoutMethod::Trivial => Step::pass(TrivialLayout),
            LayoutMethod::Dense => Step::pass(
                InteractionLayout::new(config.layout_search.clone())
                    .with_seed(config.seed)
                    .with_parallel(config.parallel_trials),
            ),
            LayoutMethod::Sabre => Step::pass(
                SabreLayout::new(config.sabre.clone())
                    .with_seed(config.seed)
                    .with_parallel(config.parallel_trials),
            ),
        };
        vec![PassGroup::sequence([step])]
    }

    fn routing(&self) -> Vec<PassGroup> {
        let config = &self.config;
        let unmapped = |props: &PropertySet| !props.get::<bool>(IS_SWAP_MAPPED).copied().unwrap_or(false);
        match config.routing_method {
            RoutingMethod::Sabre => vec![
                PassGroup::sequence([Step::pass(CheckMap)]),
                PassGroup::conditional(
                    unmapped,
                    [Step::pass(
                        SabreRouting::new(config.sabre.clone())
                            .with_seed(config.seed)
                            .with_parallel(config.parallel_trials),
                    )],
                )
                .otherwise([Step::pass(ApplyLayout::new())]),
            ],
            RoutingMethod::None => vec![PassGroup::sequence([Step::pass(ApplyLayout::strict())])],
        }
    }

    fn translation(&self) -> Vec<PassGroup> {
        vec![PassGroup::sequence([
            Step::pass(BasisTranslation::new()),
            Step::pass(GateDirection),
            Step::pass(BasisTranslation::new()),
        ])]
    }

    fn optimization(&self) -> Vec<PassGroup> {
        let level = self.config.optimization_level;
        if level == 0 {
            return vec![];
        }
        let mut steps = vec![Step::pass(Optimize1qGates::new()), Step::pass(CancelCX::new())];
        if level >= 2 {
            steps.push(Step::pass(RemoveDiagonalGatesBeforeMeasure));
            steps.push(Step::pass(MergeAdjacentBarriers));
        }
        vec![PassGroup::fixed_point(steps, self.config.max_fixed_point_iterations)]
    }

    fn scheduling(&self) -> Vec<PassGroup> {
        self.config
            .scheduling
            .map(|method| vec![PassGroup::sequence([Step::pass(ScheduleAnalysis::new(method))])])
            .unwrap_or_default()
    }
}

impl StageRegistry for PresetStages {
    fn resolve(&self, stage: Stage) -> CompileResult<Vec<PassGroup>> {
        if let Some(groups) = self.overrides.get(&stage) {
            return Ok(groups.clone());
        }
        Ok(match stage {
            Stage::Init => self.init(),
            Stage::Layout => self.layout(),
            Stage::Routing => self.routing(),
            Stage::Translation => self.translation(),
            Stage::Optimization => self.optimization(),
            Stage::Scheduling => self.scheduling(),
        })
    }
}

impl fmt::Debug for PresetStages {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresetStages")
            .field("config", &self.config)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}
