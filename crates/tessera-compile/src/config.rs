//! Transpiler configuration.
//!
//! A [`TranspileConfig`] can be built in code, or loaded from YAML or JSON.
//! Missing fields take their defaults; unknown fields are rejected.
//!
//! ```yaml
//! optimization_level: 2
//! layout_method: sabre
//! seed: 7
//! sabre:
//!   heuristic: decay
//!   swap_trials: 8
//! synthesis:
//!   methods:
//!     linear_function: gauss
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, CompileResult};

/// How the initial layout is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMethod {
    /// Logical qubit `i` on physical qubit `i`.
    Trivial,
    /// Interaction-weighted search.
    Dense,
    /// Forward/backward routing refinement.
    #[default]
    Sabre,
}

/// How two-qubit operations are made adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutingMethod {
    /// Sabre swap insertion.
    #[default]
    Sabre,
    /// No routing; the circuit must already fit the coupling map.
    None,
}

/// Which terms the Sabre cost function uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heuristic {
    /// Front-layer distance only.
    Basic,
    /// Front layer plus the extended set.
    Lookahead,
    /// Lookahead scaled by per-qubit decay.
    #[default]
    Decay,
}

/// Objective of the layout search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutObjective {
    /// Estimated number of swaps: Σ w·(d − 1).
    #[default]
    SwapCount,
    /// Distance weighted by two-qubit error: Σ w·d·(1 + ε).
    ErrorWeighted,
}

/// Order used by the scheduling analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingMethod {
    /// As soon as possible.
    Asap,
    /// As late as possible.
    Alap,
}

/// Sabre router settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SabreConfig {
    /// Cost function.
    pub heuristic: Heuristic,
    /// Weight of the front-layer term.
    pub basic_weight: f64,
    /// Maximum number of gates in the lookahead set.
    pub extended_set_size: usize,
    /// Weight of the lookahead term.
    pub extended_set_weight: f64,
    /// Decay added to a qubit each time it is swapped.
    pub decay_increment: f64,
    /// Number of swaps after which decay resets.
    pub decay_reset: usize,
    /// Swaps without progress, per device qubit, before the release valve opens.
    pub stall_factor: usize,
    /// Independent routing trials.
    pub swap_trials: usize,
    /// Independent layout trials for Sabre layout.
    pub layout_trials: usize,
    /// Forward/backward refinement rounds per layout trial.
    pub layout_iterations: usize,
    /// Break score ties by a seeded random choice instead of the lowest pair.
    pub seeded_tie_break: bool,
}

impl Default for SabreConfig {
    fn default() -> Self {
        Self {
            heuristic: Heuristic::Decay,
            basic_weight: 1.0,
            extended_set_size: 20,
            extended_set_weight: 0.5,
            decay_increment: 0.001,
            decay_reset: 5,
            stall_factor: 10,
            swap_trials: 1,
            layout_trials: 4,
            layout_iterations: 2,
            seeded_tie_break: false,
        }
    }
}

/// Interaction-layout search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayoutSearchConfig {
    /// Random starts besides the greedy one.
    pub trials: usize,
    /// Local-search moves per start.
    pub iterations: usize,
    /// Cost to minimise.
    pub objective: LayoutObjective,
}

impl Default for LayoutSearchConfig {
    fn default() -> Self {
        Self {
            trials: 8,
            iterations: 200,
            objective: LayoutObjective::SwapCount,
        }
    }
}

/// Synthesis settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SynthesisConfig {
    /// Preferred method per operation class.
    pub methods: BTreeMap<String, String>,
    /// Largest accepted distance between a unitary and its synthesis.
    pub tolerance: f64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            methods: BTreeMap::new(),
            tolerance: default_tolerance(),
        }
    }
}

fn default_tolerance() -> f64 {
    1e-9
}

/// Complete transpiler configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TranspileConfig {
    /// 0 (none) to 3 (heaviest).
    pub optimization_level: u8,
    /// Initial layout selection.
    pub layout_method: LayoutMethod,
    /// Swap insertion.
    pub routing_method: RoutingMethod,
    /// Seed for every randomised stage.
    pub seed: u64,
    /// Sabre settings, shared by layout and routing.
    pub sabre: SabreConfig,
    /// Interaction-layout settings.
    pub layout_search: LayoutSearchConfig,
    /// Synthesis settings.
    pub synthesis: SynthesisConfig,
    /// Bound on each fixed-point loop.
    pub max_fixed_point_iterations: usize,
    /// Run independent trials on the rayon pool.
    pub parallel_trials: bool,
    /// Optional scheduling analysis at the end of the pipeline.
    pub scheduling: Option<SchedulingMethod>,
}

impl Default for TranspileConfig {
    fn default() -> Self {
        Self {
            optimization_level: 1,
            layout_method: LayoutMethod::Sabre,
            routing_method: RoutingMethod::Sabre,
            seed: 0,
            sabre: SabreConfig::default(),
            layout_search: LayoutSearchConfig::default(),
            synthesis: SynthesisConfig::default(),
            max_fixed_point_iterations: 16,
            parallel_trials: true,
            scheduling: None,
        }
    }
}

impl TranspileConfig {
    /// Defaults with a given optimization level.
    pub fn with_optimization_level(level: u8) -> Self {
        Self {
            optimization_level: level,
            ..Self::default()
        }
    }

    /// Parse YAML and validate.
    pub fn from_yaml_str(yaml: &str) -> CompileResult<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| CompileError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse JSON and validate.
    pub fn from_json_str(json: &str) -> CompileResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| CompileError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> CompileResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            CompileError::InvalidConfiguration(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_yaml_str(&contents),
        }
    }

    /// Check that all values are in range.
    pub fn validate(&self) -> CompileResult<()> {
        let invalid = |msg: &str| Err(CompileError::InvalidConfiguration(msg.to_string()));
        if self.optimization_level > 3 {
            return invalid("optimization_level must be between 0 and 3");
        }
        if self.max_fixed_point_iterations == 0 {
            return invalid("max_fixed_point_iterations must be at least 1");
        }
        let sabre = &self.sabre;
        if sabre.swap_trials == 0 || sabre.layout_trials == 0 {
            return invalid("sabre trials must be at least 1");
        }
        if sabre.stall_factor == 0 {
            return invalid("sabre.stall_factor must be at least 1");
        }
        if sabre.decay_reset == 0 {
            return invalid("sabre.decay_reset must be at least 1");
        }
        for (name, value) in [
            ("basic_weight", sabre.basic_weight),
            ("extended_set_weight", sabre.extended_set_weight),
            ("decay_increment", sabre.decay_increment),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(CompileError::InvalidConfiguration(format!(
                    "sabre.{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if !(self.synthesis.tolerance.is_finite() && self.synthesis.tolerance > 0.0) {
            return invalid("synthesis.tolerance must be positive");
        }
        Ok(())
    }
}
