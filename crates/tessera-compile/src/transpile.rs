//! One-call compilation entry points.

use std::sync::Arc;

use rayon::prelude::*;
use tessera_ir::CircuitDag;
use tracing::{info, instrument};

use crate::config::TranspileConfig;
use crate::error::{CompileError, CompileResult};
use crate::manager::{PassManager, PassManagerBuilder, RunReport};
use crate::property::{Layout, PropertySet};
use crate::target::Target;

/// Result of compiling one circuit.
#[derive(Debug, Clone)]
pub struct TranspileOutput {
    /// The physical circuit.
    pub dag: CircuitDag,
    /// Property set at the end of the run: layouts, analyses, target.
    pub properties: PropertySet,
    /// What each pass did.
    pub report: RunReport,
}

impl TranspileOutput {
    /// Where each logical qubit was placed before routing.
    pub fn initial_layout(&self) -> Option<&Layout> {
        self.properties.layout.as_ref()
    }

    /// Where each logical qubit ends up after routing.
    pub fn final_layout(&self) -> Option<&Layout> {
        self.properties.final_layout.as_ref()
    }
}

/// Compile `dag` for `target` with the preset pipeline for `config`.
#[instrument(skip_all, fields(qubits = dag.num_qubits(), level = config.optimization_level))]
pub fn transpile(dag: CircuitDag, target: Arc<Target>, config: &TranspileConfig) -> CompileResult<TranspileOutput> {
    let pm = PassManagerBuilder::new().with_config(config.clone()).build()?;
    run_pipeline(&pm, dag, target)
}

/// Compile `dag` for `target` with a prebuilt pass manager.
pub fn transpile_with(pm: &PassManager, dag: CircuitDag, target: Arc<Target>) -> CompileResult<TranspileOutput> {
    run_pipeline(pm, dag, target)
}

/// Compile many circuits for one target on the rayon pool.
///
/// Each job gets its own DAG and property set; results come back in input
/// order. A configuration error fails every job.
pub fn transpile_batch(
    dags: Vec<CircuitDag>,
    target: Arc<Target>,
    config: &TranspileConfig,
) -> Vec<CompileResult<TranspileOutput>> {
    let pm = match PassManagerBuilder::new().with_config(config.clone()).build() {
        Ok(pm) => pm,
        Err(e) => {
            let message = e.to_string();
            return dags
                .iter()
                .map(|_| Err(CompileError::InvalidConfiguration(message.clone())))
                .collect();
        }
    };
    info!("Transpiling batch of {} circuits", dags.len());
    dags.into_par_iter()
        .map(|dag| run_pipeline(&pm, dag, target.clone()))
        .collect()
}

fn run_pipeline(pm: &PassManager, mut dag: CircuitDag, target: Arc<Target>) -> CompileResult<TranspileOutput> {
    let mut properties = PropertySet::new().with_target(target);
    let report = pm.run(&mut dag, &mut properties)?;
    Ok(TranspileOutput {
        dag,
        properties,
        report,
    })
}
