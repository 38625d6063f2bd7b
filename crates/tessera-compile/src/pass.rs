//! Pass trait and types for compilation passes.

use tessera_ir::CircuitDag;

use crate::error::CompileResult;
use crate::property::{Invalidation, PropertySet};

/// The kind of compilation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Reads the DAG, writes only to the `PropertySet`.
    Analysis,
    /// Modifies the DAG.
    Transformation,
}

/// What a pass did to the DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The DAG was modified.
    Changed,
    /// The DAG is exactly as before.
    Unchanged,
}

impl PassOutcome {
    /// `Changed` if `changed` holds.
    pub fn from_changed(changed: bool) -> Self {
        if changed {
            PassOutcome::Changed
        } else {
            PassOutcome::Unchanged
        }
    }

    /// Whether the DAG was modified.
    pub fn is_changed(self) -> bool {
        self == PassOutcome::Changed
    }
}

/// A compilation pass that operates on a circuit DAG.
///
/// Passes are the unit of work the [`PassManager`](crate::PassManager)
/// schedules. A pass is stateless with respect to a run: everything it learns
/// goes into the `PropertySet`.
pub trait Pass: Send + Sync {
    /// Name used in logs, reports and errors.
    fn name(&self) -> &str;

    /// Analysis or transformation.
    fn kind(&self) -> PassKind;

    /// Run the pass.
    ///
    /// Analysis passes must leave the DAG untouched; the manager rejects one
    /// that changes the DAG's structural version.
    fn run(&self, dag: &mut CircuitDag, properties: &mut PropertySet)
    -> CompileResult<PassOutcome>;

    /// Whether the pass should run at all in the current state. Returning
    /// `false` marks the pass skipped.
    fn should_run(&self, _dag: &CircuitDag, _properties: &PropertySet) -> bool {
        true
    }

    /// Check what the pass needs before it runs. An `Err` aborts the run with
    /// a transpiler error naming this pass.
    fn check_preconditions(&self, _dag: &CircuitDag, _properties: &PropertySet) -> Result<(), String> {
        Ok(())
    }

    /// Which cached analyses become stale when this pass changes the DAG.
    fn invalidates(&self) -> Invalidation {
        match self.kind() {
            PassKind::Analysis => Invalidation::Nothing,
            PassKind::Transformation => Invalidation::All,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestPass;

    impl Pass for TestPass {
        fn name(&self) -> &'static str {
            "test"
        }

        fn kind(&self) -> PassKind {
            PassKind::Transformation
        }

        fn run(&self, _dag: &mut CircuitDag, _properties: &mut PropertySet) -> CompileResult<PassOutcome> {
            Ok(PassOutcome::Unchanged)
        }
    }

    #[test]
    fn test_pass_defaults() {
        let pass = TestPass;
        assert_eq!(pass.kind(), PassKind::Transformation);
        assert_eq!(pass.name(), "test");
        assert_eq!(pass.invalidates(), Invalidation::All);
        assert!(pass.check_preconditions(&CircuitDag::new(), &PropertySet::new()).is_ok());
    }

    #[test]
    fn test_outcome() {
        assert!(PassOutcome::from_changed(true).is_changed());
        assert!(!PassOutcome::from_changed(false).is_changed());
    }
}
