//! Registry of synthesis methods.
//!
//! Synthesis methods are looked up by operation class (see
//! [`HighLevelOp::class_name`]) and method name. The [`SynthesisRegistry`]
//! trait is the lookup seam; [`PluginRegistry`] is the in-memory
//! implementation that ships with the built-in methods.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tessera_ir::{CircuitDag, HighLevelOp};
use tracing::debug;

use crate::error::CompileResult;
use crate::passes::agnostic::synthesis::{
    CycleSwapNetwork, GaussianLinear, KakUnitary, PauliLadder, RecursiveMultiControlled, ShannonUnitary,
};
use crate::target::Target;

/// What a synthesis method may know about the compilation.
#[derive(Debug, Clone, Copy)]
pub struct SynthesisContext<'a> {
    /// Device being compiled for, if any.
    pub target: Option<&'a Target>,
    /// Largest accepted distance between an operator and its synthesis.
    pub tolerance: f64,
}

impl<'a> SynthesisContext<'a> {
    /// Context with the given tolerance and no target.
    pub fn new(tolerance: f64) -> Self {
        Self {
            target: None,
            tolerance,
        }
    }

    /// Attach a target.
    #[must_use]
    pub fn with_target(mut self, target: &'a Target) -> Self {
        self.target = Some(target);
        self
    }
}

impl Default for SynthesisContext<'_> {
    fn default() -> Self {
        Self::new(1e-9)
    }
}

/// A way to decompose one class of high-level operation.
pub trait SynthesisMethod: Send + Sync {
    /// Method name, unique within its class.
    fn name(&self) -> &str;

    /// Decompose `op` into a circuit over `op.num_qubits()` qubits.
    ///
    /// `Ok(None)` declines, letting the dispatcher try the next method.
    fn synthesize(
        &self,
        op: &HighLevelOp,
        context: &SynthesisContext<'_>,
    ) -> CompileResult<Option<CircuitDag>>;
}

/// Lookup of synthesis methods by class and name.
pub trait SynthesisRegistry: Send + Sync {
    /// The method registered as `method` for `class`.
    fn resolve(&self, class: &str, method: &str) -> Option<Arc<dyn SynthesisMethod>>;

    /// Names of all methods for `class`, in registration order.
    fn methods(&self, class: &str) -> Vec<String>;
}

/// In-memory synthesis registry.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    methods: FxHashMap<String, Vec<Arc<dyn SynthesisMethod>>>,
}

impl PluginRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in method.
    pub fn with_builtin_methods() -> Self {
        let mut registry = Self::new();
        registry.register("unitary", KakUnitary);
        registry.register("unitary", ShannonUnitary);
        registry.register("mcx", RecursiveMultiControlled);
        registry.register("mcu", RecursiveMultiControlled);
        registry.register("linear_function", GaussianLinear);
        registry.register("pauli_evolution", PauliLadder);
        registry.register("permutation", CycleSwapNetwork);
        registry
    }

    /// Register `method` for `class`. A method with the same name replaces
    /// the earlier one in place.
    pub fn register(&mut self, class: impl Into<String>, method: impl SynthesisMethod + 'static) {
        self.register_arc(class, Arc::new(method));
    }

    /// Register a shared method.
    pub fn register_arc(&mut self, class: impl Into<String>, method: Arc<dyn SynthesisMethod>) {
        let class = class.into();
        debug!("Registering synthesis method {}/{}", class, method.name());
        let slot = self.methods.entry(class).or_default();
        match slot.iter_mut().find(|m| m.name() == method.name()) {
            Some(existing) => *existing = method,
            None => slot.push(method),
        }
    }

    /// Classes with at least one method, sorted.
    pub fn classes(&self) -> Vec<&str> {
        let mut classes: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        classes.sort_unstable();
        classes
    }
}

impl SynthesisRegistry for PluginRegistry {
    fn resolve(&self, class: &str, method: &str) -> Option<Arc<dyn SynthesisMethod>> {
        self.methods
            .get(class)?
            .iter()
            .find(|m| m.name() == method)
            .cloned()
    }

    fn methods(&self, class: &str) -> Vec<String> {
        self.methods
            .get(class)
            .map(|ms| ms.iter().map(|m| m.name().to_string()).collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for class in self.classes() {
            map.entry(&class, &self.methods(class));
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    impl SynthesisMethod for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn synthesize(&self, _: &HighLevelOp, _: &SynthesisContext<'_>) -> CompileResult<Option<CircuitDag>> {
            Ok(None)
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = PluginRegistry::new();
        assert!(registry.methods("unitary").is_empty());
        assert!(registry.resolve("unitary", "default").is_none());
    }

    #[test]
    fn test_registration_order_and_replacement() {
        let mut registry = PluginRegistry::new();
        registry.register("unitary", Named("a"));
        registry.register("unitary", Named("b"));
        registry.register("unitary", Named("a"));
        assert_eq!(registry.methods("unitary"), vec!["a", "b"]);
        assert!(registry.resolve("unitary", "b").is_some());
        assert!(registry.resolve("mcx", "b").is_none());
    }

    #[test]
    fn test_builtin_classes() {
        let registry = PluginRegistry::with_builtin_methods();
        assert_eq!(
            registry.classes(),
            vec!["linear_function", "mcu", "mcx", "pauli_evolution", "permutation", "unitary"]
        );
        assert_eq!(registry.methods("linear_function"), vec!["gauss"]);
        assert_eq!(registry.methods("unitary"), vec!["default", "qsd"]);
        assert!(registry.resolve("unitary", "default").is_some());
    }
}
