//! Run-scoped state shared between passes.
//!
//! A [`PropertySet`] travels through one pass-manager run. It has dedicated
//! fields for the things most passes need (the target, the initial layout and
//! the final layout after routing) and a keyed store for analysis results.
//!
//! Analysis results are stored behind `Arc`, so cloning a property set is
//! cheap; the pass manager relies on that to run transactionally.
//!
//! ```
//! use std::sync::Arc;
//! use tessera_compile::{BasisGates, CouplingMap, Layout, PropertySet, Target};
//!
//! let target = Arc::new(Target::from_coupling(CouplingMap::linear(3), &BasisGates::ibm()));
//! let mut props = PropertySet::new().with_target(target).with_layout(Layout::trivial(3));
//!
//! props.insert("depth", 7usize);
//! assert_eq!(props.get::<usize>("depth"), Some(&7));
//! assert!(props.layout.as_ref().unwrap().is_injective());
//! ```

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_ir::QubitId;

use crate::error::{CompileError, CompileResult};
use crate::target::Target;

/// A mapping from logical qubits to physical qubits.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layout {
    logical_to_physical: BTreeMap<QubitId, u32>,
    physical_to_logical: BTreeMap<u32, QubitId>,
}

impl Layout {
    /// Create a new empty layout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logical qubit `i` on physical qubit `i`.
    pub fn trivial(num_qubits: u32) -> Self {
        Self::from_physical(&(0..num_qubits).collect::<Vec<_>>())
    }

    /// Logical qubit `i` on physical qubit `physical[i]`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_physical(physical: &[u32]) -> Self {
        let mut layout = Self::new();
        for (i, &p) in physical.iter().enumerate() {
            layout.add(QubitId(i as u32), p);
        }
        layout
    }

    /// Map `logical` to `physical`.
    ///
    /// A previous mapping of either side is dropped, so both directions stay
    /// consistent.
    pub fn add(&mut self, logical: QubitId, physical: u32) {
        if let Some(old_logical) = self.physical_to_logical.insert(physical, logical) {
            if old_logical != logical {
                self.logical_to_physical.remove(&old_logical);
            }
        }
        if let Some(old_physical) = self.logical_to_physical.insert(logical, physical) {
            if old_physical != physical {
                self.physical_to_logical.remove(&old_physical);
            }
        }
    }

    /// Physical qubit of a logical qubit.
    pub fn get_physical(&self, logical: QubitId) -> Option<u32> {
        self.logical_to_physical.get(&logical).copied()
    }

    /// Logical qubit on a physical qubit.
    pub fn get_logical(&self, physical: u32) -> Option<QubitId> {
        self.physical_to_logical.get(&physical).copied()
    }

    /// Exchange whatever sits on two physical qubits.
    pub fn swap(&mut self, p1: u32, p2: u32) {
        let l1 = self.physical_to_logical.remove(&p1);
        let l2 = self.physical_to_logical.remove(&p2);
        if let Some(l1) = l1 {
            self.logical_to_physical.insert(l1, p2);
            self.physical_to_logical.insert(p2, l1);
        }
        if let Some(l2) = l2 {
            self.logical_to_physical.insert(l2, p1);
            self.physical_to_logical.insert(p1, l2);
        }
    }

    /// Number of mapped logical qubits.
    pub fn len(&self) -> usize {
        self.logical_to_physical.len()
    }

    /// Whether nothing is mapped.
    pub fn is_empty(&self) -> bool {
        self.logical_to_physical.is_empty()
    }

    /// `(logical, physical)` pairs in logical order.
    pub fn iter(&self) -> impl Iterator<Item = (QubitId, u32)> + '_ {
        self.logical_to_physical.iter().map(|(&l, &p)| (l, p))
    }

    /// Whether no two logical qubits share a physical qubit.
    pub fn is_injective(&self) -> bool {
        self.logical_to_physical.len() == self.physical_to_logical.len()
            && self
                .logical_to_physical
                .iter()
                .all(|(l, p)| self.physical_to_logical.get(p) == Some(l))
    }

    /// Check that the layout is injective, covers `logical`, and stays on a
    /// device of `num_physical` qubits.
    pub fn validate(
        &self,
        logical: impl IntoIterator<Item = QubitId>,
        num_physical: u32,
    ) -> CompileResult<()> {
        if !self.is_injective() {
            return Err(CompileError::InvalidLayout("two logical qubits share a physical qubit".into()));
        }
        if let Some((l, p)) = self.iter().find(|&(_, p)| p >= num_physical) {
            return Err(CompileError::InvalidLayout(format!(
                "{l} is placed on physical qubit {p}, device has {num_physical}"
            )));
        }
        for q in logical {
            if self.get_physical(q).is_none() {
                return Err(CompileError::InvalidLayout(format!("{q} is not placed")));
            }
        }
        Ok(())
    }

    /// Place every physical qubit without a logical qubit under a fresh
    /// ancilla id, so the layout becomes a bijection on `0..num_physical`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn fill_ancillas(&mut self, num_physical: u32) {
        let mut next = self
            .logical_to_physical
            .keys()
            .next_back()
            .map_or(0, |q| q.0 + 1);
        for p in 0..num_physical {
            if !self.physical_to_logical.contains_key(&p) {
                self.add(QubitId(next), p);
                next += 1;
            }
        }
    }
}

/// How a transformation affects cached analyses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invalidation {
    /// Analyses stay valid.
    Nothing,
    /// Every cached analysis is dropped.
    All,
    /// Only the named analyses are dropped.
    Only(Vec<&'static str>),
}

/// Properties shared between passes during one run.
#[derive(Debug, Clone, Default)]
pub struct PropertySet {
    /// Initial logical → physical mapping.
    pub layout: Option<Layout>,
    /// Logical → physical mapping at the end of the routed circuit.
    pub final_layout: Option<Layout>,
    /// The device being compiled for.
    pub target: Option<Arc<Target>>,
    analyses: BTreeMap<String, Arc<dyn Any + Send + Sync>>,
    /// Keys written since the manager last looked.
    written: Vec<String>,
}

impl PropertySet {
    /// Create an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the target.
    #[must_use]
    pub fn with_target(mut self, target: Arc<Target>) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the initial layout.
    #[must_use]
    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// The target, or a [`CompileError::MissingTarget`] naming `pass`.
    pub fn require_target(&self, pass: &str) -> CompileResult<&Arc<Target>> {
        self.target
            .as_ref()
            .ok_or_else(|| CompileError::MissingTarget(pass.to_string()))
    }

    /// The initial layout, or a [`CompileError::MissingLayout`] naming `pass`.
    pub fn require_layout(&self, pass: &str) -> CompileResult<&Layout> {
        self.layout
            .as_ref()
            .ok_or_else(|| CompileError::MissingLayout(pass.to_string()))
    }

    /// Store an analysis result under `key`.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        let key = key.into();
        self.written.push(key.clone());
        self.analyses.insert(key, Arc::new(value));
    }

    /// Fetch an analysis result, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.analyses.get(key).and_then(|v| v.downcast_ref())
    }

    /// Whether an analysis result is cached under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.analyses.contains_key(key)
    }

    /// Drop one analysis result.
    pub fn remove(&mut self, key: &str) -> bool {
        self.analyses.remove(key).is_some()
    }

    /// Names of cached analyses.
    pub fn analysis_names(&self) -> impl Iterator<Item = &str> {
        self.analyses.keys().map(String::as_str)
    }

    /// Apply an invalidation contract, keeping the keys in `keep`.
    pub fn invalidate(&mut self, invalidation: &Invalidation, keep: &[String]) {
        match invalidation {
            Invalidation::Nothing => {}
            Invalidation::All => self.analyses.retain(|k, _| keep.contains(k)),
            Invalidation::Only(names) => {
                for name in names {
                    if !keep.iter().any(|k| k == name) {
                        self.analyses.remove(*name);
                    }
                }
            }
        }
    }

    /// Keys written since the previous call, deduplicated in write order.
    pub(crate) fn take_written(&mut self) -> Vec<String> {
        let mut keys = std::mem::take(&mut self.written);
        let mut seen = std::collections::BTreeSet::new();
        keys.retain(|k| seen.insert(k.clone()));
        keys
    }
}
