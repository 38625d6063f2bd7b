//! Gate equivalence library used by basis translation.
//!
//! Each [`EquivalenceRule`] rewrites one standard gate into a short circuit
//! of other standard gates that equals it up to global phase. Rules may
//! mention gates that are themselves rewritten, so a translation is a path
//! through the library; [`EquivalenceLibrary::plan`] finds the cheapest one
//! for a given set of supported gates.

use std::collections::BTreeMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use tessera_ir::{ParameterExpression, QubitId, StandardGate};

/// Gates on operand qubits, in circuit order.
pub type Expansion = Vec<(StandardGate, Vec<QubitId>)>;

type ExpandFn = fn(&[ParameterExpression], &[QubitId]) -> Expansion;

/// One rewrite of a gate into other gates.
#[derive(Clone)]
pub struct EquivalenceRule {
    source: &'static str,
    body: &'static [&'static str],
    expand: ExpandFn,
}

impl EquivalenceRule {
    /// A rule rewriting `source` into gates named in `body`.
    ///
    /// `expand` receives the source gate's parameters and operand qubits.
    pub fn new(source: &'static str, body: &'static [&'static str], expand: ExpandFn) -> Self {
        Self { source, body, expand }
    }

    /// Name of the rewritten gate.
    pub fn source(&self) -> &'static str {
        self.source
    }

    /// Gate names the rewrite emits, with repetition.
    pub fn body(&self) -> &'static [&'static str] {
        self.body
    }

    /// Rewrite a gate with these parameters on these qubits.
    pub fn expand(&self, params: &[ParameterExpression], qubits: &[QubitId]) -> Expansion {
        (self.expand)(params, qubits)
    }
}

impl std::fmt::Debug for EquivalenceRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EquivalenceRule")
            .field("source", &self.source)
            .field("body", &self.body)
            .finish_non_exhaustive()
    }
}

/// The cheapest rule per gate for one set of supported gates.
#[derive(Debug, Clone, Default)]
pub struct TranslationPlan {
    cost: BTreeMap<&'static str, usize>,
    choice: BTreeMap<&'static str, usize>,
}

impl TranslationPlan {
    /// Number of supported gates a translation of `name` emits, if any path
    /// exists. Supported gates cost one.
    pub fn cost(&self, name: &str) -> Option<usize> {
        self.cost.get(name).copied()
    }

    /// Index of the chosen rule for `name` in the library.
    pub fn choice(&self, name: &str) -> Option<usize> {
        self.choice.get(name).copied()
    }
}

/// Rewrite rules keyed by source gate.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceLibrary {
    rules: BTreeMap<&'static str, Vec<EquivalenceRule>>,
}

impl EquivalenceLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule after the existing rules for its source gate.
    pub fn add(&mut self, rule: EquivalenceRule) {
        self.rules.entry(rule.source).or_default().push(rule);
    }

    /// Rules for a gate, in insertion order.
    pub fn rules_for(&self, name: &str) -> &[EquivalenceRule] {
        self.rules.get(name).map_or(&[], Vec::as_slice)
    }

    /// Rule `index` for `name`.
    pub fn rule(&self, name: &str, index: usize) -> Option<&EquivalenceRule> {
        self.rules_for(name).get(index)
    }

    /// Cheapest translation of every gate into gates `supported` accepts.
    ///
    /// Costs relax until nothing improves; a gate's rule only changes on a
    /// strict improvement, so earlier rules win ties.
    pub fn plan(&self, supported: impl Fn(&str) -> bool) -> TranslationPlan {
        let mut plan = TranslationPlan::default();
        for (&source, rules) in &self.rules {
            if supported(source) {
                plan.cost.insert(source, 1);
            }
            for &name in rules.iter().flat_map(|r| r.body) {
                if supported(name) {
                    plan.cost.insert(name, 1);
                }
            }
        }

        loop {
            let mut changed = false;
            for (&source, rules) in &self.rules {
                if supported(source) {
                    continue;
                }
                for (index, rule) in rules.iter().enumerate() {
                    let total: Option<usize> = rule.body.iter().map(|n| plan.cost.get(n).copied()).sum();
                    let Some(total) = total else {
                        continue;
                    };
                    if plan.cost.get(source).is_none_or(|&current| total < current) {
                        plan.cost.insert(source, total);
                        plan.choice.insert(source, index);
                        changed = true;
                    }
                }
            }
            if !changed {
                return plan;
            }
        }
    }

    /// The built-in library over the standard gate set.
    #[allow(clippy::too_many_lines)]
    pub fn standard() -> Self {
        use StandardGate as G;

        let mut lib = Self::new();
        let mut add = |source: &'static str, body: &'static [&'static str], expand: ExpandFn| {
            lib.add(EquivalenceRule::new(source, body, expand));
        };

        add("id", &[], |_, _| vec![]);

        add("x", &["u"], |_, q| vec![(G::U(c(PI), c(0.0), c(PI)), vec![q[0]])]);
        add("x", &["rx"], |_, q| vec![(G::Rx(c(PI)), vec![q[0]])]);
        add("x", &["sx", "sx"], |_, q| vec![(G::SX, vec![q[0]]), (G::SX, vec![q[0]])]);

        add("y", &["u"], |_, q| vec![(G::U(c(PI), c(FRAC_PI_2), c(FRAC_PI_2)), vec![q[0]])]);
        add("y", &["ry"], |_, q| vec![(G::Ry(c(PI)), vec![q[0]])]);
        add("y", &["rz", "x"], |_, q| vec![(G::Rz(c(PI)), vec![q[0]]), (G::X, vec![q[0]])]);

        add("z", &["rz"], |_, q| vec![(G::Rz(c(PI)), vec![q[0]])]);
        add("z", &["p"], |_, q| vec![(G::P(c(PI)), vec![q[0]])]);

        add("h", &["u"], |_, q| vec![(G::U(c(FRAC_PI_2), c(0.0), c(PI)), vec![q[0]])]);
        add("h", &["rz", "sx", "rz"], |_, q| {
            vec![
                (G::Rz(c(FRAC_PI_2)), vec![q[0]]),
                (G::SX, vec![q[0]]),
                (G::Rz(c(FRAC_PI_2)), vec![q[0]]),
            ]
        });
        add("h", &["rz", "ry"], |_, q| vec![(G::Rz(c(PI)), vec![q[0]]), (G::Ry(c(FRAC_PI_2)), vec![q[0]])]);
        add("h", &["prx", "prx"], |_, q| {
            vec![
                (G::PRX(c(FRAC_PI_2), c(FRAC_PI_2)), vec![q[0]]),
                (G::PRX(c(PI), c(0.0)), vec![q[0]]),
            ]
        });

        add("s", &["rz"], |_, q| vec![(G::Rz(c(FRAC_PI_2)), vec![q[0]])]);
        add("s", &["p"], |_, q| vec![(G::P(c(FRAC_PI_2)), vec![q[0]])]);
        add("sdg", &["rz"], |_, q| vec![(G::Rz(c(-FRAC_PI_2)), vec![q[0]])]);
        add("sdg", &["p"], |_, q| vec![(G::P(c(-FRAC_PI_2)), vec![q[0]])]);
        add("t", &["rz"], |_, q| vec![(G::Rz(c(FRAC_PI_4)), vec![q[0]])]);
        add("t", &["p"], |_, q| vec![(G::P(c(FRAC_PI_4)), vec![q[0]])]);
        add("tdg", &["rz"], |_, q| vec![(G::Rz(c(-FRAC_PI_4)), vec![q[0]])]);
        add("tdg", &["p"], |_, q| vec![(G::P(c(-FRAC_PI_4)), vec![q[0]])]);

        add("sx", &["rx"], |_, q| vec![(G::Rx(c(FRAC_PI_2)), vec![q[0]])]);
        add("sx", &["u"], |_, q| vec![(G::U(c(FRAC_PI_2), c(-FRAC_PI_2), c(FRAC_PI_2)), vec![q[0]])]);
        add("sxdg", &["rx"], |_, q| vec![(G::Rx(c(-FRAC_PI_2)), vec![q[0]])]);
        add("sxdg", &["rz", "sx", "rz"], |_, q| {
            vec![(G::Rz(c(PI)), vec![q[0]]), (G::SX, vec![q[0]]), (G::Rz(c(PI)), vec![q[0]])]
        });

        add("rx", &["u"], |p, q| vec![(G::U(p[0].clone(), c(-FRAC_PI_2), c(FRAC_PI_2)), vec![q[0]])]);
        add("rx", &["prx"], |p, q| vec![(G::PRX(p[0].clone(), c(0.0)), vec![q[0]])]);
        add("rx", &["h", "rz", "h"], |p, q| {
            vec![(G::H, vec![q[0]]), (G::Rz(p[0].clone()), vec![q[0]]), (G::H, vec![q[0]])]
        });

        add("ry", &["u"], |p, q| vec![(G::U(p[0].clone(), c(0.0), c(0.0)), vec![q[0]])]);
        add("ry", &["prx"], |p, q| vec![(G::PRX(p[0].clone(), c(FRAC_PI_2)), vec![q[0]])]);
        add("ry", &["sdg", "rx", "s"], |p, q| {
            vec![(G::Sdg, vec![q[0]]), (G::Rx(p[0].clone()), vec![q[0]]), (G::S, vec![q[0]])]
        });

        add("rz", &["p"], |p, q| vec![(G::P(p[0].clone()), vec![q[0]])]);
        add("rz", &["u"], |p, q| vec![(G::U(c(0.0), c(0.0), p[0].clone()), vec![q[0]])]);
        add("rz", &["prx", "prx"], |p, q| {
            vec![
                (G::PRX(c(PI), c(0.0)), vec![q[0]]),
                (G::PRX(c(PI), (p[0].clone() / 2.0).simplify()), vec![q[0]]),
            ]
        });
        add("rz", &["h", "rx", "h"], |p, q| {
            vec![(G::H, vec![q[0]]), (G::Rx(p[0].clone()), vec![q[0]]), (G::H, vec![q[0]])]
        });

        add("p", &["rz"], |p, q| vec![(G::Rz(p[0].clone()), vec![q[0]])]);
        add("p", &["u"], |p, q| vec![(G::U(c(0.0), c(0.0), p[0].clone()), vec![q[0]])]);

        add("u", &["rz", "ry", "rz"], |p, q| {
            vec![
                (G::Rz(p[2].clone()), vec![q[0]]),
                (G::Ry(p[0].clone()), vec![q[0]]),
                (G::Rz(p[1].clone()), vec![q[0]]),
            ]
        });
        add("u", &["rz", "sx", "rz", "sx", "rz"], |p, q| {
            vec![
                (G::Rz(p[2].clone()), vec![q[0]]),
                (G::SX, vec![q[0]]),
                (G::Rz((p[0].clone() + PI).simplify()), vec![q[0]]),
                (G::SX, vec![q[0]]),
                (G::Rz((p[1].clone() + PI).simplify()), vec![q[0]]),
            ]
        });

        add("prx", &["rz", "rx", "rz"], |p, q| {
            vec![
                (G::Rz((-p[1].clone()).simplify()), vec![q[0]]),
                (G::Rx(p[0].clone()), vec![q[0]]),
                (G::Rz(p[1].clone()), vec![q[0]]),
            ]
        });
        add("prx", &["u"], |p, q| {
            vec![(
                G::U(
                    p[0].clone(),
                    (p[1].clone() - FRAC_PI_2).simplify(),
                    (-p[1].clone() + FRAC_PI_2).simplify(),
                ),
                vec![q[0]],
            )]
        });

        add("cx", &["h", "cz", "h"], |_, q| {
            vec![(G::H, vec![q[1]]), (G::CZ, vec![q[0], q[1]]), (G::H, vec![q[1]])]
        });
        add("cz", &["h", "cx", "h"], |_, q| {
            vec![(G::H, vec![q[1]]), (G::CX, vec![q[0], q[1]]), (G::H, vec![q[1]])]
        });
        add("cz", &["rzz", "rz", "rz"], |_, q| {
            vec![
                (G::RZZ(c(-FRAC_PI_2)), vec![q[0], q[1]]),
                (G::Rz(c(FRAC_PI_2)), vec![q[0]]),
                (G::Rz(c(FRAC_PI_2)), vec![q[1]]),
            ]
        });

        add("rzz", &["cx", "rz", "cx"], |p, q| {
            vec![
                (G::CX, vec![q[0], q[1]]),
                (G::Rz(p[0].clone()), vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
            ]
        });
        add("rxx", &["h", "h", "rzz", "h", "h"], |p, q| {
            vec![
                (G::H, vec![q[0]]),
                (G::H, vec![q[1]]),
                (G::RZZ(p[0].clone()), vec![q[0], q[1]]),
                (G::H, vec![q[0]]),
                (G::H, vec![q[1]]),
            ]
        });
        add("ryy", &["rx", "rx", "rzz", "rx", "rx"], |p, q| {
            vec![
                (G::Rx(c(FRAC_PI_2)), vec![q[0]]),
                (G::Rx(c(FRAC_PI_2)), vec![q[1]]),
                (G::RZZ(p[0].clone()), vec![q[0], q[1]]),
                (G::Rx(c(-FRAC_PI_2)), vec![q[0]]),
                (G::Rx(c(-FRAC_PI_2)), vec![q[1]]),
            ]
        });

        add("swap", &["cx", "cx", "cx"], |_, q| {
            vec![
                (G::CX, vec![q[0], q[1]]),
                (G::CX, vec![q[1], q[0]]),
                (G::CX, vec![q[0], q[1]]),
            ]
        });
        add("iswap", &["s", "s", "h", "cx", "cx", "h"], |_, q| {
            vec![
                (G::S, vec![q[0]]),
                (G::S, vec![q[1]]),
                (G::H, vec![q[0]]),
                (G::CX, vec![q[0], q[1]]),
                (G::CX, vec![q[1], q[0]]),
                (G::H, vec![q[1]]),
            ]
        });

        add("cy", &["sdg", "cx", "s"], |_, q| {
            vec![(G::Sdg, vec![q[1]]), (G::CX, vec![q[0], q[1]]), (G::S, vec![q[1]])]
        });
        add("ch", &["s", "h", "t", "cx", "tdg", "h", "sdg"], |_, q| {
            vec![
                (G::S, vec![q[1]]),
                (G::H, vec![q[1]]),
                (G::T, vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
                (G::Tdg, vec![q[1]]),
                (G::H, vec![q[1]]),
                (G::Sdg, vec![q[1]]),
            ]
        });

        add("crz", &["rz", "cx", "rz", "cx"], |p, q| {
            vec![
                (G::Rz((p[0].clone() / 2.0).simplify()), vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
                (G::Rz((-p[0].clone() / 2.0).simplify()), vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
            ]
        });
        add("cry", &["ry", "cx", "ry", "cx"], |p, q| {
            vec![
                (G::Ry((p[0].clone() / 2.0).simplify()), vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
                (G::Ry((-p[0].clone() / 2.0).simplify()), vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
            ]
        });
        add("crx", &["h", "crz", "h"], |p, q| {
            vec![
                (G::H, vec![q[1]]),
                (G::CRz(p[0].clone()), vec![q[0], q[1]]),
                (G::H, vec![q[1]]),
            ]
        });
        add("cp", &["p", "cx", "p", "cx", "p"], |p, q| {
            let half = (p[0].clone() / 2.0).simplify();
            vec![
                (G::P(half.clone()), vec![q[0]]),
                (G::CX, vec![q[0], q[1]]),
                (G::P((-half.clone()).simplify()), vec![q[1]]),
                (G::CX, vec![q[0], q[1]]),
                (G::P(half), vec![q[1]]),
            ]
        });

        add(
            "ccx",
            &["h", "cx", "tdg", "cx", "t", "cx", "tdg", "cx", "t", "t", "h", "cx", "t", "tdg", "cx"],
            |_, q| {
                let (a, b, t) = (q[0], q[1], q[2]);
                vec![
                    (G::H, vec![t]),
                    (G::CX, vec![b, t]),
                    (G::Tdg, vec![t]),
                    (G::CX, vec![a, t]),
                    (G::T, vec![t]),
                    (G::CX, vec![b, t]),
                    (G::Tdg, vec![t]),
                    (G::CX, vec![a, t]),
                    (G::T, vec![b]),
                    (G::T, vec![t]),
                    (G::H, vec![t]),
                    (G::CX, vec![a, b]),
                    (G::T, vec![a]),
                    (G::Tdg, vec![b]),
                    (G::CX, vec![a, b]),
                ]
            },
        );
        add("cswap", &["cx", "ccx", "cx"], |_, q| {
            vec![
                (G::CX, vec![q[2], q[1]]),
                (G::CCX, vec![q[0], q[1], q[2]]),
                (G::CX, vec![q[2], q[1]]),
            ]
        });

        lib
    }
}

fn c(value: f64) -> ParameterExpression {
    ParameterExpression::constant(value)
}
