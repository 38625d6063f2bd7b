//! Parameter expressions for gate angles.
//!
//! Angles stay symbolic until bound. Rewrite rules (basis translation,
//! synthesis) build new expressions from old ones with the arithmetic
//! operators, so a symbolic angle survives the whole pipeline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::f64::consts::PI;
use std::fmt;
use std::ops;

use crate::error::{IrError, IrResult};

/// A symbolic or concrete angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParameterExpression {
    /// A numeric value.
    Constant(f64),
    /// A named free parameter.
    Symbol(String),
    /// The constant π, kept symbolic for readable output.
    Pi,
    /// Negation.
    Neg(Box<ParameterExpression>),
    /// Sum.
    Add(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Difference.
    Sub(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Product.
    Mul(Box<ParameterExpression>, Box<ParameterExpression>),
    /// Quotient.
    Div(Box<ParameterExpression>, Box<ParameterExpression>),
}

impl ParameterExpression {
    /// A numeric constant.
    pub fn constant(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }

    /// A free parameter.
    pub fn symbol(name: impl Into<String>) -> Self {
        ParameterExpression::Symbol(name.into())
    }

    /// π.
    pub fn pi() -> Self {
        ParameterExpression::Pi
    }

    /// Whether any free parameter occurs in the expression.
    pub fn is_symbolic(&self) -> bool {
        match self {
            ParameterExpression::Symbol(_) => true,
            ParameterExpression::Constant(_) | ParameterExpression::Pi => false,
            ParameterExpression::Neg(e) => e.is_symbolic(),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => a.is_symbolic() || b.is_symbolic(),
        }
    }

    /// Evaluate to a number, if the expression has no free parameters.
    ///
    /// Division by zero evaluates to `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterExpression::Constant(v) => Some(*v),
            ParameterExpression::Symbol(_) => None,
            ParameterExpression::Pi => Some(PI),
            ParameterExpression::Neg(e) => e.as_f64().map(|v| -v),
            ParameterExpression::Add(a, b) => Some(a.as_f64()? + b.as_f64()?),
            ParameterExpression::Sub(a, b) => Some(a.as_f64()? - b.as_f64()?),
            ParameterExpression::Mul(a, b) => Some(a.as_f64()? * b.as_f64()?),
            ParameterExpression::Div(a, b) => {
                let divisor = b.as_f64()?;
                if divisor == 0.0 {
                    return None;
                }
                Some(a.as_f64()? / divisor)
            }
        }
    }

    /// Evaluate to a number or report the first unbound symbol.
    pub fn try_f64(&self) -> IrResult<f64> {
        self.as_f64().ok_or_else(|| {
            let name = self.symbols().into_iter().next().unwrap_or_else(|| self.to_string());
            IrError::UnboundParameter(name)
        })
    }

    /// Names of all free parameters, sorted.
    pub fn symbols(&self) -> BTreeSet<String> {
        let mut set = BTreeSet::new();
        self.visit_symbols(&mut |name| {
            set.insert(name.to_string());
        });
        set
    }

    fn visit_symbols(&self, f: &mut impl FnMut(&str)) {
        match self {
            ParameterExpression::Constant(_) | ParameterExpression::Pi => {}
            ParameterExpression::Symbol(name) => f(name),
            ParameterExpression::Neg(e) => e.visit_symbols(f),
            ParameterExpression::Add(a, b)
            | ParameterExpression::Sub(a, b)
            | ParameterExpression::Mul(a, b)
            | ParameterExpression::Div(a, b) => {
                a.visit_symbols(f);
                b.visit_symbols(f);
            }
        }
    }

    /// Replace every occurrence of `name` with `value`.
    pub fn bind(&self, name: &str, value: f64) -> Self {
        self.map_leaves(&|leaf| match leaf {
            ParameterExpression::Symbol(n) if n == name => Some(ParameterExpression::Constant(value)),
            _ => None,
        })
    }

    fn map_leaves(&self, f: &impl Fn(&Self) -> Option<Self>) -> Self {
        use ParameterExpression as P;
        match self {
            P::Constant(_) | P::Pi | P::Symbol(_) => f(self).unwrap_or_else(|| self.clone()),
            P::Neg(e) => P::Neg(Box::new(e.map_leaves(f))),
            P::Add(a, b) => P::Add(Box::new(a.map_leaves(f)), Box::new(b.map_leaves(f))),
            P::Sub(a, b) => P::Sub(Box::new(a.map_leaves(f)), Box::new(b.map_leaves(f))),
            P::Mul(a, b) => P::Mul(Box::new(a.map_leaves(f)), Box::new(b.map_leaves(f))),
            P::Div(a, b) => P::Div(Box::new(a.map_leaves(f)), Box::new(b.map_leaves(f))),
        }
    }

    /// Fold constant subexpressions into numbers.
    ///
    /// A fully numeric expression collapses to a single [`Constant`]
    /// (`Pi` is folded too); symbolic branches keep their structure.
    ///
    /// [`Constant`]: ParameterExpression::Constant
    pub fn simplify(&self) -> Self {
        use ParameterExpression as P;
        if let Some(v) = self.as_f64() {
            return P::Constant(v);
        }
        let fold = |a: &P, b: &P, build: fn(Box<P>, Box<P>) -> P| {
            build(Box::new(a.simplify()), Box::new(b.simplify()))
        };
        match self {
            P::Neg(e) => P::Neg(Box::new(e.simplify())),
            P::Add(a, b) => fold(a, b, P::Add),
            P::Sub(a, b) => fold(a, b, P::Sub),
            P::Mul(a, b) => fold(a, b, P::Mul),
            P::Div(a, b) => fold(a, b, P::Div),
            P::Constant(_) | P::Pi | P::Symbol(_) => self.clone(),
        }
    }
}

impl fmt::Display for ParameterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterExpression::Constant(v) => write!(f, "{v}"),
            ParameterExpression::Symbol(name) => write!(f, "{name}"),
            ParameterExpression::Pi => write!(f, "π"),
            ParameterExpression::Neg(e) => write!(f, "-({e})"),
            ParameterExpression::Add(a, b) => write!(f, "({a} + {b})"),
            ParameterExpression::Sub(a, b) => write!(f, "({a} - {b})"),
            ParameterExpression::Mul(a, b) => write!(f, "({a} * {b})"),
            ParameterExpression::Div(a, b) => write!(f, "({a} / {b})"),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        ParameterExpression::Constant(value)
    }
}

impl From<i32> for ParameterExpression {
    fn from(value: i32) -> Self {
        ParameterExpression::Constant(f64::from(value))
    }
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl ops::$trait for ParameterExpression {
            type Output = Self;

            fn $method(self, rhs: Self) -> Self {
                ParameterExpression::$variant(Box::new(self), Box::new(rhs))
            }
        }

        impl ops::$trait<f64> for ParameterExpression {
            type Output = Self;

            fn $method(self, rhs: f64) -> Self {
                ParameterExpression::$variant(Box::new(self), Box::new(rhs.into()))
            }
        }
    };
}

impl_binary_op!(Add, add, Add);
impl_binary_op!(Sub, sub, Sub);
impl_binary_op!(Mul, mul, Mul);
impl_binary_op!(Div, div, Div);

impl ops::Neg for ParameterExpression {
    type Output = Self;

    fn neg(self) -> Self {
        ParameterExpression::Neg(Box::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_and_pi() {
        assert_eq!(ParameterExpression::constant(1.5).as_f64(), Some(1.5));
        assert_eq!(ParameterExpression::pi().as_f64(), Some(PI));
        assert!(!ParameterExpression::pi().is_symbolic());
    }

    #[test]
    fn test_symbol_is_unbound() {
        let theta = ParameterExpression::symbol("theta");
        assert!(theta.is_symbolic());
        assert_eq!(theta.as_f64(), None);
        assert!(matches!(theta.try_f64(), Err(IrError::UnboundParameter(name)) if name == "theta"));
    }

    #[test]
    fn test_bind_inside_expression() {
        let expr = ParameterExpression::symbol("theta") / 2.0 + ParameterExpression::pi();
        let bound = expr.bind("theta", PI);
        assert!((bound.as_f64().unwrap() - 1.5 * PI).abs() < 1e-12);
        assert_eq!(expr.symbols().into_iter().collect::<Vec<_>>(), vec!["theta".to_string()]);
    }

    #[test]
    fn test_simplify_keeps_symbolic_branch() {
        let expr = (ParameterExpression::constant(2.0) * 3.0) + ParameterExpression::symbol("x");
        match expr.simplify() {
            ParameterExpression::Add(a, b) => {
                assert_eq!(*a, ParameterExpression::Constant(6.0));
                assert_eq!(*b, ParameterExpression::symbol("x"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_division_by_zero() {
        let expr = ParameterExpression::constant(1.0) / 0.0;
        assert_eq!(expr.as_f64(), None);
    }
}
