//! Declarative style expressions and feature filters.
//!
//! These mirror the rendering host's array syntax (`["case", ...]`,
//! `["interpolate", ["linear"], ...]`, `["any", ["<", key, v]]`) so they can
//! be handed over as JSON, and can also be evaluated locally against a
//! feature's properties and state.

use crate::color::Rgb;
use crate::models::FeatureState;
use serde_json::{Map, Value, json};

/// Style expression tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// `["get", key]`
    Get(String),
    /// `["boolean", ["feature-state", key], default]`
    FeatureFlag { key: String, default: bool },
    /// `["==", a, b]`
    Eq(Box<Expr>, Box<Expr>),
    /// `["case", cond, out, ..., fallback]`
    Case {
        branches: Vec<(Expr, Expr)>,
        fallback: Box<Expr>,
    },
    /// `["interpolate", ["linear"], input, stop, out, ...]`
    Interpolate { input: Box<Expr>, stops: Vec<(f64, Expr)> },
    /// `["*", ...]`
    Mul(Vec<Expr>),
    /// `["concat", ...]`
    Concat(Vec<Expr>),
}

impl Expr {
    pub fn lit(v: impl Into<Value>) -> Expr {
        Expr::Literal(v.into())
    }

    pub fn get(key: impl Into<String>) -> Expr {
        Expr::Get(key.into())
    }

    pub fn eq(a: Expr, b: Expr) -> Expr {
        Expr::Eq(Box::new(a), Box::new(b))
    }

    /// Host JSON form.
    pub fn to_json(&self) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Get(k) => json!(["get", k]),
            Expr::FeatureFlag { key, default } => {
                json!(["boolean", ["feature-state", key], default])
            }
            Expr::Eq(a, b) => json!(["==", a.to_json(), b.to_json()]),
            Expr::Case { branches, fallback } => {
                let mut out = vec![json!("case")];
                for (cond, val) in branches {
                    out.push(cond.to_json());
                    out.push(val.to_json());
                }
                out.push(fallback.to_json());
                Value::Array(out)
            }
            Expr::Interpolate { input, stops } => {
                let mut out = vec![json!("interpolate"), json!(["linear"]), input.to_json()];
                for (stop, val) in stops {
                    out.push(json!(stop));
                    out.push(val.to_json());
                }
                Value::Array(out)
            }
            Expr::Mul(xs) => tagged("*", xs),
            Expr::Concat(xs) => tagged("concat", xs),
        }
    }

    /// Evaluate for one feature. Colors come back as CSS strings.
    pub fn evaluate(&self, props: &Map<String, Value>, state: &FeatureState) -> Value {
        match self {
            Expr::Literal(v) => v.clone(),
            Expr::Get(k) => props.get(k).cloned().unwrap_or(Value::Null),
            Expr::FeatureFlag { key, default } => match state.get(key) {
                Some(Value::Bool(b)) => Value::Bool(*b),
                _ => Value::Bool(*default),
            },
            Expr::Eq(a, b) => {
                Value::Bool(values_equal(&a.evaluate(props, state), &b.evaluate(props, state)))
            }
            Expr::Case { branches, fallback } => {
                for (cond, val) in branches {
                    if cond.evaluate(props, state) == Value::Bool(true) {
                        return val.evaluate(props, state);
                    }
                }
                fallback.evaluate(props, state)
            }
            Expr::Interpolate { input, stops } => {
                let x = input.evaluate(props, state).as_f64().unwrap_or(f64::NAN);
                let outs: Vec<(f64, Value)> = stops
                    .iter()
                    .map(|(s, e)| (*s, e.evaluate(props, state)))
                    .collect();
                interpolate_values(x, &outs)
            }
            Expr::Mul(xs) => {
                let product = xs
                    .iter()
                    .map(|x| x.evaluate(props, state).as_f64().unwrap_or(f64::NAN))
                    .product::<f64>();
                json!(product)
            }
            Expr::Concat(xs) => Value::String(
                xs.iter()
                    .map(|x| value_to_string(&x.evaluate(props, state)))
                    .collect(),
            ),
        }
    }
}

fn tagged(op: &str, xs: &[Expr]) -> Value {
    let mut out = vec![json!(op)];
    out.extend(xs.iter().map(Expr::to_json));
    Value::Array(out)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

/// Host `to-string`: integral numbers print without a fraction.
fn value_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            Some(f) => format!("{}", f),
            None => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Piecewise-linear interpolation over numeric or color outputs, clamped at
/// the outer stops.
fn interpolate_values(x: f64, stops: &[(f64, Value)]) -> Value {
    if stops.is_empty() {
        return Value::Null;
    }
    let first = &stops[0];
    let last = &stops[stops.len() - 1];
    let (lo, hi, t) = if x.is_nan() || x <= first.0 {
        (first, first, 0.0)
    } else if x >= last.0 {
        (last, last, 0.0)
    } else {
        let upper = stops.iter().position(|(s, _)| *s >= x).unwrap_or(stops.len() - 1);
        let lo = &stops[upper - 1];
        let hi = &stops[upper];
        let span = hi.0 - lo.0;
        (lo, hi, if span > 0.0 { (x - lo.0) / span } else { 0.0 })
    };

    if let (Some(a), Some(b)) = (lo.1.as_f64(), hi.1.as_f64()) {
        return json!(a + (b - a) * t);
    }
    let color = |v: &Value| v.as_str().and_then(Rgb::from_css);
    match (color(&lo.1), color(&hi.1)) {
        (Some(a), Some(b)) => {
            let mix = Rgb::new(
                a.r + (b.r - a.r) * t,
                a.g + (b.g - a.g) * t,
                a.b + (b.b - a.b) * t,
            );
            Value::String(mix.to_css())
        }
        _ => lo.1.clone(),
    }
}

/// Comparison operator in a legacy-syntax filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

/// Feature filter in the host's legacy syntax.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Any(Vec<Filter>),
    All(Vec<Filter>),
    Compare { op: CmpOp, key: String, value: Value },
}

impl Filter {
    pub fn cmp(op: CmpOp, key: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::Compare {
            op,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Filter {
        Filter::cmp(CmpOp::Eq, key, value)
    }

    pub fn lt(key: impl Into<String>, value: f64) -> Filter {
        Filter::cmp(CmpOp::Lt, key, value)
    }

    pub fn gt(key: impl Into<String>, value: f64) -> Filter {
        Filter::cmp(CmpOp::Gt, key, value)
    }

    pub fn to_json(&self) -> Value {
        match self {
            Filter::Any(fs) => {
                let mut out = vec![json!("any")];
                out.extend(fs.iter().map(Filter::to_json));
                Value::Array(out)
            }
            Filter::All(fs) => {
                let mut out = vec![json!("all")];
                out.extend(fs.iter().map(Filter::to_json));
                Value::Array(out)
            }
            Filter::Compare { op, key, value } => json!([op.symbol(), key, value]),
        }
    }

    /// Whether a feature with these properties passes the filter.
    /// Ordering comparisons against a missing or non-numeric value never match.
    pub fn matches(&self, props: &Map<String, Value>) -> bool {
        match self {
            Filter::Any(fs) => fs.iter().any(|f| f.matches(props)),
            Filter::All(fs) => fs.iter().all(|f| f.matches(props)),
            Filter::Compare { op, key, value } => {
                let actual = props.get(key).unwrap_or(&Value::Null);
                match op {
                    CmpOp::Eq => values_equal(actual, value),
                    CmpOp::Ne => !values_equal(actual, value),
                    _ => match (actual.as_f64(), value.as_f64()) {
                        (Some(a), Some(b)) => match op {
                            CmpOp::Lt => a < b,
                            CmpOp::Le => a <= b,
                            CmpOp::Gt => a > b,
                            _ => a >= b,
                        },
                        _ => match (actual.as_str(), value.as_str()) {
                            (Some(a), Some(b)) => match op {
                                CmpOp::Lt => a < b,
                                CmpOp::Le => a <= b,
                                CmpOp::Gt => a > b,
                                _ => a >= b,
                            },
                            _ => false,
                        },
                    },
                }
            }
        }
    }
}
