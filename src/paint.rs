//! Fill-color expressions for univariate and bivariate choropleths.
//!
//! Both expressions share the same leading tiers:
//! 1. feature-state `focus` -> focus color
//! 2. value equals the null sentinel -> null color
//! 3. otherwise the gradient (or the product of two gradients).

use crate::color::Gradient;
use crate::expr::Expr;
use crate::models::Prop;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Colors the painter needs besides the property gradients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaintColors {
    pub focus: String,
    pub null: String,
}

impl Default for PaintColors {
    fn default() -> Self {
        Self {
            focus: "#f8d84a".into(),
            null: "#520004".into(),
        }
    }
}

fn stop_to_value(stop: f64, range: [f64; 2]) -> f64 {
    range[0] + (range[1] - range[0]) * stop
}

/// Interpolation over the whole gradient, spread across `range`.
fn gradient_expr(key: &str, gradient: &Gradient, range: [f64; 2]) -> Expr {
    Expr::Interpolate {
        input: Box::new(Expr::get(key)),
        stops: gradient
            .stops()
            .iter()
            .map(|(stop, hex)| (stop_to_value(*stop, range), Expr::lit(hex.as_str())))
            .collect(),
    }
}

/// Interpolation of a single normalized channel (0 = r, 1 = g, 2 = b).
fn channel_expr(key: &str, gradient: &Gradient, range: [f64; 2], idx: usize) -> Expr {
    Expr::Interpolate {
        input: Box::new(Expr::get(key)),
        stops: gradient
            .rgb_stops()
            .iter()
            .map(|(stop, rgb)| (stop_to_value(*stop, range), Expr::lit(rgb.channel(idx))))
            .collect(),
    }
}

#[derive(Debug, Clone)]
pub struct Painter {
    pub colors: PaintColors,
    /// Value used in the tiles to represent "no data".
    pub null_value: Value,
}

impl Painter {
    pub fn new(colors: PaintColors) -> Self {
        Self {
            colors,
            null_value: Value::Null,
        }
    }

    pub fn with_null_value(mut self, null_value: impl Into<Value>) -> Self {
        self.null_value = null_value.into();
        self
    }

    fn focus_branch(&self) -> (Expr, Expr) {
        (
            Expr::FeatureFlag {
                key: "focus".into(),
                default: false,
            },
            Expr::lit(self.colors.focus.as_str()),
        )
    }

    fn is_null(&self, key: &str) -> Expr {
        Expr::eq(Expr::get(key), Expr::Literal(self.null_value.clone()))
    }

    /// Univariate color ramp for one property.
    pub fn range(&self, prop: &Prop) -> Expr {
        let null_color = prop.null_color.as_deref().unwrap_or(&self.colors.null);
        Expr::Case {
            branches: vec![
                self.focus_branch(),
                (self.is_null(&prop.key), Expr::lit(null_color)),
            ],
            fallback: Box::new(gradient_expr(&prop.key, &prop.color, prop.range)),
        }
    }

    /// Bivariate color: per channel, `a(v_a) * b(v_b) * 255`, composed into `rgb(...)`.
    pub fn bivariate(&self, a: &Prop, b: &Prop) -> Expr {
        let channel = |idx: usize| {
            Expr::Mul(vec![
                channel_expr(&a.key, &a.color, a.range, idx),
                channel_expr(&b.key, &b.color, b.range, idx),
                Expr::lit(255),
            ])
        };
        Expr::Case {
            branches: vec![
                self.focus_branch(),
                (self.is_null(&a.key), Expr::lit(self.colors.null.as_str())),
                (self.is_null(&b.key), Expr::lit(self.colors.null.as_str())),
            ],
            fallback: Box::new(Expr::Concat(vec![
                Expr::lit("rgb("),
                channel(0),
                Expr::lit(","),
                channel(1),
                Expr::lit(","),
                channel(2),
                Expr::lit(")"),
            ])),
        }
    }

    /// Pick the expression for the displayed properties: one -> range, two -> bivariate.
    /// Returns `None` when there is nothing to paint.
    pub fn paint(&self, props: &[Prop]) -> Option<Expr> {
        match props {
            [] => None,
            [only] => Some(self.range(only)),
            [a, b, ..] => Some(self.bivariate(a, b)),
        }
    }
}

impl Default for Painter {
    fn default() -> Self {
        Self::new(PaintColors::default())
    }
}
