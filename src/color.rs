//! Color-space helpers: hex/RGB conversion, gradient interpolation and the
//! channel multiplication used to mix two gradients into a bivariate color.
//!
//! Channels are kept normalized to `0..=1` while mixing and only scaled to
//! `0..=255` when a color is rendered as CSS or hex.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Normalized RGB color (each channel in `0..=1`).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub fn new(r: f64, g: f64, b: f64) -> Self {
        Self { r, g, b }
    }

    /// Parse `#RRGGBB` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let h = hex.trim().trim_start_matches('#');
        if h.len() != 6 || !h.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let v = u32::from_str_radix(h, 16).ok()?;
        Some(Self {
            r: ((v >> 16) & 255) as f64 / 255.0,
            g: ((v >> 8) & 255) as f64 / 255.0,
            b: (v & 255) as f64 / 255.0,
        })
    }

    /// Parse either `#RRGGBB` or `rgb(r, g, b)` with 0..255 channels.
    pub fn from_css(css: &str) -> Option<Self> {
        let s = css.trim();
        if s.starts_with('#') {
            return Self::from_hex(s);
        }
        let inner = s.strip_prefix("rgb(")?.strip_suffix(')')?;
        let parts: Vec<f64> = inner
            .split(',')
            .map(|p| p.trim().parse::<f64>())
            .collect::<Result<_, _>>()
            .ok()?;
        match parts.as_slice() {
            [r, g, b] => Some(Self::new(r / 255.0, g / 255.0, b / 255.0)),
            _ => None,
        }
    }

    /// Channel `idx` (0 = r, 1 = g, 2 = b).
    pub fn channel(&self, idx: usize) -> f64 {
        match idx {
            0 => self.r,
            1 => self.g,
            _ => self.b,
        }
    }

    /// Element-wise product, the bivariate mixing rule.
    pub fn multiply(&self, other: &Rgb) -> Rgb {
        Rgb::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    pub fn to_rgb8(&self) -> (u8, u8, u8) {
        (to_byte(self.r), to_byte(self.g), to_byte(self.b))
    }

    pub fn to_css(&self) -> String {
        let (r, g, b) = self.to_rgb8();
        format!("rgb({}, {}, {})", r, g, b)
    }

    pub fn to_hex(&self) -> String {
        let (r, g, b) = self.to_rgb8();
        format!("#{:02X}{:02X}{:02X}", r, g, b)
    }

    /// Channel-wise distance, handy for comparing evaluated colors.
    pub fn max_channel_diff(&self, other: &Rgb) -> f64 {
        (self.r - other.r)
            .abs()
            .max((self.g - other.g).abs())
            .max((self.b - other.b).abs())
    }
}

fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

fn to_byte(x: f64) -> u8 {
    (clamp01(x) * 255.0).round() as u8
}

fn lerp(l: f64, u: f64, p: f64) -> f64 {
    l + (u - l) * p
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GradientError {
    #[error("gradient needs at least two stops, got {0}")]
    TooFewStops(usize),
    #[error("gradient stop {0:?} is not a number")]
    BadStop(String),
    #[error("gradient stop {0:?} is outside 0..=1")]
    StopOutOfRange(String),
    #[error("invalid hex color {0:?}")]
    BadColor(String),
}

/// A color ramp: stop position (`0..=1`) to hex color, sorted ascending.
///
/// Serialized as a JSON object keyed by stop position, e.g.
/// `{"0": "#ffffff", "0.5": "#7fa7d8", "1": "#08306b"}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct Gradient {
    stops: Vec<(f64, String)>,
}

impl Gradient {
    pub fn new(stops: Vec<(f64, String)>) -> Result<Self, GradientError> {
        if stops.len() < 2 {
            return Err(GradientError::TooFewStops(stops.len()));
        }
        let mut stops = stops;
        for (pos, hex) in &stops {
            if !(0.0..=1.0).contains(pos) {
                return Err(GradientError::StopOutOfRange(pos.to_string()));
            }
            if Rgb::from_hex(hex).is_none() {
                return Err(GradientError::BadColor(hex.clone()));
            }
        }
        stops.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(Self { stops })
    }

    /// Convenience for two-stop ramps.
    pub fn linear(from: &str, to: &str) -> Result<Self, GradientError> {
        Self::new(vec![(0.0, from.to_string()), (1.0, to.to_string())])
    }

    pub fn stops(&self) -> &[(f64, String)] {
        &self.stops
    }

    /// Stop colors as normalized RGB, in stop order.
    pub fn rgb_stops(&self) -> Vec<(f64, Rgb)> {
        // Colors were validated on construction.
        self.stops
            .iter()
            .map(|(p, hex)| (*p, Rgb::from_hex(hex).unwrap_or(Rgb::new(0.0, 0.0, 0.0))))
            .collect()
    }

    /// Linear interpolation between the two stops bracketing `p`.
    /// Positions outside the first/last stop clamp to those stops.
    pub fn interpolate(&self, p: f64) -> Rgb {
        let stops = self.rgb_stops();
        let (first_pos, first) = stops[0];
        let (last_pos, last) = stops[stops.len() - 1];
        if p.is_nan() || p <= first_pos {
            return first;
        }
        if p >= last_pos {
            return last;
        }
        let upper = stops.iter().position(|(s, _)| *s >= p).unwrap_or(stops.len() - 1);
        let (l_pos, l) = stops[upper - 1];
        let (u_pos, u) = stops[upper];
        let t = if u_pos > l_pos { (p - l_pos) / (u_pos - l_pos) } else { 0.0 };
        Rgb::new(lerp(l.r, u.r, t), lerp(l.g, u.g, t), lerp(l.b, u.b, t))
    }
}

impl TryFrom<BTreeMap<String, String>> for Gradient {
    type Error = GradientError;

    fn try_from(raw: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        let stops = raw
            .into_iter()
            .map(|(k, v)| {
                k.trim()
                    .parse::<f64>()
                    .map(|p| (p, v))
                    .map_err(|_| GradientError::BadStop(k))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Gradient::new(stops)
    }
}

impl From<Gradient> for BTreeMap<String, String> {
    fn from(g: Gradient) -> Self {
        g.stops.into_iter().map(|(p, c)| (p.to_string(), c)).collect()
    }
}
