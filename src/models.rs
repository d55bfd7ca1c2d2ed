use crate::color::Gradient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Geographic bounding box `[min_lon, min_lat, max_lon, max_lat]`.
pub type Bounds = [f64; 4];

/// Legend display policy for a property.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendSpec {
    #[serde(default)]
    pub flip: bool,
    #[serde(default)]
    pub min_clamped: bool,
    #[serde(default)]
    pub max_clamped: bool,
    /// Named override colors, e.g. `"Missing Data" -> "#cccccc"`.
    #[serde(default)]
    pub special: BTreeMap<String, String>,
}

/// A displayable statistical property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prop {
    pub key: String,
    #[serde(default)]
    pub nick: String,
    #[serde(default)]
    pub desc: String,
    pub range: [f64; 2],
    pub color: Gradient,
    #[serde(default, rename = "nullColor", alias = "null_color")]
    pub null_color: Option<String>,
    #[serde(default)]
    pub legend: LegendSpec,
    #[serde(default)]
    pub stats: BTreeMap<String, f64>,
}

impl Prop {
    /// Position of `value` within `range`, clamped to `0..=1`.
    pub fn normalize(&self, value: f64) -> f64 {
        let [lo, hi] = self.range;
        if hi <= lo {
            return 0.0;
        }
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// Copy of this property under a category-qualified key.
    pub fn qualified(&self, key: impl Into<String>) -> Prop {
        Prop {
            key: key.into(),
            ..self.clone()
        }
    }
}

/// A selection along independent category dimensions (year, school subset, ...).
///
/// Insertion order is kept only for display; equality ignores it and the
/// canonical key (see [`crate::category::key_for_category`]) sorts dimensions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, CategoryValue>", into = "BTreeMap<String, String>")]
pub struct Category {
    entries: Vec<(String, String)>,
}

impl Category {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `dim` to `value`, replacing any previous value for that dimension.
    pub fn set(&mut self, dim: impl Into<String>, value: impl Into<String>) {
        let dim = dim.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(d, _)| *d == dim) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((dim, value)),
        }
    }

    pub fn with(mut self, dim: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(dim, value);
        self
    }

    pub fn get(&self, dim: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(d, _)| d == dim)
            .map(|(_, v)| v.as_str())
    }

    pub fn dims(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(d, _)| d.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(d, v)| (d.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PartialEq for Category {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(d, v)| other.get(d) == Some(v))
    }
}

impl Eq for Category {}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Category {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut c = Category::new();
        for (k, v) in iter {
            c.set(k, v);
        }
        c
    }
}

impl From<BTreeMap<String, CategoryValue>> for Category {
    fn from(raw: BTreeMap<String, CategoryValue>) -> Self {
        raw.into_iter().map(|(k, v)| (k, v.0)).collect()
    }
}

impl From<Category> for BTreeMap<String, String> {
    fn from(c: Category) -> Self {
        c.entries.into_iter().collect()
    }
}

/// Category value that may be written as a JSON string or number
/// (`{"Y": 2022}` and `{"Y": "2022"}` are the same selection).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryValue(pub String);

impl<'de> Deserialize<'de> for CategoryValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{self, Visitor};
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = CategoryValue;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a string or number category value")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CategoryValue(v.to_string()))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CategoryValue(v.to_string()))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CategoryValue(v.to_string()))
            }

            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(CategoryValue(s.to_string()))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Stable feature identifier within a source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureId {
    Num(u64),
    Text(String),
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Num(n) => write!(f, "{n}"),
            FeatureId::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for FeatureId {
    fn from(n: u64) -> Self {
        FeatureId::Num(n)
    }
}

impl From<&str> for FeatureId {
    fn from(s: &str) -> Self {
        FeatureId::Text(s.to_string())
    }
}

/// A feature from a vector/GeoJSON source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapFeature {
    pub id: FeatureId,
    /// Source the host reported this feature from.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl MapFeature {
    pub fn new(id: impl Into<FeatureId>, source: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            properties: Map::new(),
        }
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.properties.get(key).and_then(Value::as_f64)
    }

    /// Place ids this rendered shape stands for (`loa_key`, falling back to `id`),
    /// split on `,`. Several places share one shape at low zoom.
    pub fn place_ids(&self) -> Vec<String> {
        let raw = ["loa_key", "id"]
            .iter()
            .find_map(|k| match self.properties.get(*k) {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| self.id.to_string());
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Zero-pad an all-digit place id to `min_len` ("501" -> "00501"). Other ids
/// are only trimmed.
pub fn normalize_place_id(place: &str, min_len: usize) -> String {
    let place = place.trim();
    if !place.is_empty() && place.chars().all(|c| c.is_ascii_digit()) && place.len() < min_len {
        format!("{place:0>min_len$}")
    } else {
        place.to_string()
    }
}

/// A map source managed by the controller, with the layer its features live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MapSource {
    pub id: String,
    pub layer: String,
}

impl MapSource {
    pub fn new(id: impl Into<String>, layer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            layer: layer.into(),
        }
    }

    pub fn feature_ref(&self, id: &FeatureId) -> FeatureRef {
        FeatureRef {
            source: self.id.clone(),
            source_layer: self.layer.clone(),
            id: id.clone(),
        }
    }
}

/// Address of one feature's state in the host: (source, source-layer, id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureRef {
    pub source: String,
    pub source_layer: String,
    pub id: FeatureId,
}

/// Per-feature visual state written through the host (`focus`, `mute`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureState(pub Map<String, Value>);

impl FeatureState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn flag(key: &str, on: bool) -> Self {
        Self::new().with(key, on)
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_set(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(Value::Bool(true)))
    }

    /// Merge `other` into this state, key by key (host `setFeatureState` semantics).
    pub fn merge(&mut self, other: &FeatureState) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

/// Screen position in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}
