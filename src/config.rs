//! Static map configuration loaded from JSON.
//!
//! Category-qualified property variants are derived once at load time, one
//! per base property and combination of its registered dimensions, and kept
//! in a lookup table keyed by the fully-qualified key.

use crate::category::{CategoryRegistry, CategorySpec, all_categories, key_for_category};
use crate::error::ConfigError;
use crate::models::{Category, Prop};
use crate::paint::PaintColors;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Formatting for a field in the place summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    #[default]
    Number,
    Currency,
    Percent,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoField {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub format: FieldFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UiConfig {
    /// Fully-qualified keys for which no data exists.
    #[serde(default)]
    pub no_data: Vec<String>,
    #[serde(default = "default_min_place_id_length")]
    pub min_place_id_length: usize,
}

fn default_min_place_id_length() -> usize {
    5
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            no_data: Vec::new(),
            min_place_id_length: default_min_place_id_length(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    #[serde(default)]
    pub cat: Category,
    /// Base property names, one or two.
    pub props: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorConfig {
    #[serde(flatten)]
    pub paint: PaintColors,
    /// Named colors shown in the legend's special section.
    #[serde(default)]
    pub special: BTreeMap<String, String>,
}

/// Raw config document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapConfig {
    pub loa: String,
    #[serde(default)]
    pub place_name: String,
    #[serde(default)]
    pub place_name_plural: String,
    #[serde(default)]
    pub data_prefix: Option<String>,
    pub props: BTreeMap<String, Prop>,
    #[serde(default)]
    pub cats: CategorySpec,
    #[serde(default)]
    pub cats_for_props: CategoryRegistry,
    pub colors: ColorConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub info_fields: Vec<InfoField>,
    /// Stat names plotted on the legend, e.g. `["min"]`.
    #[serde(default)]
    pub legend_stats: Vec<String>,
    pub initial_state: InitialState,
}

impl MapConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        let cfg: MapConfig = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&s)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for (key, p) in &self.props {
            let [min, max] = p.range;
            if min > max {
                return Err(ConfigError::InvertedRange {
                    key: key.clone(),
                    min,
                    max,
                });
            }
        }
        for base in self.cats_for_props.bases() {
            for dim in self.cats_for_props.dims_for(base).unwrap_or(&[]) {
                if !self.cats.contains_key(dim) {
                    return Err(ConfigError::UnknownDimension {
                        prop: base.to_string(),
                        dim: dim.clone(),
                    });
                }
            }
        }
        for p in &self.initial_state.props {
            if !self.props.contains_key(p) {
                return Err(ConfigError::UnknownInitialProp(p.clone()));
            }
        }
        Ok(())
    }

    /// Build the lookup table of base and category-qualified properties.
    pub fn prop_table(&self) -> PropTable {
        let mut props: BTreeMap<String, Prop> = BTreeMap::new();
        for (key, prop) in &self.props {
            if key.contains('.') {
                continue;
            }
            let base = prop.qualified(key.clone());
            if let Some(dims) = self.cats_for_props.dims_for(key) {
                let spec: CategorySpec = self
                    .cats
                    .iter()
                    .filter(|(d, _)| dims.contains(*d))
                    .map(|(d, v)| (d.clone(), v.clone()))
                    .collect();
                for cat in all_categories(&spec) {
                    let full = format!("{}.{}", key, key_for_category(&cat));
                    props.insert(full.clone(), base.qualified(full));
                }
            }
            props.insert(key.clone(), base);
        }
        // Explicit per-variant entries override the derived ones.
        for (key, prop) in &self.props {
            if key.contains('.') {
                props.insert(key.clone(), prop.qualified(key.clone()));
            }
        }
        PropTable { props }
    }
}

/// Lookup of every displayable property by fully-qualified key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropTable {
    props: BTreeMap<String, Prop>,
}

impl PropTable {
    pub fn get(&self, key: &str) -> Option<&Prop> {
        self.props.get(key)
    }

    pub fn len(&self) -> usize {
        self.props.len()
    }

    pub fn is_empty(&self) -> bool {
        self.props.is_empty()
    }

    /// Base (unqualified) property keys, for property selectors.
    pub fn base_keys(&self) -> impl Iterator<Item = &str> {
        self.props
            .keys()
            .map(String::as_str)
            .filter(|k| !k.contains('.'))
    }
}
