//! Canonical category keys and category-qualified property keys.
//!
//! A category selection `{Y: "2022", S: "public"}` always produces the key
//! `"S:public.Y:2022"`: dimensions sorted, `dim:value` pairs joined with `.`.
//! That string is used both as the cache key for place data and as the
//! suffix of tile property names (`med_bal.S:public.Y:2022`).

use crate::models::Category;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Category spec: dimension -> (value -> display label).
pub type CategorySpec = BTreeMap<String, BTreeMap<String, String>>;

/// Locale-style string ordering: case-insensitive first, lowercase before
/// uppercase on ties, then plain byte order.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    let fold = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<String>();
    fold(a)
        .cmp(&fold(b))
        .then_with(|| {
            a.chars()
                .zip(b.chars())
                .find(|(x, y)| x != y)
                .map(|(x, y)| x.is_uppercase().cmp(&y.is_uppercase()))
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.cmp(b))
}

/// Canonical key for a category selection.
pub fn key_for_category(cat: &Category) -> String {
    let mut pairs: Vec<(&str, &str)> = cat.iter().collect();
    pairs.sort_by(|a, b| locale_cmp(a.0, b.0));
    pairs
        .iter()
        .map(|(d, v)| format!("{d}:{v}"))
        .collect::<Vec<_>>()
        .join(".")
}

/// Split a property key at its first `.` into (base, category key).
pub fn split_property_key(full_key: &str) -> (&str, Option<&str>) {
    match full_key.split_once('.') {
        Some((base, cat)) => (base, Some(cat)),
        None => (full_key, None),
    }
}

/// Every combination of category values, one value per dimension.
pub fn all_categories(spec: &CategorySpec) -> Vec<Category> {
    let mut combos: Vec<Category> = Vec::new();
    for (dim, values) in spec {
        if values.is_empty() {
            continue;
        }
        if combos.is_empty() {
            combos = values
                .keys()
                .map(|v| Category::new().with(dim.clone(), v.clone()))
                .collect();
        } else {
            combos = combos
                .iter()
                .flat_map(|c| values.keys().map(move |v| c.clone().with(dim.clone(), v.clone())))
                .collect();
        }
    }
    combos
}

/// The one table of which category dimensions apply to which base property.
///
/// Key resolution and UI-control enablement both read this table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryRegistry {
    dims_for_prop: BTreeMap<String, Vec<String>>,
}

impl CategoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<I, S>(&mut self, base: impl Into<String>, dims: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dims_for_prop
            .insert(base.into(), dims.into_iter().map(Into::into).collect());
    }

    pub fn with<I, S>(mut self, base: impl Into<String>, dims: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.register(base, dims);
        self
    }

    pub fn dims_for(&self, base: &str) -> Option<&[String]> {
        self.dims_for_prop.get(base).map(Vec::as_slice)
    }

    pub fn is_category_sensitive(&self, base: &str) -> bool {
        self.dims_for_prop.contains_key(base)
    }

    pub fn bases(&self) -> impl Iterator<Item = &str> {
        self.dims_for_prop.keys().map(String::as_str)
    }

    /// Resolve a (possibly already qualified) property name plus the current
    /// category into the fully-qualified key used for lookups and tile access.
    ///
    /// Dimensions not registered for the property are dropped. A registered
    /// property with no matching dimensions still yields `"<base>."`.
    pub fn property_key_for(&self, property: &str, cat: &Category) -> String {
        let (base, _) = split_property_key(property);
        let Some(dims) = self.dims_for(base) else {
            return base.to_string();
        };
        let restricted: Category = dims
            .iter()
            .filter_map(|d| cat.get(d).map(|v| (d.clone(), v.to_string())))
            .collect();
        if restricted.is_empty() {
            log::warn!(
                "property {base:?} is category-sensitive but none of {dims:?} are selected"
            );
        }
        format!("{}.{}", base, key_for_category(&restricted))
    }

    /// Dimensions relevant to at least one of the given properties, i.e. the
    /// category controls that should be enabled.
    pub fn enabled_dimensions<'a, I>(&self, props: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        props
            .into_iter()
            .filter_map(|p| self.dims_for(split_property_key(p).0))
            .flatten()
            .cloned()
            .collect()
    }
}
