//! Place summaries for focused features.
//!
//! A summary merges the fetched per-category payload for the feature's
//! primary place with those tile properties that belong to the current
//! category (or to no category at all).

use crate::api::PlaceApi;
use crate::category::{key_for_category, split_property_key};
use crate::config::{FieldFormat, InfoField};
use crate::format::{NA, cur_or_na, fmt_or_na, or_na, pct_or_na};
use crate::models::{Category, MapFeature};
use serde_json::{Map, Value};
use std::fmt::Write as _;

/// Other places listed before "+N more".
const OTHER_PLACES_SHOWN: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceSummary {
    pub title: String,
    /// `(label, formatted value)` per configured field.
    pub fields: Vec<(String, String)>,
    /// Neither fetched data nor category properties were available.
    pub no_data: bool,
    pub other_places: Vec<String>,
    pub more_places: usize,
}

impl PlaceSummary {
    pub fn render_text(&self, place_name_plural: &str) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{}", self.title);
        if self.no_data {
            let _ = writeln!(out, "No data for this place.");
        } else {
            for (label, value) in &self.fields {
                let _ = writeln!(out, "{label}: {value}");
            }
        }
        if !self.other_places.is_empty() {
            let _ = write!(
                out,
                "Other {} here: {}",
                place_name_plural,
                self.other_places.join(", ")
            );
            if self.more_places > 0 {
                let _ = write!(out, ", ... +{} more (zoom in to see).", self.more_places);
            }
            out.push('\n');
        }
        out
    }
}

fn format_field(value: Option<&Value>, format: FieldFormat) -> String {
    match value {
        Some(Value::String(s)) if format == FieldFormat::Plain => s.clone(),
        Some(v) => {
            let n = v.as_f64();
            match format {
                FieldFormat::Currency => cur_or_na(n),
                FieldFormat::Percent => pct_or_na(n),
                FieldFormat::Number => fmt_or_na(n),
                FieldFormat::Plain => or_na(n),
            }
        }
        None => NA.to_string(),
    }
}

/// Summary for one place's merged data.
pub fn describe_place(
    place_id: &str,
    data: &Map<String, Value>,
    fields: &[InfoField],
    others: &[String],
) -> PlaceSummary {
    let title = match data.get("name") {
        Some(Value::String(s)) => s.clone(),
        _ => place_id.to_string(),
    };
    PlaceSummary {
        title,
        fields: fields
            .iter()
            .map(|f| (f.label.clone(), format_field(data.get(&f.key), f.format)))
            .collect(),
        no_data: data.is_empty(),
        other_places: others.iter().take(OTHER_PLACES_SHOWN).cloned().collect(),
        more_places: others.len().saturating_sub(OTHER_PLACES_SHOWN),
    }
}

/// Overlay feature properties for `category_key` (and uncategorized ones) on `data`.
pub fn merge_feature_props(
    mut data: Map<String, Value>,
    feature: &MapFeature,
    category_key: &str,
) -> Map<String, Value> {
    for (k, v) in &feature.properties {
        let (prop, cat) = split_property_key(k);
        match cat {
            None | Some("") => {
                data.insert(prop.to_string(), v.clone());
            }
            Some(c) if c == category_key => {
                data.insert(prop.to_string(), v.clone());
            }
            _ => {}
        }
    }
    data
}

/// Summaries for the given features under `cat`, fetching place data as needed.
pub async fn explain(
    api: &PlaceApi,
    feats: &[MapFeature],
    cat: &Category,
    fields: &[InfoField],
) -> Vec<PlaceSummary> {
    let key = key_for_category(cat);
    let lookups = feats.iter().map(|f| {
        let key = key.clone();
        async move {
            let ids = f.place_ids();
            let (primary, others) = match ids.split_first() {
                Some((p, rest)) => (p.clone(), rest.to_vec()),
                None => (f.id.to_string(), Vec::new()),
            };
            let fetched = match api.data_for_key_place(&key, &primary).await {
                Value::Object(m) => m,
                _ => Map::new(),
            };
            let merged = merge_feature_props(fetched, f, &key);
            describe_place(&primary, &merged, fields, &others)
        }
    });
    futures::future::join_all(lookups).await
}
