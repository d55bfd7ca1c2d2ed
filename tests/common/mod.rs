#![allow(dead_code)]

use async_trait::async_trait;
use msdmap_rs::api::JsonFetcher;
use msdmap_rs::error::FetchError;
use msdmap_rs::legend::{LegendPoint, LegendTarget, LegendView};
use msdmap_rs::models::{Bounds, FeatureId, FeatureRef, FeatureState, MapFeature, Point};
use msdmap_rs::{Expr, FeatureStateHost, Filter};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Map host that keeps loaded features and feature-state in memory.
#[derive(Debug, Default)]
pub struct MemoryHost {
    loaded: BTreeMap<String, Vec<MapFeature>>,
    states: BTreeMap<(String, String), FeatureState>,
    /// Every `set_feature_state` call, in order, as `(source, id, state)`.
    pub writes: Vec<(String, String, FeatureState)>,
    pub rendered: Vec<MapFeature>,
    pub paint: BTreeMap<(String, String), Value>,
    pub fitted: Vec<Bounds>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate a tile load adding `feats` to `source`.
    pub fn load(&mut self, source: &str, feats: impl IntoIterator<Item = MapFeature>) {
        self.loaded.entry(source.to_string()).or_default().extend(feats);
    }

    pub fn state(&self, source: &str, id: impl Into<FeatureId>) -> FeatureState {
        self.states
            .get(&(source.to_string(), id.into().to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Boolean flag of a feature's state, `None` when never written.
    pub fn flag(&self, source: &str, id: impl Into<FeatureId>, key: &str) -> Option<bool> {
        self.state(source, id).get(key).and_then(Value::as_bool)
    }

    pub fn touched(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.writes.iter().map(|(_, id, _)| id.clone()).collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

impl FeatureStateHost for MemoryHost {
    fn set_feature_state(&mut self, feature: &FeatureRef, state: &FeatureState) {
        let key = (feature.source.clone(), feature.id.to_string());
        self.states.entry(key).or_default().merge(state);
        self.writes
            .push((feature.source.clone(), feature.id.to_string(), state.clone()));
    }

    fn query_source_features(
        &self,
        source: &str,
        _source_layer: &str,
        filter: &Filter,
    ) -> Vec<MapFeature> {
        self.loaded
            .get(source)
            .map(|fs| {
                fs.iter()
                    .filter(|f| filter.matches(&f.properties))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn query_rendered_features(&self, _point: Point) -> Vec<MapFeature> {
        self.rendered.clone()
    }

    fn set_paint_property(&mut self, layer: &str, property: &str, value: &Expr) {
        self.paint
            .insert((layer.to_string(), property.to_string()), value.to_json());
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        self.fitted.push(bounds);
    }
}

/// Legend target that records what it was asked to draw.
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub views: Vec<LegendView>,
    pub points: Vec<Vec<LegendPoint>>,
    pub cleared: usize,
    pub destroyed: bool,
}

impl LegendTarget for RecordingTarget {
    fn render(&mut self, view: &LegendView) {
        self.views.push(view.clone());
    }

    fn show_points(&mut self, points: &[LegendPoint]) {
        self.points.push(points.to_vec());
    }

    fn clear_focus_points(&mut self) {
        self.cleared += 1;
    }

    fn destroy(&mut self) {
        self.destroyed = true;
    }
}

/// Fetcher serving canned JSON by URL suffix; anything else is a 404.
#[derive(Debug, Default)]
pub struct ScriptedFetcher {
    responses: Mutex<BTreeMap<String, Value>>,
    calls: AtomicUsize,
    urls: Mutex<Vec<String>>,
    delay_ms: u64,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    pub fn respond(self, url_suffix: &str, body: Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url_suffix.to_string(), body);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requested URLs, in call order.
    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl JsonFetcher for ScriptedFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        let found = self
            .responses
            .lock()
            .unwrap()
            .iter()
            .find(|(suffix, _)| url.ends_with(suffix.as_str()))
            .map(|(_, v)| v.clone());
        found.ok_or(FetchError::Status(404))
    }
}

/// Feature on `source` with numeric properties.
pub fn feature(id: u64, source: &str, props: &[(&str, f64)]) -> MapFeature {
    props
        .iter()
        .fold(MapFeature::new(id, source), |f, (k, v)| f.with_prop(*k, *v))
}
