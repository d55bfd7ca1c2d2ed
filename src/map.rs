//! Feature-state controller: focus and filter bookkeeping per map source.
//!
//! Focus and filter are independent axes. Each axis always unwinds its
//! previous state before applying the new one, element by element, because
//! the host keys feature-state by individual feature identity.
//!
//! Tiles stream in after a filter is set, so the current filter is replayed on
//! every `sourcedata` event for its source until it is cleared or replaced.

use crate::error::MapError;
use crate::expr::Filter;
use crate::host::FeatureStateHost;
use crate::models::{Bounds, FeatureId, FeatureState, MapFeature, MapSource, Point, Prop};
use crate::paint::Painter;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Basemap source reported alongside managed sources by `features_at_point`.
pub const COMPOSITE_SOURCE: &str = "composite";

/// Features grouped by source id.
pub type SourceFeatures = BTreeMap<String, Vec<MapFeature>>;

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// `sourcedata` events to wait through before a lookup gives up.
    pub max_lookup_attempts: usize,
    /// Paint property repainted by [`MapController::set`].
    pub fill_property: String,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            max_lookup_attempts: 20,
            fill_property: "fill-color".into(),
        }
    }
}

#[derive(Debug, Clone)]
struct ActiveFilter {
    filter: Filter,
    state: FeatureState,
    reset_state: FeatureState,
    /// Every feature this filter has written `state` to.
    matched: Vec<MapFeature>,
}

#[derive(Debug, Clone)]
struct SourceState {
    source: MapSource,
    focused: Vec<MapFeature>,
    filter: Option<ActiveFilter>,
}

/// Handle for a lookup still waiting on tile data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupToken(u64);

#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(Vec<MapFeature>),
    NotFound,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupStatus {
    Found(Vec<MapFeature>),
    Pending(LookupToken),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupResolution {
    pub token: LookupToken,
    pub outcome: Lookup,
}

#[derive(Debug)]
struct PendingLookup {
    token: LookupToken,
    source_id: String,
    filter: Filter,
    attempts: usize,
}

pub struct MapController<H: FeatureStateHost> {
    host: H,
    painter: Painter,
    options: ControllerOptions,
    sources: BTreeMap<String, SourceState>,
    focused_lock: bool,
    under_mouse: BTreeMap<String, BTreeSet<FeatureId>>,
    pending: Vec<PendingLookup>,
    next_token: u64,
}

impl<H: FeatureStateHost> MapController<H> {
    pub fn new(host: H, painter: Painter, sources: impl IntoIterator<Item = MapSource>) -> Self {
        Self::with_options(host, painter, sources, ControllerOptions::default())
    }

    pub fn with_options(
        host: H,
        painter: Painter,
        sources: impl IntoIterator<Item = MapSource>,
        options: ControllerOptions,
    ) -> Self {
        let sources = sources
            .into_iter()
            .map(|s| {
                (
                    s.id.clone(),
                    SourceState {
                        source: s,
                        focused: Vec::new(),
                        filter: None,
                    },
                )
            })
            .collect();
        Self {
            host,
            painter,
            options,
            sources,
            focused_lock: false,
            under_mouse: BTreeMap::new(),
            pending: Vec::new(),
            next_token: 1,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn painter(&self) -> &Painter {
        &self.painter
    }

    pub fn source(&self, source_id: &str) -> Result<&MapSource, MapError> {
        self.state(source_id).map(|s| &s.source)
    }

    fn state(&self, source_id: &str) -> Result<&SourceState, MapError> {
        self.sources
            .get(source_id)
            .ok_or_else(|| MapError::UnknownSource(source_id.to_string()))
    }

    fn state_mut(&mut self, source_id: &str) -> Result<&mut SourceState, MapError> {
        self.sources
            .get_mut(source_id)
            .ok_or_else(|| MapError::UnknownSource(source_id.to_string()))
    }

    /// Repaint the source's layer for the displayed properties.
    pub fn set(&mut self, source_id: &str, props: &[Prop]) -> Result<(), MapError> {
        self.state(source_id)?;
        let expr = self.painter.paint(props).ok_or(MapError::NoProperties)?;
        self.host
            .set_paint_property(source_id, &self.options.fill_property, &expr);
        Ok(())
    }

    pub fn focused(&self, source_id: &str) -> &[MapFeature] {
        self.sources
            .get(source_id)
            .map(|s| s.focused.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the focused set: `focus=false` on the old set, then `focus=true` on the new.
    pub fn focus_features(
        &mut self,
        source_id: &str,
        feats: Vec<MapFeature>,
    ) -> Result<(), MapError> {
        let st = self
            .sources
            .get_mut(source_id)
            .ok_or_else(|| MapError::UnknownSource(source_id.to_string()))?;
        let off = FeatureState::flag("focus", false);
        for f in &st.focused {
            self.host.set_feature_state(&st.source.feature_ref(&f.id), &off);
        }
        let on = FeatureState::flag("focus", true);
        for f in &feats {
            log::trace!("focus {}/{}", source_id, f.id);
            self.host.set_feature_state(&st.source.feature_ref(&f.id), &on);
        }
        st.focused = feats;
        Ok(())
    }

    pub fn active_filter(&self, source_id: &str) -> Option<&Filter> {
        self.sources
            .get(source_id)
            .and_then(|s| s.filter.as_ref())
            .map(|a| &a.filter)
    }

    /// Apply `state` to every loaded feature matching `filter`.
    ///
    /// A different filter already active on this source is rolled back first
    /// with its own reset-state.
    pub fn set_filter(
        &mut self,
        source_id: &str,
        filter: Filter,
        state: FeatureState,
        reset_state: FeatureState,
    ) -> Result<(), MapError> {
        let previous_reset = match &self.state(source_id)?.filter {
            Some(active) if active.filter != filter => Some(active.reset_state.clone()),
            _ => None,
        };
        if let Some(reset) = previous_reset {
            self.reset_filter(source_id, &reset)?;
        }

        let st = self.state_mut(source_id)?;
        let source = st.source.clone();
        let carried = match st.filter.take() {
            // Same filter again (a replay): keep tracking what it already touched.
            Some(active) if active.filter == filter => active.matched,
            _ => Vec::new(),
        };

        let found = self
            .host
            .query_source_features(&source.id, &source.layer, &filter);
        for f in &found {
            self.host.set_feature_state(&source.feature_ref(&f.id), &state);
        }

        let seen: BTreeSet<FeatureId> = found.iter().map(|f| f.id.clone()).collect();
        let mut matched = found;
        matched.extend(carried.into_iter().filter(|f| !seen.contains(&f.id)));

        log::debug!(
            "filter on {} matched {} loaded features",
            source.id,
            seen.len()
        );
        self.state_mut(source_id)?.filter = Some(ActiveFilter {
            filter,
            state,
            reset_state,
            matched,
        });
        Ok(())
    }

    /// Clear the filter and write `reset_state` to the features it matched
    /// when it was applied.
    pub fn reset_filter(
        &mut self,
        source_id: &str,
        reset_state: &FeatureState,
    ) -> Result<(), MapError> {
        let st = self.state_mut(source_id)?;
        let source = st.source.clone();
        if let Some(active) = st.filter.take() {
            for f in &active.matched {
                self.host
                    .set_feature_state(&source.feature_ref(&f.id), reset_state);
            }
        }
        Ok(())
    }

    /// Handle a host `sourcedata` event: replay the current filter for this
    /// source and retry pending lookups. Returns lookups that finished.
    pub fn on_source_data(&mut self, source_id: &str) -> Vec<LookupResolution> {
        let replay = self
            .sources
            .get(source_id)
            .and_then(|s| s.filter.as_ref())
            .map(|a| (a.filter.clone(), a.state.clone(), a.reset_state.clone()));
        if let Some((filter, state, reset_state)) = replay {
            log::debug!("replaying filter on {source_id}");
            if let Err(e) = self.set_filter(source_id, filter, state, reset_state) {
                log::warn!("filter replay on {source_id} failed: {e}");
            }
        }

        let mut resolved = Vec::new();
        let mut still_pending = Vec::new();
        for mut lookup in std::mem::take(&mut self.pending) {
            if lookup.source_id != source_id {
                still_pending.push(lookup);
                continue;
            }
            lookup.attempts += 1;
            let found = self.query(&lookup.source_id, &lookup.filter);
            if !found.is_empty() {
                resolved.push(LookupResolution {
                    token: lookup.token,
                    outcome: Lookup::Found(found),
                });
            } else if lookup.attempts >= self.options.max_lookup_attempts {
                log::warn!(
                    "no feature matching {:?} on {} after {} loads",
                    lookup.filter.to_json(),
                    source_id,
                    lookup.attempts
                );
                resolved.push(LookupResolution {
                    token: lookup.token,
                    outcome: Lookup::NotFound,
                });
            } else {
                still_pending.push(lookup);
            }
        }
        self.pending = still_pending;
        resolved
    }

    fn query(&self, source_id: &str, filter: &Filter) -> Vec<MapFeature> {
        match self.sources.get(source_id) {
            Some(st) => self
                .host
                .query_source_features(&st.source.id, &st.source.layer, filter),
            None => Vec::new(),
        }
    }

    /// Loaded features whose `key` equals `value`. When nothing is loaded yet
    /// the lookup waits on later `sourcedata` events, up to
    /// `max_lookup_attempts` of them.
    pub fn features_matching_property(
        &mut self,
        source_id: &str,
        key: &str,
        value: impl Into<Value>,
    ) -> Result<LookupStatus, MapError> {
        self.state(source_id)?;
        let filter = Filter::All(vec![Filter::eq(key, value)]);
        let found = self.query(source_id, &filter);
        if !found.is_empty() {
            return Ok(LookupStatus::Found(found));
        }
        let token = LookupToken(self.next_token);
        self.next_token += 1;
        self.pending.push(PendingLookup {
            token,
            source_id: source_id.to_string(),
            filter,
            attempts: 0,
        });
        Ok(LookupStatus::Pending(token))
    }

    pub fn pending_lookups(&self) -> usize {
        self.pending.len()
    }

    /// Rendered features under `point`, grouped by managed source plus `composite`.
    pub fn features_at_point(&self, point: Point) -> SourceFeatures {
        let mut out: SourceFeatures = self
            .sources
            .keys()
            .map(|k| (k.clone(), Vec::new()))
            .collect();
        out.insert(COMPOSITE_SOURCE.to_string(), Vec::new());
        for f in self.host.query_rendered_features(point) {
            if let Some(bucket) = out.get_mut(&f.source) {
                bucket.push(f);
            }
        }
        out
    }

    /// Mouse moved. Returns the features under the cursor only when something
    /// new came under it; nothing while the map is moving.
    pub fn on_mouse_move(&mut self, point: Point, map_moving: bool) -> Option<SourceFeatures> {
        if map_moving {
            return None;
        }
        let features = self.features_at_point(point);
        let have_new = features.iter().any(|(src, feats)| {
            let seen = self.under_mouse.get(src);
            feats
                .iter()
                .any(|f| seen.is_none_or(|ids| !ids.contains(&f.id)))
        });
        if !have_new {
            return None;
        }
        self.under_mouse = features
            .iter()
            .map(|(src, feats)| (src.clone(), feats.iter().map(|f| f.id.clone()).collect()))
            .collect();
        Some(features)
    }

    /// Click: returns the features under the point and locks focus if any were hit.
    pub fn on_click(&mut self, point: Point) -> SourceFeatures {
        let features = self.features_at_point(point);
        if features.values().any(|v| !v.is_empty()) {
            self.focused_lock = true;
        }
        features
    }

    pub fn is_focus_locked(&self) -> bool {
        self.focused_lock
    }

    pub fn unlock_focus(&mut self) {
        self.focused_lock = false;
    }

    pub fn fit_bounds(&mut self, bounds: Bounds) {
        self.host.fit_bounds(bounds);
    }
}
