//! The single mutation entry point for a map view.
//!
//! A `Session` owns the current category, the displayed base properties, the
//! feature-state controller and the legend. Every change goes through it, so
//! category keys are always resolved against the same registry and the map
//! and legend are repainted together.

use crate::api::PlaceApi;
use crate::category::split_property_key;
use crate::config::{MapConfig, PropTable};
use crate::error::{MapError, SessionError};
use crate::host::FeatureStateHost;
use crate::info::{PlaceSummary, explain};
use crate::legend::{Legend, LegendTarget};
use crate::map::{Lookup, LookupStatus, LookupToken, MapController};
use crate::models::{Category, MapFeature, MapSource, Point, Prop, normalize_place_id};
use crate::paint::Painter;
use std::collections::BTreeSet;

pub const MISSING_DATA_NOTICE: &str = "No data available for this selection.";

/// At most a univariate and a bivariate slot.
const MAX_PROPS: usize = 2;

/// What the UI should show after a change.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayUpdate {
    /// Fully-qualified keys now on the map.
    pub keys: Vec<String>,
    pub missing_data: Option<String>,
    /// Category controls to enable.
    pub enabled_dims: BTreeSet<String>,
}

pub struct Session<H: FeatureStateHost, T: LegendTarget> {
    config: MapConfig,
    table: PropTable,
    cat: Category,
    bases: Vec<String>,
    source: MapSource,
    map: MapController<H>,
    legend: Legend<T>,
    api: PlaceApi,
    pending_jump: Option<LookupToken>,
}

impl<H: FeatureStateHost, T: LegendTarget> Session<H, T> {
    /// Start from the config's initial state and paint it.
    pub fn new(config: MapConfig, host: H, target: T, api: PlaceApi) -> Result<Self, SessionError> {
        let table = config.prop_table();
        let source = MapSource::new(config.loa.clone(), config.loa.clone());
        let map = MapController::new(
            host,
            Painter::new(config.colors.paint.clone()),
            [source.clone()],
        );
        let legend = Legend::new(
            target,
            source.clone(),
            Vec::new(),
            config.colors.special.clone(),
            config.legend_stats.clone(),
        );
        let mut session = Self {
            cat: config.initial_state.cat.clone(),
            bases: config.initial_state.props.clone(),
            config,
            table,
            source,
            map,
            legend,
            api,
            pending_jump: None,
        };
        session.refresh()?;
        Ok(session)
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn category(&self) -> &Category {
        &self.cat
    }

    pub fn map(&self) -> &MapController<H> {
        &self.map
    }

    /// The host, for feeding it events (tile loads, pointer positions).
    pub fn host_mut(&mut self) -> &mut H {
        self.map.host_mut()
    }

    pub fn legend(&self) -> &Legend<T> {
        &self.legend
    }

    pub fn api(&self) -> &PlaceApi {
        &self.api
    }

    /// Fully-qualified keys for the displayed properties under the current category.
    pub fn keys(&self) -> Vec<String> {
        self.bases
            .iter()
            .map(|b| self.config.cats_for_props.property_key_for(b, &self.cat))
            .collect()
    }

    fn resolve(&self, keys: &[String]) -> Result<Vec<Prop>, SessionError> {
        keys.iter()
            .map(|k| {
                self.table
                    .get(k)
                    .cloned()
                    .ok_or_else(|| SessionError::UnknownProperty(k.clone()))
            })
            .collect()
    }

    /// Current display state without changing anything.
    pub fn display(&self) -> DisplayUpdate {
        let keys = self.keys();
        let missing_data = keys
            .iter()
            .any(|k| self.config.ui.no_data.contains(k))
            .then(|| MISSING_DATA_NOTICE.to_string());
        let enabled_dims = self
            .config
            .cats_for_props
            .enabled_dimensions(self.bases.iter().map(String::as_str));
        DisplayUpdate {
            keys,
            missing_data,
            enabled_dims,
        }
    }

    fn refresh(&mut self) -> Result<DisplayUpdate, SessionError> {
        let update = self.display();
        let props = self.resolve(&update.keys)?;
        self.map.set(&self.source.id, &props)?;
        self.legend.set(props);
        let focused = self.map.focused(&self.source.id).to_vec();
        if !focused.is_empty() {
            self.legend.render_features(&focused);
        }
        Ok(update)
    }

    fn check_base(&self, base: &str) -> Result<(), SessionError> {
        if self.table.get(base).is_none() {
            return Err(SessionError::UnknownProperty(base.to_string()));
        }
        Ok(())
    }

    /// Put `base` in slot `idx` (0 or 1). An empty `base` clears the slot,
    /// which drops a bivariate display back to univariate.
    pub fn set_property(&mut self, idx: usize, base: &str) -> Result<DisplayUpdate, SessionError> {
        if idx >= MAX_PROPS {
            return Err(SessionError::BadSlot(idx));
        }
        let previous = self.bases.clone();
        if base.is_empty() {
            if idx < self.bases.len() {
                self.bases.remove(idx);
            }
            if self.bases.is_empty() {
                self.bases = previous;
                return Err(MapError::NoProperties.into());
            }
        } else {
            let (base, _) = split_property_key(base);
            self.check_base(base)?;
            match idx.cmp(&self.bases.len()) {
                std::cmp::Ordering::Less => self.bases[idx] = base.to_string(),
                std::cmp::Ordering::Equal => self.bases.push(base.to_string()),
                std::cmp::Ordering::Greater => return Err(SessionError::BadSlot(idx)),
            }
        }
        self.refresh().inspect_err(|_| self.bases = previous)
    }

    /// Change one category dimension and re-resolve every displayed property.
    pub fn set_category(&mut self, dim: &str, value: &str) -> Result<DisplayUpdate, SessionError> {
        let previous = self.cat.clone();
        self.cat.set(dim, value);
        self.refresh().inspect_err(|_| self.cat = previous)
    }

    /// Replace the displayed properties. Qualified keys are reduced to their base.
    pub fn set_display<S: AsRef<str>>(&mut self, keys: &[S]) -> Result<DisplayUpdate, SessionError> {
        if keys.is_empty() {
            return Err(MapError::NoProperties.into());
        }
        let bases: Vec<String> = keys
            .iter()
            .take(MAX_PROPS)
            .map(|k| split_property_key(k.as_ref()).0.to_string())
            .collect();
        for b in &bases {
            self.check_base(b)?;
        }
        let previous = std::mem::replace(&mut self.bases, bases);
        self.refresh().inspect_err(|_| self.bases = previous)
    }

    /// Focus exactly `feats` and show them on the legend.
    pub fn focus(&mut self, feats: Vec<MapFeature>) -> Result<(), SessionError> {
        if feats.is_empty() {
            self.legend.hide_features();
        } else {
            self.legend.render_features(&feats);
        }
        self.map.focus_features(&self.source.id, feats)?;
        Ok(())
    }

    pub fn focused(&self) -> &[MapFeature] {
        self.map.focused(&self.source.id)
    }

    /// Hover: focus what came under the cursor unless a click locked focus.
    pub fn on_mouse_move(&mut self, point: Point, map_moving: bool) -> Result<(), SessionError> {
        if self.map.is_focus_locked() {
            return Ok(());
        }
        if let Some(mut found) = self.map.on_mouse_move(point, map_moving) {
            let feats = found.remove(&self.source.id).unwrap_or_default();
            self.focus(feats)?;
        }
        Ok(())
    }

    /// Click: focus what is under the point and lock it.
    pub fn on_click(&mut self, point: Point) -> Result<(), SessionError> {
        let mut found = self.map.on_click(point);
        let feats = found.remove(&self.source.id).unwrap_or_default();
        self.focus(feats)
    }

    pub fn unlock_focus(&mut self) {
        self.map.unlock_focus();
    }

    pub fn hover_bin(&mut self, index: usize) -> Result<(), SessionError> {
        Ok(self.legend.hover_bin(&mut self.map, index)?)
    }

    pub fn hover_cell(&mut self, column: usize, row: usize) -> Result<(), SessionError> {
        Ok(self.legend.hover_cell(&mut self.map, column, row)?)
    }

    pub fn leave_legend(&mut self) -> Result<(), SessionError> {
        Ok(self.legend.leave(&mut self.map)?)
    }

    /// Host `sourcedata` event. Returns the outcome of a place jump that was
    /// waiting on tiles, if it finished with this event.
    pub fn on_source_data(&mut self, source_id: &str) -> Result<Option<Lookup>, SessionError> {
        let resolutions = self.map.on_source_data(source_id);
        let Some(token) = self.pending_jump else {
            return Ok(None);
        };
        let Some(done) = resolutions.into_iter().find(|r| r.token == token) else {
            return Ok(None);
        };
        self.pending_jump = None;
        if let Lookup::Found(feats) = &done.outcome {
            self.focus(feats.clone())?;
        }
        Ok(Some(done.outcome))
    }

    /// Zero-pad numeric place ids to the configured minimum length ("501" -> "00501").
    pub fn normalize_place_id(&self, place: &str) -> String {
        normalize_place_id(place, self.config.ui.min_place_id_length)
    }

    /// Fly to a place and focus it. Returns the focused features, or `None`
    /// while the lookup waits on tiles (see [`Session::on_source_data`]).
    pub async fn jump_to_place(&mut self, place: &str) -> Result<Option<Vec<MapFeature>>, SessionError> {
        let place = self.normalize_place_id(place);
        match self.api.bbox_for_place(&place).await {
            Some(bounds) => self.map.fit_bounds(bounds),
            None => log::warn!("no bounding box for place {place}"),
        }
        match self
            .map
            .features_matching_property(&self.source.id, "loa_key", place.as_str())?
        {
            LookupStatus::Found(feats) => {
                self.pending_jump = None;
                self.focus(feats.clone())?;
                Ok(Some(feats))
            }
            LookupStatus::Pending(token) => {
                log::debug!("place {place} not loaded yet, waiting on tiles");
                self.pending_jump = Some(token);
                Ok(None)
            }
        }
    }

    /// Summaries for the focused features under the current category.
    pub async fn explain_focused(&self) -> Vec<PlaceSummary> {
        explain(
            &self.api,
            self.map.focused(&self.source.id),
            &self.cat,
            &self.config.info_fields,
        )
        .await
    }

    /// Tear down the legend, releasing its target.
    pub fn close(self) -> T {
        self.legend.destroy()
    }
}
