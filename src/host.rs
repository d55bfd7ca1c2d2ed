//! Capabilities consumed from the rendering host (the vector-tile map engine).
//!
//! The controller only talks to the map through this trait, so its ordering
//! rules can be exercised against an in-memory host.

use crate::expr::{Expr, Filter};
use crate::models::{Bounds, FeatureRef, FeatureState, MapFeature, Point};

pub trait FeatureStateHost {
    /// Merge `state` into the feature's state.
    fn set_feature_state(&mut self, feature: &FeatureRef, state: &FeatureState);

    /// Features in already-loaded tiles of `source`/`source_layer` passing `filter`.
    fn query_source_features(
        &self,
        source: &str,
        source_layer: &str,
        filter: &Filter,
    ) -> Vec<MapFeature>;

    /// Features rendered under a screen point, across all sources.
    fn query_rendered_features(&self, point: Point) -> Vec<MapFeature>;

    fn set_paint_property(&mut self, layer: &str, property: &str, value: &Expr);

    fn fit_bounds(&mut self, bounds: Bounds);
}
