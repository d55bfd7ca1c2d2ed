//! Legend model: bins, labels, reference points, and hover filters.
//!
//! Drawing is left to a [`LegendTarget`] handed in at construction, so
//! several maps can each own a legend without sharing global state.
//!
//! Hover convention: a bin's filter selects the features to **mute**, i.e.
//! the complement of the bin.

use crate::color::Gradient;
use crate::error::MapError;
use crate::expr::Filter;
use crate::host::FeatureStateHost;
use crate::map::MapController;
use crate::models::{FeatureState, MapFeature, MapSource, Prop};
use std::collections::BTreeMap;

/// Bins in the univariate bar.
pub const RANGE_BINS: usize = 4;
/// Cells per side in the bivariate grid.
pub const GRID_SIZE: usize = 5;

/// Bounds of one bin along one axis, plus which ends are open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisBin {
    pub lower: f64,
    pub upper: f64,
    /// Lowest bin: also takes values below `lower`.
    pub open_below: bool,
    /// Highest bin: also takes values above `upper`.
    pub open_above: bool,
}

impl AxisBin {
    /// Bin `k` (counted from the low end) of `n` equal slices of `[lo, hi]`.
    fn slice(lo: f64, hi: f64, k: usize, n: usize) -> Self {
        let span = hi - lo;
        AxisBin {
            lower: lo + span * k as f64 / n as f64,
            upper: lo + span * (k + 1) as f64 / n as f64,
            open_below: k == 0,
            open_above: k + 1 == n,
        }
    }

    pub fn contains(&self, v: f64) -> bool {
        (self.open_below || v >= self.lower) && (self.open_above || v <= self.upper)
    }

    /// Predicates for values outside this bin.
    fn outside(&self, key: &str) -> Vec<Filter> {
        let mut out = Vec::new();
        if !self.open_below {
            out.push(Filter::lt(key, self.lower));
        }
        if !self.open_above {
            out.push(Filter::gt(key, self.upper));
        }
        out
    }
}

/// One bin of the univariate legend bar.
#[derive(Debug, Clone, PartialEq)]
pub struct Bin {
    /// Index from the top of the bar (0 = highest values).
    pub index: usize,
    /// Slot the bin is drawn in; differs from `index` when the legend is flipped.
    pub display_slot: usize,
    pub bounds: AxisBin,
}

impl Bin {
    pub fn contains(&self, v: f64) -> bool {
        self.bounds.contains(v)
    }

    /// Filter muting everything outside this bin.
    pub fn mute_filter(&self, key: &str) -> Filter {
        Filter::Any(self.bounds.outside(key))
    }
}

/// Split `[0, range[1]]` into `n` equal bins, top bin first.
///
/// Bins are anchored at zero rather than `range[0]`.
pub fn bins_for_range(range: [f64; 2], n: usize, flip: bool) -> Vec<Bin> {
    let upper = range[1];
    (0..n)
        .map(|i| Bin {
            index: i,
            display_slot: if flip { n - i - 1 } else { i },
            bounds: AxisBin::slice(0.0, upper, n - i - 1, n),
        })
        .collect()
}

/// One cell of the bivariate grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BivariateBin {
    pub a_bounds: AxisBin,
    pub b_bounds: AxisBin,
}

impl BivariateBin {
    pub fn contains(&self, a: f64, b: f64) -> bool {
        self.a_bounds.contains(a) && self.b_bounds.contains(b)
    }

    /// Filter muting features outside this cell on either axis.
    pub fn mute_filter(&self, a_key: &str, b_key: &str) -> Filter {
        let mut parts = self.b_bounds.outside(b_key);
        parts.extend(self.a_bounds.outside(a_key));
        Filter::Any(parts)
    }
}

/// Display indices after flipping: `(I, J)` for column `i` and row `j`.
fn flipped_indices(i: usize, j: usize, n: usize, flip_a: bool, flip_b: bool) -> (usize, usize) {
    let big_i = if flip_b { n - i - 1 } else { i };
    let big_j = if flip_a { n - j - 1 } else { j };
    (big_i, big_j)
}

/// Bounds for grid column `i` (property B, left to right) and row `j`
/// (property A, top to bottom) of an `n`×`n` grid. Anchored at each range's minimum.
///
/// `n` is at least 1 and out-of-grid indices clamp to the last row or column.
pub fn bivariate_bin(
    i: usize,
    j: usize,
    n: usize,
    range_a: [f64; 2],
    range_b: [f64; 2],
    flip: (bool, bool),
) -> BivariateBin {
    let n = n.max(1);
    let (i, j) = (i.min(n - 1), j.min(n - 1));
    let (big_i, big_j) = flipped_indices(i, j, n, flip.0, flip.1);
    BivariateBin {
        a_bounds: AxisBin::slice(range_a[0], range_a[1], n - big_j - 1, n),
        b_bounds: AxisBin::slice(range_b[0], range_b[1], big_i, n),
    }
}

/// `(lower, upper)` labels: floor/ceil, `≤`/`≥` prefixes when clamped,
/// swapped when the legend is flipped.
pub fn range_labels(prop: &Prop) -> (String, String) {
    let spec = &prop.legend;
    let lower = prop.range[0].floor() as i64;
    let upper = prop.range[1].ceil() as i64;
    let lower = if spec.min_clamped { format!("≤{lower}") } else { lower.to_string() };
    let upper = if spec.max_clamped { format!("≥{upper}") } else { upper.to_string() };
    if spec.flip { (upper, lower) } else { (lower, upper) }
}

/// Position of `value` along the legend axis, `0..=1` from the low end.
pub fn point_position(prop: &Prop, value: f64) -> f64 {
    let p = prop.normalize(value);
    if prop.legend.flip { 1.0 - p } else { p }
}

/// CSS stop list for the univariate bar, low end first.
pub fn gradient_css(gradient: &Gradient, flip: bool) -> Vec<String> {
    let mut stops: Vec<String> = gradient
        .stops()
        .iter()
        .map(|(stop, hex)| {
            let at = if flip { 1.0 - stop } else { *stop };
            format!("{} {}%", hex, at * 100.0)
        })
        .collect();
    if flip {
        stops.reverse();
    }
    stops
}

#[derive(Debug, Clone, PartialEq)]
pub struct RangeView {
    pub title: String,
    pub gradient_css: Vec<String>,
    pub bins: Vec<Bin>,
    pub labels: (String, String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GridCell {
    pub column: usize,
    pub row: usize,
    pub color: String,
    pub bin: BivariateBin,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BivariateView {
    pub nick_a: String,
    pub nick_b: String,
    pub labels_a: (String, String),
    pub labels_b: (String, String),
    /// `cells[i][j]`: column `i`, row `j`.
    pub cells: Vec<Vec<GridCell>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LegendBody {
    Range(RangeView),
    Bivariate(BivariateView),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LegendView {
    pub body: LegendBody,
    /// Special colors (label -> color), global first, then per-property.
    pub special: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointKind {
    Focus,
    Stat,
}

/// A marker on the legend. `x` is only set for bivariate legends.
#[derive(Debug, Clone, PartialEq)]
pub struct LegendPoint {
    pub kind: PointKind,
    pub x: Option<f64>,
    pub y: f64,
}

/// Where a legend draws. Implemented by the UI layer.
pub trait LegendTarget {
    fn render(&mut self, view: &LegendView);
    fn show_points(&mut self, points: &[LegendPoint]);
    fn clear_focus_points(&mut self);
    fn destroy(&mut self) {}
}

fn range_view(prop: &Prop) -> RangeView {
    RangeView {
        title: prop.nick.clone(),
        gradient_css: gradient_css(&prop.color, prop.legend.flip),
        bins: bins_for_range(prop.range, RANGE_BINS, prop.legend.flip),
        labels: range_labels(prop),
    }
}

fn bivariate_view(a: &Prop, b: &Prop) -> BivariateView {
    let n = GRID_SIZE;
    let flip = (a.legend.flip, b.legend.flip);
    let cells = (0..n)
        .map(|i| {
            (0..n)
                .map(|j| {
                    let (big_i, big_j) = flipped_indices(i, j, n, flip.0, flip.1);
                    let x = big_i as f64 / (n - 1) as f64;
                    let y = (n - 1 - big_j) as f64 / (n - 1) as f64;
                    let mix = a.color.interpolate(y).multiply(&b.color.interpolate(x));
                    GridCell {
                        column: i,
                        row: j,
                        color: mix.to_css(),
                        bin: bivariate_bin(i, j, n, a.range, b.range, flip),
                    }
                })
                .collect()
        })
        .collect();
    BivariateView {
        nick_a: a.nick.clone(),
        nick_b: b.nick.clone(),
        labels_a: range_labels(a),
        labels_b: range_labels(b),
        cells,
    }
}

/// Build the view for the displayed properties, or `None` when empty.
pub fn legend_view(props: &[Prop], special: &BTreeMap<String, String>) -> Option<LegendView> {
    let body = match props {
        [] => return None,
        [only] => LegendBody::Range(range_view(only)),
        [a, b, ..] => LegendBody::Bivariate(bivariate_view(a, b)),
    };
    let mut merged = special.clone();
    for p in props.iter().take(2) {
        merged.extend(p.legend.special.iter().map(|(k, v)| (k.clone(), v.clone())));
    }
    Some(LegendView {
        body,
        special: merged,
    })
}

/// Legend point for one feature (or stat) given its values per displayed prop.
/// Univariate points with no value are skipped.
pub fn legend_point(props: &[Prop], values: &[Option<f64>], kind: PointKind) -> Option<LegendPoint> {
    match (props, values) {
        ([a, b, ..], [va, vb, ..]) => Some(LegendPoint {
            kind,
            x: Some(point_position(b, vb.unwrap_or(b.range[0]))),
            y: point_position(a, va.unwrap_or(a.range[0])),
        }),
        ([only, ..], [Some(v), ..]) => Some(LegendPoint {
            kind,
            x: None,
            y: point_position(only, *v),
        }),
        _ => None,
    }
}

/// A legend bound to one map source.
pub struct Legend<T: LegendTarget> {
    target: T,
    source: MapSource,
    props: Vec<Prop>,
    special: BTreeMap<String, String>,
    stats: Vec<String>,
    view: Option<LegendView>,
}

impl<T: LegendTarget> Legend<T> {
    pub fn new(
        target: T,
        source: MapSource,
        props: Vec<Prop>,
        special: BTreeMap<String, String>,
        stats: Vec<String>,
    ) -> Self {
        let mut legend = Self {
            target,
            source,
            props: Vec::new(),
            special,
            stats,
            view: None,
        };
        legend.set(props);
        legend
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn view(&self) -> Option<&LegendView> {
        self.view.as_ref()
    }

    pub fn props(&self) -> &[Prop] {
        &self.props
    }

    /// Rebuild for new displayed properties; stat reference points are redrawn.
    pub fn set(&mut self, props: Vec<Prop>) {
        self.props = props;
        self.view = legend_view(&self.props, &self.special);
        if let Some(view) = &self.view {
            self.target.render(view);
            let stat_points: Vec<LegendPoint> = self
                .stats
                .iter()
                .filter_map(|stat| {
                    let vals: Vec<Option<f64>> =
                        self.props.iter().map(|p| p.stats.get(stat).copied()).collect();
                    legend_point(&self.props, &vals, PointKind::Stat)
                })
                .collect();
            if !stat_points.is_empty() {
                self.target.show_points(&stat_points);
            }
        }
    }

    /// Show where the given features fall on the legend.
    pub fn render_features(&mut self, feats: &[MapFeature]) {
        self.hide_features();
        let points: Vec<LegendPoint> = feats
            .iter()
            .filter_map(|f| {
                let vals: Vec<Option<f64>> = self.props.iter().map(|p| f.number(&p.key)).collect();
                legend_point(&self.props, &vals, PointKind::Focus)
            })
            .collect();
        if !points.is_empty() {
            self.target.show_points(&points);
        }
    }

    pub fn hide_features(&mut self) {
        self.target.clear_focus_points();
    }

    /// Hovering bar bin `index`: mute features outside it.
    pub fn hover_bin<H: FeatureStateHost>(
        &self,
        map: &mut MapController<H>,
        index: usize,
    ) -> Result<(), MapError> {
        let Some(LegendBody::Range(view)) = self.view.as_ref().map(|v| &v.body) else {
            return Ok(());
        };
        let (Some(bin), Some(prop)) = (view.bins.get(index), self.props.first()) else {
            return Ok(());
        };
        map.set_filter(
            &self.source.id,
            bin.mute_filter(&prop.key),
            FeatureState::flag("mute", true),
            FeatureState::flag("mute", false),
        )
    }

    /// Hovering grid cell (`column`, `row`): mute features outside it.
    pub fn hover_cell<H: FeatureStateHost>(
        &self,
        map: &mut MapController<H>,
        column: usize,
        row: usize,
    ) -> Result<(), MapError> {
        let Some(LegendBody::Bivariate(view)) = self.view.as_ref().map(|v| &v.body) else {
            return Ok(());
        };
        let (Some(cell), [a, b, ..]) = (
            view.cells.get(column).and_then(|c| c.get(row)),
            self.props.as_slice(),
        ) else {
            return Ok(());
        };
        map.set_filter(
            &self.source.id,
            cell.bin.mute_filter(&a.key, &b.key),
            FeatureState::flag("mute", true),
            FeatureState::flag("mute", false),
        )
    }

    /// Pointer left a bin or cell.
    pub fn leave<H: FeatureStateHost>(&self, map: &mut MapController<H>) -> Result<(), MapError> {
        map.reset_filter(&self.source.id, &FeatureState::flag("mute", false))
    }

    /// Tear down the legend and release its target.
    pub fn destroy(mut self) -> T {
        self.target.destroy();
        self.target
    }
}
