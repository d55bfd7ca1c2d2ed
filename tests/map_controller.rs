mod common;

use common::{MemoryHost, feature};
use msdmap_rs::map::{COMPOSITE_SOURCE, ControllerOptions, Lookup, LookupStatus};
use msdmap_rs::models::{FeatureState, MapFeature, MapSource, Point};
use msdmap_rs::{Filter, MapController, MapError, Painter};
use pretty_assertions::assert_eq;

const SRC: &str = "zcta";

fn controller(host: MemoryHost) -> MapController<MemoryHost> {
    MapController::new(host, Painter::default(), [MapSource::new(SRC, "zcta")])
}

fn loaded_host() -> MemoryHost {
    let mut host = MemoryHost::new();
    host.load(
        SRC,
        (1..=6).map(|i| feature(i, SRC, &[("v", i as f64 * 10.0)])),
    );
    host
}

fn mute() -> (FeatureState, FeatureState) {
    (FeatureState::flag("mute", true), FeatureState::flag("mute", false))
}

#[test]
fn new_filter_rolls_back_previous_before_applying() {
    let mut map = controller(loaded_host());
    // F1 matches 1..=3
    map.set_filter(
        SRC,
        Filter::Any(vec![Filter::lt("v", 35.0)]),
        FeatureState::flag("mute", true),
        FeatureState::flag("mute", false).with("dim", 0),
    )
    .unwrap();
    // F2 matches 3..=6
    let (a2, r2) = mute();
    map.set_filter(SRC, Filter::Any(vec![Filter::gt("v", 25.0)]), a2, r2)
        .unwrap();

    let host = map.host();
    for id in [1u64, 2] {
        assert_eq!(host.flag(SRC, id, "mute"), Some(false), "feature {id}");
        assert_eq!(host.state(SRC, id).get("dim"), Some(&serde_json::json!(0)));
    }
    for id in [3u64, 4, 5, 6] {
        assert_eq!(host.flag(SRC, id, "mute"), Some(true), "feature {id}");
    }

    // Feature 3 is in both sets: its reset must come before its new state.
    let writes_for_3: Vec<bool> = host
        .writes
        .iter()
        .filter(|(_, id, _)| id == "3")
        .filter_map(|(_, _, s)| s.get("mute").and_then(|v| v.as_bool()))
        .collect();
    assert_eq!(writes_for_3, vec![true, false, true]);
}

#[test]
fn reset_uses_captured_set_not_a_fresh_query() {
    let mut host = MemoryHost::new();
    host.load(SRC, [feature(1, SRC, &[("v", 1.0)])]);
    let mut map = controller(host);
    let (on, off) = mute();
    map.set_filter(SRC, Filter::eq("v", 1.0), on, off.clone()).unwrap();

    // A fresh query would also hit feature 2.
    map.host_mut().load(SRC, [feature(2, SRC, &[("v", 1.0)])]);
    map.reset_filter(SRC, &off).unwrap();

    assert_eq!(map.host().flag(SRC, 1u64, "mute"), Some(false));
    assert_eq!(map.host().flag(SRC, 2u64, "mute"), None);
    assert!(map.active_filter(SRC).is_none());
}

#[test]
fn focus_is_exclusive_and_touches_nothing_else() {
    let mut map = controller(loaded_host());
    let f1 = feature(1, SRC, &[]);
    let f2 = feature(2, SRC, &[]);
    map.focus_features(SRC, vec![f1]).unwrap();
    map.focus_features(SRC, vec![f2.clone()]).unwrap();

    let host = map.host();
    assert_eq!(host.flag(SRC, 1u64, "focus"), Some(false));
    assert_eq!(host.flag(SRC, 2u64, "focus"), Some(true));
    assert_eq!(host.touched(), vec!["1".to_string(), "2".to_string()]);
    assert_eq!(map.focused(SRC), &[f2]);
}

#[test]
fn filter_replays_on_source_data_and_accumulates_matches() {
    let mut host = MemoryHost::new();
    host.load(SRC, [feature(1, SRC, &[("v", 5.0)])]);
    let mut map = controller(host);
    let (on, off) = mute();
    map.set_filter(SRC, Filter::Any(vec![Filter::lt("v", 10.0)]), on, off.clone())
        .unwrap();

    // A tile arrives with another matching feature.
    map.host_mut().load(SRC, [feature(7, SRC, &[("v", 2.0)])]);
    map.on_source_data(SRC);
    assert_eq!(map.host().flag(SRC, 7u64, "mute"), Some(true));

    map.reset_filter(SRC, &off).unwrap();
    assert_eq!(map.host().flag(SRC, 1u64, "mute"), Some(false));
    assert_eq!(map.host().flag(SRC, 7u64, "mute"), Some(false));
}

#[test]
fn cleared_filter_is_not_replayed() {
    let mut map = controller(loaded_host());
    let (on, off) = mute();
    map.set_filter(SRC, Filter::eq("v", 10.0), on, off.clone()).unwrap();
    map.reset_filter(SRC, &off).unwrap();
    let writes = map.host().writes.len();

    map.host_mut().load(SRC, [feature(9, SRC, &[("v", 10.0)])]);
    map.on_source_data(SRC);
    assert_eq!(map.host().writes.len(), writes);
    assert_eq!(map.host().flag(SRC, 9u64, "mute"), None);
}

#[test]
fn replaced_filter_replays_only_the_current_one() {
    let mut map = controller(loaded_host());
    let (on, off) = mute();
    map.set_filter(SRC, Filter::eq("v", 10.0), on.clone(), off.clone())
        .unwrap();
    map.set_filter(SRC, Filter::eq("v", 20.0), on, off).unwrap();

    map.host_mut().load(SRC, [feature(11, SRC, &[("v", 10.0)])]);
    map.on_source_data(SRC);
    assert_eq!(map.host().flag(SRC, 11u64, "mute"), None);
    assert_eq!(map.active_filter(SRC), Some(&Filter::eq("v", 20.0)));
}

#[test]
fn lookup_waits_for_tiles_then_finds() {
    let mut map = controller(MemoryHost::new());
    let token = match map
        .features_matching_property(SRC, "loa_key", "10001")
        .unwrap()
    {
        LookupStatus::Pending(t) => t,
        other => panic!("expected pending, got {other:?}"),
    };
    assert!(map.on_source_data(SRC).is_empty());

    let place = MapFeature::new(42u64, SRC).with_prop("loa_key", "10001");
    map.host_mut().load(SRC, [place.clone()]);
    let done = map.on_source_data(SRC);
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].token, token);
    assert_eq!(done[0].outcome, Lookup::Found(vec![place]));
    assert_eq!(map.pending_lookups(), 0);
}

#[test]
fn lookup_gives_up_after_max_attempts() {
    let mut map = MapController::with_options(
        MemoryHost::new(),
        Painter::default(),
        [MapSource::new(SRC, "zcta"), MapSource::new("schools", "schools")],
        ControllerOptions {
            max_lookup_attempts: 3,
            ..ControllerOptions::default()
        },
    );
    map.features_matching_property(SRC, "loa_key", "99999").unwrap();
    // Events on other sources don't count.
    map.on_source_data("schools");
    assert!(map.on_source_data(SRC).is_empty());
    assert!(map.on_source_data(SRC).is_empty());
    let done = map.on_source_data(SRC);
    assert_eq!(done[0].outcome, Lookup::NotFound);
    assert_eq!(map.pending_lookups(), 0);
}

#[test]
fn unknown_source_is_an_error() {
    let mut map = controller(MemoryHost::new());
    assert_eq!(
        map.focus_features("nope", vec![]),
        Err(MapError::UnknownSource("nope".into()))
    );
    assert_eq!(map.set(SRC, &[]), Err(MapError::NoProperties));
}

#[test]
fn pointer_events_group_by_source_and_lock_on_click() {
    let mut host = MemoryHost::new();
    host.rendered = vec![
        feature(1, SRC, &[]),
        feature(2, COMPOSITE_SOURCE, &[]),
        feature(3, "elsewhere", &[]),
    ];
    let mut map = controller(host);
    let at = Point { x: 10.0, y: 10.0 };

    assert!(map.on_mouse_move(at, true).is_none());
    let seen = map.on_mouse_move(at, false).unwrap();
    assert_eq!(seen[SRC].len(), 1);
    assert_eq!(seen[COMPOSITE_SOURCE].len(), 1);
    assert!(!seen.contains_key("elsewhere"));
    // Nothing new under the cursor.
    assert!(map.on_mouse_move(at, false).is_none());

    assert!(!map.is_focus_locked());
    map.on_click(at);
    assert!(map.is_focus_locked());
    map.unlock_focus();
    assert!(!map.is_focus_locked());

    map.fit_bounds([-74.1, 40.6, -73.9, 40.9]);
    assert_eq!(map.host().fitted.len(), 1);
}
