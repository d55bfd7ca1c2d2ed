mod common;

use common::ScriptedFetcher;
use msdmap_rs::config::{FieldFormat, InfoField};
use msdmap_rs::info::explain;
use msdmap_rs::models::{Category, MapFeature};
use msdmap_rs::{CategoryRegistry, PlaceApi, key_for_category};
use serde_json::json;
use std::sync::Arc;

fn fields() -> Vec<InfoField> {
    vec![
        InfoField {
            key: "med_bal".into(),
            label: "Median Balance".into(),
            format: FieldFormat::Currency,
        },
        InfoField {
            key: "pct_bal_grt".into(),
            label: "Share Owing More".into(),
            format: FieldFormat::Percent,
        },
    ]
}

#[tokio::test]
async fn concurrent_gets_share_one_request() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .with_delay(20)
            .respond("by_cat/Y:2022/10001.json", json!({"med_bal": 24000})),
    );
    let api = PlaceApi::with_fetcher("zcta", "https://x.org", fetcher.clone());

    let (a, b) = tokio::join!(
        api.data_for_key_place("Y:2022", "10001"),
        api.data_for_key_place("Y:2022", "10001"),
    );
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(a, b);
    assert_eq!(a, json!({"med_bal": 24000}));

    // Later calls are served from the cache.
    api.data_for_key_place("Y:2022", "10001").await;
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(api.cache().len(), 1);
}

#[tokio::test]
async fn different_keys_fetch_separately() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let api = PlaceApi::with_fetcher("zcta", ".", fetcher.clone());
    let _ = tokio::join!(
        api.data_for_key_place("Y:2022", "10001"),
        api.data_for_key_place("Y:2019", "10001"),
        api.schools_for_place("10001"),
    );
    assert_eq!(fetcher.calls(), 3);
}

#[tokio::test]
async fn failed_fetch_reads_as_empty_object() {
    let fetcher = Arc::new(ScriptedFetcher::new());
    let api = PlaceApi::with_fetcher("zcta", ".", fetcher.clone());
    let v = api.data_for_key_place("Y:2022", "00000").await;
    assert_eq!(v, json!({}));
    // The failure is cached too.
    api.data_for_key_place("Y:2022", "00000").await;
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test]
async fn bbox_parses_or_is_none() {
    let fetcher = Arc::new(
        ScriptedFetcher::new()
            .respond("bboxes/10001.json", json!([-74.01, 40.74, -73.98, 40.76]))
            .respond("bboxes/bad.json", json!({"oops": true})),
    );
    let api = PlaceApi::with_fetcher("zcta", "https://data.example.org", fetcher.clone());
    assert_eq!(
        api.bbox_for_place("10001").await,
        Some([-74.01, 40.74, -73.98, 40.76])
    );
    assert_eq!(api.bbox_for_place("bad").await, None);
    assert_eq!(api.bbox_for_place("missing").await, None);
    // The data prefix applies to place data only.
    assert_eq!(
        fetcher.urls(),
        vec![
            "assets/maps/zcta/bboxes/10001.json".to_string(),
            "assets/maps/zcta/bboxes/bad.json".to_string(),
            "assets/maps/zcta/bboxes/missing.json".to_string(),
        ]
    );

    api.schools_for_place("10001").await;
    assert_eq!(
        fetcher.urls().last().map(String::as_str),
        Some("https://data.example.org/assets/maps/zcta/schools/10001.json")
    );
}

#[tokio::test]
async fn missing_place_data_renders_na() {
    let registry = CategoryRegistry::new().with("med_bal", ["Y"]);
    let cat = Category::new().with("Y", "2022");
    assert_eq!(registry.property_key_for("med_bal", &cat), "med_bal.Y:2022");

    let fetcher = Arc::new(ScriptedFetcher::new());
    let api = PlaceApi::with_fetcher("zcta", ".", fetcher);
    assert_eq!(
        api.data_for_key_place(&key_for_category(&cat), "10001").await,
        json!({})
    );

    let feats = [MapFeature::new("10001", "zcta").with_prop("loa_key", "10001")];
    let summaries = explain(&api, &feats, &cat, &fields()).await;
    let s = &summaries[0];
    // loa_key itself is an uncategorized property, so the payload isn't empty
    assert_eq!(s.title, "10001");
    assert!(s.fields.iter().all(|(_, v)| v == "N/A"));
}

#[tokio::test]
async fn summary_merges_fetched_and_tile_data() {
    let fetcher = Arc::new(ScriptedFetcher::new().respond(
        "by_cat/Y:2022/10001.json",
        json!({"name": "New York 10001", "med_bal": 24000.4}),
    ));
    let api = PlaceApi::with_fetcher("zcta", ".", fetcher);
    let cat = Category::new().with("Y", "2022");
    let feats = [MapFeature::new(7u64, "zcta")
        .with_prop("loa_key", "10001,10002")
        .with_prop("pct_bal_grt.Y:2022", 0.4231)
        .with_prop("pct_bal_grt.Y:2019", 0.9)];
    let summaries = explain(&api, &feats, &cat, &fields()).await;

    let s = &summaries[0];
    assert_eq!(s.title, "New York 10001");
    assert_eq!(s.fields[0], ("Median Balance".to_string(), "$24,000".to_string()));
    assert_eq!(s.fields[1].1, "42.3%");
    assert_eq!(s.other_places, vec!["10002".to_string()]);
    assert!(!s.no_data);
    assert!(s.render_text("ZIP codes").contains("Other ZIP codes here: 10002"));
}

#[tokio::test]
async fn empty_payload_says_no_data() {
    let api = PlaceApi::with_fetcher("zcta", ".", Arc::new(ScriptedFetcher::new()));
    let cat = Category::new().with("Y", "2022");
    // No properties at all: the id comes from the feature id.
    let feats = [MapFeature::new("99999", "zcta")];
    let summaries = explain(&api, &feats, &cat, &fields()).await;
    assert!(summaries[0].no_data);
    assert_eq!(summaries[0].title, "99999");
    assert!(summaries[0].render_text("ZIP codes").contains("No data for this place."));
}
