//! Place data over HTTP, memoized per (category key, place).
//!
//! Static JSON files are laid out as
//! `<prefix>/assets/maps/<loa>/by_cat/<categoryKey>/<placeId>.json`.
//! Bounding boxes are served next to the app at
//! `assets/maps/<loa>/bboxes/<placeId>.json`, without the data prefix.
//! Failures are absorbed here: a place whose data cannot be fetched or parsed
//! reads as an empty object, and downstream display shows "N/A".
//!
//! Typical usage:
//! ```no_run
//! # use msdmap_rs::api::PlaceApi;
//! # async fn demo() {
//! let api = PlaceApi::new("zcta", ".");
//! let data = api.data_for_key_place("Y:2022", "10001").await;
//! # }
//! ```
use crate::error::FetchError;
use crate::models::Bounds;
use ahash::AHashMap;
use async_trait::async_trait;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC};
use reqwest::Client as HttpClient;
use reqwest::StatusCode;
use reqwest::redirect::Policy;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Anything that can GET a URL and decode JSON.
#[async_trait]
pub trait JsonFetcher: Send + Sync {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError>;
}

/// `reqwest`-backed fetcher with a small retry on 5xx responses.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: HttpClient,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(30)) // total request timeout
            .connect_timeout(Duration::from_secs(10))
            .redirect(Policy::limited(5))
            .user_agent(concat!("msdmap_rs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http })
    }

    async fn get_once(&self, url: &str) -> Result<Value, FetchError> {
        let r = self
            .http
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await?;
        let status = r.status();
        let bytes = r.bytes().await?;
        decode_body(status, &bytes)
    }
}

/// Pause before each retry; one more attempt than entries.
const BACKOFF_MS: [u64; 2] = [100, 300];

#[async_trait]
impl JsonFetcher for HttpFetcher {
    async fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        with_retries(url, || self.get_once(url)).await
    }
}

/// Run `op`, retrying retryable failures after each [`BACKOFF_MS`] pause.
/// The last failure is returned without a trailing sleep.
async fn with_retries<F, Fut>(url: &str, mut op: F) -> Result<Value, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Value, FetchError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Err(e) if is_retryable(&e) && attempt < BACKOFF_MS.len() => {
                log::debug!("GET {url} failed ({e}), retrying");
                tokio::time::sleep(Duration::from_millis(BACKOFF_MS[attempt])).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Map a response to JSON: non-2xx is a status error, a 2xx body must parse.
fn decode_body(status: StatusCode, body: &[u8]) -> Result<Value, FetchError> {
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }
    Ok(serde_json::from_slice(body)?)
}

/// Transport failures and 5xx are worth another try; 4xx and bad JSON are not.
fn is_retryable(err: &FetchError) -> bool {
    match err {
        FetchError::Status(s) => *s >= 500,
        FetchError::Http(_) => true,
        FetchError::Json(_) => false,
    }
}

// Keep -, _, ., : readable in path segments (category keys use `:` and `.`).
const SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b':');

fn enc(segment: &str) -> String {
    percent_encoding::utf8_percent_encode(segment.trim(), SAFE).to_string()
}

type PendingValue = Shared<BoxFuture<'static, Value>>;

/// Process-lifetime cache of decoded JSON, at most one request in flight per key.
///
/// The pending future is stored before it is polled, so concurrent callers for
/// the same key await the same request.
#[derive(Clone)]
pub struct PlaceDataCache {
    fetcher: Arc<dyn JsonFetcher>,
    entries: Arc<Mutex<AHashMap<String, PendingValue>>>,
}

impl PlaceDataCache {
    pub fn new(fetcher: Arc<dyn JsonFetcher>) -> Self {
        Self {
            fetcher,
            entries: Arc::new(Mutex::new(AHashMap::new())),
        }
    }

    /// Value for `key`, fetching `url` on first use. Never fails: fetch or
    /// parse errors are cached as `{}`.
    pub async fn get_or_fetch(&self, key: &str, url: String) -> Value {
        let pending = {
            let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
            match entries.get(key) {
                Some(p) => {
                    log::debug!("cache hit {key}");
                    p.clone()
                }
                None => {
                    log::debug!("cache miss {key}, fetching {url}");
                    let fetcher = Arc::clone(&self.fetcher);
                    let fut: BoxFuture<'static, Value> = async move {
                        match fetcher.get_json(&url).await {
                            Ok(v) => v,
                            Err(e) => {
                                log::warn!("GET {url} failed, using empty data: {e}");
                                Value::Object(Map::new())
                            }
                        }
                    }
                    .boxed();
                    let shared = fut.shared();
                    entries.insert(key.to_string(), shared.clone());
                    shared
                }
            }
        };
        pending.await
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Place-data endpoints for one level of aggregation.
#[derive(Clone)]
pub struct PlaceApi {
    pub loa: String,
    pub prefix: String,
    cache: PlaceDataCache,
}

impl PlaceApi {
    /// Uses the default HTTP fetcher. If the client can't be built, requests
    /// fail soft like any other fetch error.
    pub fn new(loa: impl Into<String>, prefix: impl Into<String>) -> Self {
        let fetcher: Arc<dyn JsonFetcher> = match HttpFetcher::new() {
            Ok(f) => Arc::new(f),
            Err(e) => {
                log::warn!("HTTP client unavailable: {e}");
                Arc::new(Unavailable)
            }
        };
        Self::with_fetcher(loa, prefix, fetcher)
    }

    pub fn with_fetcher(
        loa: impl Into<String>,
        prefix: impl Into<String>,
        fetcher: Arc<dyn JsonFetcher>,
    ) -> Self {
        let prefix = prefix.into();
        Self {
            loa: loa.into(),
            prefix: if prefix.is_empty() { ".".into() } else { prefix },
            cache: PlaceDataCache::new(fetcher),
        }
    }

    pub fn cache(&self) -> &PlaceDataCache {
        &self.cache
    }

    fn url(&self, parts: &[&str]) -> String {
        let mut url = format!(
            "{}/assets/maps/{}",
            self.prefix.trim_end_matches('/'),
            enc(&self.loa)
        );
        for p in parts {
            url.push('/');
            url.push_str(&enc(p));
        }
        url.push_str(".json");
        url
    }

    /// Data for `place_id` under the category with canonical key `category_key`.
    pub async fn data_for_key_place(&self, category_key: &str, place_id: &str) -> Value {
        let url = self.url(&["by_cat", category_key, place_id]);
        self.cache
            .get_or_fetch(&format!("{category_key}_{place_id}"), url)
            .await
    }

    pub async fn schools_for_place(&self, place_id: &str) -> Value {
        let url = self.url(&["schools", place_id]);
        self.cache.get_or_fetch(&format!("schools_{place_id}"), url).await
    }

    /// Bounding box of a place, `None` when unavailable.
    pub async fn bbox_for_place(&self, place_id: &str) -> Option<Bounds> {
        // Bounding boxes ship with the app, not with the data prefix.
        let url = format!("assets/maps/{}/bboxes/{}.json", enc(&self.loa), enc(place_id));
        let v = self.cache.get_or_fetch(&format!("bbox_{place_id}"), url).await;
        serde_json::from_value::<Bounds>(v).ok()
    }
}

struct Unavailable;

#[async_trait]
impl JsonFetcher for Unavailable {
    async fn get_json(&self, _url: &str) -> Result<Value, FetchError> {
        Err(FetchError::Status(0))
    }
}
