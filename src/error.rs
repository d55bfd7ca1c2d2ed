use thiserror::Error;

/// Failures while loading or validating a map configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("property {key:?} has range [{min}, {max}] with min > max")]
    InvertedRange { key: String, min: f64, max: f64 },

    #[error("initial property {0:?} is not defined")]
    UnknownInitialProp(String),

    #[error("category registry names dimension {dim:?} for {prop:?}, but no such dimension exists")]
    UnknownDimension { prop: String, dim: String },
}

/// Failures inside the data layer. These never leave the place-data cache;
/// callers see an empty payload instead.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed with HTTP {0}")]
    Status(u16),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misuse of the feature-state controller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MapError {
    #[error("unknown map source {0:?}")]
    UnknownSource(String),

    #[error("no properties to paint")]
    NoProperties,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Map(#[from] MapError),

    #[error("property {0:?} is not defined for the current category")]
    UnknownProperty(String),

    #[error("property slot {0} is out of range")]
    BadSlot(usize),
}
