//! msdmap_rs
//!
//! State engine for choropleth and bivariate maps of place-level data. Pairs
//! with the `msdmap` CLI.
//!
//! ### Features
//! - Canonical category keys and category-qualified property resolution
//! - Fill-color expressions (univariate ramps and multiplied bivariate colors)
//! - Feature-state focus and filter bookkeeping against an injected map host
//! - Legends with hover-to-mute bins and grid cells
//! - Fail-soft, single-flight place data fetching and place summaries
//!
//! ### Example
//! ```no_run
//! use msdmap_rs::{CategoryRegistry, Category, key_for_category};
//!
//! let registry = CategoryRegistry::new().with("med_bal", ["Y"]);
//! let cat = Category::new().with("Y", "2022").with("S", "public");
//! assert_eq!(key_for_category(&cat), "S:public.Y:2022");
//! assert_eq!(registry.property_key_for("med_bal", &cat), "med_bal.Y:2022");
//! ```

pub mod api;
pub mod category;
pub mod color;
pub mod config;
pub mod error;
pub mod expr;
pub mod format;
pub mod host;
pub mod info;
pub mod legend;
pub mod map;
pub mod models;
pub mod paint;
pub mod session;
pub mod storage;

pub use api::{HttpFetcher, JsonFetcher, PlaceApi, PlaceDataCache};
pub use category::{CategoryRegistry, key_for_category, split_property_key};
pub use color::{Gradient, Rgb};
pub use config::{MapConfig, PropTable};
pub use error::{ConfigError, FetchError, MapError, SessionError};
pub use expr::{Expr, Filter};
pub use host::FeatureStateHost;
pub use legend::{Legend, LegendTarget};
pub use map::{Lookup, LookupStatus, MapController};
pub use models::{Category, FeatureId, FeatureRef, FeatureState, MapFeature, MapSource, Point, Prop};
pub use paint::Painter;
pub use session::{DisplayUpdate, Session};
