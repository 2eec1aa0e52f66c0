//! geostore
//!
//! Embedded store for geographic point and polygon features.
//!
//! ## Features
//! - Points (title, lat/lng, category) and GeoJSON Polygon/MultiPolygon features
//! - Bounding-box, radius and point-in-polygon queries
//! - Category, layer-group and value-range filters
//! - All-or-nothing batch import and optimistic transactions
//!
//! ## Architecture
//! - Storage: `StorageBackend` port, embedded backend with checksummed snapshots
//! - Index: uniform grid over feature bounding boxes (native spatial capability)
//! - Query: validated parameter sets, native path or scan + predicate fallback

pub mod codec;
pub mod config;
pub mod database;
pub mod index;
pub mod predicate;
pub mod query;
pub mod storage;
pub mod types;

mod api;
mod error;

pub use config::{DurabilityLevel, StoreConfig};
pub use error::{ErrorKind, GeoError, Result};

pub use api::Database;
pub use database::{
    DatabaseStats, GeoDB, ImportFeature, ImportRequest, ImportSummary, Transaction,
    TransactionStats,
};
pub use query::{
    BoundsQuery, ByIdQuery, ContainsPointQuery, FeatureStream, Nearby, RadiusQuery, RawParams,
    ValueRangeQuery,
};
pub use storage::{EmbeddedBackend, SpatialCapability, StorageBackend};
pub use types::{
    Collection, FeatureId, NewPoint, NewPolygon, PointFeature, PointPatch, PolygonFeature,
    PolygonPatch, Properties, PropertyValue,
};
