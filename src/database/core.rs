//! Database Core - GeoDB structure and initialization
//!
//! This module contains:
//! - GeoDB struct definition
//! - open() / create() / in_memory()
//! - row decoding helpers shared by the other database modules

use crate::config::StoreConfig;
use crate::storage::{EmbeddedBackend, StorageBackend, StoredRecord};
use crate::types::{Collection, FeatureId, PointFeature, PolygonFeature};
use crate::{GeoError, Result};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub points: usize,
    pub polygons: usize,
    /// Spatial queries use the backend's indexed path
    pub native_spatial: bool,
}

/// GeoDB instance
pub struct GeoDB {
    pub(crate) backend: Arc<dyn StorageBackend>,
}

impl GeoDB {
    /// Open a store with the embedded backend
    pub fn open(config: StoreConfig) -> Result<Self> {
        let backend = EmbeddedBackend::open(config)?;
        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Open (or create) a persistent store rooted at `path`
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(StoreConfig::persistent(path.as_ref()))
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Run on top of any storage backend
    pub fn with_backend(backend: Arc<dyn StorageBackend>) -> Self {
        info!(
            native_spatial = backend.spatial().is_some(),
            "geostore ready"
        );
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    pub fn flush(&self) -> Result<()> {
        self.backend.flush()
    }

    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            points: self.backend.len(Collection::Points),
            polygons: self.backend.len(Collection::Polygons),
            native_spatial: self.backend.spatial().is_some(),
        }
    }
}

pub(crate) fn wrong_collection(expected: Collection, id: FeatureId) -> GeoError {
    GeoError::Corruption(format!("row {} is not a {} record", id, expected))
}

pub(crate) fn point_from(stored: StoredRecord) -> Result<PointFeature> {
    let id = stored.id();
    stored
        .into_point()
        .ok_or_else(|| wrong_collection(Collection::Points, id))
}

pub(crate) fn polygon_from(stored: &StoredRecord) -> Result<PolygonFeature> {
    stored
        .to_polygon()
        .unwrap_or_else(|| Err(wrong_collection(Collection::Polygons, stored.id())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NewPoint;

    #[test]
    fn test_stats_reflect_rows_and_path() {
        let db = GeoDB::in_memory().unwrap();
        db.create_point(NewPoint::new("a", 1.0, 1.0)).unwrap();
        assert_eq!(
            db.stats(),
            DatabaseStats {
                points: 1,
                polygons: 0,
                native_spatial: true,
            }
        );

        let fallback = GeoDB::open(StoreConfig::fallback_only()).unwrap();
        assert!(!fallback.stats().native_spatial);
    }

    #[test]
    fn test_create_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let db = GeoDB::create(dir.path()).unwrap();
            db.create_point(NewPoint::new("Harbor", 47.6, -122.3)).unwrap().id
        };
        let db = GeoDB::create(dir.path()).unwrap();
        let point = db.get_point(&id).unwrap();
        assert_eq!((point.latitude, point.longitude), (47.6, -122.3));
    }
}
