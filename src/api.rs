//! geostore Public API
//!
//! Embedded point/polygon feature store with spatial queries.
//!
//! # Core features
//! - **CRUD**: points and GeoJSON polygons with validated attributes
//! - **Spatial queries**: bounding box, radius (nearest first), point-in-polygon
//! - **Attribute filters**: category, layer group, value range
//! - **Batch import**: all-or-nothing feature collection ingestion
//! - **Transactions**: optimistic multi-operation commits

use crate::config::StoreConfig;
use crate::database::{DatabaseStats, GeoDB, ImportRequest, ImportSummary, Transaction};
use crate::query::{
    BoundsQuery, ByIdQuery, ContainsPointQuery, FeatureStream, Nearby, RadiusQuery,
    ValueRangeQuery,
};
use crate::types::{
    FeatureId, NewPoint, NewPolygon, PointFeature, PointPatch, PolygonFeature, PolygonPatch,
};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// geostore database instance
///
/// # Quick start
///
/// ```no_run
/// use geostore::{BoundsQuery, Database, NewPoint, RadiusQuery};
///
/// # fn main() -> geostore::Result<()> {
/// let db = Database::open("features.db")?;
///
/// db.create_point(NewPoint::new("Trailhead", 45.0, -110.5))?;
///
/// let in_box = db.points_in_bounds(&BoundsQuery::new(46.0, 44.0, -110.0, -111.0)?)?;
/// for point in in_box {
///     println!("{}", point?.title);
/// }
///
/// for hit in db.points_within_radius(&RadiusQuery::new(45.0, -110.0, 50.0)?)? {
///     let hit = hit?;
///     println!("{} at {:.1} km", hit.feature.title, hit.distance_km);
/// }
/// # Ok(())
/// # }
/// ```
///
/// # Operations
///
/// ## 1. Points
/// - `create_point()` / `get_point()` / `update_point()` / `delete_point()`
/// - `list_points()` / `points_by_category()`
///
/// ## 2. Polygons
/// - `create_polygon()` / `get_polygon()` / `update_polygon()` / `delete_polygon()`
/// - `list_polygons()` / `polygons_by_category()` / `polygons_by_layer()`
/// - `polygons_in_value_range()`
/// - `import_polygons()`: batch import, all or nothing
///
/// ## 3. Spatial queries
/// - `points_in_bounds()`: inclusive box, wraps the antimeridian when west > east
/// - `points_within_radius()`: strict haversine radius, nearest first
/// - `polygons_containing()`: strict interior, holes excluded
///
/// ## 4. Lifecycle
/// - `begin()`: optimistic transaction
/// - `stats()` / `flush()`
#[derive(Clone)]
pub struct Database {
    inner: Arc<GeoDB>,
}

impl Database {
    // ============================================================================
    // 1. Lifecycle
    // ============================================================================

    /// Open (or create) a persistent database in directory `path`
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(GeoDB::create(path)?),
        })
    }

    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        Ok(Self {
            inner: Arc::new(GeoDB::open(config)?),
        })
    }

    /// Non-persistent database
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            inner: Arc::new(GeoDB::in_memory()?),
        })
    }

    pub fn from_geodb(db: GeoDB) -> Self {
        Self {
            inner: Arc::new(db),
        }
    }

    pub fn stats(&self) -> DatabaseStats {
        self.inner.stats()
    }

    /// Persist all committed changes (needed under `DurabilityLevel::NoSync`)
    pub fn flush(&self) -> Result<()> {
        self.inner.flush()
    }

    pub fn begin(&self) -> Transaction<'_> {
        self.inner.begin()
    }

    // ============================================================================
    // 2. Points
    // ============================================================================

    pub fn create_point(&self, attrs: NewPoint) -> Result<PointFeature> {
        self.inner.create_point(attrs)
    }

    pub fn get_point(&self, query: &ByIdQuery) -> Result<PointFeature> {
        self.inner.get_point(&query.id)
    }

    pub fn list_points(&self) -> Result<FeatureStream<PointFeature>> {
        self.inner.list_points()
    }

    pub fn points_by_category(&self, category: &str) -> Result<FeatureStream<PointFeature>> {
        self.inner.points_by_category(category)
    }

    pub fn update_point(&self, id: &FeatureId, patch: &PointPatch) -> Result<PointFeature> {
        self.inner.update_point(id, patch)
    }

    pub fn delete_point(&self, id: &FeatureId) -> Result<()> {
        self.inner.delete_point(id)
    }

    // ============================================================================
    // 3. Polygons
    // ============================================================================

    pub fn create_polygon(&self, attrs: NewPolygon) -> Result<PolygonFeature> {
        self.inner.create_polygon(attrs)
    }

    pub fn get_polygon(&self, query: &ByIdQuery) -> Result<PolygonFeature> {
        self.inner.get_polygon(&query.id)
    }

    pub fn list_polygons(&self) -> Result<FeatureStream<PolygonFeature>> {
        self.inner.list_polygons()
    }

    pub fn polygons_by_category(&self, category: &str) -> Result<FeatureStream<PolygonFeature>> {
        self.inner.polygons_by_category(category)
    }

    pub fn polygons_by_layer(&self, layer_group: &str) -> Result<FeatureStream<PolygonFeature>> {
        self.inner.polygons_by_layer(layer_group)
    }

    pub fn polygons_in_value_range(
        &self,
        query: &ValueRangeQuery,
    ) -> Result<FeatureStream<PolygonFeature>> {
        self.inner.polygons_in_value_range(query)
    }

    pub fn update_polygon(&self, id: &FeatureId, patch: &PolygonPatch) -> Result<PolygonFeature> {
        self.inner.update_polygon(id, patch)
    }

    pub fn delete_polygon(&self, id: &FeatureId) -> Result<()> {
        self.inner.delete_polygon(id)
    }

    pub fn import_polygons(&self, request: &ImportRequest) -> Result<ImportSummary> {
        self.inner.import_polygons(request)
    }

    // ============================================================================
    // 4. Spatial queries
    // ============================================================================

    pub fn points_in_bounds(&self, query: &BoundsQuery) -> Result<FeatureStream<PointFeature>> {
        self.inner.points_in_bounds(query)
    }

    pub fn points_within_radius(&self, query: &RadiusQuery) -> Result<FeatureStream<Nearby>> {
        self.inner.points_within_radius(query)
    }

    pub fn polygons_containing(
        &self,
        query: &ContainsPointQuery,
    ) -> Result<FeatureStream<PolygonFeature>> {
        self.inner.polygons_containing(query)
    }
}
