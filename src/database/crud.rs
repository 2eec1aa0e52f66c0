//! CRUD Operations Module
//!
//! Create, read, update and delete for both feature collections.
//!
//! # Features
//! - Creation assigns the id and timestamps, validates, then commits
//! - Updates are atomic read-modify-write through the backend's row lock
//! - Listing is a lazy stream in insertion order

use super::core::{point_from, polygon_from, wrong_collection, GeoDB};
use crate::query::FeatureStream;
use crate::storage::{Record, WriteBatch};
use crate::types::{
    Collection, FeatureId, NewPoint, NewPolygon, PointFeature, PointPatch, PolygonFeature,
    PolygonPatch,
};
use crate::{GeoError, Result};
use chrono::Utc;
use tracing::debug;

impl GeoDB {
    // ==================== Point Features ====================

    /// Create a point feature
    ///
    /// # Example
    /// ```ignore
    /// let cafe = db.create_point(NewPoint::new("Cafe", 45.0, -100.0))?;
    /// ```
    pub fn create_point(&self, attrs: NewPoint) -> Result<PointFeature> {
        let point = attrs.into_feature(FeatureId::new(), Utc::now())?;
        let mut batch = WriteBatch::with_capacity(1);
        batch.insert(Record::Point(point.clone()));
        self.backend.commit(batch)?;
        debug!(id = %point.id, "point created");
        Ok(point)
    }

    pub fn get_point(&self, id: &FeatureId) -> Result<PointFeature> {
        let stored = self
            .backend
            .get(Collection::Points, id)?
            .ok_or_else(|| GeoError::not_found(Collection::Points, *id))?;
        point_from(stored)
    }

    /// All points in insertion order
    pub fn list_points(&self) -> Result<FeatureStream<PointFeature>> {
        let rows = self.backend.scan(Collection::Points)?;
        Ok(FeatureStream::new(rows.into_iter().map(point_from)))
    }

    /// Merge `patch` into the stored point and re-validate
    pub fn update_point(&self, id: &FeatureId, patch: &PointPatch) -> Result<PointFeature> {
        let stored = self
            .backend
            .update_with(Collection::Points, id, &mut |record: &Record| {
                let current = record
                    .as_point()
                    .ok_or_else(|| wrong_collection(Collection::Points, *id))?;
                patch.apply(current, Utc::now()).map(Record::Point)
            })?;
        debug!(%id, version = stored.version, "point updated");
        point_from(stored)
    }

    /// Hard delete; `NotFound` if the point does not exist
    pub fn delete_point(&self, id: &FeatureId) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.delete(Collection::Points, *id, None);
        self.backend.commit(batch)?;
        debug!(%id, "point deleted");
        Ok(())
    }

    // ==================== Polygon Features ====================

    pub fn create_polygon(&self, attrs: NewPolygon) -> Result<PolygonFeature> {
        let polygon = attrs.into_feature(FeatureId::new(), Utc::now())?;
        let mut batch = WriteBatch::with_capacity(1);
        batch.insert(Record::polygon(&polygon)?);
        self.backend.commit(batch)?;
        debug!(id = %polygon.id, "polygon created");
        Ok(polygon)
    }

    pub fn get_polygon(&self, id: &FeatureId) -> Result<PolygonFeature> {
        let stored = self
            .backend
            .get(Collection::Polygons, id)?
            .ok_or_else(|| GeoError::not_found(Collection::Polygons, *id))?;
        polygon_from(&stored)
    }

    /// All polygons in insertion order, decoded as pulled
    pub fn list_polygons(&self) -> Result<FeatureStream<PolygonFeature>> {
        let rows = self.backend.scan(Collection::Polygons)?;
        Ok(FeatureStream::new(rows.into_iter().map(|r| polygon_from(&r))))
    }

    pub fn update_polygon(&self, id: &FeatureId, patch: &PolygonPatch) -> Result<PolygonFeature> {
        let stored = self
            .backend
            .update_with(Collection::Polygons, id, &mut |record: &Record| {
                let current = record
                    .as_polygon()
                    .ok_or_else(|| wrong_collection(Collection::Polygons, *id))?
                    .to_feature()?;
                let next = patch.apply(&current, Utc::now())?;
                Record::polygon(&next)
            })?;
        debug!(%id, version = stored.version, "polygon updated");
        polygon_from(&stored)
    }

    pub fn delete_polygon(&self, id: &FeatureId) -> Result<()> {
        let mut batch = WriteBatch::with_capacity(1);
        batch.delete(Collection::Polygons, *id, None);
        self.backend.commit(batch)?;
        debug!(%id, "polygon deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PropertyValue;
    use crate::ErrorKind;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn square(min: f64, max: f64) -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[[min, min], [max, min], [max, max], [min, max], [min, min]]]
        })
    }

    #[test]
    fn test_point_round_trip_keeps_coordinates() {
        let db = GeoDB::in_memory().unwrap();
        for (lat, lon) in [(0.0, 0.0), (-90.0, 180.0), (12.345678901, -98.7654321), (90.0, -180.0)] {
            let created = db.create_point(NewPoint::new("p", lat, lon)).unwrap();
            let fetched = db.get_point(&created.id).unwrap();
            assert_eq!((fetched.latitude, fetched.longitude), (lat, lon));
            assert_eq!(fetched, created);
        }
    }

    #[test]
    fn test_create_point_validation_commits_nothing() {
        let db = GeoDB::in_memory().unwrap();
        let err = db.create_point(NewPoint::new("bad", 0.0, 181.0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(db.stats().points, 0);
    }

    #[test]
    fn test_update_point_merges_and_keeps_identity() {
        let db = GeoDB::in_memory().unwrap();
        let created = db
            .create_point(NewPoint::new("Market", 10.0, 20.0).with_category("food"))
            .unwrap();

        let updated = db
            .update_point(&created.id, &PointPatch::title("Night market"))
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.created_at, created.created_at);
        assert!(updated.updated_at >= created.updated_at);
        assert_eq!(updated.category.as_deref(), Some("food"));
        assert_eq!(db.get_point(&created.id).unwrap().title, "Night market");
    }

    #[test]
    fn test_update_invalid_leaves_row_untouched() {
        let db = GeoDB::in_memory().unwrap();
        let created = db.create_point(NewPoint::new("Pier", 10.0, 20.0)).unwrap();
        let patch = PointPatch {
            latitude: Some(-91.0),
            ..Default::default()
        };
        assert_eq!(
            db.update_point(&created.id, &patch).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(db.get_point(&created.id).unwrap(), created);
    }

    #[test]
    fn test_missing_ids_are_not_found() {
        let db = GeoDB::in_memory().unwrap();
        let keep = db.create_point(NewPoint::new("keep", 1.0, 1.0)).unwrap();
        let ghost = FeatureId::new();

        assert_eq!(db.get_point(&ghost).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.delete_point(&ghost).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            db.update_point(&ghost, &PointPatch::title("x")).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(db.get_polygon(&ghost).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(
            db.update_polygon(&ghost, &PolygonPatch::default()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(db.delete_polygon(&ghost).unwrap_err().kind(), ErrorKind::NotFound);

        // a point id is not a polygon id
        assert_eq!(db.get_polygon(&keep.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.stats().points, 1);
    }

    #[test]
    fn test_delete_is_hard() {
        let db = GeoDB::in_memory().unwrap();
        let p = db.create_point(NewPoint::new("gone", 1.0, 1.0)).unwrap();
        db.delete_point(&p.id).unwrap();
        assert_eq!(db.get_point(&p.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(db.delete_point(&p.id).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_points_insertion_order() {
        let db = GeoDB::in_memory().unwrap();
        for title in ["c", "a", "b"] {
            db.create_point(NewPoint::new(title, 0.0, 0.0)).unwrap();
        }
        let titles: Vec<String> = db
            .list_points()
            .unwrap()
            .map(|p| p.unwrap().title)
            .collect();
        assert_eq!(titles, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_concurrent_title_updates_end_in_one_submitted_state() {
        let db = Arc::new(GeoDB::in_memory().unwrap());
        let created = db.create_point(NewPoint::new("start", 0.0, 0.0)).unwrap();

        let handles: Vec<_> = ["from-alice", "from-bob"]
            .into_iter()
            .map(|title| {
                let db = Arc::clone(&db);
                let id = created.id;
                thread::spawn(move || {
                    for _ in 0..100 {
                        db.update_point(&id, &PointPatch::title(title)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let title = db.get_point(&created.id).unwrap().title;
        assert!(title == "from-alice" || title == "from-bob", "got {}", title);
    }

    #[test]
    fn test_polygon_crud() {
        let db = GeoDB::in_memory().unwrap();
        let mut attrs = NewPolygon::new("Block", square(0.0, 10.0)).with_value(42.0, "people");
        attrs.properties = Some(
            [("GEOID".to_string(), PropertyValue::from("30063"))]
                .into_iter()
                .collect(),
        );
        let created = db.create_polygon(attrs).unwrap();
        assert_eq!(db.get_polygon(&created.id).unwrap(), created);

        let patch = PolygonPatch {
            geometry: Some(square(0.0, 20.0)),
            value: Some(None),
            ..Default::default()
        };
        let updated = db.update_polygon(&created.id, &patch).unwrap();
        assert_eq!(updated.value, None);
        assert_eq!(updated.properties, created.properties);
        assert_eq!(updated.geometry.bounding_box().unwrap().max_x, 20.0);

        db.delete_polygon(&created.id).unwrap();
        assert_eq!(db.list_polygons().unwrap().count(), 0);
    }

    #[test]
    fn test_create_polygon_rejects_unclosed_ring() {
        let db = GeoDB::in_memory().unwrap();
        let err = db
            .create_polygon(NewPolygon::new(
                "open",
                json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]}),
            ))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Geometry);
        assert_eq!(db.stats().polygons, 0);
    }
}
