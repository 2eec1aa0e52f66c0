//! Attribute filters: category, layer group, value range
//!
//! These have no index; they scan the collection and match on the stored
//! row before decoding, so only hits pay for geometry decoding.

use super::core::{point_from, polygon_from, GeoDB};
use crate::query::{FeatureStream, LabelQuery, ValueRangeQuery};
use crate::storage::{PolygonRecord, StoredRecord};
use crate::types::{Collection, PointFeature, PolygonFeature};
use crate::Result;

impl GeoDB {
    pub fn points_by_category(&self, category: &str) -> Result<FeatureStream<PointFeature>> {
        let query = LabelQuery::new("category", category)?;
        let rows = self.backend.scan(Collection::Points)?;
        Ok(FeatureStream::new(
            rows.into_iter()
                .filter(move |row| query.matches(row.record.category()))
                .map(point_from),
        ))
    }

    pub fn polygons_by_category(&self, category: &str) -> Result<FeatureStream<PolygonFeature>> {
        let query = LabelQuery::new("category", category)?;
        self.filter_polygons(move |p| query.matches(p.category.as_deref()))
    }

    pub fn polygons_by_layer(&self, layer_group: &str) -> Result<FeatureStream<PolygonFeature>> {
        let query = LabelQuery::new("layerGroup", layer_group)?;
        self.filter_polygons(move |p| query.matches(p.layer_group.as_deref()))
    }

    /// Polygons with `min <= value <= max`; polygons without a value never match
    pub fn polygons_in_value_range(
        &self,
        query: &ValueRangeQuery,
    ) -> Result<FeatureStream<PolygonFeature>> {
        let query = *query;
        self.filter_polygons(move |p| p.value.is_some_and(|v| query.contains(v)))
    }

    fn filter_polygons<F>(&self, keep: F) -> Result<FeatureStream<PolygonFeature>>
    where
        F: Fn(&PolygonRecord) -> bool + Send + 'static,
    {
        let rows: Vec<StoredRecord> = self.backend.scan(Collection::Polygons)?;
        Ok(FeatureStream::new(
            rows.into_iter()
                .filter(move |row| row.record.as_polygon().is_some_and(&keep))
                .map(|row| polygon_from(&row)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FeatureId, NewPoint, NewPolygon};
    use crate::ErrorKind;
    use serde_json::json;

    fn tri() -> serde_json::Value {
        json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]]})
    }

    fn names(stream: FeatureStream<PolygonFeature>) -> Vec<String> {
        stream.map(|p| p.unwrap().name).collect()
    }

    #[test]
    fn test_point_category() {
        let db = GeoDB::in_memory().unwrap();
        let a = db.create_point(NewPoint::new("a", 0.0, 0.0).with_category("food")).unwrap();
        db.create_point(NewPoint::new("b", 0.0, 0.0).with_category("music")).unwrap();
        db.create_point(NewPoint::new("c", 0.0, 0.0)).unwrap();

        let hits: Vec<FeatureId> = db
            .points_by_category("food")
            .unwrap()
            .map(|p| p.unwrap().id)
            .collect();
        assert_eq!(hits, vec![a.id]);
        assert_eq!(
            db.points_by_category("").unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_polygon_category_and_layer() {
        let db = GeoDB::in_memory().unwrap();
        db.create_polygon(NewPolygon::new("mt", tri()).with_category("state").with_layer_group("us"))
            .unwrap();
        db.create_polygon(NewPolygon::new("gallatin", tri()).with_category("county").with_layer_group("us"))
            .unwrap();
        db.create_polygon(NewPolygon::new("ab", tri()).with_category("province")).unwrap();

        assert_eq!(names(db.polygons_by_category("county").unwrap()), vec!["gallatin"]);
        assert_eq!(names(db.polygons_by_layer("us").unwrap()), vec!["mt", "gallatin"]);
        assert!(names(db.polygons_by_layer("eu").unwrap()).is_empty());
    }

    #[test]
    fn test_value_range_inclusive_and_skips_missing() {
        let db = GeoDB::in_memory().unwrap();
        db.create_polygon(NewPolygon::new("low", tri()).with_value(5.0, "u")).unwrap();
        db.create_polygon(NewPolygon::new("mid", tri()).with_value(7.5, "u")).unwrap();
        db.create_polygon(NewPolygon::new("high", tri()).with_value(10.0, "u")).unwrap();
        db.create_polygon(NewPolygon::new("none", tri())).unwrap();

        let range = ValueRangeQuery::new(5.0, 10.0).unwrap();
        assert_eq!(
            names(db.polygons_in_value_range(&range).unwrap()),
            vec!["low", "mid", "high"]
        );
        let range = ValueRangeQuery::new(6.0, 8.0).unwrap();
        assert_eq!(names(db.polygons_in_value_range(&range).unwrap()), vec!["mid"]);
    }
}
