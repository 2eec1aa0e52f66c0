//! Spatial query routing
//!
//! Each spatial query runs on the backend's [`SpatialCapability`] when it has
//! one, and otherwise on the predicate engine over a full scan. Both paths
//! return the same rows in the same order:
//! - bounds and containment: insertion order
//! - radius: ascending distance, ties in insertion order
//!
//! [`SpatialCapability`]: crate::storage::SpatialCapability

use super::core::{point_from, polygon_from, GeoDB};
use crate::codec;
use crate::predicate;
use crate::query::{BoundsQuery, ContainsPointQuery, FeatureStream, Nearby, RadiusQuery};
use crate::storage::{Record, StoredRecord};
use crate::types::{Collection, PointFeature, PolygonFeature};
use crate::Result;
use tracing::debug;

impl GeoDB {
    /// Points inside a lat/lon box, edges inclusive
    pub fn points_in_bounds(&self, query: &BoundsQuery) -> Result<FeatureStream<PointFeature>> {
        let rows = match self.backend.spatial() {
            Some(spatial) => {
                debug!(path = "native", "points_in_bounds");
                spatial.points_in_bounds(&query.bounds)?
            }
            None => {
                debug!(path = "fallback", "points_in_bounds");
                self.scan_points_in_bounds(query)?
            }
        };
        Ok(FeatureStream::new(rows.into_iter().map(point_from)))
    }

    /// Points strictly closer than the radius, nearest first
    pub fn points_within_radius(&self, query: &RadiusQuery) -> Result<FeatureStream<Nearby>> {
        let hits = match self.backend.spatial() {
            Some(spatial) => {
                debug!(path = "native", "points_within_radius");
                spatial.points_within_radius(&query.center, query.radius_km)?
            }
            None => {
                debug!(path = "fallback", "points_within_radius");
                self.scan_points_within_radius(query)?
            }
        };
        Ok(FeatureStream::new(hits.into_iter().map(|(stored, distance_km)| {
            point_from(stored).map(|feature| Nearby {
                feature,
                distance_km,
            })
        })))
    }

    /// Polygons whose interior contains the point; boundary points excluded
    pub fn polygons_containing(
        &self,
        query: &ContainsPointQuery,
    ) -> Result<FeatureStream<PolygonFeature>> {
        let rows = match self.backend.spatial() {
            Some(spatial) => {
                debug!(path = "native", "polygons_containing");
                spatial.polygons_containing(&query.point)?
            }
            None => {
                debug!(path = "fallback", "polygons_containing");
                self.scan_polygons_containing(query)?
            }
        };
        Ok(FeatureStream::new(rows.into_iter().map(|r| polygon_from(&r))))
    }

    // ==================== Fallback Path ====================

    fn scan_points_in_bounds(&self, query: &BoundsQuery) -> Result<Vec<StoredRecord>> {
        Ok(self
            .backend
            .scan(Collection::Points)?
            .into_iter()
            .filter(|row| {
                row.record
                    .as_point()
                    .is_some_and(|p| query.bounds.contains(&p.coord()))
            })
            .collect())
    }

    fn scan_points_within_radius(&self, query: &RadiusQuery) -> Result<Vec<(StoredRecord, f64)>> {
        let mut hits: Vec<(StoredRecord, f64)> = self
            .backend
            .scan(Collection::Points)?
            .into_iter()
            .filter_map(|row| {
                let point = row.record.as_point()?;
                let distance = predicate::haversine_km(&query.center, &point.coord());
                (distance < query.radius_km).then_some((row, distance))
            })
            .collect();
        // stable: equal distances stay in insertion order
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(hits)
    }

    fn scan_polygons_containing(&self, query: &ContainsPointQuery) -> Result<Vec<StoredRecord>> {
        let mut hits = Vec::new();
        for row in self.backend.scan(Collection::Polygons)? {
            if let Record::Polygon(polygon) = &row.record {
                let geometry = codec::decode_text(&polygon.geometry)?;
                if predicate::point_in_geometry(&query.point, &geometry) {
                    hits.push(row);
                }
            }
        }
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::index::GridConfig;
    use crate::types::{BoundingBox, FeatureId, NewPoint, NewPolygon};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use serde_json::json;

    fn both_paths() -> (GeoDB, GeoDB) {
        (
            GeoDB::open(StoreConfig::for_testing()).unwrap(),
            GeoDB::open(StoreConfig::fallback_only()).unwrap(),
        )
    }

    fn ids<T>(stream: FeatureStream<T>, id: impl Fn(&T) -> FeatureId) -> Vec<FeatureId> {
        stream.map(|item| id(&item.unwrap())).collect()
    }

    #[test]
    fn test_reference_bounds_example() {
        let (native, fallback) = both_paths();
        for db in [&native, &fallback] {
            let p = db.create_point(NewPoint::new("p", 45.0, -100.0)).unwrap();
            let hit = BoundsQuery::new(50.0, 40.0, -90.0, -110.0).unwrap();
            let miss = BoundsQuery::new(50.0, 40.0, -90.0, -95.0).unwrap();
            assert_eq!(ids(db.points_in_bounds(&hit).unwrap(), |f| f.id), vec![p.id]);
            assert!(ids(db.points_in_bounds(&miss).unwrap(), |f| f.id).is_empty());
        }
    }

    #[test]
    fn test_antimeridian_bounds() {
        let (native, fallback) = both_paths();
        for db in [&native, &fallback] {
            let east = db.create_point(NewPoint::new("east", -17.0, 178.5)).unwrap();
            let west = db.create_point(NewPoint::new("west", -17.0, -179.0)).unwrap();
            db.create_point(NewPoint::new("greenwich", -17.0, 0.0)).unwrap();

            let query = BoundsQuery::new(-10.0, -20.0, -170.0, 170.0).unwrap();
            assert_eq!(
                ids(db.points_in_bounds(&query).unwrap(), |f| f.id),
                vec![east.id, west.id]
            );
        }
    }

    #[test]
    fn test_radius_orders_by_distance() {
        let (native, fallback) = both_paths();
        for db in [&native, &fallback] {
            let far = db.create_point(NewPoint::new("far", 0.0, 0.9)).unwrap();
            let edge = db.create_point(NewPoint::new("edge", 0.0, 1.0)).unwrap();
            let near = db.create_point(NewPoint::new("near", 0.0, 0.1)).unwrap();
            let tie = db.create_point(NewPoint::new("tie", 0.0, -0.1)).unwrap();

            let hits: Vec<Nearby> = db
                .points_within_radius(&RadiusQuery::new(0.0, 0.0, 111.0).unwrap())
                .unwrap()
                .try_collect()
                .unwrap();
            let order: Vec<FeatureId> = hits.iter().map(|n| n.feature.id).collect();
            assert_eq!(order, vec![near.id, tie.id, far.id]);
            assert!(hits.windows(2).all(|w| w[0].distance_km <= w[1].distance_km));

            let wider: Vec<FeatureId> = ids(
                db.points_within_radius(&RadiusQuery::new(0.0, 0.0, 112.0).unwrap())
                    .unwrap(),
                |n| n.feature.id,
            );
            assert_eq!(wider.last(), Some(&edge.id));
        }
    }

    #[test]
    fn test_containment_with_hole() {
        let (native, fallback) = both_paths();
        for db in [&native, &fallback] {
            let donut = db
                .create_polygon(NewPolygon::new(
                    "donut",
                    json!({"type": "Polygon", "coordinates": [
                        [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                        [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
                    ]}),
                ))
                .unwrap();

            let inside = ContainsPointQuery::new(2.0, 2.0).unwrap();
            let in_hole = ContainsPointQuery::new(5.0, 5.0).unwrap();
            let corner = ContainsPointQuery::new(0.0, 0.0).unwrap();
            assert_eq!(ids(db.polygons_containing(&inside).unwrap(), |f| f.id), vec![donut.id]);
            assert!(ids(db.polygons_containing(&in_hole).unwrap(), |f| f.id).is_empty());
            assert!(ids(db.polygons_containing(&corner).unwrap(), |f| f.id).is_empty());
        }
    }

    /// Same writes against both paths, then random queries must agree exactly.
    #[test]
    fn test_native_matches_fallback_randomized() {
        let mut rng = StdRng::seed_from_u64(0x5EED);
        let (native, fallback) = both_paths();

        // mirror ids: the two stores assign different ids to the same input
        let mut point_pairs = Vec::new();
        for i in 0..300 {
            let (lat, lon) = (rng.gen_range(-89.0..89.0), rng.gen_range(-180.0..=180.0));
            let a = native.create_point(NewPoint::new(format!("p{}", i), lat, lon)).unwrap();
            let b = fallback.create_point(NewPoint::new(format!("p{}", i), lat, lon)).unwrap();
            point_pairs.push((a.id, b.id));
        }
        let mut polygon_pairs = Vec::new();
        for i in 0..60 {
            let lon = rng.gen_range(-170.0..160.0);
            let lat = rng.gen_range(-80.0..70.0);
            let (w, h) = (rng.gen_range(0.5..10.0), rng.gen_range(0.5..10.0));
            let geometry = json!({"type": "Polygon", "coordinates": [[
                [lon, lat], [lon + w, lat], [lon + w * 0.6, lat + h], [lon, lat + h * 0.8], [lon, lat]
            ]]});
            let a = native.create_polygon(NewPolygon::new(format!("g{}", i), geometry.clone())).unwrap();
            let b = fallback.create_polygon(NewPolygon::new(format!("g{}", i), geometry)).unwrap();
            polygon_pairs.push((a.id, b.id));
        }
        let to_native = |fallback_id: FeatureId, pairs: &[(FeatureId, FeatureId)]| {
            pairs.iter().find(|(_, b)| *b == fallback_id).map(|(a, _)| *a).unwrap()
        };

        for _ in 0..100 {
            let south = rng.gen_range(-90.0..80.0);
            let north = rng.gen_range(south..90.0);
            let west = rng.gen_range(-180.0..180.0);
            let east = rng.gen_range(-180.0..180.0);
            let query = BoundsQuery::new(north, south, east, west).unwrap();
            let expected: Vec<FeatureId> = ids(fallback.points_in_bounds(&query).unwrap(), |f| f.id)
                .into_iter()
                .map(|id| to_native(id, &point_pairs))
                .collect();
            assert_eq!(ids(native.points_in_bounds(&query).unwrap(), |f| f.id), expected);

            let query = RadiusQuery::new(
                rng.gen_range(-90.0..=90.0),
                rng.gen_range(-180.0..=180.0),
                rng.gen_range(1.0..3000.0),
            )
            .unwrap();
            let expected: Vec<FeatureId> =
                ids(fallback.points_within_radius(&query).unwrap(), |n| n.feature.id)
                    .into_iter()
                    .map(|id| to_native(id, &point_pairs))
                    .collect();
            assert_eq!(
                ids(native.points_within_radius(&query).unwrap(), |n| n.feature.id),
                expected
            );

            let query =
                ContainsPointQuery::new(rng.gen_range(-80.0..80.0), rng.gen_range(-170.0..170.0))
                    .unwrap();
            let expected: Vec<FeatureId> = ids(fallback.polygons_containing(&query).unwrap(), |f| f.id)
                .into_iter()
                .map(|id| to_native(id, &polygon_pairs))
                .collect();
            assert_eq!(ids(native.polygons_containing(&query).unwrap(), |f| f.id), expected);
        }
    }

    #[test]
    fn test_narrow_index_extent_never_rejects_features() {
        let extent = GridConfig::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0)).with_grid_size(4);
        let native = StoreConfig {
            spatial_index: extent.clone(),
            ..StoreConfig::for_testing()
        };
        let fallback = StoreConfig {
            spatial_index: extent,
            ..StoreConfig::fallback_only()
        };

        for db in [GeoDB::open(native).unwrap(), GeoDB::open(fallback).unwrap()] {
            let outside = db.create_point(NewPoint::new("valid wgs84", 50.0, 50.0)).unwrap();
            let inside = db.create_point(NewPoint::new("inside", 5.0, 5.0)).unwrap();
            let far_poly = db
                .create_polygon(NewPolygon::new(
                    "far",
                    json!({"type": "Polygon", "coordinates": [[[-60.0, -40.0], [-50.0, -40.0], [-50.0, -30.0], [-60.0, -40.0]]]}),
                ))
                .unwrap();

            let query = BoundsQuery::new(51.0, 49.0, 51.0, 49.0).unwrap();
            assert_eq!(ids(db.points_in_bounds(&query).unwrap(), |f| f.id), vec![outside.id]);

            let near_outside = RadiusQuery::new(50.0, 50.0, 10.0).unwrap();
            assert_eq!(
                ids(db.points_within_radius(&near_outside).unwrap(), |n| n.feature.id),
                vec![outside.id]
            );

            let everywhere = BoundsQuery::new(90.0, -90.0, 180.0, -180.0).unwrap();
            assert_eq!(
                ids(db.points_in_bounds(&everywhere).unwrap(), |f| f.id),
                vec![outside.id, inside.id]
            );

            let in_far = ContainsPointQuery::new(-38.0, -55.0).unwrap();
            assert_eq!(ids(db.polygons_containing(&in_far).unwrap(), |p| p.id), vec![far_poly.id]);
        }
    }
}
