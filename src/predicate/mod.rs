//! Spatial predicate engine
//!
//! Pure evaluators over decoded geometry. These define the query semantics:
//! the embedded backend's indexed path and the full-scan fallback both refine
//! their candidates through these functions.
//!
//! - [`Bounds::contains`]: inclusive lat/lon box, wrapping across the
//!   antimeridian when `west > east`
//! - [`within_radius`]: haversine distance strictly below the radius
//! - [`point_in_geometry`]: even-odd crossing rule, boundary counts as outside

pub mod bounds;
pub mod containment;
pub mod distance;

pub use bounds::Bounds;
pub use containment::{on_boundary, point_in_geometry, point_in_polygon};
pub use distance::{haversine_km, radius_search_boxes, within_radius, EARTH_RADIUS_KM};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::types::Coord;
    use serde_json::json;

    #[test]
    fn test_reference_bbox_cases() {
        let p = Coord::new(45.0, -100.0);
        assert!(Bounds::new(50.0, 40.0, -90.0, -110.0).contains(&p));
        assert!(!Bounds::new(50.0, 40.0, -90.0, -95.0).contains(&p));
    }

    #[test]
    fn test_reference_radius_cases() {
        let a = Coord::new(0.0, 0.0);
        let b = Coord::new(0.0, 1.0);
        assert!((haversine_km(&a, &b) - 111.19).abs() < 0.01);
        assert!(within_radius(&a, &b, 112.0));
        assert!(!within_radius(&a, &b, 111.0));
    }

    #[test]
    fn test_reference_containment_cases() {
        let geometry = codec::decode(&json!({
            "type": "Polygon",
            "coordinates": [[[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]]]
        }))
        .unwrap();
        assert!(point_in_geometry(&Coord::new(5.0, 5.0), &geometry));
        assert!(!point_in_geometry(&Coord::new(0.0, 0.0), &geometry));
        assert!(!point_in_geometry(&Coord::new(20.0, 20.0), &geometry));
    }
}
