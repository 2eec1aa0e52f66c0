//! Great-circle distance (haversine) on a spherical earth

use crate::types::{BoundingBox, Coord};

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Widening applied to search boxes so float rounding never drops a candidate.
const BOX_MARGIN_DEG: f64 = 1e-7;

/// Haversine distance in kilometres:
/// `2R * asin(sqrt(sin²(Δlat/2) + cos(lat1) * cos(lat2) * sin²(Δlon/2)))`
#[inline]
pub fn haversine_km(a: &Coord, b: &Coord) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// True iff `point` lies strictly closer than `radius_km` to `center`.
#[inline]
pub fn within_radius(center: &Coord, point: &Coord, radius_km: f64) -> bool {
    haversine_km(center, point) < radius_km
}

/// Lat/lon boxes that together cover every point within `radius_km` of
/// `center`. Used to pick index candidates before exact refinement.
pub fn radius_search_boxes(center: &Coord, radius_km: f64) -> Vec<BoundingBox> {
    let angular = radius_km / EARTH_RADIUS_KM;
    if angular >= std::f64::consts::PI {
        return vec![BoundingBox::new(-180.0, -90.0, 180.0, 90.0)];
    }

    let dlat = angular.to_degrees() + BOX_MARGIN_DEG;
    let min_lat = center.lat - dlat;
    let max_lat = center.lat + dlat;

    // Circle reaches a pole: every longitude is in range.
    if min_lat <= -90.0 || max_lat >= 90.0 {
        return vec![BoundingBox::new(-180.0, min_lat.max(-90.0), 180.0, max_lat.min(90.0))];
    }

    let ratio = angular.sin() / center.lat.to_radians().cos();
    if ratio >= 1.0 {
        return vec![BoundingBox::new(-180.0, min_lat, 180.0, max_lat)];
    }
    let dlon = ratio.asin().to_degrees() + BOX_MARGIN_DEG;
    let min_lon = center.lon - dlon;
    let max_lon = center.lon + dlon;

    if min_lon < -180.0 {
        vec![
            BoundingBox::new(min_lon + 360.0, min_lat, 180.0, max_lat),
            BoundingBox::new(-180.0, min_lat, max_lon, max_lat),
        ]
    } else if max_lon > 180.0 {
        vec![
            BoundingBox::new(min_lon, min_lat, 180.0, max_lat),
            BoundingBox::new(-180.0, min_lat, max_lon - 360.0, max_lat),
        ]
    } else {
        vec![BoundingBox::new(min_lon, min_lat, max_lon, max_lat)]
    }
}
