//! Point-in-polygon test
//!
//! Even-odd crossing rule, applied the same way to simple and
//! self-intersecting rings. Points on any ring edge (outer or hole) are
//! outside: only the strict interior counts.

use crate::types::{Coord, Geometry, Polygon, Ring};

/// Tolerance for the collinearity test in `on_segment`.
const EPS: f64 = 1e-12;

/// Inside the outer ring, outside every hole, and on no edge.
pub fn point_in_polygon(point: &Coord, polygon: &Polygon) -> bool {
    if polygon.rings().iter().any(|ring| on_ring(point, ring)) {
        return false;
    }
    crossing_parity(point, polygon.exterior())
        && !polygon.holes().iter().any(|hole| crossing_parity(point, hole))
}

/// Inside any member polygon.
pub fn point_in_geometry(point: &Coord, geometry: &Geometry) -> bool {
    geometry.polygons().iter().any(|p| point_in_polygon(point, p))
}

/// True if `point` lies on an edge of any ring of `geometry`.
pub fn on_boundary(point: &Coord, geometry: &Geometry) -> bool {
    geometry
        .polygons()
        .iter()
        .flat_map(|p| p.rings().iter())
        .any(|ring| on_ring(point, ring))
}

/// Odd number of edge crossings for a ray cast towards +lon.
fn crossing_parity(point: &Coord, ring: &Ring) -> bool {
    let mut inside = false;
    for (a, b) in ring.edges() {
        if (a.lat > point.lat) != (b.lat > point.lat) {
            let x = a.lon + (point.lat - a.lat) * (b.lon - a.lon) / (b.lat - a.lat);
            if point.lon < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn on_ring(point: &Coord, ring: &Ring) -> bool {
    ring.edges().any(|(a, b)| on_segment(point, &a, &b))
}

fn on_segment(p: &Coord, a: &Coord, b: &Coord) -> bool {
    let cross = (b.lon - a.lon) * (p.lat - a.lat) - (b.lat - a.lat) * (p.lon - a.lon);
    let scale = (b.lon - a.lon).abs() + (b.lat - a.lat).abs() + 1.0;
    if cross.abs() > EPS * scale {
        return false;
    }
    p.lon >= a.lon.min(b.lon) - EPS
        && p.lon <= a.lon.max(b.lon) + EPS
        && p.lat >= a.lat.min(b.lat) - EPS
        && p.lat <= a.lat.max(b.lat) + EPS
}
