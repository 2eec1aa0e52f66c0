//! Spatial geometry data types (WGS84 degrees)

use serde::{Deserialize, Serialize};

/// Geographic coordinate. `lon` is the x axis, `lat` the y axis.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coord {
    pub lat: f64,
    pub lon: f64,
}

impl Coord {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

/// Closed sequence of coordinates; first == last.
#[derive(Debug, Clone, PartialEq)]
pub struct Ring(pub(crate) Vec<Coord>);

impl Ring {
    /// Wrap coordinates without checking closure. Use the codec to validate.
    pub fn new(coords: Vec<Coord>) -> Self {
        Self(coords)
    }

    pub fn coords(&self) -> &[Coord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        match (self.0.first(), self.0.last()) {
            (Some(first), Some(last)) => first == last,
            _ => false,
        }
    }

    /// Consecutive vertex pairs, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Coord, Coord)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }
}

/// One outer ring followed by zero or more holes.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon {
    pub(crate) rings: Vec<Ring>,
}

impl Polygon {
    pub fn new(exterior: Ring, holes: Vec<Ring>) -> Self {
        let mut rings = Vec::with_capacity(holes.len() + 1);
        rings.push(exterior);
        rings.extend(holes);
        Self { rings }
    }

    pub(crate) fn from_rings(rings: Vec<Ring>) -> Self {
        Self { rings }
    }

    pub fn exterior(&self) -> &Ring {
        &self.rings[0]
    }

    pub fn holes(&self) -> &[Ring] {
        &self.rings[1..]
    }

    pub fn rings(&self) -> &[Ring] {
        &self.rings
    }
}

/// Polygonal geometry supported by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Polygon(Polygon),
    MultiPolygon(Vec<Polygon>),
}

impl Geometry {
    pub fn polygons(&self) -> &[Polygon] {
        match self {
            Geometry::Polygon(p) => std::slice::from_ref(p),
            Geometry::MultiPolygon(ps) => ps,
        }
    }

    /// Get bounding box of the geometry (outer rings only)
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        let mut coords = self
            .polygons()
            .iter()
            .flat_map(|p| p.exterior().coords().iter());
        let first = coords.next()?;
        let mut bbox = BoundingBox::from_coord(*first);
        for c in coords {
            bbox.expand(c);
        }
        Some(bbox)
    }
}

/// Axis-aligned box used for index candidate selection (x = lon, y = lat)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    pub fn from_coord(c: Coord) -> Self {
        Self {
            min_x: c.lon,
            min_y: c.lat,
            max_x: c.lon,
            max_y: c.lat,
        }
    }

    pub fn contains(&self, c: &Coord) -> bool {
        c.lon >= self.min_x && c.lon <= self.max_x && c.lat >= self.min_y && c.lat <= self.max_y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(self.max_x < other.min_x
            || self.min_x > other.max_x
            || self.max_y < other.min_y
            || self.min_y > other.max_y)
    }

    pub fn expand(&mut self, c: &Coord) {
        self.min_x = self.min_x.min(c.lon);
        self.min_y = self.min_y.min(c.lat);
        self.max_x = self.max_x.max(c.lon);
        self.max_y = self.max_y.max(c.lat);
    }

    pub fn area(&self) -> f64 {
        (self.max_x - self.min_x) * (self.max_y - self.min_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Polygon {
        Polygon::new(
            Ring::new(vec![
                Coord::new(0.0, 0.0),
                Coord::new(0.0, 10.0),
                Coord::new(10.0, 10.0),
                Coord::new(10.0, 0.0),
                Coord::new(0.0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_coord_ranges() {
        assert!(Coord::new(90.0, -180.0).is_valid());
        assert!(!Coord::new(90.5, 0.0).is_valid());
        assert!(!Coord::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn test_ring_closure_and_edges() {
        let poly = square();
        assert!(poly.exterior().is_closed());
        assert_eq!(poly.exterior().edges().count(), 4);
        assert!(!Ring::new(vec![Coord::new(0.0, 0.0), Coord::new(1.0, 1.0)]).is_closed());
    }

    #[test]
    fn test_geometry_bbox() {
        let bbox = Geometry::Polygon(square()).bounding_box().unwrap();
        assert_eq!(bbox.min_x, 0.0);
        assert_eq!(bbox.max_y, 10.0);
        assert_eq!(bbox.area(), 100.0);
    }

    #[test]
    fn test_bbox_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
