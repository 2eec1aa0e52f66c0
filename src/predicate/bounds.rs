//! Bounding-box predicate

use crate::types::{BoundingBox, Coord};
use serde::{Deserialize, Serialize};

/// Lat/lon rectangle given by its four edges.
///
/// `south <= north` is expected. A box with `west > east` spans the
/// antimeridian: it covers `lon >= west` together with `lon <= east`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl Bounds {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Self {
        Self { north, south, east, west }
    }

    pub fn crosses_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Inclusive on every edge.
    #[inline]
    pub fn contains(&self, c: &Coord) -> bool {
        if c.lat < self.south || c.lat > self.north {
            return false;
        }
        if self.crosses_antimeridian() {
            c.lon >= self.west || c.lon <= self.east
        } else {
            c.lon >= self.west && c.lon <= self.east
        }
    }

    /// Index boxes covering this area; two when the antimeridian is crossed.
    pub fn index_boxes(&self) -> Vec<BoundingBox> {
        if self.crosses_antimeridian() {
            vec![
                BoundingBox::new(self.west, self.south, 180.0, self.north),
                BoundingBox::new(-180.0, self.south, self.east, self.north),
            ]
        } else {
            vec![BoundingBox::new(self.west, self.south, self.east, self.north)]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_are_inclusive() {
        let b = Bounds::new(50.0, 40.0, -90.0, -110.0);
        assert!(b.contains(&Coord::new(50.0, -90.0)));
        assert!(b.contains(&Coord::new(40.0, -110.0)));
        assert!(!b.contains(&Coord::new(50.0001, -100.0)));
    }

    #[test]
    fn test_antimeridian_wrap() {
        // Fiji-ish box: from 170E across the dateline to 170W
        let b = Bounds::new(-10.0, -20.0, -170.0, 170.0);
        assert!(b.crosses_antimeridian());
        assert!(b.contains(&Coord::new(-15.0, 178.0)));
        assert!(b.contains(&Coord::new(-15.0, -175.0)));
        assert!(b.contains(&Coord::new(-15.0, 180.0)));
        assert!(!b.contains(&Coord::new(-15.0, 0.0)));
        assert!(!b.contains(&Coord::new(-25.0, 178.0)));
        assert_eq!(b.index_boxes().len(), 2);
    }
}
