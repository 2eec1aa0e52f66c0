//! Feature data model

mod feature;
mod properties;
mod spatial;

pub use feature::{NewPoint, NewPolygon, PointFeature, PointPatch, PolygonFeature, PolygonPatch};
pub(crate) use feature::{check_latitude, check_longitude};
pub use properties::{Properties, PropertyValue};
pub use spatial::{BoundingBox, Coord, Geometry, Polygon, Ring};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Feature identifier, assigned once on creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureId(Uuid);

impl FeatureId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for FeatureId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for FeatureId {
    type Err = crate::GeoError;

    fn from_str(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s.trim())
            .map(FeatureId)
            .map_err(|e| crate::GeoError::validation("id", e.to_string()))
    }
}

/// The two entity collections held by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Points,
    Polygons,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Points => f.write_str("point"),
            Collection::Polygons => f.write_str("polygon"),
        }
    }
}
