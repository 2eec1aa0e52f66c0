//! GeoJSON geometry codec
//!
//! Converts between GeoJSON-shaped `serde_json::Value`s and [`Geometry`].
//! Decoding validates the structural invariants; encoding is its exact
//! inverse, so `decode(&encode(g)) == g` for every decoded `g`.
//!
//! Accepted shapes:
//! - `{"type": "Polygon", "coordinates": [ring, ...]}`
//! - `{"type": "MultiPolygon", "coordinates": [[ring, ...], ...]}`
//!
//! Positions are `[longitude, latitude]` pairs. Every ring needs at least four
//! positions and must end where it starts.

use crate::types::{Coord, Geometry, Polygon, Ring};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use thiserror::Error;

const MIN_RING_POSITIONS: usize = 4;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("geometry must be a JSON object")]
    NotAnObject,

    #[error("missing `{0}` member")]
    MissingMember(&'static str),

    #[error("unsupported geometry type `{0}` (expected Polygon or MultiPolygon)")]
    UnsupportedType(String),

    #[error("{path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("{path}: ring has {count} positions, needs at least 4")]
    TooFewPositions { path: String, count: usize },

    #[error("{path}: ring is not closed (first position != last position)")]
    UnclosedRing { path: String },

    #[error("{path}: coordinate ({lon}, {lat}) is outside WGS84 range")]
    OutOfRange { path: String, lat: f64, lon: f64 },

    #[error("stored geometry text is not valid JSON: {0}")]
    InvalidText(String),
}

fn malformed(path: &str, reason: impl Into<String>) -> GeometryError {
    GeometryError::Malformed {
        path: path.to_string(),
        reason: reason.into(),
    }
}

/// Decode GeoJSON into a validated geometry.
pub fn decode(raw: &Value) -> Result<Geometry, GeometryError> {
    let obj = raw.as_object().ok_or(GeometryError::NotAnObject)?;
    let kind = obj
        .get("type")
        .ok_or(GeometryError::MissingMember("type"))?
        .as_str()
        .ok_or_else(|| malformed("type", "must be a string"))?;
    let coords = obj
        .get("coordinates")
        .ok_or(GeometryError::MissingMember("coordinates"))?;

    match kind {
        "Polygon" => Ok(Geometry::Polygon(decode_polygon(coords, "coordinates")?)),
        "MultiPolygon" => {
            let members = coords
                .as_array()
                .ok_or_else(|| malformed("coordinates", "must be an array of polygons"))?;
            if members.is_empty() {
                return Err(malformed("coordinates", "multipolygon has no polygons"));
            }
            let polygons = members
                .iter()
                .enumerate()
                .map(|(i, p)| decode_polygon(p, &format!("coordinates[{}]", i)))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Geometry::MultiPolygon(polygons))
        }
        other => Err(GeometryError::UnsupportedType(other.to_string())),
    }
}

fn decode_polygon(raw: &Value, path: &str) -> Result<Polygon, GeometryError> {
    let rings = raw
        .as_array()
        .ok_or_else(|| malformed(path, "must be an array of rings"))?;
    if rings.is_empty() {
        return Err(malformed(path, "polygon has no rings"));
    }
    let rings = rings
        .iter()
        .enumerate()
        .map(|(i, r)| decode_ring(r, &format!("{}[{}]", path, i)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Polygon::from_rings(rings))
}

fn decode_ring(raw: &Value, path: &str) -> Result<Ring, GeometryError> {
    let positions = raw
        .as_array()
        .ok_or_else(|| malformed(path, "must be an array of positions"))?;
    let coords = positions
        .iter()
        .enumerate()
        .map(|(i, p)| decode_position(p, &format!("{}[{}]", path, i)))
        .collect::<Result<Vec<_>, _>>()?;
    let ring = Ring::new(coords);
    validate_ring(&ring, path)?;
    Ok(ring)
}

fn decode_position(raw: &Value, path: &str) -> Result<Coord, GeometryError> {
    let pair = raw
        .as_array()
        .ok_or_else(|| malformed(path, "position must be an array"))?;
    if pair.len() != 2 {
        return Err(malformed(
            path,
            format!("position must be [longitude, latitude], got {} elements", pair.len()),
        ));
    }
    let lon = pair[0]
        .as_f64()
        .ok_or_else(|| malformed(path, "longitude must be a number"))?;
    let lat = pair[1]
        .as_f64()
        .ok_or_else(|| malformed(path, "latitude must be a number"))?;
    Ok(Coord::new(lat, lon))
}

fn validate_ring(ring: &Ring, path: &str) -> Result<(), GeometryError> {
    if ring.len() < MIN_RING_POSITIONS {
        return Err(GeometryError::TooFewPositions {
            path: path.to_string(),
            count: ring.len(),
        });
    }
    if let Some((i, c)) = ring.coords().iter().enumerate().find(|(_, c)| !c.is_valid()) {
        return Err(GeometryError::OutOfRange {
            path: format!("{}[{}]", path, i),
            lat: c.lat,
            lon: c.lon,
        });
    }
    if !ring.is_closed() {
        return Err(GeometryError::UnclosedRing {
            path: path.to_string(),
        });
    }
    Ok(())
}

/// Check the invariants of a geometry built in code rather than decoded.
pub fn validate(geometry: &Geometry) -> Result<(), GeometryError> {
    let polygons = geometry.polygons();
    if polygons.is_empty() {
        return Err(malformed("coordinates", "multipolygon has no polygons"));
    }
    let multi = matches!(geometry, Geometry::MultiPolygon(_));
    for (pi, polygon) in polygons.iter().enumerate() {
        let base = if multi {
            format!("coordinates[{}]", pi)
        } else {
            "coordinates".to_string()
        };
        if polygon.rings().is_empty() {
            return Err(malformed(&base, "polygon has no rings"));
        }
        for (ri, ring) in polygon.rings().iter().enumerate() {
            validate_ring(ring, &format!("{}[{}]", base, ri))?;
        }
    }
    Ok(())
}

/// Encode a geometry as GeoJSON.
pub fn encode(geometry: &Geometry) -> Value {
    match geometry {
        Geometry::Polygon(p) => json!({
            "type": "Polygon",
            "coordinates": encode_polygon(p),
        }),
        Geometry::MultiPolygon(ps) => json!({
            "type": "MultiPolygon",
            "coordinates": ps.iter().map(encode_polygon).collect::<Vec<_>>(),
        }),
    }
}

fn encode_polygon(polygon: &Polygon) -> Value {
    Value::Array(
        polygon
            .rings()
            .iter()
            .map(|ring| {
                Value::Array(
                    ring.coords()
                        .iter()
                        .map(|c| json!([c.lon, c.lat]))
                        .collect(),
                )
            })
            .collect(),
    )
}

/// Serialized form kept in storage.
pub fn encode_text(geometry: &Geometry) -> String {
    encode(geometry).to_string()
}

pub fn decode_text(text: &str) -> Result<Geometry, GeometryError> {
    let raw: Value =
        serde_json::from_str(text).map_err(|e| GeometryError::InvalidText(e.to_string()))?;
    decode(&raw)
}

impl Serialize for Geometry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode(self).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Geometry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        decode(&raw).map_err(serde::de::Error::custom)
    }
}
