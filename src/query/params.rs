//! Query parameter validation
//!
//! Callers hand over raw text parameters (query strings, CLI flags). Each
//! query shape parses and validates them into a typed query before anything
//! touches the store, so every rejection names the offending parameter.

use crate::predicate::Bounds;
use crate::types::{check_latitude, check_longitude, Coord, FeatureId};
use crate::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw named parameters as received from a caller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawParams(BTreeMap<String, String>);

impl RawParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Required finite number. `"0"` is a valid value.
    pub fn number(&self, name: &str) -> Result<f64> {
        parse_number(name, self.get(name))
    }

    /// Required non-blank text
    pub fn text(&self, name: &str) -> Result<String> {
        match self.get(name).map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            Some(_) => Err(GeoError::validation(name, "must not be empty")),
            None => Err(GeoError::validation(name, "is required")),
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

fn parse_number(name: &str, raw: Option<&str>) -> Result<f64> {
    let raw = raw
        .map(str::trim)
        .ok_or_else(|| GeoError::validation(name, "is required"))?;
    if raw.is_empty() {
        return Err(GeoError::validation(name, "is required"));
    }
    let value: f64 = raw
        .parse()
        .map_err(|_| GeoError::validation(name, format!("`{}` is not a number", raw)))?;
    if !value.is_finite() {
        return Err(GeoError::validation(name, "must be a finite number"));
    }
    Ok(value)
}

fn require_finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GeoError::validation(name, "must be a finite number"))
    }
}

/// Lookup by identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ByIdQuery {
    pub id: FeatureId,
}

impl ByIdQuery {
    pub fn from_params(params: &RawParams) -> Result<Self> {
        Ok(Self {
            id: params.text("id")?.parse()?,
        })
    }
}

/// Points inside a lat/lon box (`north`, `south`, `east`, `west`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsQuery {
    pub bounds: Bounds,
}

impl BoundsQuery {
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        let north = require_finite("north", north)?;
        let south = require_finite("south", south)?;
        let east = require_finite("east", east)?;
        let west = require_finite("west", west)?;
        if south > north {
            return Err(GeoError::validation(
                "south",
                format!("{} is north of north ({})", south, north),
            ));
        }
        Ok(Self {
            bounds: Bounds::new(north, south, east, west),
        })
    }

    pub fn from_params(params: &RawParams) -> Result<Self> {
        Self::new(
            params.number("north")?,
            params.number("south")?,
            params.number("east")?,
            params.number("west")?,
        )
    }
}

/// Points strictly within `radius_km` of (`lat`, `lng`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadiusQuery {
    pub center: Coord,
    pub radius_km: f64,
}

impl RadiusQuery {
    pub fn new(lat: f64, lng: f64, radius_km: f64) -> Result<Self> {
        check_latitude("lat", lat)?;
        check_longitude("lng", lng)?;
        let radius_km = require_finite("radius", radius_km)?;
        if radius_km <= 0.0 {
            return Err(GeoError::validation("radius", "must be positive"));
        }
        Ok(Self {
            center: Coord::new(lat, lng),
            radius_km,
        })
    }

    pub fn from_params(params: &RawParams) -> Result<Self> {
        Self::new(
            params.number("lat")?,
            params.number("lng")?,
            params.number("radius")?,
        )
    }
}

/// Polygons with `min <= value <= max`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRangeQuery {
    pub min: f64,
    pub max: f64,
}

impl ValueRangeQuery {
    pub fn new(min: f64, max: f64) -> Result<Self> {
        let min = require_finite("min", min)?;
        let max = require_finite("max", max)?;
        if min > max {
            return Err(GeoError::validation(
                "min",
                format!("range is reversed (min {} > max {})", min, max),
            ));
        }
        Ok(Self { min, max })
    }

    pub fn from_params(params: &RawParams) -> Result<Self> {
        Self::new(params.number("min")?, params.number("max")?)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Polygons whose interior contains (`lat`, `lng`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContainsPointQuery {
    pub point: Coord,
}

impl ContainsPointQuery {
    pub fn new(lat: f64, lng: f64) -> Result<Self> {
        check_latitude("lat", lat)?;
        check_longitude("lng", lng)?;
        Ok(Self {
            point: Coord::new(lat, lng),
        })
    }

    pub fn from_params(params: &RawParams) -> Result<Self> {
        Self::new(params.number("lat")?, params.number("lng")?)
    }
}

/// Exact-match label filter (category or layer group)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelQuery {
    pub label: String,
}

impl LabelQuery {
    pub fn new(field: &str, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        if label.trim().is_empty() {
            return Err(GeoError::validation(field, "must not be empty"));
        }
        Ok(Self { label })
    }

    pub fn matches(&self, value: Option<&str>) -> bool {
        value == Some(self.label.as_str())
    }
}
