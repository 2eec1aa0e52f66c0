//! Point and polygon feature entities, their creation attributes and patches

use super::{FeatureId, Geometry, Properties};
use crate::codec;
use crate::{GeoError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguishes an absent patch field (`None`) from an explicit `null` (`Some(None)`).
fn double_option<'de, D, T>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

fn required_text(field: &str, value: Option<String>) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        Some(_) => Err(GeoError::validation(field, "must not be empty")),
        None => Err(GeoError::validation(field, "is required")),
    }
}

pub(crate) fn check_latitude(field: &str, lat: f64) -> Result<()> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        return Err(GeoError::validation(field, format!("{} is outside [-90, 90]", lat)));
    }
    Ok(())
}

pub(crate) fn check_longitude(field: &str, lon: f64) -> Result<()> {
    if !lon.is_finite() || !(-180.0..=180.0).contains(&lon) {
        return Err(GeoError::validation(field, format!("{} is outside [-180, 180]", lon)));
    }
    Ok(())
}

fn check_value(value: Option<f64>) -> Result<()> {
    match value {
        Some(v) if !v.is_finite() => Err(GeoError::validation("value", "must be a finite number")),
        _ => Ok(()),
    }
}

// ==================== Point features ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointFeature {
    pub id: FeatureId,
    pub title: String,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub address: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub event_time: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PointFeature {
    pub fn coord(&self) -> super::Coord {
        super::Coord::new(self.latitude, self.longitude)
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(GeoError::validation("title", "must not be empty"));
        }
        check_latitude("latitude", self.latitude)?;
        check_longitude("longitude", self.longitude)
    }
}

/// Attributes supplied to create a point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPoint {
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub address: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub event_time: Option<String>,
    pub price: Option<String>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl NewPoint {
    pub fn new(title: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            title: Some(title.into()),
            latitude: Some(latitude),
            longitude: Some(longitude),
            ..Default::default()
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub(crate) fn into_feature(self, id: FeatureId, now: DateTime<Utc>) -> Result<PointFeature> {
        let title = required_text("title", self.title)?;
        let latitude = self
            .latitude
            .ok_or_else(|| GeoError::validation("latitude", "is required"))?;
        let longitude = self
            .longitude
            .ok_or_else(|| GeoError::validation("longitude", "is required"))?;

        let feature = PointFeature {
            id,
            title,
            description: self.description,
            latitude,
            longitude,
            address: self.address,
            event_date: self.event_date,
            event_time: self.event_time,
            price: self.price,
            category: self.category,
            image_url: self.image_url,
            created_at: now,
            updated_at: now,
        };
        feature.validate()?;
        Ok(feature)
    }
}

/// Partial update of a point. `null` clears an optional attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PointPatch {
    pub title: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(deserialize_with = "double_option")]
    pub address: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub event_date: Option<Option<DateTime<Utc>>>,
    #[serde(deserialize_with = "double_option")]
    pub event_time: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub price: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub image_url: Option<Option<String>>,
}

impl PointPatch {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            ..Default::default()
        }
    }

    /// Merge into `point` and re-validate; `point` is untouched on error.
    pub(crate) fn apply(&self, point: &PointFeature, now: DateTime<Utc>) -> Result<PointFeature> {
        let mut next = point.clone();
        if let Some(title) = &self.title {
            next.title = title.clone();
        }
        if let Some(lat) = self.latitude {
            next.latitude = lat;
        }
        if let Some(lon) = self.longitude {
            next.longitude = lon;
        }
        merge(&mut next.description, &self.description);
        merge(&mut next.address, &self.address);
        merge(&mut next.event_date, &self.event_date);
        merge(&mut next.event_time, &self.event_time);
        merge(&mut next.price, &self.price);
        merge(&mut next.category, &self.category);
        merge(&mut next.image_url, &self.image_url);
        next.updated_at = now;
        next.validate()?;
        Ok(next)
    }
}

fn merge<T: Clone>(slot: &mut Option<T>, patch: &Option<Option<T>>) {
    if let Some(v) = patch {
        *slot = v.clone();
    }
}

// ==================== Polygon features ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonFeature {
    pub id: FeatureId,
    pub name: String,
    pub description: Option<String>,
    pub geometry: Geometry,
    pub properties: Properties,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub layer_group: Option<String>,
    pub fill_color: Option<String>,
    pub border_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolygonFeature {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(GeoError::validation("name", "must not be empty"));
        }
        codec::validate(&self.geometry)?;
        check_value(self.value)
    }
}

/// Attributes supplied to create a polygon. `geometry` is raw GeoJSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NewPolygon {
    pub name: Option<String>,
    pub description: Option<String>,
    pub geometry: Option<serde_json::Value>,
    pub properties: Option<Properties>,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub layer_group: Option<String>,
    pub fill_color: Option<String>,
    pub border_color: Option<String>,
}

impl NewPolygon {
    pub fn new(name: impl Into<String>, geometry: serde_json::Value) -> Self {
        Self {
            name: Some(name.into()),
            geometry: Some(geometry),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: f64, unit: impl Into<String>) -> Self {
        self.value = Some(value);
        self.unit = Some(unit.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_layer_group(mut self, layer_group: impl Into<String>) -> Self {
        self.layer_group = Some(layer_group.into());
        self
    }

    pub(crate) fn into_feature(self, id: FeatureId, now: DateTime<Utc>) -> Result<PolygonFeature> {
        let name = required_text("name", self.name)?;
        let raw = self
            .geometry
            .ok_or_else(|| GeoError::validation("geometry", "is required"))?;
        let geometry = codec::decode(&raw)?;

        let feature = PolygonFeature {
            id,
            name,
            description: self.description,
            geometry,
            properties: self.properties.unwrap_or_default(),
            value: self.value,
            unit: self.unit,
            category: self.category,
            layer_group: self.layer_group,
            fill_color: self.fill_color,
            border_color: self.border_color,
            created_at: now,
            updated_at: now,
        };
        feature.validate()?;
        Ok(feature)
    }
}

/// Partial update of a polygon. `null` clears an optional attribute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PolygonPatch {
    pub name: Option<String>,
    #[serde(deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub geometry: Option<serde_json::Value>,
    pub properties: Option<Properties>,
    #[serde(deserialize_with = "double_option")]
    pub value: Option<Option<f64>>,
    #[serde(deserialize_with = "double_option")]
    pub unit: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub category: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub layer_group: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub fill_color: Option<Option<String>>,
    #[serde(deserialize_with = "double_option")]
    pub border_color: Option<Option<String>>,
}

impl PolygonPatch {
    pub(crate) fn apply(&self, polygon: &PolygonFeature, now: DateTime<Utc>) -> Result<PolygonFeature> {
        let mut next = polygon.clone();
        if let Some(name) = &self.name {
            next.name = name.clone();
        }
        if let Some(raw) = &self.geometry {
            next.geometry = codec::decode(raw)?;
        }
        if let Some(props) = &self.properties {
            next.properties = props.clone();
        }
        merge(&mut next.description, &self.description);
        merge(&mut next.value, &self.value);
        merge(&mut next.unit, &self.unit);
        merge(&mut next.category, &self.category);
        merge(&mut next.layer_group, &self.layer_group);
        merge(&mut next.fill_color, &self.fill_color);
        merge(&mut next.border_color, &self.border_color);
        next.updated_at = now;
        next.validate()?;
        Ok(next)
    }
}
