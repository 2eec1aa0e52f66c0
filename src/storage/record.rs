//! Stored row formats
//!
//! Points are stored as-is. Polygons keep their geometry and property bag as
//! JSON text; conversion to and from [`PolygonFeature`] goes through the codec
//! and happens only here, at the store boundary.

use crate::codec;
use crate::types::{
    BoundingBox, Collection, FeatureId, PointFeature, PolygonFeature, Properties,
};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonRecord {
    pub id: FeatureId,
    pub name: String,
    pub description: Option<String>,
    /// GeoJSON geometry text (`codec::encode_text`)
    pub geometry: String,
    /// JSON object text
    pub properties: String,
    pub value: Option<f64>,
    pub unit: Option<String>,
    pub category: Option<String>,
    pub layer_group: Option<String>,
    pub fill_color: Option<String>,
    pub border_color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PolygonRecord {
    pub fn from_feature(feature: &PolygonFeature) -> Result<Self> {
        Ok(Self {
            id: feature.id,
            name: feature.name.clone(),
            description: feature.description.clone(),
            geometry: codec::encode_text(&feature.geometry),
            properties: serde_json::to_string(&feature.properties)?,
            value: feature.value,
            unit: feature.unit.clone(),
            category: feature.category.clone(),
            layer_group: feature.layer_group.clone(),
            fill_color: feature.fill_color.clone(),
            border_color: feature.border_color.clone(),
            created_at: feature.created_at,
            updated_at: feature.updated_at,
        })
    }

    pub fn to_feature(&self) -> Result<PolygonFeature> {
        let properties: Properties = serde_json::from_str(&self.properties)?;
        Ok(PolygonFeature {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            geometry: codec::decode_text(&self.geometry)?,
            properties,
            value: self.value,
            unit: self.unit.clone(),
            category: self.category.clone(),
            layer_group: self.layer_group.clone(),
            fill_color: self.fill_color.clone(),
            border_color: self.border_color.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A row in either collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Point(PointFeature),
    Polygon(PolygonRecord),
}

impl Record {
    pub fn polygon(feature: &PolygonFeature) -> Result<Self> {
        PolygonRecord::from_feature(feature).map(Record::Polygon)
    }

    pub fn collection(&self) -> Collection {
        match self {
            Record::Point(_) => Collection::Points,
            Record::Polygon(_) => Collection::Polygons,
        }
    }

    pub fn id(&self) -> FeatureId {
        match self {
            Record::Point(p) => p.id,
            Record::Polygon(p) => p.id,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Record::Point(p) => p.category.as_deref(),
            Record::Polygon(p) => p.category.as_deref(),
        }
    }

    pub fn as_point(&self) -> Option<&PointFeature> {
        match self {
            Record::Point(p) => Some(p),
            Record::Polygon(_) => None,
        }
    }

    pub fn as_polygon(&self) -> Option<&PolygonRecord> {
        match self {
            Record::Point(_) => None,
            Record::Polygon(p) => Some(p),
        }
    }
}

/// A record with its store bookkeeping
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Insertion sequence; never reused, unchanged by updates
    pub seq: u64,
    /// Bumped on every replace; checked by optimistic writes
    pub version: u64,
    pub record: Record,
}

impl StoredRecord {
    pub fn id(&self) -> FeatureId {
        self.record.id()
    }

    pub fn into_point(self) -> Option<PointFeature> {
        match self.record {
            Record::Point(p) => Some(p),
            Record::Polygon(_) => None,
        }
    }

    pub fn to_polygon(&self) -> Option<Result<PolygonFeature>> {
        self.record.as_polygon().map(PolygonRecord::to_feature)
    }
}

/// Index key for a point row
pub(crate) fn point_bbox(point: &PointFeature) -> BoundingBox {
    BoundingBox::from_coord(point.coord())
}
