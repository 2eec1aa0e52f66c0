//! Batch polygon import
//!
//! Ingests a GeoJSON-style feature list as one all-or-nothing commit. Each
//! feature's entity fields are derived from its `properties`; a batch-level
//! `category` / `layerGroup` overrides the per-feature value of the same name.

use super::core::GeoDB;
use crate::storage::{Record, WriteBatch};
use crate::types::{FeatureId, NewPolygon, Properties, PropertyValue};
use crate::{GeoError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const UNNAMED: &str = "Unnamed Polygon";

/// One input feature (`{"type": "Feature", "geometry": ..., "properties": ...}`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportFeature {
    pub geometry: Option<serde_json::Value>,
    pub properties: Option<Properties>,
}

/// A feature collection plus batch-level overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRequest {
    pub features: Vec<ImportFeature>,
    pub layer_group: Option<String>,
    pub category: Option<String>,
}

impl ImportRequest {
    pub fn new(features: Vec<ImportFeature>) -> Self {
        Self {
            features,
            ..Default::default()
        }
    }

    pub fn with_layer_group(mut self, layer_group: impl Into<String>) -> Self {
        self.layer_group = Some(layer_group.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub count: usize,
    pub ids: Vec<FeatureId>,
}

/// Text value of `key`; blank text counts as absent
fn text_property(props: &Properties, key: &str) -> Option<String> {
    match props.get(key)? {
        PropertyValue::Text(s) if !s.trim().is_empty() => Some(s.clone()),
        PropertyValue::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn number_property(props: &Properties, key: &str) -> Result<Option<f64>> {
    match props.get(key) {
        None | Some(PropertyValue::Null) => Ok(None),
        Some(PropertyValue::Number(n)) => Ok(Some(*n)),
        Some(PropertyValue::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(PropertyValue::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| GeoError::validation(key, format!("`{}` is not a number", s))),
        Some(_) => Err(GeoError::validation(key, "must be a number")),
    }
}

impl ImportFeature {
    /// Derive creation attributes; `category`/`layer_group` win over properties.
    pub fn to_new_polygon(
        &self,
        layer_group: Option<&str>,
        category: Option<&str>,
    ) -> Result<NewPolygon> {
        let props = self.properties.clone().unwrap_or_default();
        Ok(NewPolygon {
            name: Some(text_property(&props, "name").unwrap_or_else(|| UNNAMED.to_string())),
            description: None,
            geometry: self.geometry.clone(),
            value: number_property(&props, "value")?,
            unit: text_property(&props, "unit"),
            category: category
                .map(str::to_string)
                .or_else(|| text_property(&props, "category")),
            layer_group: layer_group
                .map(str::to_string)
                .or_else(|| text_property(&props, "layerGroup")),
            fill_color: text_property(&props, "fillColor"),
            border_color: text_property(&props, "borderColor"),
            properties: Some(props),
        })
    }
}

impl GeoDB {
    /// Import every feature or none.
    ///
    /// A rejected feature fails the batch with [`GeoError::BatchFeature`]
    /// carrying its 1-based position.
    pub fn import_polygons(&self, request: &ImportRequest) -> Result<ImportSummary> {
        let layer_group = non_blank(request.layer_group.as_deref());
        let category = non_blank(request.category.as_deref());
        let now = Utc::now();

        let mut batch = WriteBatch::with_capacity(request.features.len());
        let mut ids = Vec::with_capacity(request.features.len());
        for (index, feature) in request.features.iter().enumerate() {
            let record = feature
                .to_new_polygon(layer_group, category)
                .and_then(|attrs| attrs.into_feature(FeatureId::new(), now))
                .and_then(|polygon| Record::polygon(&polygon))
                .map_err(|e| {
                    warn!(position = index + 1, error = %e, "import rejected");
                    GeoError::BatchFeature {
                        position: index + 1,
                        source: Box::new(e),
                    }
                })?;
            ids.push(record.id());
            batch.insert(record);
        }

        self.backend.commit(batch)?;
        info!(
            count = ids.len(),
            layer_group = ?layer_group,
            category = ?category,
            "polygons imported"
        );
        Ok(ImportSummary {
            count: ids.len(),
            ids,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    fn square(offset: f64) -> serde_json::Value {
        json!({"type": "Polygon", "coordinates": [[
            [offset, offset], [offset + 1.0, offset], [offset + 1.0, offset + 1.0],
            [offset, offset + 1.0], [offset, offset]
        ]]})
    }

    fn feature(geometry: serde_json::Value, props: serde_json::Value) -> ImportFeature {
        serde_json::from_value(json!({"type": "Feature", "geometry": geometry, "properties": props}))
            .unwrap()
    }

    #[test]
    fn test_derives_fields_with_batch_override() {
        let db = GeoDB::in_memory().unwrap();
        let request = ImportRequest::new(vec![
            feature(
                square(0.0),
                json!({"name": "Gallatin", "value": 12.5, "unit": "ppl/km2",
                       "category": "county", "layerGroup": "ignored", "fillColor": "#f00"}),
            ),
            feature(square(5.0), json!({"category": "county"})),
        ])
        .with_layer_group("montana");

        let summary = db.import_polygons(&request).unwrap();
        assert_eq!(summary.count, 2);

        let first = db.get_polygon(&summary.ids[0]).unwrap();
        assert_eq!(first.name, "Gallatin");
        assert_eq!(first.value, Some(12.5));
        assert_eq!(first.unit.as_deref(), Some("ppl/km2"));
        assert_eq!(first.category.as_deref(), Some("county"));
        assert_eq!(first.layer_group.as_deref(), Some("montana"));
        assert_eq!(first.fill_color.as_deref(), Some("#f00"));
        assert_eq!(first.properties["name"].as_str(), Some("Gallatin"));

        let second = db.get_polygon(&summary.ids[1]).unwrap();
        assert_eq!(second.name, "Unnamed Polygon");
        assert_eq!(second.layer_group.as_deref(), Some("montana"));
    }

    #[test]
    fn test_missing_properties_default_to_empty() {
        let db = GeoDB::in_memory().unwrap();
        let request = ImportRequest::new(vec![ImportFeature {
            geometry: Some(square(0.0)),
            properties: None,
        }])
        .with_category("parcel");
        let summary = db.import_polygons(&request).unwrap();
        let polygon = db.get_polygon(&summary.ids[0]).unwrap();
        assert!(polygon.properties.is_empty());
        assert_eq!(polygon.category.as_deref(), Some("parcel"));
    }

    #[test]
    fn test_bad_second_feature_commits_nothing() {
        let db = GeoDB::in_memory().unwrap();
        let unclosed = json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]]});
        let request = ImportRequest::new(vec![
            feature(square(0.0), json!({"name": "one"})),
            feature(unclosed, json!({"name": "two"})),
            feature(square(2.0), json!({"name": "three"})),
        ]);

        let err = db.import_polygons(&request).unwrap_err();
        assert!(matches!(err, GeoError::BatchFeature { position: 2, .. }));
        assert_eq!(err.kind(), ErrorKind::Geometry);
        assert_eq!(db.stats().polygons, 0);
    }

    #[test]
    fn test_blank_properties_fall_back_to_defaults() {
        let db = GeoDB::in_memory().unwrap();
        let request = ImportRequest::new(vec![feature(
            square(0.0),
            json!({"name": "   ", "category": " ", "unit": "\t", "value": "  ", "layerGroup": ""}),
        )]);

        let summary = db.import_polygons(&request).unwrap();
        let polygon = db.get_polygon(&summary.ids[0]).unwrap();
        assert_eq!(polygon.name, "Unnamed Polygon");
        assert_eq!(polygon.category, None);
        assert_eq!(polygon.unit, None);
        assert_eq!(polygon.value, None);
        assert_eq!(polygon.layer_group, None);
        assert_eq!(polygon.properties["name"].as_str(), Some("   "));
    }

    #[test]
    fn test_non_numeric_value_rejected() {
        let db = GeoDB::in_memory().unwrap();
        let request = ImportRequest::new(vec![feature(square(0.0), json!({"value": true}))]);
        let err = db.import_polygons(&request).unwrap_err();
        assert!(matches!(err, GeoError::BatchFeature { position: 1, .. }));
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_empty_batch() {
        let db = GeoDB::in_memory().unwrap();
        let summary = db.import_polygons(&ImportRequest::default()).unwrap();
        assert_eq!(summary.count, 0);
    }
}
