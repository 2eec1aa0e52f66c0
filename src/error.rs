//! Error types for the geostore feature store

use crate::codec::GeometryError;
use crate::types::{Collection, FeatureId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, GeoError>;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Invalid `{field}`: {reason}")]
    Validation { field: String, reason: String },

    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    #[error("{collection} {id} not found")]
    NotFound { collection: Collection, id: FeatureId },

    #[error("Write conflict on {collection} {id}: {reason}")]
    Conflict {
        collection: Collection,
        id: FeatureId,
        reason: String,
    },

    /// A batch import rejected as a whole; `position` is 1-based.
    #[error("Feature #{position} rejected: {source}")]
    BatchFeature {
        position: usize,
        #[source]
        source: Box<GeoError>,
    },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Data corruption: {0}")]
    Corruption(String),
}

/// Coarse failure classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Geometry,
    NotFound,
    Conflict,
    StoreUnavailable,
}

impl GeoError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        GeoError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn not_found(collection: Collection, id: FeatureId) -> Self {
        GeoError::NotFound { collection, id }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoError::Validation { .. } => ErrorKind::Validation,
            GeoError::Geometry(_) => ErrorKind::Geometry,
            GeoError::NotFound { .. } => ErrorKind::NotFound,
            GeoError::Conflict { .. } => ErrorKind::Conflict,
            GeoError::BatchFeature { source, .. } => source.kind(),
            GeoError::StoreUnavailable(_)
            | GeoError::Io(_)
            | GeoError::Serialization(_)
            | GeoError::Corruption(_) => ErrorKind::StoreUnavailable,
        }
    }
}

impl From<bincode::Error> for GeoError {
    fn from(err: bincode::Error) -> Self {
        GeoError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for GeoError {
    fn from(err: serde_json::Error) -> Self {
        GeoError::Serialization(err.to_string())
    }
}
