//! Query layer
//!
//! Typed, validated query parameter sets and the result sequence returned by
//! every list-shaped operation.

pub mod params;
pub mod result;

pub use params::{
    BoundsQuery, ByIdQuery, ContainsPointQuery, LabelQuery, RadiusQuery, RawParams,
    ValueRangeQuery,
};
pub use result::{FeatureStream, Nearby};
