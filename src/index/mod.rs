//! Index layer implementation
//!
//! Bounding-box grid index used by the embedded backend's native spatial path

pub mod spatial_grid;

pub use spatial_grid::{GridConfig, GridIndex, GridStats};
