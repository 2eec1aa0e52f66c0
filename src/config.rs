//! Store configuration and durability levels
//!
//! Provides configuration options for balancing write latency and safety.

use crate::index::GridConfig;
use crate::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_LOG_COMPACT_BYTES: u64 = 4 * 1024 * 1024;

/// Durability level
///
/// Trade-off between data safety and write throughput:
/// - Synchronous: each commit appends its changed rows to the change log and
///   fsyncs it, O(batch) per commit
/// - NoSync: changes reach disk only on `flush()` or close
///
/// In both modes the full snapshot is rewritten only on compaction: `flush()`,
/// close, or once the log passes [`StoreConfig::log_compact_bytes`]. A
/// compaction serializes every row while holding the write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DurabilityLevel {
    /// Log within each commit. A failed append rolls the commit back,
    /// so a returned `Ok` means the change is on disk.
    #[default]
    Synchronous,

    /// Keep changes in memory until `flush()` or close (tests, bulk loads)
    NoSync,
}

impl DurabilityLevel {
    pub fn requires_immediate_sync(&self) -> bool {
        matches!(self, Self::Synchronous)
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Synchronous => "synchronous (log every commit)",
            Self::NoSync => "no-sync (persist on flush only)",
        }
    }
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding `features.snap` and `features.wal`. `None` keeps the
    /// store in memory.
    pub data_dir: Option<PathBuf>,

    pub durability: DurabilityLevel,

    /// Expose the backend's indexed spatial capability.
    ///
    /// `false` routes every spatial query through the full-scan
    /// predicate fallback.
    pub native_spatial: bool,

    /// Grid layout for the point and polygon indexes
    pub spatial_index: GridConfig,

    /// Change log size (bytes) that triggers compaction into the snapshot
    pub log_compact_bytes: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            durability: DurabilityLevel::default(),
            native_spatial: true,
            spatial_index: GridConfig::default(),
            log_compact_bytes: DEFAULT_LOG_COMPACT_BYTES,
        }
    }
}

impl StoreConfig {
    /// In-memory store with the native spatial path
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// On-disk store rooted at `dir`, synchronous durability
    pub fn persistent(dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(dir.into()),
            ..Default::default()
        }
    }

    /// Small grid, no fsync
    pub fn for_testing() -> Self {
        Self {
            durability: DurabilityLevel::NoSync,
            spatial_index: GridConfig::default().with_grid_size(16),
            ..Default::default()
        }
    }

    /// In-memory store without the spatial capability
    pub fn fallback_only() -> Self {
        Self {
            native_spatial: false,
            ..Self::for_testing()
        }
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_durability(mut self, durability: DurabilityLevel) -> Self {
        self.durability = durability;
        self
    }

    pub fn with_log_compact_bytes(mut self, bytes: u64) -> Self {
        self.log_compact_bytes = bytes;
        self
    }

    /// Load a JSON config file; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let wb = &self.spatial_index.world_bounds;
        if !(wb.min_x < wb.max_x && wb.min_y < wb.max_y) {
            return Err(GeoError::validation(
                "spatial_index.world_bounds",
                "must have min < max on both axes",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;
    use std::io::Write;

    #[test]
    fn test_durability_levels() {
        assert!(DurabilityLevel::Synchronous.requires_immediate_sync());
        assert!(!DurabilityLevel::NoSync.requires_immediate_sync());
        assert_eq!(DurabilityLevel::default(), DurabilityLevel::Synchronous);
    }

    #[test]
    fn test_config_presets() {
        assert!(StoreConfig::in_memory().data_dir.is_none());
        assert!(StoreConfig::in_memory().native_spatial);

        let persistent = StoreConfig::persistent("/tmp/geo");
        assert_eq!(persistent.data_dir, Some(PathBuf::from("/tmp/geo")));
        assert_eq!(persistent.durability, DurabilityLevel::Synchronous);

        assert_eq!(StoreConfig::for_testing().durability, DurabilityLevel::NoSync);
        assert!(!StoreConfig::fallback_only().native_spatial);
    }

    #[test]
    fn test_from_json_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"durability": "NoSync", "native_spatial": false}}"#).unwrap();

        let config = StoreConfig::from_json_file(file.path()).unwrap();
        assert_eq!(config.durability, DurabilityLevel::NoSync);
        assert!(!config.native_spatial);
        assert_eq!(config.spatial_index, GridConfig::default());
    }

    #[test]
    fn test_degenerate_world_bounds_rejected() {
        let config = StoreConfig {
            spatial_index: GridConfig::new(BoundingBox::new(10.0, 0.0, 10.0, 5.0)),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
