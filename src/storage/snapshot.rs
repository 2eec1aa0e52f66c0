//! Snapshot file persistence
//!
//! # File format
//! ```text
//! ┌───────────┬──────────────┬──────────────────────────────────────────┐
//! │ magic (4) │ version (u32)│ checksum frame: len | bincode | crc32    │
//! └───────────┴──────────────┴──────────────────────────────────────────┘
//! ```
//!
//! # Write protocol
//! 1. Serialize the full state and write `features.snap.tmp`
//! 2. fsync the temp file (synchronous durability)
//! 3. rename over `features.snap` (atomic commit point)
//! 4. fsync the parent directory so the rename itself is durable
//!
//! A crash at any step leaves either the old or the new snapshot in place.
//! Commits between snapshots live in the change log (see [`super::wal`]).

use super::checksum::Checksum;
use super::record::StoredRecord;
use crate::{GeoError, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

pub const SNAPSHOT_FILE: &str = "features.snap";
const MAGIC: &[u8; 4] = b"GEOS";
const FORMAT_VERSION: u32 = 1;

/// Everything needed to restore a store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotData {
    pub next_seq: u64,
    pub points: Vec<StoredRecord>,
    pub polygons: Vec<StoredRecord>,
}

pub fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

/// Atomically replace the snapshot at `path`.
pub fn write(path: &Path, data: &SnapshotData, sync: bool) -> Result<()> {
    let payload = bincode::serialize(data)?;
    let frame = Checksum::encode_with_checksum(&payload);

    let temp_path = path.with_extension("snap.tmp");
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(MAGIC)?;
        file.write_all(&FORMAT_VERSION.to_le_bytes())?;
        file.write_all(&frame)?;
        if sync {
            file.sync_all()?;
        }
    }

    fs::rename(&temp_path, path)?;

    if sync && cfg!(unix) {
        if let Some(parent) = path.parent() {
            File::open(parent)?.sync_all()?;
        }
    }

    tracing::debug!(
        path = %path.display(),
        bytes = frame.len() + 8,
        points = data.points.len(),
        polygons = data.polygons.len(),
        "snapshot written"
    );
    Ok(())
}

/// Read the snapshot at `path`; `Ok(None)` if there is none yet.
pub fn read(path: &Path) -> Result<Option<SnapshotData>> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if bytes.len() < 8 || &bytes[..4] != MAGIC {
        return Err(GeoError::Corruption(format!(
            "{} is not a snapshot file",
            path.display()
        )));
    }
    let mut version = [0u8; 4];
    version.copy_from_slice(&bytes[4..8]);
    let version = u32::from_le_bytes(version);
    if version != FORMAT_VERSION {
        return Err(GeoError::Corruption(format!(
            "unsupported snapshot version {} (expected {})",
            version, FORMAT_VERSION
        )));
    }

    let payload = Checksum::decode_with_checksum(&bytes[8..])?;
    let data: SnapshotData = bincode::deserialize(payload)?;
    Ok(Some(data))
}
