//! Change log (write-ahead delta log)
//!
//! Synchronous commits append the rows they produced here instead of
//! rewriting the whole snapshot. The log is folded back into the snapshot by
//! compaction (flush, close, or size threshold).
//!
//! # File format
//! ```text
//! ┌──────────────────────────────┬──────────────────────────────┬───
//! │ frame: len | bincode | crc32 │ frame: len | bincode | crc32 │ ...
//! └──────────────────────────────┴──────────────────────────────┴───
//! ```
//!
//! ## Checksum Protection
//! - Every frame carries a CRC32 (see [`Checksum`])
//! - A torn or corrupt frame ends replay; it and everything after it is
//!   dropped, since a commit only returns once its frame is synced
//!
//! Replay is idempotent: a `Put` carries the full stored row and a `Remove`
//! of an absent row is a no-op, so replaying a log over a snapshot that
//! already contains it is harmless.

use super::checksum::Checksum;
use super::record::StoredRecord;
use crate::types::{Collection, FeatureId};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const LOG_FILE: &str = "features.wal";

/// Frame header (u64 length) plus trailer (u32 crc)
const FRAME_OVERHEAD: usize = 12;

/// Net effect of one committed batch on one row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LogChange {
    Put(StoredRecord),
    Remove(Collection, FeatureId),
}

/// One committed batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub next_seq: u64,
    pub changes: Vec<LogChange>,
}

pub fn log_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE)
}

/// Append handle over the change log file
#[derive(Debug)]
pub struct ChangeLog {
    path: PathBuf,
    /// Length of the valid prefix of the file
    bytes: u64,
    entries: u64,
}

impl ChangeLog {
    /// Read every intact entry, truncating a torn tail.
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, Vec<LogEntry>)> {
        let path = path.into();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let (entries, valid) = parse_frames(&data);
        if valid < data.len() {
            warn!(
                path = %path.display(),
                valid_bytes = valid,
                dropped_bytes = data.len() - valid,
                "discarding torn change log tail"
            );
            OpenOptions::new()
                .write(true)
                .open(&path)?
                .set_len(valid as u64)?;
        }

        let log = Self {
            path,
            bytes: valid as u64,
            entries: entries.len() as u64,
        };
        Ok((log, entries))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes
    }

    pub fn entry_count(&self) -> u64 {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Append one entry; with `sync`, it is on disk when this returns.
    ///
    /// On failure the file is cut back to its previous length so later
    /// appends never land behind a partial frame.
    pub fn append(&mut self, entry: &LogEntry, sync: bool) -> Result<()> {
        let payload = bincode::serialize(entry)?;
        let frame = Checksum::encode_with_checksum(&payload);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let written = file
            .write_all(&frame)
            .and_then(|()| if sync { file.sync_data() } else { Ok(()) });
        if let Err(e) = written {
            if let Err(trim) = file.set_len(self.bytes) {
                warn!(error = %trim, "failed to trim change log after a failed append");
            }
            return Err(e.into());
        }

        self.bytes += frame.len() as u64;
        self.entries += 1;
        debug!(bytes = frame.len(), changes = entry.changes.len(), "change log appended");
        Ok(())
    }

    /// Empty the log once its entries are in the snapshot
    pub fn reset(&mut self, sync: bool) -> Result<()> {
        if self.bytes == 0 && !self.path.exists() {
            return Ok(());
        }
        let file = File::create(&self.path)?;
        if sync {
            file.sync_all()?;
        }
        self.bytes = 0;
        self.entries = 0;
        Ok(())
    }
}

/// Decode consecutive frames; returns the entries and the valid prefix length.
fn parse_frames(data: &[u8]) -> (Vec<LogEntry>, usize) {
    let mut entries = Vec::new();
    let mut offset = 0;
    while data.len() - offset >= FRAME_OVERHEAD {
        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&data[offset..offset + 8]);
        let Some(end) = usize::try_from(u64::from_le_bytes(len_bytes))
            .ok()
            .and_then(|len| len.checked_add(FRAME_OVERHEAD))
            .and_then(|frame_len| offset.checked_add(frame_len))
            .filter(|end| *end <= data.len())
        else {
            break;
        };

        let entry = Checksum::decode_with_checksum(&data[offset..end])
            .ok()
            .and_then(|payload| bincode::deserialize::<LogEntry>(payload).ok());
        match entry {
            Some(entry) => {
                entries.push(entry);
                offset = end;
            }
            None => break,
        }
    }
    (entries, offset)
}
