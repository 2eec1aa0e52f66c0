//! Storage port and the embedded backend
//!
//! The database layer talks to storage only through [`StorageBackend`]. A
//! backend may additionally expose [`SpatialCapability`]; when it does not,
//! spatial queries fall back to the predicate engine over a full scan.
//! Both paths must return identical results.

pub mod checksum;
pub mod embedded;
pub mod record;
pub mod snapshot;
pub mod wal;

pub use checksum::{Checksum, ChecksumError};
pub use embedded::EmbeddedBackend;
pub use record::{PolygonRecord, Record, StoredRecord};
pub use wal::{ChangeLog, LogChange, LogEntry};

use crate::predicate::Bounds;
use crate::types::{Collection, Coord, FeatureId};
use crate::Result;

/// One mutation inside a [`WriteBatch`]
#[derive(Debug, Clone)]
pub enum WriteOp {
    /// Add a new row; fails with `Conflict` if the id already exists
    Insert(Record),

    /// Overwrite an existing row. With `expected_version`, fails with
    /// `Conflict` unless the stored version still matches.
    Replace {
        record: Record,
        expected_version: Option<u64>,
    },

    /// Hard-delete a row
    Delete {
        collection: Collection,
        id: FeatureId,
        expected_version: Option<u64>,
    },
}

impl WriteOp {
    pub fn collection(&self) -> Collection {
        match self {
            WriteOp::Insert(record) | WriteOp::Replace { record, .. } => record.collection(),
            WriteOp::Delete { collection, .. } => *collection,
        }
    }
}

/// Ordered set of writes applied all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    pub fn insert(&mut self, record: Record) -> &mut Self {
        self.ops.push(WriteOp::Insert(record));
        self
    }

    pub fn replace(&mut self, record: Record, expected_version: Option<u64>) -> &mut Self {
        self.ops.push(WriteOp::Replace {
            record,
            expected_version,
        });
        self
    }

    pub fn delete(
        &mut self,
        collection: Collection,
        id: FeatureId,
        expected_version: Option<u64>,
    ) -> &mut Self {
        self.ops.push(WriteOp::Delete {
            collection,
            id,
            expected_version,
        });
        self
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[WriteOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<WriteOp> {
        self.ops
    }
}

/// Read-modify-write callback for [`StorageBackend::update_with`]
pub type UpdateFn<'a> = &'a mut dyn FnMut(&Record) -> Result<Record>;

/// Transactional row storage for both collections
pub trait StorageBackend: Send + Sync {
    fn get(&self, collection: Collection, id: &FeatureId) -> Result<Option<StoredRecord>>;

    /// All rows of `collection` in insertion order
    fn scan(&self, collection: Collection) -> Result<Vec<StoredRecord>>;

    /// Apply every op or none of them
    fn commit(&self, batch: WriteBatch) -> Result<()>;

    /// Atomically replace a row with `f(current)`.
    ///
    /// Concurrent calls on the same id are serialized; each sees the result
    /// of the previous one. `NotFound` if the row does not exist.
    fn update_with(
        &self,
        collection: Collection,
        id: &FeatureId,
        f: UpdateFn<'_>,
    ) -> Result<StoredRecord>;

    /// Make all committed changes durable
    fn flush(&self) -> Result<()>;

    fn len(&self, collection: Collection) -> usize;

    /// Indexed spatial predicates, if this backend has them
    fn spatial(&self) -> Option<&dyn SpatialCapability>;
}

/// Indexed spatial predicates with the same semantics as [`crate::predicate`]
pub trait SpatialCapability: Send + Sync {
    /// Points inside `bounds`, insertion order
    fn points_in_bounds(&self, bounds: &Bounds) -> Result<Vec<StoredRecord>>;

    /// Points strictly within `radius_km`, nearest first (ties by insertion)
    fn points_within_radius(&self, center: &Coord, radius_km: f64)
        -> Result<Vec<(StoredRecord, f64)>>;

    /// Polygons whose interior contains `point`, insertion order
    fn polygons_containing(&self, point: &Coord) -> Result<Vec<StoredRecord>>;
}
