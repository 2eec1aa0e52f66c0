//! Embedded storage backend
//!
//! # Architecture
//! ```text
//! ┌──────────────────── RwLock<State> ────────────────────┐
//! │  points:   rows (id → Row) │ order (seq → id) │ grid  │
//! │  polygons: rows (id → Row) │ order (seq → id) │ grid  │
//! │  next_seq, dirty                                      │
//! └───────────────────────────┬───────────────────────────┘
//!                             │
//!              commit (Synchronous)    flush / close / log over threshold
//!                             ▼                       ▼
//!                 features.wal (append)  ──►  features.snap (atomic rename)
//! ```
//!
//! Readers share the lock; every write path takes it exclusively for the
//! whole apply + persist step, which gives per-row atomicity and
//! last-committed-wins ordering. Each applied op records an undo entry, so a
//! failing op or a failing log append restores the previous state.
//! Opening loads the snapshot, then replays the change log over it.

use super::record::{point_bbox, Record, StoredRecord};
use super::snapshot::{self, SnapshotData};
use super::wal::{self, ChangeLog, LogChange, LogEntry};
use super::{SpatialCapability, StorageBackend, UpdateFn, WriteBatch, WriteOp};
use crate::codec;
use crate::config::StoreConfig;
use crate::index::{GridConfig, GridIndex, GridStats};
use crate::predicate::{self, Bounds};
use crate::types::{BoundingBox, Collection, Coord, FeatureId, Geometry};
use crate::{GeoError, Result};
use ahash::{AHashMap, AHashSet};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

struct Row {
    stored: StoredRecord,
    /// Decoded polygon geometry; `None` for points
    geometry: Option<Geometry>,
}

impl Row {
    fn decode(stored: StoredRecord) -> Result<Self> {
        let geometry = match &stored.record {
            Record::Point(point) => {
                point.validate()?;
                None
            }
            Record::Polygon(polygon) => Some(codec::decode_text(&polygon.geometry)?),
        };
        Ok(Self { stored, geometry })
    }

    fn bbox(&self) -> Option<BoundingBox> {
        match &self.stored.record {
            Record::Point(point) => Some(point_bbox(point)),
            Record::Polygon(_) => self.geometry.as_ref().and_then(Geometry::bounding_box),
        }
    }

    fn id(&self) -> FeatureId {
        self.stored.id()
    }
}

struct Table {
    rows: AHashMap<FeatureId, Row>,
    order: BTreeMap<u64, FeatureId>,
    index: GridIndex,
}

impl Table {
    fn new(config: GridConfig) -> Self {
        Self {
            rows: AHashMap::new(),
            order: BTreeMap::new(),
            index: GridIndex::new(config),
        }
    }

    /// Insert or overwrite
    fn put(&mut self, row: Row) -> Option<Row> {
        let id = row.id();
        let seq = row.stored.seq;
        if let Some(bbox) = row.bbox() {
            self.index.insert(id, bbox);
        }
        self.order.insert(seq, id);
        let previous = self.rows.insert(id, row);
        if let Some(prev) = &previous {
            if prev.stored.seq != seq {
                self.order.remove(&prev.stored.seq);
            }
        }
        previous
    }

    fn take(&mut self, id: &FeatureId) -> Option<Row> {
        let row = self.rows.remove(id)?;
        self.order.remove(&row.stored.seq);
        self.index.remove(id);
        Some(row)
    }

    fn get(&self, id: &FeatureId) -> Option<&Row> {
        self.rows.get(id)
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn rows_in_order(&self) -> impl Iterator<Item = &Row> + '_ {
        self.order.values().filter_map(|id| self.rows.get(id))
    }

    fn scan(&self) -> Vec<StoredRecord> {
        self.rows_in_order().map(|r| r.stored.clone()).collect()
    }

    /// Candidate rows for `boxes`, in insertion order
    fn candidates(&self, boxes: &[BoundingBox]) -> Vec<&Row> {
        let mut rows: Vec<&Row> = self
            .index
            .range_query_many(boxes)
            .iter()
            .filter_map(|id| self.rows.get(id))
            .collect();
        rows.sort_by_key(|r| r.stored.seq);
        rows
    }
}

struct State {
    points: Table,
    polygons: Table,
    next_seq: u64,
    /// Committed changes not yet in the snapshot file
    dirty: bool,
}

enum Undo {
    Inserted(Collection, FeatureId),
    Replaced(Collection, Row),
    Deleted(Collection, Row),
}

impl State {
    fn new(grid: &GridConfig) -> Self {
        Self {
            points: Table::new(grid.clone()),
            polygons: Table::new(grid.clone()),
            next_seq: 0,
            dirty: false,
        }
    }

    fn table(&self, collection: Collection) -> &Table {
        match collection {
            Collection::Points => &self.points,
            Collection::Polygons => &self.polygons,
        }
    }

    fn table_mut(&mut self, collection: Collection) -> &mut Table {
        match collection {
            Collection::Points => &mut self.points,
            Collection::Polygons => &mut self.polygons,
        }
    }

    fn to_snapshot(&self) -> SnapshotData {
        SnapshotData {
            next_seq: self.next_seq,
            points: self.points.scan(),
            polygons: self.polygons.scan(),
        }
    }

    fn restore(&mut self, data: SnapshotData) -> Result<()> {
        let mut max_seq = None;
        for stored in data.points.into_iter().chain(data.polygons) {
            let id = stored.id();
            let collection = stored.record.collection();
            max_seq = max_seq.max(Some(stored.seq));
            let row = Row::decode(stored)
                .map_err(|e| GeoError::Corruption(format!("{} {}: {}", collection, id, e)))?;
            self.table_mut(collection).put(row);
        }
        self.next_seq = data.next_seq.max(max_seq.map_or(0, |s| s + 1));
        Ok(())
    }

    fn replay(&mut self, entry: LogEntry) -> Result<()> {
        for change in entry.changes {
            match change {
                LogChange::Put(stored) => {
                    let id = stored.id();
                    let collection = stored.record.collection();
                    let row = Row::decode(stored).map_err(|e| {
                        GeoError::Corruption(format!("logged {} {}: {}", collection, id, e))
                    })?;
                    self.table_mut(collection).put(row);
                }
                LogChange::Remove(collection, id) => {
                    self.table_mut(collection).take(&id);
                }
            }
        }
        self.next_seq = self.next_seq.max(entry.next_seq);
        Ok(())
    }

    /// Net effect of the ops recorded in `undo`, in first-touch order
    fn changes(&self, undo: &[Undo]) -> Vec<LogChange> {
        let mut seen = AHashSet::with_capacity(undo.len());
        let mut changes = Vec::with_capacity(undo.len());
        for entry in undo {
            let key = match entry {
                Undo::Inserted(collection, id) => (*collection, *id),
                Undo::Replaced(collection, row) | Undo::Deleted(collection, row) => {
                    (*collection, row.id())
                }
            };
            if !seen.insert(key) {
                continue;
            }
            let (collection, id) = key;
            changes.push(match self.table(collection).get(&id) {
                Some(row) => LogChange::Put(row.stored.clone()),
                None => LogChange::Remove(collection, id),
            });
        }
        changes
    }

    fn apply(&mut self, op: WriteOp, undo: &mut Vec<Undo>) -> Result<()> {
        match op {
            WriteOp::Insert(record) => {
                let collection = record.collection();
                let id = record.id();
                if self.table(collection).get(&id).is_some() {
                    return Err(GeoError::Conflict {
                        collection,
                        id,
                        reason: "id already exists".to_string(),
                    });
                }
                let row = Row::decode(StoredRecord {
                    seq: self.next_seq,
                    version: 1,
                    record,
                })?;
                self.table_mut(collection).put(row);
                self.next_seq += 1;
                undo.push(Undo::Inserted(collection, id));
            }
            WriteOp::Replace {
                record,
                expected_version,
            } => {
                let collection = record.collection();
                let id = record.id();
                let current = self.current(collection, &id, expected_version)?;
                let row = Row::decode(StoredRecord {
                    seq: current.seq,
                    version: current.version + 1,
                    record,
                })?;
                if let Some(previous) = self.table_mut(collection).put(row) {
                    undo.push(Undo::Replaced(collection, previous));
                }
            }
            WriteOp::Delete {
                collection,
                id,
                expected_version,
            } => {
                self.current(collection, &id, expected_version)?;
                if let Some(previous) = self.table_mut(collection).take(&id) {
                    undo.push(Undo::Deleted(collection, previous));
                }
            }
        }
        Ok(())
    }

    /// Existing row's bookkeeping, checked against `expected_version`
    fn current(
        &self,
        collection: Collection,
        id: &FeatureId,
        expected_version: Option<u64>,
    ) -> Result<StoredRecord> {
        let row = self
            .table(collection)
            .get(id)
            .ok_or_else(|| GeoError::not_found(collection, *id))?;
        if let Some(expected) = expected_version {
            if row.stored.version != expected {
                return Err(GeoError::Conflict {
                    collection,
                    id: *id,
                    reason: format!(
                        "expected version {}, found {}",
                        expected, row.stored.version
                    ),
                });
            }
        }
        Ok(StoredRecord {
            seq: row.stored.seq,
            version: row.stored.version,
            record: row.stored.record.clone(),
        })
    }

    fn rollback(&mut self, undo: Vec<Undo>, next_seq: u64) {
        for entry in undo.into_iter().rev() {
            let (collection, previous) = match entry {
                Undo::Inserted(collection, id) => {
                    self.table_mut(collection).take(&id);
                    continue;
                }
                Undo::Replaced(collection, previous) => {
                    self.table_mut(collection).take(&previous.id());
                    (collection, previous)
                }
                Undo::Deleted(collection, previous) => (collection, previous),
            };
            self.table_mut(collection).put(previous);
        }
        self.next_seq = next_seq;
    }
}

/// In-process backend: hash tables + grid indexes, optionally persisted to a
/// snapshot file plus change log
pub struct EmbeddedBackend {
    state: RwLock<State>,
    snapshot_path: Option<PathBuf>,
    /// Only locked while holding the state write lock
    log: Option<Mutex<ChangeLog>>,
    config: StoreConfig,
}

impl EmbeddedBackend {
    /// Open (or create) a backend; restores the snapshot if `data_dir` has one.
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;

        let snapshot_path = match &config.data_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir).map_err(|e| {
                    GeoError::StoreUnavailable(format!("cannot create {}: {}", dir.display(), e))
                })?;
                Some(snapshot::snapshot_path(dir))
            }
            None => None,
        };

        let mut state = State::new(&config.spatial_index);
        let mut log = None;
        if let (Some(path), Some(dir)) = (&snapshot_path, &config.data_dir) {
            if let Some(data) = snapshot::read(path)? {
                state.restore(data)?;
                info!(
                    path = %path.display(),
                    points = state.points.len(),
                    polygons = state.polygons.len(),
                    "snapshot loaded"
                );
            }

            let (change_log, entries) = ChangeLog::open(wal::log_path(dir))?;
            if !entries.is_empty() {
                let replayed = entries.len();
                for entry in entries {
                    state.replay(entry)?;
                }
                info!(entries = replayed, "change log replayed");
            }
            log = Some(Mutex::new(change_log));
        }

        info!(
            data_dir = ?config.data_dir,
            durability = config.durability.description(),
            native_spatial = config.native_spatial,
            "embedded backend opened"
        );

        Ok(Self {
            state: RwLock::new(state),
            snapshot_path,
            log,
            config,
        })
    }

    pub fn in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.snapshot_path.as_deref()
    }

    pub fn index_stats(&self, collection: Collection) -> GridStats {
        self.state.read().table(collection).index.stats()
    }

    /// Bytes in the change log not yet compacted into the snapshot
    pub fn log_size(&self) -> u64 {
        self.log.as_ref().map_or(0, |log| log.lock().size_bytes())
    }

    fn commit_locked(&self, state: &mut State, ops: Vec<WriteOp>) -> Result<()> {
        let next_seq = state.next_seq;
        let mut undo = Vec::with_capacity(ops.len());

        let applied = ops
            .into_iter()
            .try_for_each(|op| state.apply(op, &mut undo));
        let result = applied.and_then(|()| self.persist_locked(state, &undo));

        if let Err(e) = &result {
            let reverted = undo.len();
            state.rollback(undo, next_seq);
            warn!(error = %e, reverted, "commit rolled back");
        }
        result
    }

    fn persist_locked(&self, state: &mut State, undo: &[Undo]) -> Result<()> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        if !self.config.durability.requires_immediate_sync() {
            state.dirty = true;
            return Ok(());
        }

        let entry = LogEntry {
            next_seq: state.next_seq,
            changes: state.changes(undo),
        };
        let mut log = log.lock();
        log.append(&entry, true)?;

        if log.size_bytes() >= self.config.log_compact_bytes {
            // The commit is already durable in the log; a failed compaction
            // leaves the log in place and is retried on the next trigger.
            if let Err(e) = self.compact_locked(state, &mut log) {
                warn!(error = %e, "change log compaction failed");
            }
        }
        Ok(())
    }

    /// Fold the change log into a fresh snapshot
    fn compact_locked(&self, state: &mut State, log: &mut ChangeLog) -> Result<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let folded = log.size_bytes();
        snapshot::write(path, &state.to_snapshot(), true)?;
        log.reset(true)?;
        state.dirty = false;
        debug!(path = %path.display(), log_bytes = folded, "change log compacted");
        Ok(())
    }
}

impl StorageBackend for EmbeddedBackend {
    fn get(&self, collection: Collection, id: &FeatureId) -> Result<Option<StoredRecord>> {
        Ok(self
            .state
            .read()
            .table(collection)
            .get(id)
            .map(|r| r.stored.clone()))
    }

    fn scan(&self, collection: Collection) -> Result<Vec<StoredRecord>> {
        Ok(self.state.read().table(collection).scan())
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.len();
        let mut state = self.state.write();
        self.commit_locked(&mut state, batch.into_ops())?;
        debug!(ops, "commit applied");
        Ok(())
    }

    fn update_with(
        &self,
        collection: Collection,
        id: &FeatureId,
        f: UpdateFn<'_>,
    ) -> Result<StoredRecord> {
        let mut state = self.state.write();
        let current = state.current(collection, id, None)?;

        let next = f(&current.record)?;
        if next.collection() != collection || next.id() != *id {
            return Err(GeoError::validation(
                "id",
                "an update must not change the feature identity",
            ));
        }

        let op = WriteOp::Replace {
            record: next,
            expected_version: Some(current.version),
        };
        self.commit_locked(&mut state, vec![op])?;

        state
            .table(collection)
            .get(id)
            .map(|r| r.stored.clone())
            .ok_or_else(|| GeoError::not_found(collection, *id))
    }

    fn flush(&self) -> Result<()> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        let mut state = self.state.write();
        let mut log = log.lock();
        if state.dirty || !log.is_empty() {
            self.compact_locked(&mut state, &mut log)?;
        }
        Ok(())
    }

    fn len(&self, collection: Collection) -> usize {
        self.state.read().table(collection).len()
    }

    fn spatial(&self) -> Option<&dyn SpatialCapability> {
        if self.config.native_spatial {
            Some(self)
        } else {
            None
        }
    }
}

impl SpatialCapability for EmbeddedBackend {
    fn points_in_bounds(&self, bounds: &Bounds) -> Result<Vec<StoredRecord>> {
        let state = self.state.read();
        Ok(state
            .points
            .candidates(&bounds.index_boxes())
            .into_iter()
            .filter(|row| {
                row.stored
                    .record
                    .as_point()
                    .is_some_and(|p| bounds.contains(&p.coord()))
            })
            .map(|row| row.stored.clone())
            .collect())
    }

    fn points_within_radius(
        &self,
        center: &Coord,
        radius_km: f64,
    ) -> Result<Vec<(StoredRecord, f64)>> {
        let state = self.state.read();
        let boxes = predicate::radius_search_boxes(center, radius_km);

        // candidates() is in insertion order and the sort is stable, so
        // equal distances keep insertion order.
        let mut hits: Vec<(StoredRecord, f64)> = state
            .points
            .candidates(&boxes)
            .into_iter()
            .filter_map(|row| {
                let point = row.stored.record.as_point()?;
                let distance = predicate::haversine_km(center, &point.coord());
                (distance < radius_km).then(|| (row.stored.clone(), distance))
            })
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(hits)
    }

    fn polygons_containing(&self, point: &Coord) -> Result<Vec<StoredRecord>> {
        let state = self.state.read();
        Ok(state
            .polygons
            .candidates(&[BoundingBox::from_coord(*point)])
            .into_iter()
            .filter(|row| {
                row.geometry
                    .as_ref()
                    .is_some_and(|g| predicate::point_in_geometry(point, g))
            })
            .map(|row| row.stored.clone())
            .collect())
    }
}

impl Drop for EmbeddedBackend {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            warn!(error = %e, "failed to flush on close");
        }
    }
}
