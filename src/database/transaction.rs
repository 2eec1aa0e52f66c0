//! Optimistic multi-operation transactions
//!
//! A transaction buffers its writes and reads its own writes. The first read
//! of a stored row records that row's version; commit turns the buffered
//! state into one [`WriteBatch`] whose replaces and deletes carry those
//! versions. If another writer committed to any of those rows in between,
//! the whole batch fails with `Conflict` and nothing is applied.

use super::core::{point_from, polygon_from, wrong_collection, GeoDB};
use crate::storage::{Record, StoredRecord, WriteBatch};
use crate::types::{
    Collection, FeatureId, NewPoint, NewPolygon, PointFeature, PointPatch, PolygonFeature,
    PolygonPatch,
};
use crate::{GeoError, Result};
use ahash::{AHashMap, AHashSet};
use chrono::Utc;
use tracing::debug;

type Key = (Collection, FeatureId);

struct Entry {
    /// Version read from the store; `None` for rows created in this transaction
    base_version: Option<u64>,
    /// Buffered state; `None` once deleted
    current: Option<Record>,
}

/// Transaction statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionStats {
    pub tracked_rows: usize,
    pub pending_writes: usize,
}

/// Buffered transaction over a [`GeoDB`]. Dropping it discards every write.
pub struct Transaction<'db> {
    db: &'db GeoDB,
    entries: AHashMap<Key, Entry>,
    /// First-touch order, so the commit batch is deterministic
    touched: Vec<Key>,
    dirty: AHashSet<Key>,
}

impl GeoDB {
    /// Begin a transaction
    ///
    /// # Example
    /// ```ignore
    /// let mut txn = db.begin();
    /// let id = txn.create_point(NewPoint::new("Dock", 10.0, 20.0))?;
    /// txn.update_point(&other, &PointPatch::title("Moved"))?;
    /// txn.commit()?;
    /// ```
    pub fn begin(&self) -> Transaction<'_> {
        Transaction {
            db: self,
            entries: AHashMap::new(),
            touched: Vec::new(),
            dirty: AHashSet::new(),
        }
    }
}

impl<'db> Transaction<'db> {
    // ==================== Points ====================

    pub fn create_point(&mut self, attrs: NewPoint) -> Result<FeatureId> {
        let point = attrs.into_feature(FeatureId::new(), Utc::now())?;
        let id = point.id;
        self.stage_new(Record::Point(point));
        Ok(id)
    }

    pub fn get_point(&mut self, id: &FeatureId) -> Result<PointFeature> {
        let record = self.require(Collection::Points, id)?;
        point_from(detached(record))
    }

    pub fn update_point(&mut self, id: &FeatureId, patch: &PointPatch) -> Result<PointFeature> {
        let record = self.require(Collection::Points, id)?;
        let current = record
            .as_point()
            .ok_or_else(|| wrong_collection(Collection::Points, *id))?;
        let next = patch.apply(current, Utc::now())?;
        self.stage(Collection::Points, *id, Some(Record::Point(next.clone())));
        Ok(next)
    }

    pub fn delete_point(&mut self, id: &FeatureId) -> Result<()> {
        self.require(Collection::Points, id)?;
        self.stage(Collection::Points, *id, None);
        Ok(())
    }

    // ==================== Polygons ====================

    pub fn create_polygon(&mut self, attrs: NewPolygon) -> Result<FeatureId> {
        let polygon = attrs.into_feature(FeatureId::new(), Utc::now())?;
        let id = polygon.id;
        self.stage_new(Record::polygon(&polygon)?);
        Ok(id)
    }

    pub fn get_polygon(&mut self, id: &FeatureId) -> Result<PolygonFeature> {
        let record = self.require(Collection::Polygons, id)?;
        polygon_from(&detached(record))
    }

    pub fn update_polygon(&mut self, id: &FeatureId, patch: &PolygonPatch) -> Result<PolygonFeature> {
        let record = self.require(Collection::Polygons, id)?;
        let current = record
            .as_polygon()
            .ok_or_else(|| wrong_collection(Collection::Polygons, *id))?
            .to_feature()?;
        let next = patch.apply(&current, Utc::now())?;
        self.stage(Collection::Polygons, *id, Some(Record::polygon(&next)?));
        Ok(next)
    }

    pub fn delete_polygon(&mut self, id: &FeatureId) -> Result<()> {
        self.require(Collection::Polygons, id)?;
        self.stage(Collection::Polygons, *id, None);
        Ok(())
    }

    // ==================== Lifecycle ====================

    pub fn stats(&self) -> TransactionStats {
        TransactionStats {
            tracked_rows: self.entries.len(),
            pending_writes: self.dirty.len(),
        }
    }

    /// Apply every buffered write atomically
    pub fn commit(self) -> Result<()> {
        let batch = self.build_batch();
        let ops = batch.len();
        self.db.backend.commit(batch)?;
        debug!(ops, "transaction committed");
        Ok(())
    }

    /// Discard every buffered write
    pub fn rollback(self) {
        debug!(pending = self.dirty.len(), "transaction rolled back");
    }

    fn build_batch(&self) -> WriteBatch {
        let mut batch = WriteBatch::with_capacity(self.dirty.len());
        for key in self.touched.iter().filter(|k| self.dirty.contains(*k)) {
            let Some(entry) = self.entries.get(key) else {
                continue;
            };
            match (&entry.current, entry.base_version) {
                (Some(record), None) => {
                    batch.insert(record.clone());
                }
                (Some(record), Some(version)) => {
                    batch.replace(record.clone(), Some(version));
                }
                (None, Some(version)) => {
                    batch.delete(key.0, key.1, Some(version));
                }
                // created and deleted inside the transaction
                (None, None) => {}
            }
        }
        batch
    }

    /// Buffered or stored state of a row; `NotFound` if absent or deleted
    fn require(&mut self, collection: Collection, id: &FeatureId) -> Result<Record> {
        let key = (collection, *id);
        if !self.entries.contains_key(&key) {
            let stored = self
                .db
                .backend
                .get(collection, id)?
                .ok_or_else(|| GeoError::not_found(collection, *id))?;
            self.track(
                key,
                Entry {
                    base_version: Some(stored.version),
                    current: Some(stored.record),
                },
            );
        }
        self.entries
            .get(&key)
            .and_then(|e| e.current.clone())
            .ok_or_else(|| GeoError::not_found(collection, *id))
    }

    fn stage_new(&mut self, record: Record) {
        let key = (record.collection(), record.id());
        self.track(
            key,
            Entry {
                base_version: None,
                current: Some(record),
            },
        );
        self.dirty.insert(key);
    }

    fn stage(&mut self, collection: Collection, id: FeatureId, record: Option<Record>) {
        let key = (collection, id);
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.current = record;
            self.dirty.insert(key);
        }
    }

    fn track(&mut self, key: Key, entry: Entry) {
        if self.entries.insert(key, entry).is_none() {
            self.touched.push(key);
        }
    }
}

/// Wrap a buffered record for the shared decoding helpers
fn detached(record: Record) -> StoredRecord {
    StoredRecord {
        seq: 0,
        version: 0,
        record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_commit_applies_all_writes() {
        let db = GeoDB::in_memory().unwrap();
        let existing = db.create_point(NewPoint::new("old", 1.0, 1.0)).unwrap();

        let mut txn = db.begin();
        let created = txn.create_point(NewPoint::new("new", 2.0, 2.0)).unwrap();
        txn.update_point(&existing.id, &PointPatch::title("renamed")).unwrap();
        assert_eq!(txn.get_point(&existing.id).unwrap().title, "renamed");
        assert_eq!(db.get_point(&existing.id).unwrap().title, "old");
        assert_eq!(txn.stats().pending_writes, 2);
        txn.commit().unwrap();

        assert_eq!(db.get_point(&existing.id).unwrap().title, "renamed");
        assert_eq!(db.get_point(&created).unwrap().title, "new");
    }

    #[test]
    fn test_rollback_discards() {
        let db = GeoDB::in_memory().unwrap();
        let mut txn = db.begin();
        txn.create_point(NewPoint::new("ghost", 0.0, 0.0)).unwrap();
        txn.rollback();
        assert_eq!(db.stats().points, 0);
    }

    #[test]
    fn test_concurrent_writer_causes_conflict() {
        let db = GeoDB::in_memory().unwrap();
        let p = db.create_point(NewPoint::new("shared", 0.0, 0.0)).unwrap();

        let mut txn = db.begin();
        let side = txn.create_point(NewPoint::new("side effect", 0.0, 0.0)).unwrap();
        txn.update_point(&p.id, &PointPatch::title("from txn")).unwrap();

        db.update_point(&p.id, &PointPatch::title("from elsewhere")).unwrap();

        let err = txn.commit().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(db.get_point(&p.id).unwrap().title, "from elsewhere");
        assert_eq!(db.get_point(&side).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_delete_inside_transaction() {
        let db = GeoDB::in_memory().unwrap();
        let p = db.create_point(NewPoint::new("doomed", 0.0, 0.0)).unwrap();

        let mut txn = db.begin();
        txn.delete_point(&p.id).unwrap();
        assert_eq!(txn.get_point(&p.id).unwrap_err().kind(), ErrorKind::NotFound);
        let temp = txn.create_point(NewPoint::new("temp", 0.0, 0.0)).unwrap();
        txn.delete_point(&temp).unwrap();
        txn.commit().unwrap();

        assert_eq!(db.stats().points, 0);
    }

    #[test]
    fn test_polygon_update_in_transaction() {
        let db = GeoDB::in_memory().unwrap();
        let poly = db
            .create_polygon(NewPolygon::new(
                "lot",
                json!({"type": "Polygon", "coordinates": [[[0.0, 0.0], [2.0, 0.0], [2.0, 2.0], [0.0, 0.0]]]}),
            ))
            .unwrap();

        let mut txn = db.begin();
        let patch = PolygonPatch {
            category: Some(Some("parcel".to_string())),
            ..Default::default()
        };
        txn.update_polygon(&poly.id, &patch).unwrap();
        txn.commit().unwrap();

        assert_eq!(db.get_polygon(&poly.id).unwrap().category.as_deref(), Some("parcel"));
    }
}
