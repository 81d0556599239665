use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

use crate::errors::DbError;
use crate::types::{CollectionName, Document, RecordId};
use crate::utils::num::usize_to_u64;

/// A capped collection and its limits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CappedInfo {
    pub name: CollectionName,
    pub max_size: u64,
    /// Document cap; `None` when only the size is bounded.
    pub max_docs: Option<u64>,
}

impl CappedInfo {
    /// True once the collection has reached either cap.
    #[must_use]
    pub fn is_exceeded(&self, stats: &CollectionStats) -> bool {
        stats.size_bytes >= self.max_size || self.max_docs.is_some_and(|m| stats.count >= m)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CollectionStats {
    /// Bytes on storage, including space held by deleted records until compaction.
    pub size_bytes: u64,
    pub count: u64,
}

/// Storage operations the capped cleaner needs.
pub trait CappedStore: Send + Sync {
    /// # Errors
    /// Backend failures.
    fn list_capped(&self) -> Result<Vec<CappedInfo>, DbError>;

    /// # Errors
    /// `Storage` if the collection does not exist.
    fn stats(&self, coll: &str) -> Result<CollectionStats, DbError>;

    /// Up to `limit` record ids, oldest first.
    ///
    /// # Errors
    /// `Storage` if the collection does not exist.
    fn oldest_records(&self, coll: &str, limit: usize) -> Result<Vec<RecordId>, DbError>;

    /// Returns how many records were removed; unknown ids are skipped.
    ///
    /// # Errors
    /// `Storage` if the collection does not exist.
    fn delete_records(&self, coll: &str, ids: &[RecordId]) -> Result<u64, DbError>;

    /// # Errors
    /// `Storage` if the collection does not exist.
    fn compact(&self, coll: &str) -> Result<(), DbError>;
}

#[derive(Debug)]
struct MemCollection {
    info: CappedInfo,
    records: BTreeMap<RecordId, (Document, u64)>,
    live_bytes: u64,
    dead_bytes: u64,
}

/// In-memory [`CappedStore`]. Deleted records keep their bytes until [`CappedStore::compact`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<CollectionName, MemCollection>>,
    next_id: RwLock<RecordId>,
}

fn missing(coll: &str) -> DbError {
    DbError::Storage(format!("collection '{coll}' does not exist"))
}

fn encoded_len(doc: &Document) -> Result<u64, DbError> {
    let bytes = doc.to_vec().map_err(|e| DbError::Storage(e.to_string()))?;
    Ok(usize_to_u64(bytes.len()))
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or resets) a capped collection.
    pub fn create_capped(&self, name: &str, max_size: u64, max_docs: Option<u64>) {
        let info = CappedInfo { name: name.to_string(), max_size, max_docs };
        self.collections.write().insert(
            name.to_string(),
            MemCollection { info, records: BTreeMap::new(), live_bytes: 0, dead_bytes: 0 },
        );
    }

    /// Appends a document and returns its record id.
    ///
    /// # Errors
    /// `Storage` if the collection does not exist or the document cannot be encoded.
    pub fn insert(&self, coll: &str, doc: Document) -> Result<RecordId, DbError> {
        let size = encoded_len(&doc)?;
        let mut cols = self.collections.write();
        let c = cols.get_mut(coll).ok_or_else(|| missing(coll))?;
        let id = {
            let mut next = self.next_id.write();
            *next += 1;
            *next
        };
        c.records.insert(id, (doc, size));
        c.live_bytes += size;
        Ok(id)
    }

    /// Documents currently stored, oldest first.
    #[must_use]
    pub fn documents(&self, coll: &str) -> Vec<Document> {
        self.collections
            .read()
            .get(coll)
            .map(|c| c.records.values().map(|(d, _)| d.clone()).collect())
            .unwrap_or_default()
    }
}

impl CappedStore for MemoryStore {
    fn list_capped(&self) -> Result<Vec<CappedInfo>, DbError> {
        let mut out: Vec<CappedInfo> = self.collections.read().values().map(|c| c.info.clone()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn stats(&self, coll: &str) -> Result<CollectionStats, DbError> {
        let cols = self.collections.read();
        let c = cols.get(coll).ok_or_else(|| missing(coll))?;
        Ok(CollectionStats {
            size_bytes: c.live_bytes + c.dead_bytes,
            count: usize_to_u64(c.records.len()),
        })
    }

    fn oldest_records(&self, coll: &str, limit: usize) -> Result<Vec<RecordId>, DbError> {
        let cols = self.collections.read();
        let c = cols.get(coll).ok_or_else(|| missing(coll))?;
        Ok(c.records.keys().take(limit).copied().collect())
    }

    fn delete_records(&self, coll: &str, ids: &[RecordId]) -> Result<u64, DbError> {
        let mut cols = self.collections.write();
        let c = cols.get_mut(coll).ok_or_else(|| missing(coll))?;
        let mut deleted = 0;
        for id in ids {
            if let Some((_, size)) = c.records.remove(id) {
                c.live_bytes -= size;
                c.dead_bytes += size;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn compact(&self, coll: &str) -> Result<(), DbError> {
        let mut cols = self.collections.write();
        let c = cols.get_mut(coll).ok_or_else(|| missing(coll))?;
        c.dead_bytes = 0;
        Ok(())
    }
}
