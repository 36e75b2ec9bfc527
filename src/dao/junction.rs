//! DAO for the `OrderPromotion` junction relation: `order_promotions.bin`
//! heap + `order_promotions.idx` extendible-hash index.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::dao::{DaoError, HeapStats};
use crate::heap::record;
use crate::heap::HeapFile;
use crate::index::hash::ExtendibleHash;

struct Inner {
    heap: HeapFile,
    index: ExtendibleHash,
    index_path: PathBuf,
}

/// Binds the junction heap to its extendible-hash index behind a single
/// mutex.
pub struct JunctionDao {
    inner: Mutex<Inner>,
    bucket_size: usize,
}

impl JunctionDao {
    pub fn open(data_dir: &Path, bucket_size: usize) -> Result<Self, DaoError> {
        let heap_path = data_dir.join("bin").join("order_promotions.bin");
        let index_path = data_dir.join("indexes").join("order_promotions.idx");
        let heap = HeapFile::open(&heap_path)?;
        let index = ExtendibleHash::load(&index_path, bucket_size);
        Ok(JunctionDao {
            inner: Mutex::new(Inner {
                heap,
                index,
                index_path,
            }),
            bucket_size,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, DaoError> {
        self.inner.lock().map_err(|_| DaoError::LockPoisoned)
    }

    /// Appends and indexes a junction row. Fails with a duplicate error if
    /// this composite key is already present (callers should treat a
    /// promotion already applied to an order as idempotent, not as an
    /// error, at the engine layer).
    pub fn apply(&self, order_id: u16, promo_id: u16) -> Result<(), DaoError> {
        let payload = record::serialize_junction(order_id, promo_id);
        let mut inner = self.lock()?;
        let offset = inner.heap.append_composite(&payload)?;
        inner.index.insert(order_id, promo_id, offset as i64)?;
        inner.index.save(&inner.index_path)?;
        debug!(order_id, promo_id, "junction dao: applied");
        Ok(())
    }

    /// Soft-deletes the `(order_id, promo_id)` row.
    pub fn remove(&self, order_id: u16, promo_id: u16) -> Result<(), DaoError> {
        let mut guard = self.lock()?;
        let Inner {
            heap,
            index,
            index_path,
        } = &mut *guard;
        heap.soft_delete_by_composite_key(order_id, promo_id)?;
        if let Err(e) = index.delete(order_id, promo_id) {
            tracing::warn!(order_id, promo_id, error = %e, "junction dao: index delete failed");
        }
        index.save(index_path)?;
        Ok(())
    }

    /// Every promotion id applied to `order_id` (no tombstone filtering —
    /// callers that need liveness re-check against the promotions heap).
    pub fn get_by_order_id(&self, order_id: u16) -> Result<Vec<u16>, DaoError> {
        let inner = self.lock()?;
        Ok(inner
            .index
            .get_by_order_id(order_id)
            .into_iter()
            .map(|(promo_id, _offset)| promo_id)
            .collect())
    }

    /// Every order id that has `promo_id` applied.
    pub fn get_by_promotion_id(&self, promo_id: u16) -> Result<Vec<u16>, DaoError> {
        let inner = self.lock()?;
        Ok(inner
            .index
            .get_by_promotion_id(promo_id)
            .into_iter()
            .map(|(order_id, _offset)| order_id)
            .collect())
    }

    pub fn heap_stats(&self) -> Result<HeapStats, DaoError> {
        let inner = self.lock()?;
        Ok(HeapStats {
            entity_count: inner.heap.entity_count(),
            tombstone_count: inner.heap.tombstone_count(),
            next_id: inner.heap.next_id(),
        })
    }

    /// Rebuilds the index from a full heap scan, skipping tombstoned rows.
    pub fn rebuild_index(&self) -> Result<(), DaoError> {
        let mut inner = self.lock()?;
        let mut fresh = ExtendibleHash::new(self.bucket_size);
        inner.heap.iterate_entries(|payload, offset| {
            let rec = record::parse_junction(payload)?;
            if !rec.is_deleted {
                fresh
                    .insert(rec.order_id, rec.promo_id, offset as i64)
                    .map_err(|e| crate::heap::HeapError::Corrupt(e.to_string()))?;
            }
            Ok(())
        })?;
        inner.index = fresh;
        inner.index.save(&inner.index_path)?;
        Ok(())
    }
}
