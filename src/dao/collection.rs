//! Shared DAO machinery for `Order` and `Promotion`, which differ only in
//! their heap/index file names and the label used in validation errors —
//! the record shape, locking discipline, and rebuild logic are identical.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::dao::{validate_item_refs, validate_name, validate_total_price, DaoError, HeapStats};
use crate::heap::record::{self, CollectionRecord};
use crate::heap::HeapFile;
use crate::index::btree::BTree;

/// Distinguishes `Order` from `Promotion` at the type level so both can
/// share [`CollectionDao`] without runtime branching.
pub trait CollectionKind {
    const HEAP_FILE: &'static str;
    const INDEX_FILE: &'static str;
    const LABEL: &'static str;
}

/// An order or promotion as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub id: u16,
    pub is_deleted: bool,
    pub name: String,
    pub total_price: u32,
    pub item_ids: Vec<u16>,
}

fn from_record(r: CollectionRecord) -> Collection {
    Collection {
        id: r.id,
        is_deleted: r.is_deleted,
        name: r.name,
        total_price: r.total_price,
        item_ids: r.item_ids,
    }
}

struct Inner {
    heap: HeapFile,
    index: BTree,
    index_path: PathBuf,
}

/// Binds an order/promotion heap to its B+-tree index behind a single
/// mutex. Parameterized over `K` to avoid duplicating this logic between
/// the two relations that share it.
pub struct CollectionDao<K> {
    inner: Mutex<Inner>,
    order: usize,
    _kind: PhantomData<K>,
}

impl<K: CollectionKind> CollectionDao<K> {
    pub fn open(data_dir: &Path, order: usize) -> Result<Self, DaoError> {
        let heap_path = data_dir.join("bin").join(K::HEAP_FILE);
        let index_path = data_dir.join("indexes").join(K::INDEX_FILE);
        let heap = HeapFile::open(&heap_path)?;
        let index = BTree::load(&index_path, order);
        Ok(CollectionDao {
            inner: Mutex::new(Inner {
                heap,
                index,
                index_path,
            }),
            order,
            _kind: PhantomData,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, DaoError> {
        self.inner.lock().map_err(|_| DaoError::LockPoisoned)
    }

    /// Validates `name`, `item_ids`, and the caller-summed `total_price`
    /// (as a `u64`, to catch overflow before narrowing to the on-disk
    /// `u32` field), then appends and indexes the record.
    pub fn create(
        &self,
        name: &str,
        total_price_sum: u64,
        item_ids: &[u16],
    ) -> Result<u16, DaoError> {
        validate_name(name)?;
        validate_item_refs(item_ids)?;
        let total_price = validate_total_price(total_price_sum)?;

        let suffix = record::serialize_collection(name, total_price, item_ids);
        let mut inner = self.lock()?;
        let (id, offset) = inner.heap.append(&suffix)?;
        inner.index.insert(u64::from(id), offset as i64)?;
        inner.index.save(&inner.index_path)?;
        debug!(id, kind = K::LABEL, "collection dao: created");
        Ok(id)
    }

    pub fn read(&self, id: u16) -> Result<Collection, DaoError> {
        self.read_with_index(id, true)
    }

    pub fn read_with_index(&self, id: u16, use_index: bool) -> Result<Collection, DaoError> {
        let mut inner = self.lock()?;
        let payload = if use_index {
            let offset = inner
                .index
                .search(u64::from(id))?
                .ok_or(DaoError::NotFound)?;
            inner.heap.read_at(offset as u64)?
        } else {
            inner.heap.find_by_id(id)?
        };
        let rec = record::parse_collection(&payload)?;
        if rec.is_deleted {
            return Err(DaoError::NotFound);
        }
        Ok(from_record(rec))
    }

    pub fn delete(&self, id: u16) -> Result<(), DaoError> {
        let mut guard = self.lock()?;
        let Inner {
            heap,
            index,
            index_path,
        } = &mut *guard;
        heap.soft_delete_by_id(id, |deleted_id| {
            index
                .delete(u64::from(deleted_id))
                .map(|_| ())
                .map_err(|e| e.to_string())
        })?;
        index.save(index_path)?;
        Ok(())
    }

    pub fn get_all(&self) -> Result<Vec<Collection>, DaoError> {
        let mut inner = self.lock()?;
        let mut out = Vec::new();
        inner.heap.iterate_entries(|payload, _offset| {
            let rec = record::parse_collection(payload)?;
            out.push(from_record(rec));
            Ok(())
        })?;
        Ok(out)
    }

    pub fn heap_stats(&self) -> Result<HeapStats, DaoError> {
        let inner = self.lock()?;
        Ok(HeapStats {
            entity_count: inner.heap.entity_count(),
            tombstone_count: inner.heap.tombstone_count(),
            next_id: inner.heap.next_id(),
        })
    }

    pub fn rebuild_index(&self) -> Result<(), DaoError> {
        let mut inner = self.lock()?;
        let mut fresh = BTree::new(self.order);
        inner.heap.iterate_entries(|payload, offset| {
            let rec = record::parse_collection(payload)?;
            if !rec.is_deleted {
                fresh
                    .insert(u64::from(rec.id), offset as i64)
                    .map_err(|e| crate::heap::HeapError::Corrupt(e.to_string()))?;
            }
            Ok(())
        })?;
        inner.index = fresh;
        inner.index.save(&inner.index_path)?;
        Ok(())
    }
}
