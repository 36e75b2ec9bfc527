//! DAO for the `Item` relation: `items.bin` heap + `items.idx` B+-tree.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::dao::{validate_name, DaoError, HeapStats};
use crate::heap::record::{self, ItemRecord};
use crate::heap::HeapFile;
use crate::index::btree::BTree;

/// An item as returned to callers, with its tombstone state exposed
/// rather than hidden — `GetAllItems` surfaces deleted rows too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub id: u16,
    pub is_deleted: bool,
    pub name: String,
    pub price_in_cents: u32,
}

fn from_record(r: ItemRecord) -> Item {
    Item {
        id: r.id,
        is_deleted: r.is_deleted,
        name: r.name,
        price_in_cents: r.price_in_cents,
    }
}

struct Inner {
    heap: HeapFile,
    index: BTree,
    index_path: PathBuf,
}

/// Binds the items heap to its B+-tree index behind a single mutex.
pub struct ItemDao {
    inner: Mutex<Inner>,
    order: usize,
}

impl ItemDao {
    pub fn open(data_dir: &Path, order: usize) -> Result<Self, DaoError> {
        let heap_path = data_dir.join("bin").join("items.bin");
        let index_path = data_dir.join("indexes").join("items.idx");
        let heap = HeapFile::open(&heap_path)?;
        let index = BTree::load(&index_path, order);
        Ok(ItemDao {
            inner: Mutex::new(Inner {
                heap,
                index,
                index_path,
            }),
            order,
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, DaoError> {
        self.inner.lock().map_err(|_| DaoError::LockPoisoned)
    }

    /// Validates `name` and `price_in_cents`, appends the record to the
    /// heap, and inserts it into the index. Returns the minted id.
    pub fn create(&self, name: &str, price_in_cents: u32) -> Result<u16, DaoError> {
        validate_name(name)?;

        let suffix = record::serialize_item(name, price_in_cents);
        let mut inner = self.lock()?;
        let (id, offset) = inner.heap.append(&suffix)?;
        inner.index.insert(u64::from(id), offset as i64)?;
        inner.index.save(&inner.index_path)?;
        debug!(id, "item dao: created");
        Ok(id)
    }

    /// Reads `id` via the index (fast path).
    pub fn read(&self, id: u16) -> Result<Item, DaoError> {
        self.read_with_index(id, true)
    }

    /// Reads `id`, optionally bypassing the index in favor of a linear
    /// heap scan — used when the index is known to be stale or absent.
    pub fn read_with_index(&self, id: u16, use_index: bool) -> Result<Item, DaoError> {
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
        let rec = record::parse_item(&payload)?;
        if rec.is_deleted {
            return Err(DaoError::NotFound);
        }
        Ok(from_record(rec))
    }

    /// Soft-deletes `id`, best-effort removing it from the index too.
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

    /// Returns every item, live and tombstoned, in heap order.
    pub fn get_all(&self) -> Result<Vec<Item>, DaoError> {
        let mut inner = self.lock()?;
        let mut out = Vec::new();
        inner.heap.iterate_entries(|payload, _offset| {
            let rec = record::parse_item(payload)?;
            out.push(from_record(rec));
            Ok(())
        })?;
        Ok(out)
    }

    /// Snapshot of the heap header's counters.
    pub fn heap_stats(&self) -> Result<HeapStats, DaoError> {
        let inner = self.lock()?;
        Ok(HeapStats {
            entity_count: inner.heap.entity_count(),
            tombstone_count: inner.heap.tombstone_count(),
            next_id: inner.heap.next_id(),
        })
    }

    /// Rebuilds the index from a full heap scan, skipping tombstoned ids.
    pub fn rebuild_index(&self) -> Result<(), DaoError> {
        let mut inner = self.lock()?;
        let order = self.order;
        let mut fresh = BTree::new(order);
        inner.heap.iterate_entries(|payload, offset| {
            let rec = record::parse_item(payload)?;
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
