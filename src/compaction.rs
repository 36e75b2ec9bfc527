//! Offline compaction: rewrites every heap file under the data directory,
//! dropping tombstoned records and fixing dangling item references in
//! orders/promotions, then discards every index so it is lazily rebuilt.
//!
//! Compaction assumes exclusive access to the data directory for its
//! duration — it opens each heap directly rather than through a DAO, and
//! does not take any DAO mutex.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;
use tracing::info;

use crate::binary;
use crate::heap::record::{self, RecordError};
use crate::heap::{HeapError, HeapFile};

/// Errors raised while compacting.
#[derive(Debug, Error)]
pub enum CompactionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    #[error("record decode error: {0}")]
    Record(#[from] RecordError),
}

/// Summary of what a compaction pass changed, mirroring the counts a
/// caller needs to report to a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompactResult {
    pub items_removed: u32,
    pub orders_affected: u32,
    pub orders_removed: u32,
    pub promotions_affected: u32,
    pub promotions_removed: u32,
    pub order_promotions_removed: u32,
    pub deleted_item_ids: Vec<u16>,
}

/// Runs a full compaction pass over `data_dir` (expected to contain
/// `bin/` and `indexes/` subdirectories per the standard layout).
pub fn compact(data_dir: &Path) -> Result<CompactResult, CompactionError> {
    let bin_dir = data_dir.join("bin");
    let indexes_dir = data_dir.join("indexes");

    let (items_removed, deleted_item_ids) = compact_items(&bin_dir.join("items.bin"))?;

    let (orders_affected, orders_removed) =
        compact_collection(&bin_dir.join("orders.bin"), &deleted_item_ids)?;
    let (promotions_affected, promotions_removed) =
        compact_collection(&bin_dir.join("promotions.bin"), &deleted_item_ids)?;

    let order_promotions_removed = compact_junction(&bin_dir.join("order_promotions.bin"))?;

    if indexes_dir.exists() {
        for entry in fs::read_dir(&indexes_dir)? {
            let entry = entry?;
            if entry.path().extension().is_some_and(|ext| ext == "idx") {
                fs::remove_file(entry.path())?;
            }
        }
    }

    info!(
        items_removed,
        orders_removed, promotions_removed, order_promotions_removed, "compaction complete"
    );

    Ok(CompactResult {
        items_removed,
        orders_affected,
        orders_removed,
        promotions_affected,
        promotions_removed,
        order_promotions_removed,
        deleted_item_ids,
    })
}

fn write_heap_file(
    path: &Path,
    name_tag: &str,
    entity_count: u32,
    tombstone_count: u32,
    next_id: u32,
    records: &[Vec<u8>],
) -> Result<(), CompactionError> {
    let mut buf = binary::pad_fixed(name_tag, crate::heap::NAME_TAG_WIDTH).map_err(HeapError::from)?;
    binary::put_u32(&mut buf, entity_count);
    binary::put_u32(&mut buf, tombstone_count);
    binary::put_u32(&mut buf, next_id);

    for payload in records {
        let len: u16 = payload
            .len()
            .try_into()
            .map_err(|_| HeapError::Corrupt("compacted record exceeds u16 length prefix".into()))?;
        binary::put_u16(&mut buf, len);
        buf.extend_from_slice(payload);
    }

    let tmp_path = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp_path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    Ok(())
}

fn compact_items(path: &Path) -> Result<(u32, Vec<u16>), CompactionError> {
    let mut heap = HeapFile::open(path)?;
    let mut live_payloads = Vec::new();
    let mut deleted_ids = Vec::new();
    let mut max_live_id: Option<u32> = None;

    heap.iterate_entries(|payload, _offset| {
        let rec = record::parse_item(payload)?;
        if rec.is_deleted {
            deleted_ids.push(rec.id);
        } else {
            max_live_id = Some(max_live_id.map_or(u32::from(rec.id), |m| m.max(u32::from(rec.id))));
            live_payloads.push(payload.to_vec());
        }
        Ok(())
    })?;

    let items_removed = deleted_ids.len() as u32;
    let next_id = max_live_id.map_or(0, |m| m + 1);
    let name_tag = file_tag(path);

    write_heap_file(
        path,
        &name_tag,
        live_payloads.len() as u32,
        0,
        next_id,
        &live_payloads,
    )?;

    Ok((items_removed, deleted_ids))
}

fn compact_collection(path: &Path, deleted_item_ids: &[u16]) -> Result<(u32, u32), CompactionError> {
    let deleted: HashSet<u16> = deleted_item_ids.iter().copied().collect();
    let mut heap = HeapFile::open(path)?;
    let next_id = heap.next_id();

    let mut live_payloads = Vec::new();
    let mut affected = 0u32;
    let mut removed = 0u32;

    heap.iterate_entries(|payload, _offset| {
        let rec = record::parse_collection(payload)?;
        if rec.is_deleted {
            removed += 1;
            return Ok(());
        }

        let original_len = rec.item_ids.len();
        let filtered: Vec<u16> = rec
            .item_ids
            .into_iter()
            .filter(|id| !deleted.contains(id))
            .collect();
        if filtered.len() != original_len {
            affected += 1;
        }

        let suffix = record::serialize_collection(&rec.name, rec.total_price, &filtered);
        let mut full = Vec::with_capacity(3 + suffix.len());
        binary::put_u16(&mut full, rec.id);
        full.push(0x00);
        full.extend_from_slice(&suffix);
        live_payloads.push(full);
        Ok(())
    })?;

    let name_tag = file_tag(path);
    write_heap_file(
        path,
        &name_tag,
        live_payloads.len() as u32,
        0,
        next_id,
        &live_payloads,
    )?;

    Ok((affected, removed))
}

fn compact_junction(path: &Path) -> Result<u32, CompactionError> {
    let mut heap = HeapFile::open(path)?;
    let mut live_payloads = Vec::new();
    let mut removed = 0u32;

    heap.iterate_entries(|payload, _offset| {
        let rec = record::parse_junction(payload)?;
        if rec.is_deleted {
            removed += 1;
        } else {
            live_payloads.push(payload.to_vec());
        }
        Ok(())
    })?;

    let name_tag = file_tag(path);
    write_heap_file(path, &name_tag, live_payloads.len() as u32, 0, 0, &live_payloads)?;

    Ok(removed)
}

fn file_tag(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("heap")
        .to_string()
}
