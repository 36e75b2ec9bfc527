//! Heap file: header + length-prefixed records, with logical (tombstone)
//! deletion and sequential scan.
//!
//! # On-disk layout
//!
//! ```text
//! [ 44-byte header ][ record ][ record ] ...
//! ```
//!
//! The header holds, in order: a 32-byte file-name tag (left-padded with
//! zero bytes), `entityCount: u32`, `tombstoneCount: u32`, `nextId: u32`.
//!
//! Each record is `[recordLength: u16][payload: recordLength bytes]`.
//! `payload` begins with the primary key (2 bytes) or, for the junction
//! relation only, the composite key (2 + 2 bytes) followed directly by the
//! tombstone byte — see [`crate::heap::record`] for the four concrete
//! shapes.
//!
//! This module never parses record bodies beyond the id/tombstone prefix;
//! [`crate::heap::record`] owns the per-relation parsers and serializers.

pub mod record;

#[cfg(test)]
mod tests;

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{trace, warn};

/// Size in bytes of the fixed heap header.
pub const HEADER_SIZE: u64 = 44;
/// Width in bytes of the header's file-name tag field.
pub const NAME_TAG_WIDTH: usize = 32;
/// Largest payload (after the length prefix) this heap will read back.
/// Guards against corrupted or adversarial length prefixes.
pub const MAX_RECORD_SIZE: usize = 1024 * 1024;

/// Errors raised by heap file operations.
#[derive(Debug, Error)]
pub enum HeapError {
    /// Underlying filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record's encoded length prefix was outside `[1, MAX_RECORD_SIZE]`,
    /// or the header itself could not be parsed.
    #[error("corrupt heap data: {0}")]
    Corrupt(String),

    /// A requested id or composite key was not found before EOF.
    #[error("record not found")]
    NotFound,

    /// A delete was attempted on a record whose tombstone byte is already set.
    #[error("record already deleted")]
    AlreadyDeleted,

    /// `nextId` would overflow the 2-byte primary key width.
    #[error("primary key space exhausted")]
    IdSpaceExhausted,

    /// Encoding of a fixed-width field failed (e.g. oversized name tag).
    #[error("binary encoding error: {0}")]
    Binary(#[from] crate::binary::BinaryError),
}

const TOMB_LIVE: u8 = 0x00;
const TOMB_DEAD: u8 = 0x01;

struct Header {
    name_tag: String,
    entity_count: u32,
    tombstone_count: u32,
    next_id: u32,
}

impl Header {
    fn new(name_tag: &str) -> Self {
        Header {
            name_tag: name_tag.to_string(),
            entity_count: 0,
            tombstone_count: 0,
            next_id: 0,
        }
    }

    fn encode(&self) -> Result<Vec<u8>, HeapError> {
        let mut buf = crate::binary::pad_fixed(&self.name_tag, NAME_TAG_WIDTH)?;
        crate::binary::put_u32(&mut buf, self.entity_count);
        crate::binary::put_u32(&mut buf, self.tombstone_count);
        crate::binary::put_u32(&mut buf, self.next_id);
        Ok(buf)
    }

    fn decode(buf: &[u8]) -> Result<Self, HeapError> {
        if buf.len() < HEADER_SIZE as usize {
            return Err(HeapError::Corrupt(format!(
                "header too short: {} bytes",
                buf.len()
            )));
        }
        let name_tag = crate::binary::trim_fixed(&buf[..NAME_TAG_WIDTH])?;
        let (entity_count, mut off) = crate::binary::get_u32(&buf[NAME_TAG_WIDTH..])?;
        off += NAME_TAG_WIDTH;
        let (tombstone_count, delta) = crate::binary::get_u32(&buf[off..])?;
        off += delta;
        let (next_id, _) = crate::binary::get_u32(&buf[off..])?;
        Ok(Header {
            name_tag,
            entity_count,
            tombstone_count,
            next_id,
        })
    }
}

/// A single append-only heap file paired with its header.
pub struct HeapFile {
    file: File,
    header: Header,
}

impl HeapFile {
    /// Opens `path`, creating it with a zeroed header (tagged with the
    /// file's base name) if it does not already exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HeapError> {
        let path = path.as_ref();
        let existed = path.exists();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;

        let header = if existed && file.metadata()?.len() >= HEADER_SIZE {
            let mut buf = vec![0u8; HEADER_SIZE as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut buf)?;
            Header::decode(&buf)?
        } else {
            let tag = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("heap")
                .to_string();
            let header = Header::new(&tag);
            file.seek(SeekFrom::Start(0))?;
            file.write_all(&header.encode()?)?;
            file.sync_all()?;
            header
        };

        Ok(HeapFile { file, header })
    }

    /// Count of all non-empty records (live + tombstoned).
    pub fn entity_count(&self) -> u32 {
        self.header.entity_count
    }

    /// Count of tombstoned records.
    pub fn tombstone_count(&self) -> u32 {
        self.header.tombstone_count
    }

    /// Primary key to be assigned on the next [`HeapFile::append`].
    pub fn next_id(&self) -> u32 {
        self.header.next_id
    }

    fn rewrite_header(&mut self) -> Result<(), HeapError> {
        let bytes = self.header.encode()?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&bytes)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Appends a single-primary-key record. `suffix` is everything after
    /// the `[id][tombstone]` prefix; this method mints a fresh id from the
    /// header's `nextId` counter, prepends `id || 0x00`, and advances
    /// `nextId`.
    ///
    /// Returns `(id, offset)`, where `offset` points at the record's
    /// length prefix.
    pub fn append(&mut self, suffix: &[u8]) -> Result<(u16, u64), HeapError> {
        if self.header.next_id > u32::from(u16::MAX) {
            return Err(HeapError::IdSpaceExhausted);
        }
        let id = self.header.next_id as u16;

        let mut payload = Vec::with_capacity(3 + suffix.len());
        crate::binary::put_u16(&mut payload, id);
        payload.push(TOMB_LIVE);
        payload.extend_from_slice(suffix);

        let offset = self.write_record(&payload)?;

        self.header.entity_count += 1;
        self.header.next_id += 1;
        self.rewrite_header()?;

        trace!(id, offset, "heap: appended record");
        Ok((id, offset))
    }

    /// Appends a junction record whose payload is exactly
    /// `[orderId:2][promoId:2][tomb:1]`. Does not mint an id and does not
    /// advance `nextId`.
    pub fn append_composite(&mut self, payload: &[u8]) -> Result<u64, HeapError> {
        let offset = self.write_record(payload)?;
        self.header.entity_count += 1;
        self.rewrite_header()?;
        trace!(offset, "heap: appended composite record");
        Ok(offset)
    }

    fn write_record(&mut self, payload: &[u8]) -> Result<u64, HeapError> {
        let record_length: u16 = payload
            .len()
            .try_into()
            .map_err(|_| HeapError::Corrupt("record payload exceeds u16 length prefix".into()))?;

        let offset = self.file.seek(SeekFrom::End(0))?;
        let mut buf = Vec::with_capacity(2 + payload.len());
        crate::binary::put_u16(&mut buf, record_length);
        buf.extend_from_slice(payload);
        self.file.write_all(&buf)?;
        self.file.sync_all()?;
        Ok(offset)
    }

    /// Reads the raw record payload (excluding the length prefix) starting
    /// at `offset`. Validates the length prefix is in `[1, MAX_RECORD_SIZE]`.
    pub fn read_at(&mut self, offset: u64) -> Result<Vec<u8>, HeapError> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 2];
        self.file.read_exact(&mut len_buf)?;
        let (len, _) = crate::binary::get_u16(&len_buf)?;
        let len = len as usize;
        if len == 0 || len > MAX_RECORD_SIZE {
            return Err(HeapError::Corrupt(format!(
                "record length {len} out of bounds at offset {offset}"
            )));
        }
        let mut payload = vec![0u8; len];
        self.file.read_exact(&mut payload)?;
        Ok(payload)
    }

    /// Sequentially scans for the first record whose leading 2-byte id
    /// matches `id`. Returns the full payload (including the id/tombstone
    /// prefix) regardless of tombstone state; callers filter tombstones.
    pub fn find_by_id(&mut self, id: u16) -> Result<Vec<u8>, HeapError> {
        self.locate_by_id(id)
            .map(|located| located.payload)
            .ok_or(HeapError::NotFound)
    }

    /// Sequentially scans for the first junction record matching the
    /// composite key `(order_id, promo_id)`.
    pub fn find_by_composite(&mut self, order_id: u16, promo_id: u16) -> Result<Vec<u8>, HeapError> {
        self.locate_by_composite(order_id, promo_id)
            .map(|located| located.payload)
            .ok_or(HeapError::NotFound)
    }

    /// Flips the tombstone byte for the record with primary key `id` from
    /// live to dead. Fails with [`HeapError::AlreadyDeleted`] if already
    /// dead. On success, invokes `on_delete(id)`; a callback failure is
    /// logged but does not fail the delete.
    pub fn soft_delete_by_id(
        &mut self,
        id: u16,
        on_delete: impl FnOnce(u16) -> Result<(), String>,
    ) -> Result<(), HeapError> {
        let located = self.locate_by_id(id).ok_or(HeapError::NotFound)?;
        self.flip_tombstone(located.tomb_offset, located.payload[2])?;

        if let Err(e) = on_delete(id) {
            warn!(id, error = %e, "heap: post-delete index callback failed");
        }
        Ok(())
    }

    /// Flips the tombstone byte for the junction record matching
    /// `(order_id, promo_id)`.
    pub fn soft_delete_by_composite_key(
        &mut self,
        order_id: u16,
        promo_id: u16,
    ) -> Result<(), HeapError> {
        let located = self
            .locate_by_composite(order_id, promo_id)
            .ok_or(HeapError::NotFound)?;
        self.flip_tombstone(located.tomb_offset, located.payload[4])
    }

    fn flip_tombstone(&mut self, tomb_offset: u64, current: u8) -> Result<(), HeapError> {
        if current == TOMB_DEAD {
            return Err(HeapError::AlreadyDeleted);
        }
        self.file.seek(SeekFrom::Start(tomb_offset))?;
        self.file.write_all(&[TOMB_DEAD])?;
        self.file.sync_all()?;

        self.header.tombstone_count += 1;
        self.rewrite_header()?;
        Ok(())
    }

    /// Streams every record (live and dead) in insertion order, passing
    /// `(payload, offset)` to `cb`. Aborts on the first callback error.
    pub fn iterate_entries(
        &mut self,
        mut cb: impl FnMut(&[u8], u64) -> Result<(), HeapError>,
    ) -> Result<(), HeapError> {
        let end = self.file.seek(SeekFrom::End(0))?;
        let mut cursor = HEADER_SIZE;
        while cursor < end {
            let payload = self.read_at(cursor)?;
            cb(&payload, cursor)?;
            cursor += 2 + payload.len() as u64;
        }
        Ok(())
    }

    fn locate_by_id(&mut self, id: u16) -> Option<Located> {
        let end = self.file.seek(SeekFrom::End(0)).ok()?;
        let mut cursor = HEADER_SIZE;
        while cursor < end {
            let payload = self.read_at(cursor).ok()?;
            if payload.len() >= 3 {
                let (record_id, _) = crate::binary::get_u16(&payload).ok()?;
                if record_id == id {
                    return Some(Located {
                        record_offset: cursor,
                        tomb_offset: cursor + 2 + 2,
                        payload,
                    });
                }
            }
            cursor += 2 + payload.len() as u64;
        }
        None
    }

    fn locate_by_composite(&mut self, order_id: u16, promo_id: u16) -> Option<Located> {
        let end = self.file.seek(SeekFrom::End(0)).ok()?;
        let mut cursor = HEADER_SIZE;
        while cursor < end {
            let payload = self.read_at(cursor).ok()?;
            if payload.len() >= 5 {
                let (got_order, _) = crate::binary::get_u16(&payload).ok()?;
                let (got_promo, _) = crate::binary::get_u16(&payload[2..]).ok()?;
                if got_order == order_id && got_promo == promo_id {
                    return Some(Located {
                        record_offset: cursor,
                        tomb_offset: cursor + 2 + 4,
                        payload,
                    });
                }
            }
            cursor += 2 + payload.len() as u64;
        }
        None
    }
}

struct Located {
    #[allow(dead_code)]
    record_offset: u64,
    tomb_offset: u64,
    payload: Vec<u8>,
}
