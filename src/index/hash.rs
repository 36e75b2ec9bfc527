//! Persistent extendible-hash index: an unordered map `(u64, u64) → i64`
//! used by the order↔promotion junction, where both "all promotions of
//! this order" and "all orders with this promotion" are common access
//! patterns.
//!
//! Buckets, like B+-tree nodes, are held in an arena and referenced by
//! numeric id so the directory can alias multiple slots to one bucket
//! without an in-memory pointer graph.

#[cfg(test)]
mod tests;

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use thiserror::Error;
use tracing::{trace, warn};

use crate::binary;

/// Default number of entries a bucket holds before it must split.
pub const DEFAULT_BUCKET_SIZE: usize = 4;

/// Odd 64-bit mixing constants for the composite-key hash. Both are
/// large primes with no particular bit structure the low bits of a
/// directory index could latch onto.
const MIX_ORDER: u64 = 0x9E37_79B9_7F4A_7C15;
const MIX_PROMO: u64 = 0xC2B2_AE3D_27D4_EB4F;

fn hash_key(order_id: u16, promo_id: u16) -> u64 {
    let o = (order_id as u64).wrapping_mul(MIX_ORDER);
    let p = (promo_id as u64).wrapping_mul(MIX_PROMO);
    o ^ p
}

fn dir_index(hash: u64, depth: u8) -> usize {
    if depth == 0 {
        0
    } else {
        (hash & ((1u64 << u32::from(depth)) - 1)) as usize
    }
}

/// Errors raised by extendible-hash operations.
#[derive(Debug, Error)]
pub enum HashIndexError {
    /// Underlying filesystem failure while saving.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// `Insert` was called for a composite key already present.
    #[error("duplicate key")]
    Duplicate,

    /// `Delete` was called for a composite key with no entry.
    #[error("key not found")]
    NotFound,

    /// The on-disk representation failed to parse.
    #[error("corrupt extendible-hash file: {0}")]
    Corrupt(String),

    /// A fixed-width field failed to decode.
    #[error("binary decode error: {0}")]
    Binary(#[from] binary::BinaryError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Entry {
    order_id: u16,
    promo_id: u16,
    offset: i64,
}

#[derive(Debug, Clone)]
struct Bucket {
    id: u32,
    local_depth: u8,
    entries: Vec<Entry>,
}

/// A persistent extendible-hash index mapping composite keys
/// `(order_id, promo_id)` to `i64` heap byte offsets.
pub struct ExtendibleHash {
    global_depth: u8,
    bucket_size: usize,
    directory: Vec<u32>,
    buckets: Vec<Option<Bucket>>,
    size: usize,
}

impl ExtendibleHash {
    /// Creates a fresh index: global depth 1, two empty buckets, one per
    /// directory slot.
    pub fn new(bucket_size: usize) -> Self {
        let bucket0 = Bucket {
            id: 0,
            local_depth: 1,
            entries: Vec::new(),
        };
        let bucket1 = Bucket {
            id: 1,
            local_depth: 1,
            entries: Vec::new(),
        };
        ExtendibleHash {
            global_depth: 1,
            bucket_size,
            directory: vec![0, 1],
            buckets: vec![Some(bucket0), Some(bucket1)],
            size: 0,
        }
    }

    /// Number of live entries.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Current global depth (number of directory-selecting hash bits).
    pub fn global_depth(&self) -> u8 {
        self.global_depth
    }

    /// Current directory size (`2^global_depth`).
    pub fn directory_size(&self) -> usize {
        self.directory.len()
    }

    /// Looks up bucket `id`. Every id stored in the directory or `buckets`
    /// is expected to reference a live bucket, but a loaded index file is
    /// untrusted input — a hand-corrupted or truncated file can produce a
    /// dangling id, so this is `Result`, not a panic.
    fn bucket(&self, id: u32) -> Result<&Bucket, HashIndexError> {
        self.buckets
            .get(id as usize)
            .and_then(|slot| slot.as_ref())
            .ok_or_else(|| {
                HashIndexError::Corrupt(format!("bucket id {id} referenced by directory is not live"))
            })
    }

    fn bucket_mut(&mut self, id: u32) -> Result<&mut Bucket, HashIndexError> {
        self.buckets
            .get_mut(id as usize)
            .and_then(|slot| slot.as_mut())
            .ok_or_else(|| {
                HashIndexError::Corrupt(format!("bucket id {id} referenced by directory is not live"))
            })
    }

    fn alloc_bucket(&mut self, mut bucket: Bucket) -> u32 {
        let id = self.buckets.len() as u32;
        bucket.id = id;
        self.buckets.push(Some(bucket));
        id
    }

    fn slot_for(&self, order_id: u16, promo_id: u16) -> usize {
        dir_index(hash_key(order_id, promo_id), self.global_depth)
    }

    /// Looks up `(order_id, promo_id)`.
    pub fn search(&self, order_id: u16, promo_id: u16) -> Result<Option<i64>, HashIndexError> {
        let bucket_id = self.directory[self.slot_for(order_id, promo_id)];
        Ok(self
            .bucket(bucket_id)?
            .entries
            .iter()
            .find(|e| e.order_id == order_id && e.promo_id == promo_id)
            .map(|e| e.offset))
    }

    /// Inserts `(order_id, promo_id) → offset`. Fails with
    /// [`HashIndexError::Duplicate`] if already present. Splits (and, if
    /// necessary, doubles the directory) until the target bucket has room.
    pub fn insert(
        &mut self,
        order_id: u16,
        promo_id: u16,
        offset: i64,
    ) -> Result<(), HashIndexError> {
        loop {
            let slot = self.slot_for(order_id, promo_id);
            let bucket_id = self.directory[slot];

            if self
                .bucket(bucket_id)?
                .entries
                .iter()
                .any(|e| e.order_id == order_id && e.promo_id == promo_id)
            {
                return Err(HashIndexError::Duplicate);
            }

            if self.bucket(bucket_id)?.entries.len() < self.bucket_size {
                self.bucket_mut(bucket_id)?.entries.push(Entry {
                    order_id,
                    promo_id,
                    offset,
                });
                self.size += 1;
                trace!(order_id, promo_id, offset, "hash: inserted");
                return Ok(());
            }

            if self.bucket(bucket_id)?.local_depth == self.global_depth {
                self.double_directory();
            }
            self.split_bucket(bucket_id)?;
        }
    }

    fn double_directory(&mut self) {
        self.global_depth += 1;
        let old_len = self.directory.len();
        self.directory.extend_from_within(0..old_len);
    }

    fn split_bucket(&mut self, bucket_id: u32) -> Result<(), HashIndexError> {
        let local_depth = self.bucket(bucket_id)?.local_depth;
        let new_local_depth = local_depth + 1;
        let entries = std::mem::take(&mut self.bucket_mut(bucket_id)?.entries);
        self.bucket_mut(bucket_id)?.local_depth = new_local_depth;

        let sibling = Bucket {
            id: 0,
            local_depth: new_local_depth,
            entries: Vec::new(),
        };
        let sibling_id = self.alloc_bucket(sibling);

        let bit_pos = u32::from(new_local_depth - 1);
        // Re-point the half of the aliased slots whose newly-significant
        // bit is 1 to the new sibling bucket.
        for (slot_idx, slot) in self.directory.iter_mut().enumerate() {
            if *slot == bucket_id {
                let bit = (slot_idx >> bit_pos) & 1;
                if bit == 1 {
                    *slot = sibling_id;
                }
            }
        }

        for entry in entries {
            let slot = dir_index(hash_key(entry.order_id, entry.promo_id), self.global_depth);
            let target = self.directory[slot];
            self.bucket_mut(target)?.entries.push(entry);
        }
        Ok(())
    }

    /// Removes `(order_id, promo_id)`. Fails with
    /// [`HashIndexError::NotFound`] if absent. No bucket merging or
    /// directory shrinkage is performed.
    pub fn delete(&mut self, order_id: u16, promo_id: u16) -> Result<(), HashIndexError> {
        let bucket_id = self.directory[self.slot_for(order_id, promo_id)];
        let bucket = self.bucket_mut(bucket_id)?;
        let pos = bucket
            .entries
            .iter()
            .position(|e| e.order_id == order_id && e.promo_id == promo_id)
            .ok_or(HashIndexError::NotFound)?;
        bucket.entries.remove(pos);
        self.size -= 1;
        trace!(order_id, promo_id, "hash: deleted");
        Ok(())
    }

    /// Full scan of every unique bucket, returning `(promo_id, offset)`
    /// pairs for every entry whose order id matches. O(N) by design.
    pub fn get_by_order_id(&self, order_id: u16) -> Vec<(u16, i64)> {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|b| b.entries.iter())
            .filter(|e| e.order_id == order_id)
            .map(|e| (e.promo_id, e.offset))
            .collect()
    }

    /// Full scan of every unique bucket, returning `(order_id, offset)`
    /// pairs for every entry whose promotion id matches. O(N) by design.
    pub fn get_by_promotion_id(&self, promo_id: u16) -> Vec<(u16, i64)> {
        self.buckets
            .iter()
            .flatten()
            .flat_map(|b| b.entries.iter())
            .filter(|e| e.promo_id == promo_id)
            .map(|e| (e.order_id, e.offset))
            .collect()
    }

    /// Serializes: `[globalDepth:1][bucketSize:4][dirLen:4][dir entries:
    /// u32 each][bucketCount:4]`, then each unique bucket as
    /// `[bucketId:4][localDepth:1][entryCount:2][entries: 12 bytes each]`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HashIndexError> {
        let mut buf = Vec::new();
        buf.push(self.global_depth);
        binary::put_u32(&mut buf, self.bucket_size as u32);
        binary::put_u32(&mut buf, self.directory.len() as u32);
        for &bucket_id in &self.directory {
            binary::put_u32(&mut buf, bucket_id);
        }

        let live: Vec<&Bucket> = self.buckets.iter().flatten().collect();
        binary::put_u32(&mut buf, live.len() as u32);
        for bucket in live {
            binary::put_u32(&mut buf, bucket.id);
            buf.push(bucket.local_depth);
            binary::put_u16(&mut buf, bucket.entries.len() as u16);
            for entry in &bucket.entries {
                binary::put_u16(&mut buf, entry.order_id);
                binary::put_u16(&mut buf, entry.promo_id);
                binary::put_i64(&mut buf, entry.offset);
            }
        }

        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        file.write_all(&buf)?;
        file.sync_all()?;
        Ok(())
    }

    fn parse(buf: &[u8]) -> Result<ExtendibleHash, HashIndexError> {
        let (global_depth, mut off) = binary::get_u8(buf)?;
        let (bucket_size, delta) = binary::get_u32(&buf[off..])?;
        off += delta;
        let (dir_len, delta) = binary::get_u32(&buf[off..])?;
        off += delta;

        let mut directory = Vec::with_capacity(dir_len as usize);
        for _ in 0..dir_len {
            let (bucket_id, delta) = binary::get_u32(&buf[off..])?;
            off += delta;
            directory.push(bucket_id);
        }

        let (bucket_count, delta) = binary::get_u32(&buf[off..])?;
        off += delta;

        let mut max_id = 0u32;
        let mut parsed = Vec::with_capacity(bucket_count as usize);
        for _ in 0..bucket_count {
            let (id, delta) = binary::get_u32(&buf[off..])?;
            off += delta;
            let (local_depth, delta) = binary::get_u8(&buf[off..])?;
            off += delta;
            let (entry_count, delta) = binary::get_u16(&buf[off..])?;
            off += delta;

            let mut entries = Vec::with_capacity(entry_count as usize);
            for _ in 0..entry_count {
                let (order_id, delta) = binary::get_u16(&buf[off..])?;
                off += delta;
                let (promo_id, delta) = binary::get_u16(&buf[off..])?;
                off += delta;
                let (offset, delta) = binary::get_i64(&buf[off..])?;
                off += delta;
                entries.push(Entry {
                    order_id,
                    promo_id,
                    offset,
                });
            }
            max_id = max_id.max(id);
            parsed.push(Bucket {
                id,
                local_depth,
                entries,
            });
        }

        let mut buckets: Vec<Option<Bucket>> = vec![None; max_id as usize + 1];
        let mut size = 0usize;
        for bucket in parsed {
            size += bucket.entries.len();
            let idx = bucket.id as usize;
            buckets[idx] = Some(bucket);
        }

        Ok(ExtendibleHash {
            global_depth,
            bucket_size: bucket_size as usize,
            directory,
            buckets,
            size,
        })
    }

    /// Loads an index previously written by [`ExtendibleHash::save`]. On a
    /// missing or malformed file this returns a fresh empty index rather
    /// than an error, matching the B+-tree's "heap is ground truth"
    /// recovery behavior.
    pub fn load(path: impl AsRef<Path>, bucket_size: usize) -> ExtendibleHash {
        let path = path.as_ref();
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(_) => return ExtendibleHash::new(bucket_size),
        };
        match Self::parse(&bytes) {
            Ok(index) => index,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "hash: failed to load index, starting fresh");
                ExtendibleHash::new(bucket_size)
            }
        }
    }
}
