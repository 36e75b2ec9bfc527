//! Relation DAOs: one per relation (Item, Order, Promotion,
//! OrderPromotion), each binding a heap file to its secondary index and
//! enforcing that relation's record shape.
//!
//! Every DAO owns exactly one [`std::sync::Mutex`] guarding the pair
//! (heap file, in-memory index); `Read` and `GetAll` take the same lock
//! as mutating operations so every observer sees consistent
//! header+record+index state (§5: "mutex per DAO, not per file").

mod collection;
pub mod item;
pub mod junction;
pub mod order;
pub mod promotion;

#[cfg(test)]
mod tests;

use thiserror::Error;

use crate::heap::HeapError;
use crate::heap::record::RecordError;
use crate::index::btree::BTreeError;
use crate::index::hash::HashIndexError;

/// Maximum byte length of a name field (items, orders, promotions).
pub const MAX_NAME_BYTES: usize = 255;
/// Maximum number of item references an order or promotion may carry.
pub const MAX_ITEM_REFS: usize = 1000;

/// Errors raised by relation DAOs.
#[derive(Debug, Error)]
pub enum DaoError {
    /// A failure in the underlying heap file.
    #[error("heap error: {0}")]
    Heap(#[from] HeapError),

    /// A failure in the underlying B+-tree index (single-key relations).
    #[error("index error: {0}")]
    Index(#[from] BTreeError),

    /// A failure in the underlying extendible-hash index (junction only).
    #[error("index error: {0}")]
    HashIndex(#[from] HashIndexError),

    /// A record body failed to parse.
    #[error("record decode error: {0}")]
    Record(#[from] RecordError),

    /// Input failed validation before any I/O was attempted.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested id (or composite key) has no live record.
    #[error("record not found")]
    NotFound,

    /// The DAO's internal mutex was poisoned by a panicking holder.
    #[error("DAO mutex poisoned")]
    LockPoisoned,
}

/// Validates a record name: non-empty, at most [`MAX_NAME_BYTES`] bytes.
pub fn validate_name(name: &str) -> Result<(), DaoError> {
    if name.is_empty() {
        return Err(DaoError::Validation("name must not be empty".into()));
    }
    if name.as_bytes().len() > MAX_NAME_BYTES {
        return Err(DaoError::Validation(format!(
            "name exceeds {MAX_NAME_BYTES} bytes"
        )));
    }
    Ok(())
}

/// Validates an order/promotion's item reference list: non-empty, at most
/// [`MAX_ITEM_REFS`] entries.
pub fn validate_item_refs(item_ids: &[u16]) -> Result<(), DaoError> {
    if item_ids.is_empty() {
        return Err(DaoError::Validation(
            "item reference list must not be empty".into(),
        ));
    }
    if item_ids.len() > MAX_ITEM_REFS {
        return Err(DaoError::Validation(format!(
            "item reference list exceeds {MAX_ITEM_REFS} entries"
        )));
    }
    Ok(())
}

/// A heap's header counters, exposed read-only for diagnostics (the
/// engine's `EngineStats`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeapStats {
    pub entity_count: u32,
    pub tombstone_count: u32,
    pub next_id: u32,
}

/// Validates that a total price (the sum of referenced item prices,
/// computed by the caller as a `u64` to detect overflow before narrowing)
/// still fits the on-disk `u32` `totalPrice` field.
pub fn validate_total_price(total_price: u64) -> Result<u32, DaoError> {
    u32::try_from(total_price)
        .map_err(|_| DaoError::Validation("total price overflows a u32 field".into()))
}
