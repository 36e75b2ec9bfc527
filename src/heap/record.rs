//! Parsers and serializers for the four record shapes stored in heap files.
//!
//! Each parser consumes exactly the full record payload (the bytes after
//! the 2-byte length prefix, including the `[id][tombstone]` prefix where
//! applicable) and returns a typed record. Each serializer produces the
//! *suffix* after that prefix — [`HeapFile::append`](crate::heap::HeapFile::append)
//! prepends `id || 0x00` itself — except [`serialize_junction`], which
//! produces the full junction payload, because the junction shape has no
//! separate id/tombstone prefix to prepend.

use thiserror::Error;

use crate::binary::{self, BinaryError};

/// Errors raised while parsing or serializing a record body.
#[derive(Debug, Error)]
pub enum RecordError {
    /// A fixed-width field could not be decoded.
    #[error("binary decode error: {0}")]
    Binary(#[from] BinaryError),

    /// The record was shorter than its declared field lengths required.
    #[error("truncated record: {0}")]
    Truncated(String),
}

impl From<RecordError> for crate::heap::HeapError {
    fn from(e: RecordError) -> Self {
        crate::heap::HeapError::Corrupt(e.to_string())
    }
}

/// An `Item` record as stored in `items.bin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRecord {
    pub id: u16,
    pub is_deleted: bool,
    pub name: String,
    pub price_in_cents: u32,
}

/// Parses `[id:2][tomb:1][nameLen:2][name][price:4]`.
pub fn parse_item(payload: &[u8]) -> Result<ItemRecord, RecordError> {
    let (id, mut off) = binary::get_u16(payload)?;
    let (tomb, delta) = binary::get_u8(&payload[off..])?;
    off += delta;
    let (name, delta) = binary::get_string16(&payload[off..])?;
    off += delta;
    let (price_in_cents, _) = binary::get_u32(&payload[off..])?;
    Ok(ItemRecord {
        id,
        is_deleted: tomb != 0,
        name,
        price_in_cents,
    })
}

/// Serializes the suffix `[nameLen:2][name][price:4]` for an `Item`.
pub fn serialize_item(name: &str, price_in_cents: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    binary::put_string16(&mut buf, name);
    binary::put_u32(&mut buf, price_in_cents);
    buf
}

/// An `Order` or `Promotion` record — both relations share this shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRecord {
    pub id: u16,
    pub is_deleted: bool,
    pub name: String,
    pub total_price: u32,
    pub item_ids: Vec<u16>,
}

/// Parses `[id:2][tomb:1][nameLen:2][name][totalPrice:4][itemCount:4][itemId:2]×itemCount`.
pub fn parse_collection(payload: &[u8]) -> Result<CollectionRecord, RecordError> {
    let (id, mut off) = binary::get_u16(payload)?;
    let (tomb, delta) = binary::get_u8(&payload[off..])?;
    off += delta;
    let (name, delta) = binary::get_string16(&payload[off..])?;
    off += delta;
    let (total_price, delta) = binary::get_u32(&payload[off..])?;
    off += delta;
    let (item_count, delta) = binary::get_u32(&payload[off..])?;
    off += delta;

    let mut item_ids = Vec::with_capacity(item_count as usize);
    for _ in 0..item_count {
        let (item_id, delta) = binary::get_u16(&payload[off..])?;
        off += delta;
        item_ids.push(item_id);
    }

    Ok(CollectionRecord {
        id,
        is_deleted: tomb != 0,
        name,
        total_price,
        item_ids,
    })
}

/// Serializes the suffix `[nameLen:2][name][totalPrice:4][itemCount:4][itemId:2]×itemCount`
/// for an `Order` or `Promotion`.
pub fn serialize_collection(name: &str, total_price: u32, item_ids: &[u16]) -> Vec<u8> {
    let mut buf = Vec::new();
    binary::put_string16(&mut buf, name);
    binary::put_u32(&mut buf, total_price);
    binary::put_u32(&mut buf, item_ids.len() as u32);
    for &id in item_ids {
        binary::put_u16(&mut buf, id);
    }
    buf
}

/// An `OrderPromotion` junction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JunctionRecord {
    pub order_id: u16,
    pub promo_id: u16,
    pub is_deleted: bool,
}

/// Parses the junction shape `[orderId:2][promoId:2][tomb:1]`, which — unlike
/// the other three shapes — has no separate id/tombstone prefix: these three
/// fields are the entire record.
pub fn parse_junction(payload: &[u8]) -> Result<JunctionRecord, RecordError> {
    if payload.len() < 5 {
        return Err(RecordError::Truncated(format!(
            "junction record needs 5 bytes, got {}",
            payload.len()
        )));
    }
    let (order_id, mut off) = binary::get_u16(payload)?;
    let (promo_id, delta) = binary::get_u16(&payload[off..])?;
    off += delta;
    let (tomb, _) = binary::get_u8(&payload[off..])?;
    Ok(JunctionRecord {
        order_id,
        promo_id,
        is_deleted: tomb != 0,
    })
}

/// Serializes the full junction payload `[orderId:2][promoId:2][tomb:1]`.
/// `tomb` is always `0x00` for a freshly-applied junction row.
pub fn serialize_junction(order_id: u16, promo_id: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    binary::put_u16(&mut buf, order_id);
    binary::put_u16(&mut buf, promo_id);
    buf.push(0x00);
    buf
}
