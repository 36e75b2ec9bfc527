//! Persistent secondary indexes backing point lookups into heap files.
//!
//! [`btree`] implements an ordered `u64 → i64` map (B+-tree) used by the
//! single-primary-key relations. [`hash`] implements an unordered
//! `(u64, u64) → i64` map (extendible hashing) used by the order↔promotion
//! junction, where both "all promotions of this order" and "all orders
//! with this promotion" access patterns are common.

pub mod btree;
pub mod hash;
