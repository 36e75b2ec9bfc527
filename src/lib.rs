//! # relstore
//!
//! An embeddable, single-process, disk-backed CRUD store for a small
//! relational schema (items, orders, promotions, and an order↔promotion
//! junction). Designed for simplicity and auditability, not for
//! concurrent multi-writer access or crash-safe atomic commits.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       Engine                              │
//! │  ┌──────────┐  ┌──────────┐  ┌───────────┐  ┌──────────┐ │
//! │  │ ItemDao  │  │ OrderDao │  │ PromoDao  │  │Junction  │ │
//! │  │ (heap +  │  │ (heap +  │  │ (heap +   │  │Dao (heap │ │
//! │  │ B+-tree) │  │ B+-tree) │  │ B+-tree)  │  │+ hash)   │ │
//! │  └────┬─────┘  └────┬─────┘  └─────┬─────┘  └────┬─────┘ │
//! │       └─────────────┴──────────────┴─────────────┘       │
//! │                         │                                 │
//! │                    compaction                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`binary`] | Fixed-width big-endian integer and string encode/decode |
//! | [`heap`] | Append-only heap file: header, records, tombstones, scans |
//! | [`index`] | Persistent B+-tree and extendible-hash indexes |
//! | [`dao`] | Per-relation DAOs binding a heap file to its index |
//! | [`compaction`] | Offline heap rewrite dropping tombstones and dangling refs |
//! | [`codec`] | Huffman and LZW whole-buffer compression codecs |
//! | [`engine`] | Top-level facade wiring DAOs to a data directory |
//!
//! ## Key properties
//!
//! - **Heap is ground truth** — every index can be rebuilt by scanning the
//!   heap and reinserting live records.
//! - **Logical deletion** — records are tombstoned in place, never
//!   physically removed until compaction.
//! - **Best-effort durability** — every mutation is `write → fsync →
//!   header update → fsync`; there is no write-ahead log.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relstore::engine::{Engine, EngineConfig};
//!
//! let mut engine = Engine::open("/tmp/relstore-demo", EngineConfig::default()).unwrap();
//!
//! let burger = engine.create_item("Burger", 899).unwrap();
//! let fries = engine.create_item("Fries", 349).unwrap();
//!
//! let order = engine.create_order("Alice", vec![burger, fries]).unwrap();
//! assert_eq!(engine.read_item(burger).unwrap().price_in_cents, 899);
//!
//! engine.delete_item(fries).unwrap();
//! let result = engine.compact().unwrap();
//! assert_eq!(result.items_removed, 1);
//! ```

#![allow(dead_code)]

pub mod binary;
pub mod codec;
pub mod compaction;
pub mod dao;
pub mod engine;
pub mod heap;
pub mod index;
