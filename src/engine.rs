//! Top-level facade: wires the four relation DAOs to a data directory,
//! bootstraps its layout, and exposes the consumer-facing CRUD,
//! junction, compaction, and archival operations.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use crate::codec::{self, Algorithm, CodecError};
use crate::compaction::{self, CompactResult, CompactionError};
use crate::dao::item::{Item, ItemDao};
use crate::dao::junction::JunctionDao;
use crate::dao::order::{Order, OrderDao};
use crate::dao::promotion::{Promotion, PromotionDao};
use crate::dao::{DaoError, HeapStats};
use crate::index::btree::DEFAULT_ORDER;
use crate::index::hash::DEFAULT_BUCKET_SIZE;

/// Errors surfaced by the engine facade. Every lower-layer error kind is
/// represented; nothing is swallowed except where the DAO/index layers
/// already treat it as benign (stale index recovery).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Dao(#[from] DaoError),

    #[error(transparent)]
    Compaction(#[from] CompactionError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Tuning knobs for the two index structures. Both default to the
/// values named in their modules.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub btree_order: usize,
    pub bucket_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            btree_order: DEFAULT_ORDER,
            bucket_size: DEFAULT_BUCKET_SIZE,
        }
    }
}

/// Heap header counters for every relation, for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineStats {
    pub items: HeapStats,
    pub orders: HeapStats,
    pub promotions: HeapStats,
    pub order_promotions: HeapStats,
}

/// A promotion applied to an order, or a placeholder if the target
/// promotion no longer exists (tombstoned or never existed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionSummary {
    pub id: u16,
    pub name: String,
}

/// An order that has a given promotion applied, or a placeholder if the
/// target order no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderSummary {
    pub id: u16,
    pub name: String,
}

const DELETED_PROMOTION_PLACEHOLDER: &str = "Deleted Promotion";
const DELETED_ORDER_PLACEHOLDER: &str = "Deleted Order";

/// The embedded storage engine: one directory on disk, one DAO per
/// relation, wired together.
pub struct Engine {
    data_dir: PathBuf,
    config: EngineConfig,
    items: ItemDao,
    orders: OrderDao,
    promotions: PromotionDao,
    order_promotions: JunctionDao,
}

impl Engine {
    /// Opens (creating if necessary) the engine's data directory under
    /// `root`, sweeping stray `.tmp` files left by an interrupted
    /// compaction before any DAO is opened.
    pub fn open(root: impl AsRef<Path>, config: EngineConfig) -> Result<Self, EngineError> {
        let data_dir = root.as_ref().join("data");
        let bin_dir = data_dir.join("bin");
        let indexes_dir = data_dir.join("indexes");
        let compressed_dir = data_dir.join("compressed");
        fs::create_dir_all(&bin_dir)?;
        fs::create_dir_all(&indexes_dir)?;
        fs::create_dir_all(&compressed_dir)?;

        sweep_tmp_files(&bin_dir)?;
        sweep_tmp_files(&indexes_dir)?;

        let engine = Self::open_daos(&data_dir, config)?;
        info!(data_dir = %data_dir.display(), "engine: opened");
        Ok(engine)
    }

    fn open_daos(data_dir: &Path, config: EngineConfig) -> Result<Self, EngineError> {
        Ok(Engine {
            data_dir: data_dir.to_path_buf(),
            config,
            items: ItemDao::open(data_dir, config.btree_order)?,
            orders: OrderDao::open(data_dir, config.btree_order)?,
            promotions: PromotionDao::open(data_dir, config.btree_order)?,
            order_promotions: JunctionDao::open(data_dir, config.bucket_size)?,
        })
    }

    // -- Items ---------------------------------------------------------

    pub fn create_item(&self, name: &str, price_in_cents: u32) -> Result<u16, EngineError> {
        Ok(self.items.create(name, price_in_cents)?)
    }

    pub fn read_item(&self, id: u16) -> Result<Item, EngineError> {
        Ok(self.items.read(id)?)
    }

    pub fn read_item_with_index(&self, id: u16, use_index: bool) -> Result<Item, EngineError> {
        Ok(self.items.read_with_index(id, use_index)?)
    }

    pub fn delete_item(&self, id: u16) -> Result<(), EngineError> {
        Ok(self.items.delete(id)?)
    }

    pub fn get_all_items(&self) -> Result<Vec<Item>, EngineError> {
        Ok(self.items.get_all()?)
    }

    // -- Orders ----------------------------------------------------------

    /// Looks up each referenced item's price, sums it as a `u64` to catch
    /// overflow before the DAO narrows it to the on-disk `u32` field, and
    /// creates the order.
    pub fn create_order(&self, name: &str, item_ids: Vec<u16>) -> Result<u16, EngineError> {
        let total_price = self.sum_item_prices(&item_ids)?;
        Ok(self.orders.create(name, total_price, &item_ids)?)
    }

    pub fn read_order(&self, id: u16) -> Result<Order, EngineError> {
        Ok(self.orders.read(id)?)
    }

    pub fn read_order_with_index(&self, id: u16, use_index: bool) -> Result<Order, EngineError> {
        Ok(self.orders.read_with_index(id, use_index)?)
    }

    pub fn delete_order(&self, id: u16) -> Result<(), EngineError> {
        Ok(self.orders.delete(id)?)
    }

    pub fn get_all_orders(&self) -> Result<Vec<Order>, EngineError> {
        Ok(self.orders.get_all()?)
    }

    // -- Promotions --------------------------------------------------------

    pub fn create_promotion(&self, name: &str, item_ids: Vec<u16>) -> Result<u16, EngineError> {
        let total_price = self.sum_item_prices(&item_ids)?;
        Ok(self.promotions.create(name, total_price, &item_ids)?)
    }

    pub fn read_promotion(&self, id: u16) -> Result<Promotion, EngineError> {
        Ok(self.promotions.read(id)?)
    }

    pub fn read_promotion_with_index(&self, id: u16, use_index: bool) -> Result<Promotion, EngineError> {
        Ok(self.promotions.read_with_index(id, use_index)?)
    }

    pub fn delete_promotion(&self, id: u16) -> Result<(), EngineError> {
        Ok(self.promotions.delete(id)?)
    }

    pub fn get_all_promotions(&self) -> Result<Vec<Promotion>, EngineError> {
        Ok(self.promotions.get_all()?)
    }

    fn sum_item_prices(&self, item_ids: &[u16]) -> Result<u64, EngineError> {
        let mut total: u64 = 0;
        for &id in item_ids {
            let item = self.items.read(id)?;
            total += u64::from(item.price_in_cents);
        }
        Ok(total)
    }

    // -- Junction ------------------------------------------------------

    /// Applies `promo_id` to `order_id`. Applying an already-applied
    /// promotion is idempotent, not an error — the junction's own
    /// `Duplicate` is swallowed here.
    pub fn apply_promotion_to_order(&self, order_id: u16, promo_id: u16) -> Result<(), EngineError> {
        self.read_order(order_id)?;
        self.read_promotion(promo_id)?;
        match self.order_promotions.apply(order_id, promo_id) {
            Ok(()) => Ok(()),
            Err(DaoError::HashIndex(crate::index::hash::HashIndexError::Duplicate)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn remove_promotion_from_order(&self, order_id: u16, promo_id: u16) -> Result<(), EngineError> {
        Ok(self.order_promotions.remove(order_id, promo_id)?)
    }

    /// Every promotion applied to `order_id`. A promotion that has since
    /// been deleted (or never existed) surfaces as a placeholder rather
    /// than being silently dropped — the junction row survives target
    /// deletion by design (§5 concurrency notes).
    pub fn get_order_promotions(&self, order_id: u16) -> Result<Vec<PromotionSummary>, EngineError> {
        let promo_ids = self.order_promotions.get_by_order_id(order_id)?;
        let mut summaries = Vec::with_capacity(promo_ids.len());
        for id in promo_ids {
            let name = match self.promotions.read(id) {
                Ok(p) => p.name,
                Err(DaoError::NotFound) => DELETED_PROMOTION_PLACEHOLDER.to_string(),
                Err(e) => return Err(e.into()),
            };
            summaries.push(PromotionSummary { id, name });
        }
        Ok(summaries)
    }

    /// Every order that has `promo_id` applied, with the same placeholder
    /// substitution for a vanished order.
    pub fn get_promotion_orders(&self, promo_id: u16) -> Result<Vec<OrderSummary>, EngineError> {
        let order_ids = self.order_promotions.get_by_promotion_id(promo_id)?;
        let mut summaries = Vec::with_capacity(order_ids.len());
        for id in order_ids {
            let name = match self.orders.read(id) {
                Ok(o) => o.name,
                Err(DaoError::NotFound) => DELETED_ORDER_PLACEHOLDER.to_string(),
                Err(e) => return Err(e.into()),
            };
            summaries.push(OrderSummary { id, name });
        }
        Ok(summaries)
    }

    // -- Compaction ------------------------------------------------------

    /// Runs a full compaction pass. Requires exclusive access to the
    /// engine (`&mut self`) because compaction rewrites every heap file
    /// out from under any DAO currently holding it open — the stock
    /// implementation closes and reopens every DAO around the rewrite,
    /// then eagerly rebuilds each index rather than leaving it empty
    /// until the next write.
    pub fn compact(&mut self) -> Result<CompactResult, EngineError> {
        let result = compaction::compact(&self.data_dir)?;

        let reopened = Self::open_daos(&self.data_dir, self.config)?;
        *self = reopened;

        self.items.rebuild_index()?;
        self.orders.rebuild_index()?;
        self.promotions.rebuild_index()?;
        self.order_promotions.rebuild_index()?;

        info!(
            items_removed = result.items_removed,
            orders_removed = result.orders_removed,
            promotions_removed = result.promotions_removed,
            order_promotions_removed = result.order_promotions_removed,
            "engine: compacted"
        );
        Ok(result)
    }

    // -- Archival --------------------------------------------------------

    /// Compresses an arbitrary file (typically one of the heap files
    /// under `data/bin`) into `data/compressed/<name>.<ext>`.
    pub fn compress_file(
        &self,
        path: impl AsRef<Path>,
        algorithm: Algorithm,
    ) -> Result<(PathBuf, u64, u64), EngineError> {
        Ok(codec::compress_file(path.as_ref(), algorithm)?)
    }

    /// Decompresses a previously compressed file, sniffing the codec
    /// from its container magic.
    pub fn decompress_file(&self, path: impl AsRef<Path>) -> Result<PathBuf, EngineError> {
        Ok(codec::decompress_file(path.as_ref())?)
    }

    // -- Diagnostics -----------------------------------------------------

    pub fn stats(&self) -> Result<EngineStats, EngineError> {
        Ok(EngineStats {
            items: self.items.heap_stats()?,
            orders: self.orders.heap_stats()?,
            promotions: self.promotions.heap_stats()?,
            order_promotions: self.order_promotions.heap_stats()?,
        })
    }
}

/// Removes any stray `*.tmp` file left behind by a compaction that
/// crashed between writing its temp file and renaming it over the
/// original.
fn sweep_tmp_files(dir: &Path) -> Result<(), std::io::Error> {
    if !dir.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.path().extension().is_some_and(|ext| ext == "tmp") {
            warn!(path = %entry.path().display(), "engine: sweeping stray .tmp file");
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}
