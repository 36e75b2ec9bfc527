//! DAO for the `Promotion` relation: `promotions.bin` heap + `promotions.idx` B+-tree.

use std::path::Path;

pub use crate::dao::collection::Collection as Promotion;
use crate::dao::collection::{CollectionDao, CollectionKind};
use crate::dao::{DaoError, HeapStats};

struct PromotionKind;

impl CollectionKind for PromotionKind {
    const HEAP_FILE: &'static str = "promotions.bin";
    const INDEX_FILE: &'static str = "promotions.idx";
    const LABEL: &'static str = "promotion";
}

/// Binds the promotions heap to its B+-tree index behind a single mutex.
pub struct PromotionDao(CollectionDao<PromotionKind>);

impl PromotionDao {
    pub fn open(data_dir: &Path, order: usize) -> Result<Self, DaoError> {
        Ok(PromotionDao(CollectionDao::open(data_dir, order)?))
    }

    pub fn create(&self, name: &str, total_price_sum: u64, item_ids: &[u16]) -> Result<u16, DaoError> {
        self.0.create(name, total_price_sum, item_ids)
    }

    pub fn read(&self, id: u16) -> Result<Promotion, DaoError> {
        self.0.read(id)
    }

    pub fn read_with_index(&self, id: u16, use_index: bool) -> Result<Promotion, DaoError> {
        self.0.read_with_index(id, use_index)
    }

    pub fn delete(&self, id: u16) -> Result<(), DaoError> {
        self.0.delete(id)
    }

    pub fn get_all(&self) -> Result<Vec<Promotion>, DaoError> {
        self.0.get_all()
    }

    pub fn rebuild_index(&self) -> Result<(), DaoError> {
        self.0.rebuild_index()
    }

    pub fn heap_stats(&self) -> Result<HeapStats, DaoError> {
        self.0.heap_stats()
    }
}
