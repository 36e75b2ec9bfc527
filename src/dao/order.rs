//! DAO for the `Order` relation: `orders.bin` heap + `orders.idx` B+-tree.

use std::path::Path;

pub use crate::dao::collection::Collection as Order;
use crate::dao::collection::{CollectionDao, CollectionKind};
use crate::dao::{DaoError, HeapStats};

struct OrderKind;

impl CollectionKind for OrderKind {
    const HEAP_FILE: &'static str = "orders.bin";
    const INDEX_FILE: &'static str = "orders.idx";
    const LABEL: &'static str = "order";
}

/// Binds the orders heap to its B+-tree index behind a single mutex.
pub struct OrderDao(CollectionDao<OrderKind>);

impl OrderDao {
    pub fn open(data_dir: &Path, order: usize) -> Result<Self, DaoError> {
        Ok(OrderDao(CollectionDao::open(data_dir, order)?))
    }

    pub fn create(&self, name: &str, total_price_sum: u64, item_ids: &[u16]) -> Result<u16, DaoError> {
        self.0.create(name, total_price_sum, item_ids)
    }

    pub fn read(&self, id: u16) -> Result<Order, DaoError> {
        self.0.read(id)
    }

    pub fn read_with_index(&self, id: u16, use_index: bool) -> Result<Order, DaoError> {
        self.0.read_with_index(id, use_index)
    }

    pub fn delete(&self, id: u16) -> Result<(), DaoError> {
        self.0.delete(id)
    }

    pub fn get_all(&self) -> Result<Vec<Order>, DaoError> {
        self.0.get_all()
    }

    pub fn rebuild_index(&self) -> Result<(), DaoError> {
        self.0.rebuild_index()
    }

    pub fn heap_stats(&self) -> Result<HeapStats, DaoError> {
        self.0.heap_stats()
    }
}
