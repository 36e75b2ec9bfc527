use tempfile::tempdir;

use crate::dao::item::ItemDao;
use crate::dao::junction::JunctionDao;
use crate::dao::order::OrderDao;
use crate::dao::DaoError;

fn prep_dirs(root: &std::path::Path) {
    std::fs::create_dir_all(root.join("bin")).unwrap();
    std::fs::create_dir_all(root.join("indexes")).unwrap();
}

#[test]
fn item_create_read_delete_round_trip() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = ItemDao::open(dir.path(), 4).unwrap();

    let id = dao.create("Burger", 899).unwrap();
    let item = dao.read(id).unwrap();
    assert_eq!(item.name, "Burger");
    assert_eq!(item.price_in_cents, 899);
    assert!(!item.is_deleted);

    dao.delete(id).unwrap();
    let err = dao.read(id).unwrap_err();
    assert!(matches!(err, DaoError::NotFound));

    let all = dao.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_deleted);
}

#[test]
fn item_create_rejects_empty_name() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = ItemDao::open(dir.path(), 4).unwrap();
    let err = dao.create("", 100).unwrap_err();
    assert!(matches!(err, DaoError::Validation(_)));
}

#[test]
fn item_rebuild_index_skips_tombstones() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = ItemDao::open(dir.path(), 4).unwrap();
    let a = dao.create("A", 1).unwrap();
    let b = dao.create("B", 2).unwrap();
    dao.delete(a).unwrap();

    dao.rebuild_index().unwrap();
    assert!(dao.read(b).is_ok());
    assert!(matches!(dao.read(a).unwrap_err(), DaoError::NotFound));
}

#[test]
fn order_create_rejects_empty_item_list() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = OrderDao::open(dir.path(), 4).unwrap();
    let err = dao.create("Empty order", 0, &[]).unwrap_err();
    assert!(matches!(err, DaoError::Validation(_)));
}

#[test]
fn order_create_read_delete_round_trip() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = OrderDao::open(dir.path(), 4).unwrap();

    let id = dao.create("Lunch combo", 1598, &[0, 1]).unwrap();
    let order = dao.read(id).unwrap();
    assert_eq!(order.total_price, 1598);
    assert_eq!(order.item_ids, vec![0, 1]);

    dao.delete(id).unwrap();
    assert!(matches!(dao.read(id).unwrap_err(), DaoError::NotFound));
}

#[test]
fn junction_apply_and_query_both_directions() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = JunctionDao::open(dir.path(), 4).unwrap();

    dao.apply(1, 10).unwrap();
    dao.apply(1, 20).unwrap();
    dao.apply(2, 10).unwrap();

    let mut promos_for_order_1 = dao.get_by_order_id(1).unwrap();
    promos_for_order_1.sort();
    assert_eq!(promos_for_order_1, vec![10, 20]);

    let mut orders_for_promo_10 = dao.get_by_promotion_id(10).unwrap();
    orders_for_promo_10.sort();
    assert_eq!(orders_for_promo_10, vec![1, 2]);

    dao.remove(1, 10).unwrap();
    assert_eq!(dao.get_by_order_id(1).unwrap(), vec![20]);
}

#[test]
fn junction_rebuild_index_skips_removed_rows() {
    let dir = tempdir().unwrap();
    prep_dirs(dir.path());
    let dao = JunctionDao::open(dir.path(), 4).unwrap();
    dao.apply(1, 10).unwrap();
    dao.apply(1, 20).unwrap();
    dao.remove(1, 10).unwrap();

    dao.rebuild_index().unwrap();
    assert_eq!(dao.get_by_order_id(1).unwrap(), vec![20]);
}
