use super::*;
use tempfile::tempdir;

#[test]
fn insert_twenty_entries_grows_directory_and_finds_all() {
    let mut index = ExtendibleHash::new(2);
    for i in 0..20u16 {
        index.insert(i, i * 10, (i as i64) * 100).unwrap();
    }
    assert_eq!(index.size(), 20);
    assert!(index.global_depth() > 1);
    assert!(index.directory_size() > 2);
    assert_eq!(index.search(5, 50).unwrap(), Some(500));
}

#[test]
fn insert_duplicate_composite_key_fails() {
    let mut index = ExtendibleHash::new(4);
    index.insert(1, 2, 100).unwrap();
    let err = index.insert(1, 2, 200).unwrap_err();
    assert!(matches!(err, HashIndexError::Duplicate));
}

#[test]
fn delete_missing_key_fails_not_found() {
    let mut index = ExtendibleHash::new(4);
    let err = index.delete(1, 2).unwrap_err();
    assert!(matches!(err, HashIndexError::NotFound));
}

#[test]
fn delete_removes_entry_without_shrinking_directory() {
    let mut index = ExtendibleHash::new(2);
    for i in 0..20u16 {
        index.insert(i, i * 10, (i as i64) * 100).unwrap();
    }
    let dir_size_before = index.directory_size();
    index.delete(5, 50).unwrap();
    assert_eq!(index.search(5, 50).unwrap(), None);
    assert_eq!(index.size(), 19);
    assert_eq!(index.directory_size(), dir_size_before);
}

#[test]
fn get_by_order_id_and_promotion_id_scan_all_matches() {
    let mut index = ExtendibleHash::new(4);
    index.insert(1, 10, 100).unwrap();
    index.insert(1, 20, 200).unwrap();
    index.insert(2, 10, 300).unwrap();

    let mut by_order = index.get_by_order_id(1);
    by_order.sort();
    assert_eq!(by_order, vec![(10, 100), (20, 200)]);

    let mut by_promo = index.get_by_promotion_id(10);
    by_promo.sort();
    assert_eq!(by_promo, vec![(1, 100), (2, 300)]);
}

#[test]
fn save_then_load_preserves_global_depth_and_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("order_promotions.idx");

    let mut index = ExtendibleHash::new(2);
    for i in 0..20u16 {
        index.insert(i, i * 10, (i as i64) * 100).unwrap();
    }
    index.save(&path).unwrap();

    let loaded = ExtendibleHash::load(&path, 2);
    assert_eq!(loaded.global_depth(), index.global_depth());
    assert_eq!(loaded.size(), index.size());
    assert_eq!(loaded.search(5, 50).unwrap(), Some(500));
}

#[test]
fn load_missing_file_yields_fresh_empty_index() {
    let dir = tempdir().unwrap();
    let index = ExtendibleHash::load(dir.path().join("missing.idx"), 4);
    assert_eq!(index.size(), 0);
    assert_eq!(index.global_depth(), 1);
}

#[test]
fn load_corrupt_file_yields_fresh_empty_index() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.idx");
    std::fs::write(&path, b"garbage").unwrap();
    let index = ExtendibleHash::load(&path, 4);
    assert_eq!(index.size(), 0);
}
