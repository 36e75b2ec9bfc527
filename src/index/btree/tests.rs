use super::*;
use tempfile::tempdir;

#[test]
fn insert_and_search_one_hundred_keys() {
    let mut tree = BTree::new(4);
    for k in 1..=100u64 {
        tree.insert(k, (k * 10) as i64).unwrap();
    }
    assert_eq!(tree.size(), 100);
    for k in 1..=100u64 {
        assert_eq!(tree.search(k).unwrap(), Some((k * 10) as i64));
    }
}

#[test]
fn insert_duplicate_key_fails() {
    let mut tree = BTree::new(4);
    tree.insert(1, 10).unwrap();
    let err = tree.insert(1, 20).unwrap_err();
    assert!(matches!(err, BTreeError::Duplicate));
}

#[test]
fn delete_key_removes_it_and_leaves_others_intact() {
    let mut tree = BTree::new(4);
    for k in 1..=100u64 {
        tree.insert(k, (k * 10) as i64).unwrap();
    }
    tree.delete(50).unwrap();
    assert_eq!(tree.search(50).unwrap(), None);
    assert_eq!(tree.size(), 99);
    for k in 1..=100u64 {
        if k != 50 {
            assert_eq!(tree.search(k).unwrap(), Some((k * 10) as i64));
        }
    }
}

#[test]
fn delete_missing_key_fails_not_found() {
    let mut tree = BTree::new(4);
    tree.insert(1, 10).unwrap();
    let err = tree.delete(99).unwrap_err();
    assert!(matches!(err, BTreeError::NotFound));
}

#[test]
fn search_on_empty_tree_returns_none() {
    let tree = BTree::new(4);
    assert_eq!(tree.search(42).unwrap(), None);
}

#[test]
fn delete_all_keys_leaves_empty_searchable_tree() {
    let mut tree = BTree::new(4);
    for k in 1..=30u64 {
        tree.insert(k, k as i64).unwrap();
    }
    for k in 1..=30u64 {
        tree.delete(k).unwrap();
    }
    assert_eq!(tree.size(), 0);
    for k in 1..=30u64 {
        assert_eq!(tree.search(k).unwrap(), None);
    }
}

#[test]
fn save_then_load_preserves_all_entries() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("items.idx");

    let mut tree = BTree::new(4);
    for k in 1..=50u64 {
        tree.insert(k, (k * 3) as i64).unwrap();
    }
    tree.delete(10).unwrap();
    tree.save(&path).unwrap();

    let loaded = BTree::load(&path, 4);
    assert_eq!(loaded.size(), tree.size());
    for k in 1..=50u64 {
        if k == 10 {
            assert_eq!(loaded.search(k).unwrap(), None);
        } else {
            assert_eq!(loaded.search(k).unwrap(), tree.search(k).unwrap());
        }
    }
}

#[test]
fn load_missing_file_yields_fresh_empty_tree() {
    let dir = tempdir().unwrap();
    let tree = BTree::load(dir.path().join("does-not-exist.idx"), 4);
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.search(1).unwrap(), None);
}

#[test]
fn load_corrupt_file_yields_fresh_empty_tree() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("corrupt.idx");
    std::fs::write(&path, b"not a valid btree file").unwrap();

    let tree = BTree::load(&path, 4);
    assert_eq!(tree.size(), 0);
}

#[test]
fn empty_tree_saves_as_single_empty_leaf() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.idx");
    let tree = BTree::new(4);
    tree.save(&path).unwrap();

    let loaded = BTree::load(&path, 4);
    assert_eq!(loaded.size(), 0);
    assert_eq!(loaded.root, 0);
}
