use super::record::{parse_item, serialize_item};
use super::*;
use tempfile::tempdir;

fn open_heap(dir: &tempfile::TempDir, name: &str) -> HeapFile {
    HeapFile::open(dir.path().join(name)).unwrap()
}

#[test]
fn open_creates_zeroed_header_for_missing_file() {
    let dir = tempdir().unwrap();
    let heap = open_heap(&dir, "items.bin");
    assert_eq!(heap.entity_count(), 0);
    assert_eq!(heap.tombstone_count(), 0);
    assert_eq!(heap.next_id(), 0);
}

#[test]
fn append_mints_sequential_ids_and_advances_next_id() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "items.bin");

    let (id0, _) = heap.append(&serialize_item("Burger", 899)).unwrap();
    let (id1, _) = heap.append(&serialize_item("Fries", 349)).unwrap();
    let (id2, _) = heap.append(&serialize_item("Soda", 199)).unwrap();

    assert_eq!((id0, id1, id2), (0, 1, 2));
    assert_eq!(heap.next_id(), 3);
    assert_eq!(heap.entity_count(), 3);
}

#[test]
fn find_by_id_returns_record_and_not_found_past_eof() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "items.bin");
    heap.append(&serialize_item("Burger", 899)).unwrap();

    let payload = heap.find_by_id(0).unwrap();
    let item = parse_item(&payload).unwrap();
    assert_eq!(item.name, "Burger");

    let err = heap.find_by_id(99).unwrap_err();
    assert!(matches!(err, HeapError::NotFound));
}

#[test]
fn read_at_returns_record_found_by_index_offset() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "items.bin");
    let (_, offset) = heap.append(&serialize_item("Burger", 899)).unwrap();

    let payload = heap.read_at(offset).unwrap();
    let item = parse_item(&payload).unwrap();
    assert_eq!(item.name, "Burger");
    assert_eq!(item.price_in_cents, 899);
}

#[test]
fn soft_delete_flips_tombstone_and_rejects_double_delete() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "items.bin");
    heap.append(&serialize_item("Burger", 899)).unwrap();

    heap.soft_delete_by_id(0, |_| Ok(())).unwrap();
    assert_eq!(heap.tombstone_count(), 1);

    let payload = heap.find_by_id(0).unwrap();
    assert!(parse_item(&payload).unwrap().is_deleted);

    let err = heap.soft_delete_by_id(0, |_| Ok(())).unwrap_err();
    assert!(matches!(err, HeapError::AlreadyDeleted));
    assert_eq!(heap.tombstone_count(), 1);
}

#[test]
fn soft_delete_on_missing_id_fails_not_found() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "items.bin");
    let err = heap.soft_delete_by_id(7, |_| Ok(())).unwrap_err();
    assert!(matches!(err, HeapError::NotFound));
}

#[test]
fn iterate_entries_visits_live_and_dead_in_insertion_order() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "items.bin");
    heap.append(&serialize_item("Burger", 899)).unwrap();
    heap.append(&serialize_item("Fries", 349)).unwrap();
    heap.soft_delete_by_id(0, |_| Ok(())).unwrap();

    let mut seen = Vec::new();
    heap.iterate_entries(|payload, _offset| {
        seen.push(parse_item(payload).unwrap());
        Ok(())
    })
    .unwrap();

    assert_eq!(seen.len(), 2);
    assert!(seen[0].is_deleted);
    assert!(!seen[1].is_deleted);
}

#[test]
fn read_at_rejects_out_of_bounds_length_prefix() {
    use std::io::Write;
    let dir = tempdir().unwrap();
    let path = dir.path().join("items.bin");
    {
        let mut heap = open_heap(&dir, "items.bin");
        heap.append(&serialize_item("Burger", 899)).unwrap();
    }
    // Corrupt the length prefix of the one record to claim a 0-byte payload.
    let mut file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.seek(SeekFrom::Start(HEADER_SIZE)).unwrap();
    file.write_all(&[0x00, 0x00]).unwrap();

    let mut heap = open_heap(&dir, "items.bin");
    let err = heap.read_at(HEADER_SIZE).unwrap_err();
    assert!(matches!(err, HeapError::Corrupt(_)));
}

#[test]
fn reopen_preserves_header_state() {
    let dir = tempdir().unwrap();
    {
        let mut heap = open_heap(&dir, "items.bin");
        heap.append(&serialize_item("Burger", 899)).unwrap();
        heap.append(&serialize_item("Fries", 349)).unwrap();
        heap.soft_delete_by_id(0, |_| Ok(())).unwrap();
    }
    let heap = open_heap(&dir, "items.bin");
    assert_eq!(heap.entity_count(), 2);
    assert_eq!(heap.tombstone_count(), 1);
    assert_eq!(heap.next_id(), 2);
}

#[test]
fn append_composite_does_not_mint_id_or_advance_next_id() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "order_promotions.bin");
    let payload = super::record::serialize_junction(3, 9);
    heap.append_composite(&payload).unwrap();

    assert_eq!(heap.next_id(), 0);
    assert_eq!(heap.entity_count(), 1);

    let found = heap.find_by_composite(3, 9).unwrap();
    let junction = super::record::parse_junction(&found).unwrap();
    assert_eq!(junction.order_id, 3);
    assert_eq!(junction.promo_id, 9);
    assert!(!junction.is_deleted);
}

#[test]
fn soft_delete_by_composite_key_flips_tombstone() {
    let dir = tempdir().unwrap();
    let mut heap = open_heap(&dir, "order_promotions.bin");
    heap.append_composite(&super::record::serialize_junction(3, 9))
        .unwrap();

    heap.soft_delete_by_composite_key(3, 9).unwrap();
    let found = heap.find_by_composite(3, 9).unwrap();
    assert!(super::record::parse_junction(&found).unwrap().is_deleted);

    let err = heap.soft_delete_by_composite_key(3, 9).unwrap_err();
    assert!(matches!(err, HeapError::AlreadyDeleted));
}
