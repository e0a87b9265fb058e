//! CRUD behaviour of the record store against a real workbook file.

use procura_sheet::{Book, Sheet};
use procura_store::{
    CellValue, DeleteMode, Record, RetryPolicy, Storage, StoreConfig, StoreError,
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn config(dir: &Path) -> StoreConfig {
    let mut config = StoreConfig::with_base_dir(dir);
    config.retry = RetryPolicy::no_retry();
    config.auto_backup.enabled = false;
    config
}

fn record(fields: &[(&str, CellValue)]) -> Record {
    fields
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

fn ids(rows: &[Record]) -> Vec<i64> {
    rows.iter().filter_map(|r| r["id"].as_int()).collect()
}

#[test]
fn test_appends_get_sequential_ids() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();
    let records = storage.records();

    assert_eq!(records.next_id("vessels").unwrap(), 1);
    for name in ["Aurora", "Borealis", "Corvina"] {
        records
            .append_row("vessels", record(&[("name", name.into())]))
            .unwrap();
    }

    let rows = records.list_rows("vessels").unwrap();
    assert_eq!(ids(&rows), vec![1, 2, 3]);
    assert_eq!(rows[1]["name"].as_str(), "Borealis");
    assert_eq!(records.next_id("vessels").unwrap(), 4);
}

#[test]
fn test_append_returns_stored_row() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();

    let stored = storage
        .records()
        .append_row(
            "categories",
            record(&[("name", "Spare parts".into()), ("abbr", "SP".into())]),
        )
        .unwrap();

    assert_eq!(stored["id"], CellValue::Int(1));
    assert_eq!(stored["abbr"].as_str(), "SP");
    // Every column is present, unset ones empty
    assert!(stored["created_at"].is_blank());
}

#[test]
fn test_update_touches_only_patched_columns() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();
    let records = storage.records();
    records
        .append_row(
            "directory",
            record(&[
                ("type", "supplier".into()),
                ("name", "Gulf Marine".into()),
                ("email", "sales@gulf.example".into()),
            ]),
        )
        .unwrap();

    let before = records.find_by_id("directory", 1).unwrap().unwrap();
    let updated = records
        .update_row_by_id("directory", 1, &record(&[("phone", "+971 4 000 0000".into())]))
        .unwrap();
    assert!(updated);

    let after = records.find_by_id("directory", 1).unwrap().unwrap();
    for (column, value) in &before {
        if column == "phone" {
            assert_eq!(after[column].as_str(), "+971 4 000 0000");
        } else {
            assert_eq!(&after[column], value, "column {column} changed");
        }
    }
}

#[test]
fn test_update_ignores_id_and_unknown_columns() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();
    let records = storage.records();
    records
        .append_row("vessels", record(&[("name", "Aurora".into())]))
        .unwrap();

    let patch = record(&[
        ("id", CellValue::Int(99)),
        ("flag", "PA".into()),
        ("name", "Aurora II".into()),
    ]);
    assert!(records.update_row_by_id("vessels", 1, &patch).unwrap());

    let rows = records.list_rows("vessels").unwrap();
    assert_eq!(ids(&rows), vec![1]);
    assert_eq!(rows[0]["name"].as_str(), "Aurora II");
    assert!(!rows[0].contains_key("flag"));
}

#[test]
fn test_unknown_id_is_not_an_error() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();
    let records = storage.records();

    let patch = record(&[("name", "Ghost".into())]);
    assert!(!records.update_row_by_id("vessels", 42, &patch).unwrap());
    assert!(!records.delete_row_by_id("vessels", 42).unwrap());
}

#[test]
fn test_bulk_update_counts_matches() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();
    let records = storage.records();
    for _ in 0..3 {
        records
            .append_row("landings", record(&[("item", "Filters".into())]))
            .unwrap();
    }

    let patch = record(&[("delivered", CellValue::Int(1))]);
    assert_eq!(records.update_rows_by_ids("landings", &[1, 3, 7], &patch).unwrap(), 2);

    let delivered: Vec<i64> = records
        .list_rows("landings")
        .unwrap()
        .iter()
        .map(|r| r["delivered"].as_int().unwrap_or(0))
        .collect();
    assert_eq!(delivered, vec![1, 0, 1]);
}

#[test]
fn test_deleted_ids_are_never_reused() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());
    let storage = Storage::open(&cfg).unwrap();
    let records = storage.records();
    for name in ["a", "b", "c"] {
        records
            .append_row("vessels", record(&[("name", name.into())]))
            .unwrap();
    }

    // Deleting the newest row must not hand its id out again
    assert!(records.delete_row_by_id("vessels", 3).unwrap());
    assert_eq!(records.next_id("vessels").unwrap(), 4);

    // Not even after a restart
    let reopened = Storage::open(&cfg).unwrap();
    let stored = reopened
        .records()
        .append_row("vessels", record(&[("name", "d".into())]))
        .unwrap();
    assert_eq!(stored["id"].as_int(), Some(4));
    assert_eq!(ids(&reopened.records().list_rows("vessels").unwrap()), vec![1, 2, 4]);
}

#[test]
fn test_deleted_ids_not_reused_in_workbook_without_sequences() {
    let dir = tempdir().unwrap();
    let cfg = config(dir.path());

    // Written by hand: rows 1..=3 exist but no high-water mark was ever recorded
    let mut vessels = Sheet::with_columns("vessels", &["id", "name"]);
    for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
        vessels
            .row_append(vec![CellValue::Int(id), CellValue::from(name)])
            .unwrap();
    }
    let mut book = Book::new();
    book.add_sheet("vessels", vessels).unwrap();
    book.save_as_xlsx(&cfg.workbook_path).unwrap();

    let storage = Storage::open(&cfg).unwrap();
    let records = storage.records();
    assert!(records.delete_row_by_id("vessels", 3).unwrap());
    assert_eq!(records.next_id("vessels").unwrap(), 4);

    let reopened = Storage::open(&cfg).unwrap();
    let stored = reopened
        .records()
        .append_row("vessels", record(&[("name", "d".into())]))
        .unwrap();
    assert_eq!(stored["id"].as_int(), Some(4));
}

#[test]
fn test_explicit_id_is_kept_and_duplicates_rejected() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();
    let records = storage.records();

    let stored = records
        .append_row("vessels", record(&[("id", CellValue::Int(10)), ("name", "x".into())]))
        .unwrap();
    assert_eq!(stored["id"].as_int(), Some(10));
    assert_eq!(records.next_id("vessels").unwrap(), 11);

    let err = records
        .append_row("vessels", record(&[("id", CellValue::Float(10.0))]))
        .unwrap_err();
    assert!(matches!(err, StoreError::DuplicateId { id: 10, .. }));
}

#[test]
fn test_soft_cancel_keeps_row() {
    let dir = tempdir().unwrap();
    let mut cfg = config(dir.path());
    cfg.delete_mode = DeleteMode::SoftCancel;
    let storage = Storage::open(&cfg).unwrap();
    let records = storage.records();

    records
        .append_row("requisitions", record(&[("number", "PO-7".into())]))
        .unwrap();
    assert!(records.delete_row_by_id("requisitions", 1).unwrap());

    let rows = records.list_rows("requisitions").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"].as_str(), "cancelled");

    // No status column: falls back to removing the row
    records
        .append_row("vessels", record(&[("name", "Aurora".into())]))
        .unwrap();
    assert!(records.delete_row_by_id("vessels", 1).unwrap());
    assert!(records.list_rows("vessels").unwrap().is_empty());
}

#[test]
fn test_unknown_table() {
    let dir = tempdir().unwrap();
    let storage = Storage::open(&config(dir.path())).unwrap();

    assert!(matches!(
        storage.records().list_rows("invoices"),
        Err(StoreError::UnknownTable(name)) if name == "invoices"
    ));
    assert!(matches!(
        storage.records().next_id("invoices"),
        Err(StoreError::UnknownTable(_))
    ));
}

#[test]
fn test_missing_workbook_before_setup() {
    let dir = tempdir().unwrap();
    let storage = Storage::new(&config(dir.path()));

    assert!(matches!(
        storage.records().list_rows("vessels"),
        Err(StoreError::Missing { .. })
    ));
}

#[test]
fn test_concurrent_appends_get_distinct_ids() {
    let dir = tempdir().unwrap();
    let storage = Arc::new(Storage::open(&config(dir.path())).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let storage = Arc::clone(&storage);
            std::thread::spawn(move || {
                (0..5)
                    .map(|n| {
                        let name = format!("w{worker}-{n}");
                        storage
                            .records()
                            .append_row("vessels", record(&[("name", name.into())]))
                            .unwrap()["id"]
                            .as_int()
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let issued: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let unique: HashSet<i64> = issued.iter().copied().collect();
    assert_eq!(unique.len(), 20);
    assert_eq!(unique, (1..=20).collect::<HashSet<i64>>());

    let rows = storage.records().list_rows("vessels").unwrap();
    assert_eq!(rows.len(), 20);
}
