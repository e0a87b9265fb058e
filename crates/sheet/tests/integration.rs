use procura_sheet::{Book, CellValue, Record, Sheet, SheetError};
use tempfile::tempdir;

// ===== Record Mapping Tests =====

#[test]
fn test_records_follow_header_order() {
    let mut sheet = Sheet::with_columns("requisitions", &["id", "number", "amount_usd"]);

    let mut record = Record::new();
    record.insert("amount_usd".to_string(), CellValue::Float(111.11));
    record.insert("number".to_string(), CellValue::from("PO-1"));
    record.insert("id".to_string(), CellValue::Int(1));
    sheet.row_append(sheet.row_from_record(&record)).unwrap();

    let records = sheet.to_records();
    assert_eq!(records.len(), 1);
    let keys: Vec<&str> = records[0].keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "number", "amount_usd"]);
}

#[test]
fn test_set_by_name_touches_one_cell() {
    let mut sheet = Sheet::with_columns("t", &["id", "paid", "note"]);
    sheet
        .row_append(vec![CellValue::Int(1), CellValue::Int(0), CellValue::from("x")])
        .unwrap();

    sheet.set_by_name(0, "paid", 1).unwrap();

    assert_eq!(sheet.get_by_name(0, "paid").unwrap(), &CellValue::Int(1));
    assert_eq!(sheet.get_by_name(0, "note").unwrap().as_str(), "x");
    assert!(matches!(
        sheet.set_by_name(0, "missing", 1),
        Err(SheetError::ColumnNotFound { .. })
    ));
}

#[test]
fn test_row_delete_out_of_bounds() {
    let mut sheet = Sheet::with_columns("t", &["id"]);
    assert!(matches!(
        sheet.row_delete(0),
        Err(SheetError::RowIndexOutOfBounds { index: 0, count: 0 })
    ));
}

// ===== File Round Trip Tests =====

#[test]
fn test_appended_column_survives_save() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("grow.xlsx");

    let mut sheet = Sheet::with_columns("vessels", &["id", "name"]);
    sheet
        .row_append(vec![CellValue::Int(1), CellValue::from("MV Aurora")])
        .unwrap();
    sheet.column_append("flag").unwrap();

    let mut book = Book::new();
    book.add_sheet("vessels", sheet).unwrap();
    book.save_as_xlsx(&path).unwrap();

    let loaded = Book::from_xlsx(&path).unwrap();
    let vessels = loaded.get_sheet("vessels").unwrap();
    assert_eq!(
        vessels.columns(),
        &["id".to_string(), "name".to_string(), "flag".to_string()]
    );
    assert_eq!(vessels.get_by_name(0, "name").unwrap().as_str(), "MV Aurora");
    assert!(vessels.get_by_name(0, "flag").unwrap().is_null());
}

#[test]
fn test_in_memory_bytes_match_file_contents() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bytes.xlsx");

    let mut book = Book::new();
    book.add_sheet("categories", Sheet::with_columns("c", &["id", "name", "abbr"]))
        .unwrap();

    let bytes = book.to_xlsx_bytes().unwrap();
    std::fs::write(&path, &bytes).unwrap();

    let loaded = Book::from_xlsx(&path).unwrap();
    assert!(loaded.has_sheet("categories"));
    assert_eq!(loaded.get_sheet("categories").unwrap().col_count(), 3);
}

#[test]
fn test_missing_file_is_read_error() {
    let dir = tempdir().unwrap();
    let result = Book::from_xlsx(dir.path().join("nope.xlsx"));
    assert!(matches!(result, Err(SheetError::Read(_))));
}
