//! Integer identity for workbook rows.
//!
//! Ids are normalized to `i64` here, once, whatever shape the cell has on
//! file (hand-edited workbooks mix `3`, `3.0` and `"3"`). The `_sequences`
//! sheet remembers the highest id ever issued per table so that deleting the
//! newest row never makes its id available again.

use crate::error::{StoreError, StoreResult};
use crate::schema::{ID_COLUMN, SEQUENCES_TABLE};
use procura_sheet::{Book, CellValue, Sheet};

const SEQ_TABLE_COLUMN: &str = "table";
const SEQ_LAST_ID_COLUMN: &str = "last_id";

/// Column layout of the `_sequences` sheet.
pub(crate) const SEQUENCE_COLUMNS: [&str; 2] = [SEQ_TABLE_COLUMN, SEQ_LAST_ID_COLUMN];

/// Canonical integer form of an id cell, if it has one.
#[allow(clippy::float_cmp)]
#[must_use]
pub fn normalize_id(value: &CellValue) -> Option<i64> {
    let integral = |f: f64| (f.is_finite() && f.trunc() == f).then_some(f as i64);
    match value {
        CellValue::Int(i) => Some(*i),
        CellValue::Float(f) => integral(*f),
        CellValue::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().and_then(integral))
        }
        CellValue::Null | CellValue::Bool(_) => None,
    }
}

fn id_column(sheet: &Sheet) -> StoreResult<usize> {
    sheet
        .column_index(ID_COLUMN)
        .ok_or_else(|| StoreError::NoIdColumn(sheet.name().to_string()))
}

/// Index of the first data row (top to bottom) whose id equals `id`.
pub(crate) fn find_row(sheet: &Sheet, id: i64) -> StoreResult<Option<usize>> {
    let col = id_column(sheet)?;
    Ok(sheet
        .rows()
        .position(|row| row.get(col).and_then(normalize_id) == Some(id)))
}

/// Largest id currently present, 0 for an empty table.
pub(crate) fn max_present(sheet: &Sheet) -> StoreResult<i64> {
    let col = id_column(sheet)?;
    Ok(sheet
        .rows()
        .filter_map(|row| row.get(col).and_then(normalize_id))
        .max()
        .unwrap_or(0)
        .max(0))
}

/// Highest id ever issued for `table`, 0 if none was recorded.
pub(crate) fn last_issued(book: &Book, table: &str) -> i64 {
    let Ok(seq) = book.get_sheet(SEQUENCES_TABLE) else {
        return 0;
    };
    let (Some(name_col), Some(id_col)) = (
        seq.column_index(SEQ_TABLE_COLUMN),
        seq.column_index(SEQ_LAST_ID_COLUMN),
    ) else {
        return 0;
    };
    seq.rows()
        .filter(|row| row.get(name_col).is_some_and(|c| c.as_str() == table))
        .filter_map(|row| row.get(id_col).and_then(normalize_id))
        .max()
        .unwrap_or(0)
}

/// `1 + max(present ids, highest id ever issued)`.
pub(crate) fn next_id(book: &Book, table: &str) -> StoreResult<i64> {
    let sheet = book
        .get_sheet(table)
        .map_err(|_| StoreError::UnknownTable(table.to_string()))?;
    Ok(max_present(sheet)?.max(last_issued(book, table)) + 1)
}

/// Raise the recorded high-water mark for `table` to at least `id`.
pub(crate) fn record_issued(book: &mut Book, table: &str, id: i64) -> StoreResult<()> {
    if !book.has_sheet(SEQUENCES_TABLE) {
        book.add_sheet(
            SEQUENCES_TABLE,
            Sheet::with_columns(SEQUENCES_TABLE, &SEQUENCE_COLUMNS),
        )?;
    }
    let seq = book.get_sheet_mut(SEQUENCES_TABLE)?;
    let name_col = seq.column_index(SEQ_TABLE_COLUMN);

    let existing = name_col.and_then(|col| {
        seq.rows()
            .position(|row| row.get(col).is_some_and(|c| c.as_str() == table))
    });

    match existing {
        Some(row) => {
            let current = seq
                .get_by_name(row, SEQ_LAST_ID_COLUMN)
                .ok()
                .and_then(normalize_id)
                .unwrap_or(0);
            if id > current {
                seq.set_by_name(row, SEQ_LAST_ID_COLUMN, id)?;
            }
        }
        None => {
            let mut record = procura_sheet::Record::new();
            record.insert(SEQ_TABLE_COLUMN.to_string(), CellValue::from(table));
            record.insert(SEQ_LAST_ID_COLUMN.to_string(), CellValue::Int(id));
            let row = seq.row_from_record(&record);
            seq.row_append(row)?;
        }
    }
    Ok(())
}
