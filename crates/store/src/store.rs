//! Generic CRUD over a named table of the workbook.

use crate::error::{StoreError, StoreResult};
use crate::ids::{self, normalize_id};
use crate::schema::ID_COLUMN;
use crate::serializer::WriteSerializer;
use crate::workbook;
use procura_sheet::{Book, CellValue, Record, Sheet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Column set by a soft delete.
pub const STATUS_COLUMN: &str = "status";

/// Value a soft delete writes into [`STATUS_COLUMN`].
pub const CANCELLED: &str = "cancelled";

/// What "delete" means for a row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteMode {
    /// Remove the row.
    #[default]
    Hard,
    /// Keep the row and mark it `status = cancelled`. Tables without a
    /// status column fall back to a hard delete.
    SoftCancel,
}

/// CRUD over the tables of one workbook file.
///
/// Reads go straight to the file; every mutation reloads, edits and
/// rewrites the whole workbook inside the shared [`WriteSerializer`].
pub struct RecordStore {
    path: PathBuf,
    serializer: Arc<WriteSerializer>,
    delete_mode: DeleteMode,
}

impl RecordStore {
    pub fn new(path: impl Into<PathBuf>, serializer: Arc<WriteSerializer>) -> Self {
        Self {
            path: path.into(),
            serializer,
            delete_mode: DeleteMode::default(),
        }
    }

    #[must_use]
    pub fn with_delete_mode(mut self, mode: DeleteMode) -> Self {
        self.delete_mode = mode;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn delete_mode(&self) -> DeleteMode {
        self.delete_mode
    }

    /// Names of every table in the workbook, in file order.
    pub fn table_names(&self) -> StoreResult<Vec<String>> {
        let book = workbook::load(&self.path)?;
        Ok(book.sheet_names().into_iter().map(str::to_string).collect())
    }

    /// All rows of `table` in on-file (append) order.
    pub fn list_rows(&self, table: &str) -> StoreResult<Vec<Record>> {
        let book = workbook::load(&self.path)?;
        Ok(table_sheet(&book, table)?.to_records())
    }

    /// The row whose id equals `id`, if any.
    pub fn find_by_id(&self, table: &str, id: i64) -> StoreResult<Option<Record>> {
        let book = workbook::load(&self.path)?;
        let sheet = table_sheet(&book, table)?;
        match ids::find_row(sheet, id)? {
            Some(row) => Ok(Some(sheet.record(row)?)),
            None => Ok(None),
        }
    }

    /// The id the next append would receive. Not a reservation.
    pub fn next_id(&self, table: &str) -> StoreResult<i64> {
        let book = workbook::load(&self.path)?;
        ids::next_id(&book, table)
    }

    /// Append `record` as the last row and return it as stored.
    ///
    /// Fields are placed by column name; absent columns stay empty and keys
    /// that name no column are dropped. Tables with an `id` column get the
    /// next id unless the record carries one of its own.
    pub fn append_row(&self, table: &str, record: Record) -> StoreResult<Record> {
        self.serializer.exclusive(|guard| {
            let mut book = workbook::load(&self.path)?;
            let mut record = record;

            let (has_id, assigned) = {
                let sheet = table_sheet(&book, table)?;
                warn_unknown_columns(sheet, &record);

                if sheet.has_column(ID_COLUMN) {
                    let explicit = record.get(ID_COLUMN).filter(|v| !v.is_blank());
                    let id = match explicit.map(|v| (v, normalize_id(v))) {
                        Some((_, Some(id))) => {
                            if ids::find_row(sheet, id)?.is_some() {
                                return Err(StoreError::DuplicateId {
                                    table: table.to_string(),
                                    id,
                                });
                            }
                            id
                        }
                        Some((raw, None)) => {
                            warn!(table, id = %raw, "ignoring non-integer id, assigning one");
                            ids::next_id(&book, table)?
                        }
                        None => ids::next_id(&book, table)?,
                    };
                    (true, id)
                } else {
                    (false, 0)
                }
            };
            if has_id {
                record.insert(ID_COLUMN.to_string(), CellValue::Int(assigned));
            }

            let sheet = book.get_sheet_mut(table)?;
            let row = sheet.row_from_record(&record);
            sheet.row_append(row)?;
            let stored = sheet.record(sheet.row_count() - 1)?;
            if has_id {
                ids::record_issued(&mut book, table, assigned)?;
            }

            workbook::save(&self.serializer, guard, &self.path, &book)?;
            debug!(table, id = assigned, "appended row");
            Ok(stored)
        })
    }

    /// Overwrite the columns named in `patch` on the row with id `id`.
    ///
    /// Returns `false` when no row matches. The id itself is never patched.
    pub fn update_row_by_id(&self, table: &str, id: i64, patch: &Record) -> StoreResult<bool> {
        Ok(self.update_rows_by_ids(table, &[id], patch)? > 0)
    }

    /// Apply the same patch to every listed id in one rewrite. Returns how
    /// many rows matched.
    pub fn update_rows_by_ids(&self, table: &str, ids: &[i64], patch: &Record) -> StoreResult<usize> {
        self.serializer.exclusive(|guard| {
            let mut book = workbook::load(&self.path)?;
            let sheet = table_sheet_mut(&mut book, table)?;
            warn_unknown_columns(sheet, patch);

            let mut matched = 0;
            for &id in ids {
                let Some(row) = ids::find_row(sheet, id)? else {
                    continue;
                };
                for (column, value) in patch {
                    if column == ID_COLUMN || !sheet.has_column(column) {
                        continue;
                    }
                    sheet.set_by_name(row, column, value.clone())?;
                }
                matched += 1;
            }

            if matched > 0 {
                workbook::save(&self.serializer, guard, &self.path, &book)?;
                debug!(table, matched, "updated rows");
            }
            Ok(matched)
        })
    }

    /// Delete the row with id `id` according to the delete mode. Returns
    /// `false` when no row matches.
    pub fn delete_row_by_id(&self, table: &str, id: i64) -> StoreResult<bool> {
        self.serializer.exclusive(|guard| {
            let mut book = workbook::load(&self.path)?;
            let sheet = table_sheet_mut(&mut book, table)?;

            let Some(row) = ids::find_row(sheet, id)? else {
                return Ok(false);
            };

            if self.delete_mode == DeleteMode::SoftCancel && sheet.has_column(STATUS_COLUMN) {
                sheet.set_by_name(row, STATUS_COLUMN, CANCELLED)?;
                debug!(table, id, "cancelled row");
            } else {
                // Rows that predate `_sequences` have no recorded mark yet
                let highest = ids::max_present(sheet)?;
                sheet.row_delete(row)?;
                ids::record_issued(&mut book, table, highest)?;
                debug!(table, id, "deleted row");
            }

            workbook::save(&self.serializer, guard, &self.path, &book)?;
            Ok(true)
        })
    }
}

fn table_sheet<'a>(book: &'a Book, table: &str) -> StoreResult<&'a Sheet> {
    book.get_sheet(table)
        .map_err(|_| StoreError::UnknownTable(table.to_string()))
}

fn table_sheet_mut<'a>(book: &'a mut Book, table: &str) -> StoreResult<&'a mut Sheet> {
    book.get_sheet_mut(table)
        .map_err(|_| StoreError::UnknownTable(table.to_string()))
}

fn warn_unknown_columns(sheet: &Sheet, record: &Record) {
    let unknown: Vec<&str> = record
        .keys()
        .filter(|k| !sheet.has_column(k))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        warn!(table = sheet.name(), columns = ?unknown, "ignoring fields with no matching column");
    }
}
