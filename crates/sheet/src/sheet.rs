use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use indexmap::IndexMap;
use std::collections::HashMap;

/// One row's worth of column-name-to-value data, in column order.
pub type Record = IndexMap<String, CellValue>;

/// A named table: an ordered header row plus data rows (row-major storage).
///
/// Every data row is kept exactly as wide as the header. Columns are only
/// ever appended at the end, so a column's position never changes once it
/// exists.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    name: String,
    columns: Vec<String>,
    column_index: HashMap<String, usize>,
    data: Vec<Vec<CellValue>>,
}

impl Sheet {
    /// Create a new empty sheet
    #[must_use]
    pub fn new() -> Self {
        Self::with_name("Sheet1")
    }

    /// Create a new empty sheet with a name
    #[must_use]
    pub fn with_name(name: &str) -> Self {
        Sheet {
            name: name.to_string(),
            columns: Vec::new(),
            column_index: HashMap::new(),
            data: Vec::new(),
        }
    }

    /// Create a sheet with the given header row and no data
    #[must_use]
    pub fn with_columns<S: AsRef<str>>(name: &str, columns: &[S]) -> Self {
        let mut sheet = Self::with_name(name);
        for column in columns {
            sheet.columns.push(column.as_ref().to_string());
        }
        sheet.rebuild_column_index();
        sheet
    }

    /// Build a sheet from a raw grid whose first row is the header.
    ///
    /// Header cells are stringified; blank header cells become unnamed
    /// columns so that data under them survives a rewrite. Rows are padded
    /// or widened so that every row matches the widest row in the grid.
    #[must_use]
    pub fn from_grid(name: &str, grid: Vec<Vec<CellValue>>) -> Self {
        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let mut rows = grid.into_iter();

        let mut sheet = Self::with_name(name);
        if let Some(header) = rows.next() {
            sheet.columns = header.iter().map(|c| c.as_str().trim().to_string()).collect();
            sheet.columns.resize(width, String::new());
        }
        sheet.rebuild_column_index();

        for mut row in rows {
            row.resize(width, CellValue::Null);
            sheet.data.push(row);
        }
        sheet
    }

    /// Render the sheet as a raw grid: header row first, then data rows.
    #[must_use]
    pub fn to_grid(&self) -> Vec<Vec<CellValue>> {
        let mut grid = Vec::with_capacity(self.data.len() + 1);
        grid.push(
            self.columns
                .iter()
                .map(|c| {
                    if c.is_empty() {
                        CellValue::Null
                    } else {
                        CellValue::String(c.clone())
                    }
                })
                .collect(),
        );
        grid.extend(self.data.iter().cloned());
        grid
    }

    /// Get the sheet name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the sheet name
    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Get the number of data rows (the header is not counted)
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.data.len()
    }

    /// Get the number of columns
    #[must_use]
    pub fn col_count(&self) -> usize {
        self.columns.len()
    }

    /// Check if the sheet has no data rows
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // ===== Columns =====

    /// Header names in column order
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Check if a named column exists
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.column_index.contains_key(name)
    }

    /// Position of a named column. With duplicate header names the
    /// leftmost one wins.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_index.get(name).copied()
    }

    /// Append a new trailing column; existing rows get an empty cell.
    pub fn column_append(&mut self, name: &str) -> Result<()> {
        if self.has_column(name) {
            return Err(SheetError::ColumnAlreadyExists {
                name: name.to_string(),
            });
        }
        self.columns.push(name.to_string());
        for row in &mut self.data {
            row.push(CellValue::Null);
        }
        self.column_index
            .insert(name.to_string(), self.columns.len() - 1);
        Ok(())
    }

    fn rebuild_column_index(&mut self) {
        self.column_index.clear();
        for (i, name) in self.columns.iter().enumerate() {
            if !name.is_empty() {
                self.column_index.entry(name.clone()).or_insert(i);
            }
        }
    }

    fn column_index_by_name(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| SheetError::ColumnNotFound {
                name: name.to_string(),
            })
    }

    // ===== Cell Access =====

    /// Get a cell value by data-row and column index (0-based)
    pub fn get(&self, row: usize, col: usize) -> Result<&CellValue> {
        self.data
            .get(row)
            .and_then(|r| r.get(col))
            .ok_or(SheetError::IndexOutOfBounds {
                row,
                col,
                rows: self.row_count(),
                cols: self.col_count(),
            })
    }

    /// Get a cell value by data-row index and column name
    pub fn get_by_name(&self, row: usize, col_name: &str) -> Result<&CellValue> {
        let col = self.column_index_by_name(col_name)?;
        self.get(row, col)
    }

    /// Set a cell value by data-row index and column name
    pub fn set_by_name<T: Into<CellValue>>(
        &mut self,
        row: usize,
        col_name: &str,
        value: T,
    ) -> Result<()> {
        let col = self.column_index_by_name(col_name)?;
        let rows = self.row_count();
        let cols = self.col_count();
        let cell = self
            .data
            .get_mut(row)
            .and_then(|r| r.get_mut(col))
            .ok_or(SheetError::IndexOutOfBounds {
                row,
                col,
                rows,
                cols,
            })?;
        *cell = value.into();
        Ok(())
    }

    // ===== Row Operations =====

    /// Append a data row; it must be exactly as wide as the header.
    pub fn row_append<T: Into<CellValue>>(&mut self, data: Vec<T>) -> Result<()> {
        let row: Vec<CellValue> = data.into_iter().map(Into::into).collect();
        if row.len() != self.col_count() {
            return Err(SheetError::LengthMismatch {
                expected: self.col_count(),
                actual: row.len(),
            });
        }
        self.data.push(row);
        Ok(())
    }

    /// Delete a data row at a specific index
    pub fn row_delete(&mut self, index: usize) -> Result<Vec<CellValue>> {
        if index >= self.row_count() {
            return Err(SheetError::RowIndexOutOfBounds {
                index,
                count: self.row_count(),
            });
        }
        Ok(self.data.remove(index))
    }

    /// Get data rows iterator
    pub fn rows(&self) -> impl Iterator<Item = &Vec<CellValue>> {
        self.data.iter()
    }

    // ===== Records =====

    /// Map a record onto the header order by name. Columns the record does
    /// not name are left empty; keys with no matching column are ignored.
    #[must_use]
    pub fn row_from_record(&self, record: &Record) -> Vec<CellValue> {
        self.columns
            .iter()
            .map(|name| {
                if name.is_empty() {
                    return CellValue::Null;
                }
                record.get(name).cloned().unwrap_or(CellValue::Null)
            })
            .collect()
    }

    /// Get a data row as a record keyed by column name
    pub fn record(&self, index: usize) -> Result<Record> {
        let row = self.data.get(index).ok_or(SheetError::RowIndexOutOfBounds {
            index,
            count: self.row_count(),
        })?;
        Ok(self.to_record(row))
    }

    /// All data rows as records, in on-file order
    #[must_use]
    pub fn to_records(&self) -> Vec<Record> {
        self.data.iter().map(|row| self.to_record(row)).collect()
    }

    fn to_record(&self, row: &[CellValue]) -> Record {
        let mut record = Record::new();
        for (i, name) in self.columns.iter().enumerate() {
            if name.is_empty() || record.contains_key(name) {
                continue;
            }
            record.insert(name.clone(), row.get(i).cloned().unwrap_or_default());
        }
        record
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::new()
    }
}
