use crate::book::Book;
use crate::cell::CellValue;
use crate::error::{Result, SheetError};
use crate::sheet::Sheet;
use calamine::{open_workbook, Data, Range, Reader, Xlsx, XlsxError};
use rust_xlsxwriter::{Workbook, Worksheet, XlsxError as WriteError};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Convert calamine Data to CellValue
fn data_to_cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Null,
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Int(i) => CellValue::Int(*i),
        Data::Float(f) => CellValue::Float(*f),
        Data::String(s) => CellValue::String(s.clone()),
        // Excel stores dates as days since 1899-12-30
        Data::DateTime(dt) => CellValue::Float(dt.as_f64()),
        Data::DateTimeIso(s) => CellValue::String(s.clone()),
        Data::DurationIso(s) => CellValue::String(s.clone()),
        Data::Error(e) => CellValue::String(format!("#ERROR: {e:?}")),
    }
}

fn read_error(e: XlsxError) -> SheetError {
    SheetError::Read(e.to_string())
}

fn write_error(e: WriteError) -> SheetError {
    SheetError::Write(e.to_string())
}

/// Expand a used range back to an A1-anchored grid.
///
/// calamine trims leading empty rows and columns from the range, so the
/// offset is restored here to keep the header on the first row.
fn range_to_grid(range: &Range<Data>) -> Vec<Vec<CellValue>> {
    let Some((start_row, start_col)) = range.start() else {
        return Vec::new();
    };

    let mut grid: Vec<Vec<CellValue>> = Vec::new();
    for _ in 0..start_row {
        grid.push(Vec::new());
    }
    for row in range.rows() {
        let mut cells = vec![CellValue::Null; start_col as usize];
        cells.extend(row.iter().map(data_to_cell_value));
        grid.push(cells);
    }
    grid
}

/// Write one sheet (header row plus data) into a worksheet
fn write_to_worksheet(worksheet: &mut Worksheet, name: &str, sheet: &Sheet) -> Result<()> {
    worksheet.set_name(name).map_err(write_error)?;

    for (row_idx, row) in sheet.to_grid().iter().enumerate() {
        let row_num = u32::try_from(row_idx)
            .map_err(|_| SheetError::Write("Row index overflow".to_string()))?;
        for (col_idx, cell) in row.iter().enumerate() {
            let col_num = u16::try_from(col_idx)
                .map_err(|_| SheetError::Write("Column index overflow".to_string()))?;

            match cell {
                CellValue::Null => {}
                CellValue::Bool(b) => {
                    worksheet
                        .write_boolean(row_num, col_num, *b)
                        .map_err(write_error)?;
                }
                CellValue::Int(i) => {
                    // Note: Excel stores all numbers as f64, so integers > 2^53
                    // may lose precision
                    worksheet
                        .write_number(row_num, col_num, *i as f64)
                        .map_err(write_error)?;
                }
                CellValue::Float(f) => {
                    worksheet
                        .write_number(row_num, col_num, *f)
                        .map_err(write_error)?;
                }
                CellValue::String(s) if s.is_empty() => {}
                CellValue::String(s) => {
                    worksheet
                        .write_string(row_num, col_num, s)
                        .map_err(write_error)?;
                }
            }
        }
    }

    Ok(())
}

impl Book {
    /// Load a book from an Excel file (all sheets, first row as header)
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Read` if the file is not a readable xlsx workbook.
    pub fn from_xlsx<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut workbook: Xlsx<BufReader<File>> =
            open_workbook(path.as_ref()).map_err(read_error)?;

        let sheet_names: Vec<String> = workbook
            .sheet_names()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut book = Book::new();

        for sheet_name in sheet_names {
            let range = workbook
                .worksheet_range(&sheet_name)
                .map_err(read_error)?;
            let sheet = Sheet::from_grid(&sheet_name, range_to_grid(&range));
            book.add_sheet(&sheet_name, sheet)?;
        }

        Ok(book)
    }

    /// Serialize the book to xlsx bytes in memory
    ///
    /// # Errors
    ///
    /// Returns `SheetError::Write` if a sheet name or cell cannot be encoded.
    pub fn to_xlsx_bytes(&self) -> Result<Vec<u8>> {
        let mut workbook = Workbook::new();

        for (name, sheet) in self.sheets() {
            let worksheet = workbook.add_worksheet();
            write_to_worksheet(worksheet, name, sheet)?;
        }

        workbook.save_to_buffer().map_err(write_error)
    }

    /// Save the book to an Excel file (non-atomic; see the store for
    /// crash-safe persistence)
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be created or written.
    pub fn save_as_xlsx<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let bytes = self.to_xlsx_bytes()?;
        std::fs::write(path.as_ref(), bytes)?;
        Ok(())
    }
}
