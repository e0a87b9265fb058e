//! Workbook codec for procura
//!
//! Models a workbook file as an ordered [`Book`] of header-aware [`Sheet`]s,
//! and reads/writes it as `.xlsx`. Row 1 of every worksheet is the header;
//! data rows follow.
//!
//! # Examples
//!
//! ```
//! use procura_sheet::{Book, CellValue, Record, Sheet};
//!
//! let mut vessels = Sheet::with_columns("vessels", &["id", "name"]);
//! let mut record = Record::new();
//! record.insert("name".to_string(), CellValue::from("MV Aurora"));
//! record.insert("id".to_string(), CellValue::Int(1));
//! vessels.row_append(vessels.row_from_record(&record)).unwrap();
//!
//! let mut book = Book::new();
//! book.add_sheet("vessels", vessels).unwrap();
//!
//! let records = book.get_sheet("vessels").unwrap().to_records();
//! assert_eq!(records[0]["name"].as_str(), "MV Aurora");
//! ```

mod book;
mod cell;
mod error;
mod sheet;
mod xlsx;

pub use book::Book;
pub use cell::CellValue;
pub use error::{Result, SheetError};
pub use sheet::{Record, Sheet};
