//! Loading and saving the live workbook file.

use crate::error::{StoreError, StoreResult};
use crate::serializer::{WriteGuard, WriteSerializer};
use procura_sheet::{Book, SheetError};
use std::path::Path;

/// Read the whole workbook. A missing file and an unreadable file are
/// distinct: the latter is corruption and must never be papered over.
pub(crate) fn load(path: &Path) -> StoreResult<Book> {
    if !path.exists() {
        return Err(StoreError::Missing {
            path: path.to_path_buf(),
        });
    }
    Book::from_xlsx(path).map_err(|e| match e {
        SheetError::Read(reason) => StoreError::corrupt(path, reason),
        other => StoreError::corrupt(path, other.to_string()),
    })
}

/// Rewrite the whole workbook atomically. Callers hold the write lock.
pub(crate) fn save(
    serializer: &WriteSerializer,
    guard: &WriteGuard<'_>,
    path: &Path,
    book: &Book,
) -> StoreResult<()> {
    let bytes = book.to_xlsx_bytes()?;
    serializer.save(guard, path, &bytes)
}
