//! Error types for the record store.

use procura_sheet::SheetError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in the record store.
///
/// Unknown ids on update/delete are not errors; those calls return `false`.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The workbook has not been created yet.
    #[error("Workbook not found at {}; run schema setup first", path.display())]
    Missing { path: PathBuf },

    /// The workbook exists but cannot be read or parsed.
    #[error("Store corrupt at {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Bringing an existing table up to its definition failed.
    #[error("Schema migration failed for table '{table}': {reason}")]
    SchemaMigration { table: String, reason: String },

    /// The named table is not present in the workbook.
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    /// The table has no `id` column, so id-based operations are impossible.
    #[error("Table '{0}' has no id column")]
    NoIdColumn(String),

    /// An append supplied an id that is already taken.
    #[error("Duplicate id {id} in table '{table}'")]
    DuplicateId { table: String, id: i64 },

    /// No snapshot with that name exists.
    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    /// The snapshot name is not a plain file name.
    #[error("Invalid snapshot name: {0}")]
    InvalidSnapshotName(String),

    /// Saving failed for good: either a non-transient I/O error or the
    /// retry budget ran out.
    #[error("Save failed after {attempts} attempt(s): {source}")]
    WriteFatal {
        attempts: u32,
        #[source]
        source: std::io::Error,
    },

    /// Encoding error from the workbook codec.
    #[error("Sheet error: {0}")]
    Sheet(#[from] SheetError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persisted scheduler state could not be encoded.
    #[error("State error: {0}")]
    State(#[from] serde_json::Error),
}

impl StoreError {
    /// Create a corruption error.
    pub fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for conditions the caller cannot recover from and should report
    /// as a server-side failure.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Corrupt { .. } | Self::WriteFatal { .. } | Self::SchemaMigration { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StoreError::corrupt("/tmp/x.xlsx", "bad zip").is_fatal());
        assert!(StoreError::WriteFatal {
            attempts: 6,
            source: std::io::Error::new(std::io::ErrorKind::WouldBlock, "busy"),
        }
        .is_fatal());
        assert!(!StoreError::SnapshotNotFound("x".to_string()).is_fatal());
        assert!(!StoreError::UnknownTable("x".to_string()).is_fatal());
    }

    #[test]
    fn test_messages() {
        let err = StoreError::DuplicateId {
            table: "vessels".to_string(),
            id: 3,
        };
        assert_eq!(err.to_string(), "Duplicate id 3 in table 'vessels'");
    }
}
