//! Append-only activity log kept in the `logs` table.

use crate::clock;
use crate::error::StoreResult;
use crate::store::RecordStore;
use procura_sheet::{CellValue, Record};
use std::sync::Arc;
use tracing::warn;

/// Default table for activity entries.
pub const LOGS_TABLE: &str = "logs";

/// Writes `{timestamp, user, action, target, details}` rows.
pub struct AuditLog {
    records: Arc<RecordStore>,
    table: String,
    utc_offset_hours: i32,
}

impl AuditLog {
    pub fn new(records: Arc<RecordStore>) -> Self {
        Self {
            records,
            table: LOGS_TABLE.to_string(),
            utc_offset_hours: 0,
        }
    }

    #[must_use]
    pub fn with_utc_offset(mut self, hours: i32) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    /// Log one action. Logging never fails the action it describes, so a
    /// failed write is reported and swallowed; the new entry's id is
    /// returned on success.
    pub fn record(&self, user: &str, action: &str, target: &str, details: &str) -> Option<i64> {
        let mut entry = Record::new();
        entry.insert(
            "timestamp".to_string(),
            CellValue::from(clock::now_iso(self.utc_offset_hours)),
        );
        entry.insert("user".to_string(), CellValue::from(user));
        entry.insert("action".to_string(), CellValue::from(action));
        entry.insert("target".to_string(), CellValue::from(target));
        entry.insert("details".to_string(), CellValue::from(details));

        match self.records.append_row(&self.table, entry) {
            Ok(stored) => stored.get("id").and_then(CellValue::as_int),
            Err(e) => {
                warn!(action, target, error = %e, "could not write activity log entry");
                None
            }
        }
    }

    /// The newest `limit` entries, newest first.
    pub fn recent(&self, limit: usize) -> StoreResult<Vec<Record>> {
        let mut rows = self.records.list_rows(&self.table)?;
        rows.reverse();
        rows.truncate(limit);
        Ok(rows)
    }
}
