//! Workbook schema creation and additive migration.

use crate::clock;
use crate::error::{StoreError, StoreResult};
use crate::ids::{self, SEQUENCE_COLUMNS};
use crate::serializer::{WriteGuard, WriteSerializer};
use crate::workbook;
use procura_sheet::{Book, CellValue, Record, Sheet};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Name of the identity column.
pub const ID_COLUMN: &str = "id";

/// Internal sheet holding per-table id high-water marks.
pub const SEQUENCES_TABLE: &str = "_sequences";

/// A table name plus its ordered, append-only column list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<String>,
}

impl TableDef {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
        }
    }

    /// Add a trailing column to the definition.
    #[must_use]
    pub fn with_column(mut self, column: &str) -> Self {
        if !self.columns.iter().any(|c| c == column) {
            self.columns.push(column.to_string());
        }
        self
    }
}

/// The procurement tables.
#[must_use]
pub fn default_tables() -> Vec<TableDef> {
    vec![
        TableDef::new("users", &["id", "username", "password_hash", "role", "created_at"]),
        TableDef::new(
            "requisitions",
            &[
                "id",
                "number",
                "po_number",
                "description",
                "vessel",
                "category",
                "supplier",
                "date_ordered",
                "expected",
                "amount_original",
                "currency",
                "amount_usd",
                "paid",
                "delivered",
                "status",
                "remarks",
                "urgency",
                "tracking_url",
                "created_by",
                "created_at",
                "updated_at",
            ],
        ),
        TableDef::new(
            "landings",
            &[
                "id",
                "vessel",
                "item",
                "workshop",
                "expected",
                "landed_date",
                "amount_original",
                "currency",
                "amount_usd",
                "paid",
                "delivered",
                "status",
                "created_by",
                "created_at",
                "updated_at",
            ],
        ),
        TableDef::new(
            "directory",
            &[
                "id",
                "type",
                "name",
                "email",
                "phone",
                "address",
                "rating",
                "rating_comment",
                "created_by",
                "created_at",
            ],
        ),
        TableDef::new("categories", &["id", "name", "abbr", "created_at"]),
        TableDef::new("vessels", &["id", "name", "created_at"]),
        TableDef::new("logs", &["id", "timestamp", "user", "action", "target", "details"]),
        TableDef::new(
            "documents",
            &["id", "parent_type", "parent_id", "filename", "uploaded_at", "uploaded_by"],
        ),
    ]
}

/// Lowercase hex SHA-256 of a password.
#[must_use]
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

/// The privileged account seeded on first run.
///
/// The default credential is a well-known bootstrap value: operators are
/// expected to rotate it right after the first login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapAccount {
    pub table: String,
    pub username: String,
    pub password: String,
    pub role: String,
}

impl Default for BootstrapAccount {
    fn default() -> Self {
        Self {
            table: "users".to_string(),
            username: "admin".to_string(),
            password: "admin123".to_string(),
            role: "admin".to_string(),
        }
    }
}

impl BootstrapAccount {
    #[must_use]
    pub fn password_hash(&self) -> String {
        hash_password(&self.password)
    }

    fn uses_default_password(&self) -> bool {
        self.password == Self::default().password
    }
}

/// What an `ensure` run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub created_file: bool,
    pub tables_created: Vec<String>,
    /// `(table, column)` pairs appended to existing tables.
    pub columns_added: Vec<(String, String)>,
    pub bootstrap_seeded: bool,
    pub bootstrap_repaired: bool,
}

impl SchemaReport {
    /// True if the workbook had to be rewritten.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.created_file
            || !self.tables_created.is_empty()
            || !self.columns_added.is_empty()
            || self.bootstrap_seeded
            || self.bootstrap_repaired
    }
}

/// Creates the workbook and keeps every table up to its definition.
pub struct SchemaManager {
    path: PathBuf,
    tables: Vec<TableDef>,
    bootstrap: BootstrapAccount,
    utc_offset_hours: i32,
    serializer: Arc<WriteSerializer>,
}

impl SchemaManager {
    pub fn new(
        path: impl Into<PathBuf>,
        tables: Vec<TableDef>,
        bootstrap: BootstrapAccount,
        serializer: Arc<WriteSerializer>,
    ) -> Self {
        Self {
            path: path.into(),
            tables,
            bootstrap,
            utc_offset_hours: 0,
            serializer,
        }
    }

    #[must_use]
    pub fn with_utc_offset(mut self, hours: i32) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// Create or migrate the workbook. Rewrites the file only when
    /// something changed.
    pub fn ensure(&self) -> StoreResult<SchemaReport> {
        self.serializer.exclusive(|guard| self.ensure_locked(guard))
    }

    pub(crate) fn ensure_locked(&self, guard: &WriteGuard<'_>) -> StoreResult<SchemaReport> {
        let mut report = SchemaReport::default();

        let mut book = if self.path.exists() {
            workbook::load(&self.path)?
        } else {
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            report.created_file = true;
            Book::new()
        };

        for def in &self.tables {
            Self::migrate_table(&mut book, def, &mut report)
                .inspect_err(|e| error!(table = %def.name, error = %e, "schema migration failed"))?;
        }
        let sequences = TableDef::new(SEQUENCES_TABLE, &SEQUENCE_COLUMNS);
        Self::migrate_table(&mut book, &sequences, &mut report)?;

        self.ensure_bootstrap(&mut book, &mut report)?;

        if report.changed() {
            workbook::save(&self.serializer, guard, &self.path, &book)?;
            if report.created_file {
                info!(path = %self.path.display(), "created workbook");
            } else {
                info!(
                    tables = ?report.tables_created,
                    columns = ?report.columns_added,
                    "migrated workbook schema"
                );
            }
        }
        Ok(report)
    }

    fn migrate_table(
        book: &mut Book,
        def: &TableDef,
        report: &mut SchemaReport,
    ) -> StoreResult<()> {
        let migration_error = |reason: String| StoreError::SchemaMigration {
            table: def.name.clone(),
            reason,
        };

        if !book.has_sheet(&def.name) {
            book.add_sheet(&def.name, Sheet::with_columns(&def.name, &def.columns))
                .map_err(|e| migration_error(e.to_string()))?;
            if !report.created_file {
                report.tables_created.push(def.name.clone());
            }
            return Ok(());
        }

        let sheet = book
            .get_sheet_mut(&def.name)
            .map_err(|e| migration_error(e.to_string()))?;
        for column in &def.columns {
            // Matched by name: live columns keep their positions and data.
            if !sheet.has_column(column) {
                sheet
                    .column_append(column)
                    .map_err(|e| migration_error(e.to_string()))?;
                report
                    .columns_added
                    .push((def.name.clone(), column.clone()));
            }
        }
        Ok(())
    }

    fn ensure_bootstrap(&self, book: &mut Book, report: &mut SchemaReport) -> StoreResult<()> {
        let account = &self.bootstrap;
        if !book.has_sheet(&account.table) {
            warn!(table = %account.table, "bootstrap account table is not defined; skipping");
            return Ok(());
        }

        let existing = {
            let sheet = book.get_sheet(&account.table)?;
            match sheet.column_index("username") {
                Some(col) => sheet
                    .rows()
                    .position(|row| row.get(col).is_some_and(|c| c.as_str() == account.username)),
                None => None,
            }
        };

        match existing {
            Some(row) => {
                let sheet = book.get_sheet_mut(&account.table)?;
                let blank = sheet
                    .get_by_name(row, "password_hash")
                    .map_or(true, CellValue::is_blank);
                if blank {
                    sheet.set_by_name(row, "password_hash", account.password_hash())?;
                    report.bootstrap_repaired = true;
                    self.warn_default_credential();
                }
            }
            None => {
                let id = ids::next_id(book, &account.table)?;
                let mut record = Record::new();
                record.insert(ID_COLUMN.to_string(), CellValue::Int(id));
                record.insert("username".to_string(), CellValue::from(account.username.as_str()));
                record.insert("password_hash".to_string(), CellValue::from(account.password_hash()));
                record.insert("role".to_string(), CellValue::from(account.role.as_str()));
                record.insert(
                    "created_at".to_string(),
                    CellValue::from(clock::now_iso(self.utc_offset_hours)),
                );

                let sheet = book.get_sheet_mut(&account.table)?;
                let row = sheet.row_from_record(&record);
                sheet.row_append(row)?;
                ids::record_issued(book, &account.table, id)?;
                report.bootstrap_seeded = true;
                self.warn_default_credential();
            }
        }
        Ok(())
    }

    fn warn_default_credential(&self) {
        if self.bootstrap.uses_default_password() {
            warn!(
                username = %self.bootstrap.username,
                "seeded the default bootstrap credential; rotate it after first login"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_is_sha256_hex() {
        assert_eq!(
            hash_password("admin123"),
            "240be518fabd2724ddb6f04eeb1da5967448d7e831c08c8fa822809f74c720a9"
        );
    }

    #[test]
    fn test_report_changed() {
        assert!(!SchemaReport::default().changed());
        let report = SchemaReport {
            columns_added: vec![("vessels".to_string(), "flag".to_string())],
            ..SchemaReport::default()
        };
        assert!(report.changed());
    }

    #[test]
    fn test_default_tables_all_have_ids() {
        for def in default_tables() {
            assert_eq!(def.columns.first().map(String::as_str), Some(ID_COLUMN), "{}", def.name);
        }
    }

    #[test]
    fn test_with_column_is_idempotent() {
        let def = TableDef::new("vessels", &["id", "name"])
            .with_column("flag")
            .with_column("flag");
        assert_eq!(def.columns, vec!["id", "name", "flag"]);
    }
}
