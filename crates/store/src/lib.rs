//! # procura-store
//!
//! Persistent record store on a single workbook file.
//!
//! This crate provides:
//! - Schema creation and additive migration, with a seeded bootstrap account
//! - Generic CRUD over named tables with stable integer ids
//! - A single-writer serializer with atomic, retried saves
//! - Snapshots: manual, automatic, restore, import and retention
//! - An append-only activity log
//!
//! Every component that writes the file shares one [`WriteSerializer`];
//! [`Storage`] wires them up from a [`StoreConfig`].

/// Activity log entries.
pub mod audit;
/// Snapshot management.
pub mod backup;
/// Timestamps with a fixed UTC offset.
pub mod clock;
/// Store configuration.
pub mod config;
/// Error types and result aliases.
pub mod error;
/// Row identity and id sequences.
mod ids;
/// Lazy automatic snapshots.
pub mod scheduler;
/// Table definitions and migration.
pub mod schema;
/// Write lock and atomic saves.
pub mod serializer;
/// CRUD over tables.
pub mod store;
mod workbook;

use std::sync::Arc;

pub use audit::AuditLog;
pub use backup::{BackupManager, SnapshotInfo, SnapshotOrigin};
pub use config::{AutoBackupConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use ids::normalize_id;
pub use procura_sheet::{CellValue, Record};
pub use scheduler::{AutoBackup, AutoBackupState};
pub use schema::{
    default_tables, hash_password, BootstrapAccount, SchemaManager, SchemaReport, TableDef,
};
pub use serializer::{RetryPolicy, WriteSerializer};
pub use store::{DeleteMode, RecordStore};

/// Every store component for one workbook, sharing one write lock.
pub struct Storage {
    schema: Arc<SchemaManager>,
    records: Arc<RecordStore>,
    backups: Arc<BackupManager>,
    auto_backup: AutoBackup,
    audit: AuditLog,
}

impl Storage {
    /// Wire up the components for `config` and the default tables without
    /// touching the file.
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_tables(config, default_tables())
    }

    /// Like [`Storage::new`] with a custom table set.
    pub fn with_tables(config: &StoreConfig, tables: Vec<TableDef>) -> Self {
        let serializer = Arc::new(WriteSerializer::new(config.retry));

        let schema = Arc::new(
            SchemaManager::new(
                &config.workbook_path,
                tables,
                config.bootstrap.clone(),
                Arc::clone(&serializer),
            )
            .with_utc_offset(config.utc_offset_hours),
        );
        let records = Arc::new(
            RecordStore::new(&config.workbook_path, Arc::clone(&serializer))
                .with_delete_mode(config.delete_mode),
        );
        let backups = Arc::new(
            BackupManager::new(&config.snapshot_dir, Arc::clone(&schema), serializer)
                .with_prefix(config.snapshot_prefix.clone())
                .with_retention(config.retention)
                .with_utc_offset(config.utc_offset_hours),
        );
        let auto_backup = AutoBackup::new(
            config.auto_backup.clone(),
            config.auto_backup_state_path(),
            Arc::clone(&backups),
        );
        let audit = AuditLog::new(Arc::clone(&records)).with_utc_offset(config.utc_offset_hours);

        Self {
            schema,
            records,
            backups,
            auto_backup,
            audit,
        }
    }

    /// [`Storage::new`] followed by a schema check, creating the workbook
    /// if it does not exist yet.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let storage = Self::new(config);
        storage.schema.ensure()?;
        Ok(storage)
    }

    pub fn schema(&self) -> &SchemaManager {
        &self.schema
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn auto_backup(&self) -> &AutoBackup {
        &self.auto_backup
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }
}
