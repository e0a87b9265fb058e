//! Whole-file snapshots of the workbook.
//!
//! A snapshot is a byte copy of the live file stored under the snapshot
//! directory as `<prefix>_<YYYYMMDD_HHMMSSmmm>_<ORIGIN>.xlsx`. Taking,
//! restoring and importing all run inside the workbook's write lock, so a
//! snapshot never captures a half-applied mutation.

use crate::clock;
use crate::error::{StoreError, StoreResult};
use crate::schema::{SchemaManager, SchemaReport};
use crate::serializer::WriteSerializer;
use chrono::{DateTime, Utc};
use procura_sheet::Book;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

const SNAPSHOT_EXTENSION: &str = "xlsx";

/// Who asked for a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SnapshotOrigin {
    Manual,
    Auto,
}

impl SnapshotOrigin {
    /// Tag used in snapshot file names.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Manual => "MANUAL",
            Self::Auto => "AUTO",
        }
    }

    fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(".xlsx")?;
        match stem.rsplit('_').next()? {
            "MANUAL" => Some(Self::Manual),
            "AUTO" => Some(Self::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A snapshot file as found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    pub name: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    /// `None` for files whose name carries no origin tag (copied in by hand).
    pub origin: Option<SnapshotOrigin>,
}

/// Takes, lists, restores and prunes snapshots of one workbook.
pub struct BackupManager {
    workbook_path: PathBuf,
    dir: PathBuf,
    prefix: String,
    retention: Option<usize>,
    utc_offset_hours: i32,
    serializer: Arc<WriteSerializer>,
    schema: Arc<SchemaManager>,
}

impl BackupManager {
    pub fn new(
        dir: impl Into<PathBuf>,
        schema: Arc<SchemaManager>,
        serializer: Arc<WriteSerializer>,
    ) -> Self {
        Self {
            workbook_path: schema.path().to_path_buf(),
            dir: dir.into(),
            prefix: "backup".to_string(),
            retention: None,
            utc_offset_hours: 0,
            serializer,
            schema,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Keep at most `keep` snapshots after every new one.
    #[must_use]
    pub fn with_retention(mut self, keep: Option<usize>) -> Self {
        self.retention = keep;
        self
    }

    #[must_use]
    pub fn with_utc_offset(mut self, hours: i32) -> Self {
        self.utc_offset_hours = hours;
        self
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy the live workbook into a new snapshot, then apply retention.
    pub fn create_snapshot(&self, origin: SnapshotOrigin) -> StoreResult<SnapshotInfo> {
        let name = self.serializer.exclusive(|guard| {
            let bytes = match fs::read(&self.workbook_path) {
                Ok(bytes) => bytes,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    return Err(StoreError::Missing {
                        path: self.workbook_path.clone(),
                    })
                }
                Err(e) => return Err(e.into()),
            };
            fs::create_dir_all(&self.dir)?;

            let name = self.unique_name(origin, Utc::now());
            self.serializer.save(guard, &self.dir.join(&name), &bytes)?;
            Ok(name)
        })?;
        info!(snapshot = %name, %origin, "created snapshot");

        if let Some(keep) = self.retention {
            self.prune_snapshots(keep)?;
        }
        self.info(&name)
    }

    /// Every snapshot in the directory, newest first.
    pub fn list_snapshots(&self) -> StoreResult<Vec<SnapshotInfo>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !self.is_snapshot_name(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            snapshots.push(snapshot_info(name, &entry.metadata()?)?);
        }

        snapshots.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.name.cmp(&a.name))
        });
        Ok(snapshots)
    }

    /// Replace the live workbook with a snapshot's bytes and bring the
    /// result up to the current schema.
    pub fn restore_snapshot(&self, name: &str) -> StoreResult<SchemaReport> {
        let source = self.existing_snapshot(name)?;
        Book::from_xlsx(&source).map_err(|e| StoreError::corrupt(&source, e.to_string()))?;
        self.serializer.exclusive(|guard| {
            let bytes = fs::read(&source)?;
            self.serializer.save(guard, &self.workbook_path, &bytes)?;
            info!(snapshot = %name, "restored snapshot");
            self.schema.ensure_locked(guard)
        })
    }

    pub fn delete_snapshot(&self, name: &str) -> StoreResult<()> {
        let path = self.existing_snapshot(name)?;
        fs::remove_file(&path)?;
        info!(snapshot = %name, "deleted snapshot");
        Ok(())
    }

    /// Delete all but the newest `keep` snapshots. Returns the removed names.
    pub fn prune_snapshots(&self, keep: usize) -> StoreResult<Vec<String>> {
        let mut removed = Vec::new();
        for snapshot in self.list_snapshots()?.into_iter().skip(keep) {
            match fs::remove_file(self.dir.join(&snapshot.name)) {
                Ok(()) => removed.push(snapshot.name),
                Err(e) => warn!(snapshot = %snapshot.name, error = %e, "could not prune snapshot"),
            }
        }
        if !removed.is_empty() {
            debug!(count = removed.len(), keep, "pruned snapshots");
        }
        Ok(removed)
    }

    /// Replace the live workbook with an external file.
    ///
    /// The file must parse as a workbook. The current workbook, if any, is
    /// snapshotted first; the imported one is then migrated to the schema.
    pub fn import_workbook(&self, source: &Path) -> StoreResult<SchemaReport> {
        Book::from_xlsx(source).map_err(|e| StoreError::corrupt(source, e.to_string()))?;
        let bytes = fs::read(source)?;

        if self.workbook_path.exists() {
            self.create_snapshot(SnapshotOrigin::Manual)?;
        }

        self.serializer.exclusive(|guard| {
            if let Some(parent) = self.workbook_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            self.serializer.save(guard, &self.workbook_path, &bytes)?;
            info!(source = %source.display(), "imported workbook");
            self.schema.ensure_locked(guard)
        })
    }

    /// The newest snapshot taken with the given origin.
    pub fn latest(&self, origin: SnapshotOrigin) -> StoreResult<Option<SnapshotInfo>> {
        Ok(self
            .list_snapshots()?
            .into_iter()
            .find(|s| s.origin == Some(origin)))
    }

    fn info(&self, name: &str) -> StoreResult<SnapshotInfo> {
        let metadata = fs::metadata(self.dir.join(name))?;
        snapshot_info(name.to_string(), &metadata)
    }

    fn is_snapshot_name(&self, name: &str) -> bool {
        name.starts_with(&format!("{}_", self.prefix))
            && Path::new(name).extension().is_some_and(|ext| ext == SNAPSHOT_EXTENSION)
    }

    fn unique_name(&self, origin: SnapshotOrigin, at: DateTime<Utc>) -> String {
        let stamp = clock::local(at, self.utc_offset_hours).format("%Y%m%d_%H%M%S%3f");
        let base = format!("{}_{stamp}", self.prefix);

        let mut name = format!("{base}_{origin}.{SNAPSHOT_EXTENSION}");
        let mut bump = 1;
        while self.dir.join(&name).exists() {
            name = format!("{base}_{bump}_{origin}.{SNAPSHOT_EXTENSION}");
            bump += 1;
        }
        name
    }

    fn existing_snapshot(&self, name: &str) -> StoreResult<PathBuf> {
        validate_name(name)?;
        let path = self.dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(StoreError::SnapshotNotFound(name.to_string()))
        }
    }
}

/// Snapshot names are bare file names: no separators, no parent references,
/// no hidden files.
fn validate_name(name: &str) -> StoreResult<()> {
    let plain = !name.is_empty()
        && !name.starts_with('.')
        && Path::new(name).file_name().is_some_and(|f| f == name)
        && !name.contains(['/', '\\']);
    if plain {
        Ok(())
    } else {
        Err(StoreError::InvalidSnapshotName(name.to_string()))
    }
}

fn snapshot_info(name: String, metadata: &fs::Metadata) -> StoreResult<SnapshotInfo> {
    let created_at = metadata.modified().map(DateTime::<Utc>::from)?;
    Ok(SnapshotInfo {
        origin: SnapshotOrigin::from_file_name(&name),
        size: metadata.len(),
        created_at,
        name,
    })
}
