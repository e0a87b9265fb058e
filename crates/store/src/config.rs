//! Store configuration.

use crate::schema::BootstrapAccount;
use crate::serializer::RetryPolicy;
use crate::store::DeleteMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for the workbook store, its snapshots and the auto-backup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Live workbook file.
    pub workbook_path: PathBuf,
    /// Directory holding snapshot copies.
    pub snapshot_dir: PathBuf,
    /// File name prefix for snapshots.
    pub snapshot_prefix: String,
    /// Keep at most this many snapshots; `None` keeps everything.
    pub retention: Option<usize>,
    pub delete_mode: DeleteMode,
    /// Offset applied to timestamps the store writes itself.
    pub utc_offset_hours: i32,
    pub retry: RetryPolicy,
    pub auto_backup: AutoBackupConfig,
    pub bootstrap: BootstrapAccount,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::with_base_dir("data")
    }
}

impl StoreConfig {
    /// Default layout rooted at `dir`: `office_ops.xlsx` plus a `backups/`
    /// directory next to it.
    #[must_use]
    pub fn with_base_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            workbook_path: dir.join("office_ops.xlsx"),
            snapshot_dir: dir.join("backups"),
            snapshot_prefix: "backup".to_string(),
            retention: Some(30),
            delete_mode: DeleteMode::default(),
            utc_offset_hours: 4,
            retry: RetryPolicy::default(),
            auto_backup: AutoBackupConfig::default(),
            bootstrap: BootstrapAccount::default(),
        }
    }

    /// Where the auto-backup keeps its timestamps.
    #[must_use]
    pub fn auto_backup_state_path(&self) -> PathBuf {
        self.auto_backup
            .state_path
            .clone()
            .unwrap_or_else(|| self.snapshot_dir.join("auto_backup.json"))
    }
}

/// Lazy, request-driven automatic snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoBackupConfig {
    pub enabled: bool,
    /// Minimum time between two checks.
    pub poll_interval_secs: u64,
    /// Maximum age of the newest automatic snapshot.
    pub target_interval_secs: u64,
    pub state_path: Option<PathBuf>,
}

impl Default for AutoBackupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: 5 * 60,
            target_interval_secs: 12 * 60 * 60,
            state_path: None,
        }
    }
}

impl AutoBackupConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    #[must_use]
    pub fn target_interval(&self) -> Duration {
        Duration::from_secs(self.target_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "workbook_path: /srv/ops.xlsx\ndelete_mode: soft_cancel\nretry:\n  max_attempts: 3\n";
        let config: StoreConfig = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.workbook_path, PathBuf::from("/srv/ops.xlsx"));
        assert_eq!(config.delete_mode, DeleteMode::SoftCancel);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, RetryPolicy::default().base_delay_ms);
        assert_eq!(config.snapshot_prefix, "backup");
        assert_eq!(config.auto_backup.target_interval(), Duration::from_secs(43_200));
    }

    #[test]
    fn test_state_path_defaults_into_snapshot_dir() {
        let config = StoreConfig::with_base_dir("/tmp/procura");
        assert_eq!(
            config.auto_backup_state_path(),
            PathBuf::from("/tmp/procura/backups/auto_backup.json")
        );
    }
}
