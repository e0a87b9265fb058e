//! Lazy automatic snapshots.
//!
//! There is no timer thread. Each incoming request calls
//! [`AutoBackup::on_request`]; at most once per poll interval that checks how
//! old the newest automatic snapshot is and takes a new one when it is older
//! than the target interval. The check times survive restarts in a small JSON
//! state file.

use crate::backup::{BackupManager, SnapshotOrigin};
use crate::config::AutoBackupConfig;
use crate::error::StoreResult;
use crate::serializer::atomic_write;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Persisted scheduler timestamps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoBackupState {
    pub last_checked: Option<DateTime<Utc>>,
    pub last_auto_snapshot: Option<DateTime<Utc>>,
}

impl AutoBackupState {
    /// Read the state file. A missing or unreadable file starts fresh.
    fn load(path: &Path) -> Self {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read auto-backup state");
                return Self::default();
            }
        };
        serde_json::from_slice(&raw).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "discarding malformed auto-backup state");
            Self::default()
        })
    }

    fn save(&self, path: &Path) -> StoreResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(path, &json).map_err(|e| e.into_io().into())
    }
}

/// Request-driven snapshot scheduler.
pub struct AutoBackup {
    config: AutoBackupConfig,
    state_path: PathBuf,
    backups: Arc<BackupManager>,
    state: Mutex<AutoBackupState>,
}

impl AutoBackup {
    pub fn new(
        config: AutoBackupConfig,
        state_path: impl Into<PathBuf>,
        backups: Arc<BackupManager>,
    ) -> Self {
        let state_path = state_path.into();
        let state = AutoBackupState::load(&state_path);
        Self {
            config,
            state_path,
            backups,
            state: Mutex::new(state),
        }
    }

    /// Current persisted timestamps.
    #[must_use]
    pub fn state(&self) -> AutoBackupState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Hook for every incoming request. Never fails the request: problems
    /// are logged and the snapshot name, if one was taken, is returned.
    pub fn on_request(&self) -> Option<String> {
        if !self.config.enabled {
            return None;
        }
        match self.tick_at(Utc::now()) {
            Ok(created) => created,
            Err(e) => {
                error!(error = %e, "automatic snapshot failed");
                None
            }
        }
    }

    /// Run one scheduling decision as of `now`.
    pub fn tick_at(&self, now: DateTime<Utc>) -> StoreResult<Option<String>> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(last) = state.last_checked {
            if !has_elapsed(last, now, self.config.poll_interval()) {
                return Ok(None);
            }
        }
        state.last_checked = Some(now);

        let result = self.snapshot_if_due(&mut state, now);
        state.save(&self.state_path)?;
        result
    }

    fn snapshot_if_due(
        &self,
        state: &mut AutoBackupState,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<String>> {
        let last_auto = match state.last_auto_snapshot {
            Some(at) => Some(at),
            None => self
                .backups
                .latest(SnapshotOrigin::Auto)?
                .map(|s| s.created_at),
        };

        let due = last_auto.map_or(true, |at| has_elapsed(at, now, self.config.target_interval()));
        if !due {
            debug!(?last_auto, "automatic snapshot not due");
            return Ok(None);
        }

        let snapshot = self.backups.create_snapshot(SnapshotOrigin::Auto)?;
        state.last_auto_snapshot = Some(now);
        info!(snapshot = %snapshot.name, "took automatic snapshot");
        Ok(Some(snapshot.name))
    }
}

/// True once `interval` has passed since `since`. A `since` in the future
/// (the clock moved backwards) counts as elapsed.
fn has_elapsed(since: DateTime<Utc>, now: DateTime<Utc>, interval: Duration) -> bool {
    (now - since).to_std().map_or(true, |elapsed| elapsed >= interval)
}
