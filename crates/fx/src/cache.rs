//! The last good rate set, kept as JSON on disk.

use crate::error::FxResult;
use crate::rates::RateSet;
use std::io;
use std::path::{Path, PathBuf};

pub struct RateCache {
    path: PathBuf,
}

impl RateCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The cached set, `None` if nothing was cached yet.
    pub async fn load(&self) -> FxResult<Option<RateSet>> {
        match tokio::fs::read(&self.path).await {
            Ok(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the cache. Written to a sibling file first and renamed, so a
    /// crash leaves the previous cache intact.
    pub async fn store(&self, rates: &RateSet) -> FxResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(rates)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
