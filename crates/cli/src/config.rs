//! `procura.yaml` loading.

use anyhow::{Context, Result};
use procura_fx::FxConfig;
use procura_store::StoreConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Config file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "procura.yaml";

/// Top-level configuration: one section per library crate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub fx: FxConfig,
}

impl AppConfig {
    /// Load `explicit`, or `procura.yaml` if it exists, or the defaults.
    ///
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Path::new(DEFAULT_CONFIG_FILE),
            None => return Ok(Self::default()),
        };
        Self::from_file(path)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        serde_yaml::from_str(&raw)
            .with_context(|| format!("Invalid config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use procura_store::DeleteMode;
    use std::path::PathBuf;

    #[test]
    fn test_sections_default_independently() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procura.yaml");
        std::fs::write(
            &path,
            "store:\n  workbook_path: ops.xlsx\n  delete_mode: soft_cancel\nfx:\n  ttl_secs: 60\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();

        assert_eq!(config.store.workbook_path, PathBuf::from("ops.xlsx"));
        assert_eq!(config.store.delete_mode, DeleteMode::SoftCancel);
        assert_eq!(config.store.retention, Some(30));
        assert_eq!(config.fx.ttl_secs, 60);
        assert_eq!(config.fx.base, "USD");
        assert_eq!(config.fx.timeout_secs, 8);
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("procura.yaml");
        std::fs::write(&path, "store: [not, a, map]\n").unwrap();
        let err = AppConfig::load(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("Invalid config"));
    }
}
