//! Currency settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FxConfig {
    /// Currency every stored amount is converted into.
    pub base: String,
    /// Endpoint prefix; the base code is appended as the last path segment.
    pub provider_url: String,
    pub cache_path: PathBuf,
    /// How long a cached rate set is served without refetching.
    pub ttl_secs: u64,
    /// Hard limit on one live fetch.
    pub timeout_secs: u64,
}

impl Default for FxConfig {
    fn default() -> Self {
        Self {
            base: "USD".to_string(),
            provider_url: "https://open.er-api.com/v6/latest".to_string(),
            cache_path: PathBuf::from("data/fx_cache.json"),
            ttl_secs: 6 * 60 * 60,
            timeout_secs: 8,
        }
    }
}

impl FxConfig {
    #[must_use]
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
