//! Live rate sources.

use crate::error::{FxError, FxResult};
use crate::rates::{normalize_code, RateSet};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Anything that can produce a current [`RateSet`] for a base currency.
#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch(&self, base: &str) -> FxResult<RateSet>;
}

/// Body shape of `open.er-api.com`-style endpoints.
#[derive(Debug, Deserialize)]
struct LatestRates {
    result: Option<String>,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    rates: Option<BTreeMap<String, f64>>,
}

/// Fetches `{provider_url}/{BASE}` over HTTP.
pub struct HttpRateProvider {
    client: Client,
    base_url: String,
}

impl HttpRateProvider {
    /// Build a provider whose requests give up after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `FxError::Http` if the underlying client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FxResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            // The rate endpoint is public; ambient proxy settings are not consulted
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    fn url_for(&self, base: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), normalize_code(base))
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    async fn fetch(&self, base: &str) -> FxResult<RateSet> {
        let url = self.url_for(base);
        debug!(%url, "fetching rates");

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(FxError::Status {
                status: response.status().as_u16(),
            });
        }

        let body: LatestRates = response
            .json()
            .await
            .map_err(|e| FxError::Payload(e.to_string()))?;

        if let Some(result) = body.result.as_deref() {
            if result != "success" {
                let reason = body.error_type.unwrap_or_else(|| result.to_string());
                return Err(FxError::Payload(format!("provider reported {reason}")));
            }
        }
        let rates = body
            .rates
            .filter(|r| !r.is_empty())
            .ok_or_else(|| FxError::Payload("no rates in response".to_string()))?;

        Ok(RateSet::new(base, Utc::now(), rates))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for() {
        let provider =
            HttpRateProvider::new("https://rates.example/v6/latest/", Duration::from_secs(5))
                .unwrap();
        assert_eq!(provider.url_for("usd"), "https://rates.example/v6/latest/USD");
    }
}
