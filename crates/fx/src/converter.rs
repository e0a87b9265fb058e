//! Cached, fault-tolerant currency conversion.

use crate::cache::RateCache;
use crate::config::FxConfig;
use crate::error::{FxError, FxResult};
use crate::provider::{HttpRateProvider, RateProvider};
use crate::rates::{normalize_code, RateSet, RateSource};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, warn};

/// Serves rates through three tiers: the cache while it is fresh, then the
/// live provider, then the cache at any age or the built-in table.
///
/// Lookups never fail; the worst answer is an approximation.
pub struct CurrencyConverter {
    base: String,
    ttl: Duration,
    timeout: Duration,
    provider: Box<dyn RateProvider>,
    cache: RateCache,
}

impl CurrencyConverter {
    pub fn new(config: &FxConfig, provider: Box<dyn RateProvider>) -> Self {
        Self {
            base: normalize_code(&config.base),
            ttl: config.ttl(),
            timeout: config.timeout(),
            provider,
            cache: RateCache::new(&config.cache_path),
        }
    }

    /// A converter backed by the configured HTTP endpoint.
    ///
    /// # Errors
    ///
    /// Returns `FxError::Http` if the HTTP client cannot be built.
    pub fn from_config(config: &FxConfig) -> FxResult<Self> {
        let provider = HttpRateProvider::new(&config.provider_url, config.timeout())?;
        Ok(Self::new(config, Box::new(provider)))
    }

    /// The currency amounts are converted into by default.
    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Rates for `base`.
    pub async fn get_rates(&self, base: &str) -> RateSet {
        self.resolve(base).await.0
    }

    /// Rates for `base` plus the tier that produced them.
    pub async fn resolve(&self, base: &str) -> (RateSet, RateSource) {
        self.resolve_at(base, Utc::now()).await
    }

    /// Rates for `base` plus the tier that produced them, as of `now`.
    pub async fn resolve_at(&self, base: &str, now: DateTime<Utc>) -> (RateSet, RateSource) {
        let base = normalize_code(base);

        let stored = match self.cache.load().await {
            Ok(stored) => stored,
            Err(e) => {
                warn!(path = %self.cache.path().display(), error = %e, "ignoring unreadable rate cache");
                None
            }
        };
        let cached = stored.as_ref().and_then(|set| set.rebased(&base));

        if let Some(set) = cached.as_ref().filter(|s| s.is_fresh(now, self.ttl)) {
            debug!(%base, "serving cached rates");
            return (set.clone(), RateSource::Cache);
        }

        match self.fetch_live(&base).await {
            Ok(set) => {
                if let Err(e) = self.cache.store(&set).await {
                    warn!(error = %e, "could not update rate cache");
                }
                (set, RateSource::Live)
            }
            Err(e) => {
                if let Some(stored) = stored {
                    warn!(%base, error = %e, "rate fetch failed, serving cached rates");
                    let set = cached
                        .or_else(|| bridge_through_static(&stored, &base))
                        .unwrap_or(stored);
                    if set.base != base {
                        warn!(requested = %base, served = %set.base, "cached rates are in another base");
                    }
                    (set, RateSource::StaleCache)
                } else {
                    warn!(%base, error = %e, "rate fetch failed and nothing cached, using static rates");
                    let set = RateSet::fallback(&base);
                    if set.base != base {
                        warn!(requested = %base, served = %set.base, "static rates are in another base");
                    }
                    (set, RateSource::Static)
                }
            }
        }
    }

    async fn fetch_live(&self, base: &str) -> FxResult<RateSet> {
        match tokio::time::timeout(self.timeout, self.provider.fetch(base)).await {
            Ok(result) => result,
            Err(_) => Err(FxError::Timeout(self.timeout)),
        }
    }

    /// Convert `amount` from `from` into `to` (the base when `None`).
    ///
    /// Codes missing from the current rates are looked up in the built-in
    /// table; if still unknown the amount comes back unconverted.
    pub async fn convert(&self, amount: f64, from: &str, to: Option<&str>) -> f64 {
        let from = normalize_code(from);
        let to = to.map_or_else(|| self.base.clone(), normalize_code);
        if from == to {
            return amount;
        }

        let rates = self.get_rates(&self.base).await;
        convert_with(&rates, amount, &from, &to)
    }
}

/// `cached` rebased onto `base` using the built-in table's cross rate when
/// the cache itself has no rate for `base`.
fn bridge_through_static(cached: &RateSet, base: &str) -> Option<RateSet> {
    let cross = RateSet::fallback(&cached.base);
    if cross.base != cached.base {
        return None;
    }
    let mut bridged = cached.clone();
    bridged.rates.insert(base.to_string(), cross.rate(base)?);
    bridged.rebased(base)
}

/// [`CurrencyConverter::convert`] against an explicit rate set.
#[must_use]
pub fn convert_with(rates: &RateSet, amount: f64, from: &str, to: &str) -> f64 {
    let from = normalize_code(from);
    let to = normalize_code(to);
    if from == to {
        return amount;
    }

    let fallback = RateSet::fallback(&rates.base);
    let lookup = |code: &str| {
        rates.rate(code).or_else(|| {
            (fallback.base == rates.base)
                .then(|| fallback.rate(code))
                .flatten()
        })
    };

    match (lookup(&from), lookup(&to)) {
        (Some(from_rate), Some(to_rate)) => amount / from_rate * to_rate,
        (from_rate, _) => {
            let unknown = if from_rate.is_none() { &from } else { &to };
            warn!(currency = %unknown, "no rate known, amount left unconverted");
            amount
        }
    }
}
