//! Rate sets and the built-in fallback table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Approximate USD-based rates used when no live or cached set exists.
pub const STATIC_USD_RATES: [(&str, f64); 5] = [
    ("USD", 1.0),
    ("EUR", 0.95),
    ("AED", 3.673),
    ("GBP", 0.79),
    ("SGD", 1.35),
];

/// Rates relative to `base`: one unit of base buys `rates[code]` units of
/// `code`. This is also the on-disk cache format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSet {
    /// When the set was fetched.
    pub timestamp: DateTime<Utc>,
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

impl RateSet {
    pub fn new(base: &str, timestamp: DateTime<Utc>, rates: BTreeMap<String, f64>) -> Self {
        Self {
            timestamp,
            base: normalize_code(base),
            rates,
        }
    }

    /// The built-in table, expressed against `base` when it knows that code.
    #[must_use]
    pub fn fallback(base: &str) -> Self {
        let usd = Self::new(
            "USD",
            Utc::now(),
            STATIC_USD_RATES
                .iter()
                .map(|(code, rate)| ((*code).to_string(), *rate))
                .collect(),
        );
        usd.rebased(base).unwrap_or(usd)
    }

    /// Usable rate for `code`. The base itself is always 1.
    #[must_use]
    pub fn rate(&self, code: &str) -> Option<f64> {
        let code = normalize_code(code);
        if code == self.base {
            return Some(1.0);
        }
        self.rates
            .get(&code)
            .copied()
            .filter(|r| r.is_finite() && *r > 0.0)
    }

    #[must_use]
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) < ttl
    }

    /// The same rates expressed against `base`, if this set knows it.
    #[must_use]
    pub fn rebased(&self, base: &str) -> Option<Self> {
        let base = normalize_code(base);
        if base == self.base {
            return Some(self.clone());
        }
        let pivot = self.rate(&base)?;

        let mut rates: BTreeMap<String, f64> = self
            .rates
            .iter()
            .filter(|(_, r)| r.is_finite() && **r > 0.0)
            .map(|(code, r)| (code.clone(), r / pivot))
            .collect();
        rates.insert(self.base.clone(), 1.0 / pivot);
        rates.insert(base.clone(), 1.0);

        Some(Self {
            timestamp: self.timestamp,
            base,
            rates,
        })
    }
}

/// Which tier answered a rate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RateSource {
    /// Fresh from the provider.
    Live,
    /// Cached and within the TTL.
    Cache,
    /// Cached past the TTL, served because the provider failed.
    StaleCache,
    /// The built-in table.
    Static,
}

impl fmt::Display for RateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Cache => "cache",
            Self::StaleCache => "stale cache",
            Self::Static => "static table",
        })
    }
}

/// Upper-cased, trimmed currency code.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}
