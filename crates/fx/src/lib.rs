//! # procura-fx
//!
//! Currency rates for procurement amounts.
//!
//! Rates come from an HTTP provider, are cached on disk with a time-to-live
//! and degrade to the stale cache and then to a small built-in table when
//! the provider is unreachable. Conversion never fails: an unknown currency
//! leaves the amount as it was.

/// On-disk rate cache.
pub mod cache;
/// Currency settings.
pub mod config;
/// Tiered conversion.
pub mod converter;
/// Error types and result aliases.
pub mod error;
/// Live rate sources.
pub mod provider;
/// Rate sets and the fallback table.
pub mod rates;
/// Base-amount stamping for records.
pub mod stamp;

pub use cache::RateCache;
pub use config::FxConfig;
pub use converter::{convert_with, CurrencyConverter};
pub use error::{FxError, FxResult};
pub use provider::{HttpRateProvider, RateProvider};
pub use rates::{normalize_code, RateSet, RateSource, STATIC_USD_RATES};
pub use stamp::{round_cents, stamp_base_amount, touches_amount, BASE_AMOUNT_COLUMN};
