//! A requisition's life: priced on entry, patched, deleted.

use async_trait::async_trait;
use chrono::Utc;
use procura_fx::{
    stamp_base_amount, CurrencyConverter, FxConfig, FxError, FxResult, RateProvider, RateSet,
};
use procura_store::{CellValue, Record, RetryPolicy, Storage, StoreConfig};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct FixedRates {
    eur: f64,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl RateProvider for FixedRates {
    async fn fetch(&self, base: &str) -> FxResult<RateSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RateSet::new(
            base,
            Utc::now(),
            [("EUR".to_string(), self.eur)].into_iter().collect(),
        ))
    }
}

struct Offline;

#[async_trait]
impl RateProvider for Offline {
    async fn fetch(&self, _base: &str) -> FxResult<RateSet> {
        Err(FxError::Http("connection refused".to_string()))
    }
}

fn store_config(dir: &std::path::Path) -> StoreConfig {
    let mut config = StoreConfig::with_base_dir(dir);
    config.retry = RetryPolicy::no_retry();
    config.auto_backup.enabled = false;
    config
}

#[tokio::test]
async fn test_requisition_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::open(&store_config(dir.path())).unwrap();
    let fx_config = FxConfig {
        cache_path: dir.path().join("fx_cache.json"),
        ..FxConfig::default()
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let fx = CurrencyConverter::new(
        &fx_config,
        Box::new(FixedRates {
            eur: 0.90,
            calls: Arc::clone(&calls),
        }),
    );
    let records = storage.records();

    let mut requisition = Record::new();
    requisition.insert("number".to_string(), CellValue::from("PO-1"));
    requisition.insert("amount".to_string(), CellValue::Int(100));
    requisition.insert("currency".to_string(), CellValue::from("EUR"));
    stamp_base_amount(&fx, &mut requisition).await;
    assert!(!requisition.contains_key("amount"));

    let stored = records.append_row("requisitions", requisition).unwrap();
    assert_eq!(stored["id"].as_int(), Some(1));
    let amount_usd = stored["amount_usd"].as_float().unwrap();
    assert!((amount_usd - 111.11).abs() < 1e-9, "{amount_usd}");

    let mut paid = Record::new();
    paid.insert("paid".to_string(), CellValue::Int(1));
    assert!(records.update_row_by_id("requisitions", 1, &paid).unwrap());

    let rows = records.list_rows("requisitions").unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["paid"].as_int(), Some(1));
    assert_eq!(rows[0]["amount_usd"].as_float(), Some(111.11));
    assert_eq!(rows[0]["amount_original"].as_float(), Some(100.0));
    assert_eq!(rows[0]["currency"].as_str(), "EUR");

    assert!(records.delete_row_by_id("requisitions", 1).unwrap());
    assert!(records.list_rows("requisitions").unwrap().is_empty());
    assert_eq!(records.next_id("requisitions").unwrap(), 2);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_offline_pricing_uses_static_rates() {
    let dir = tempfile::tempdir().unwrap();
    let fx = CurrencyConverter::new(
        &FxConfig {
            cache_path: dir.path().join("fx_cache.json"),
            ..FxConfig::default()
        },
        Box::new(Offline),
    );

    let mut landing = Record::new();
    landing.insert("amount_original".to_string(), CellValue::from("367.30"));
    landing.insert("currency".to_string(), CellValue::from("aed"));
    let usd = stamp_base_amount(&fx, &mut landing).await;

    assert_eq!(usd, 100.0);
    assert_eq!(landing["currency"].as_str(), "AED");
    assert_eq!(landing["amount_usd"], CellValue::Float(100.0));
}

#[tokio::test]
async fn test_unknown_currency_keeps_amount() {
    let dir = tempfile::tempdir().unwrap();
    let fx = CurrencyConverter::new(
        &FxConfig {
            cache_path: dir.path().join("fx_cache.json"),
            ..FxConfig::default()
        },
        Box::new(Offline),
    );

    let mut record = Record::new();
    record.insert("amount".to_string(), CellValue::Float(12.346));
    record.insert("currency".to_string(), CellValue::from("XYZ"));
    assert_eq!(stamp_base_amount(&fx, &mut record).await, 12.35);

    let mut no_currency = Record::new();
    no_currency.insert("amount".to_string(), CellValue::Int(5));
    assert_eq!(stamp_base_amount(&fx, &mut no_currency).await, 5.0);
    assert_eq!(no_currency["currency"].as_str(), "USD");
}
