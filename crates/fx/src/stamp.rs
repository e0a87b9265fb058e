//! Monetary fields on procurement records.

use crate::converter::CurrencyConverter;
use crate::rates::normalize_code;
use procura_sheet::{CellValue, Record};

/// Amount as entered, in its own currency.
pub const AMOUNT_COLUMN: &str = "amount_original";
/// Short alias accepted on input and folded into [`AMOUNT_COLUMN`].
pub const AMOUNT_ALIAS: &str = "amount";
pub const CURRENCY_COLUMN: &str = "currency";
/// Amount converted into the base currency.
pub const BASE_AMOUNT_COLUMN: &str = "amount_usd";

/// True if `record` sets any field that feeds the base amount.
#[must_use]
pub fn touches_amount(record: &Record) -> bool {
    [AMOUNT_COLUMN, AMOUNT_ALIAS, CURRENCY_COLUMN]
        .iter()
        .any(|k| record.contains_key(*k))
}

/// Fill in `amount_original`, `currency` and the base amount (rounded to
/// cents) from whatever monetary fields `record` carries.
///
/// `amount` is accepted in place of `amount_original` and removed. A missing
/// currency means the base currency; a missing or non-numeric amount counts
/// as zero. Returns the stamped base amount.
pub async fn stamp_base_amount(converter: &CurrencyConverter, record: &mut Record) -> f64 {
    let alias = record.shift_remove(AMOUNT_ALIAS);
    let amount = record
        .get(AMOUNT_COLUMN)
        .filter(|v| !v.is_blank())
        .or(alias.as_ref())
        .and_then(CellValue::as_float)
        .filter(|a| a.is_finite())
        .unwrap_or(0.0);

    let currency = record
        .get(CURRENCY_COLUMN)
        .filter(|v| !v.is_blank())
        .map_or_else(|| converter.base().to_string(), |v| normalize_code(&v.as_str()));

    let converted = round_cents(converter.convert(amount, &currency, None).await);

    record.insert(AMOUNT_COLUMN.to_string(), CellValue::Float(amount));
    record.insert(CURRENCY_COLUMN.to_string(), CellValue::String(currency));
    record.insert(BASE_AMOUNT_COLUMN.to_string(), CellValue::Float(converted));
    converted
}

/// Round to two decimal places.
#[must_use]
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
