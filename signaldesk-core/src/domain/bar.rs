//! Bar — one trading day of OHLC data for an instrument or contract.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLC bar.
///
/// `contract_id` may be empty when the source did not carry one; the loader
/// infers it from the date. `is_warmup` marks bars that predate the
/// authoritative data source and exist only to seed moving-average windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub is_warmup: bool,
}

impl Bar {
    /// Convenience constructor for a bar with no contract id.
    pub fn new(date: NaiveDate, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            contract_id: String::new(),
            is_warmup: false,
        }
    }

    /// Name and value of the first non-positive (or NaN) price field, if any.
    pub fn first_non_positive(&self) -> Option<(&'static str, f64)> {
        [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ]
        .into_iter()
        .find(|(_, v)| v.is_nan() || *v <= 0.0)
    }

    pub fn has_contract(&self) -> bool {
        !self.contract_id.is_empty()
    }
}
