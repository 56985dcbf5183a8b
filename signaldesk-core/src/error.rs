//! Error types for the rule engine.
//!
//! Insufficient history is deliberately absent here: it is a normal state of
//! a rolling window and surfaces as `None` / `Indeterminate` values instead.

use chrono::NaiveDate;
use thiserror::Error;

/// Rejected bar series. The core never repairs input; normalization is the
/// loader's job.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar series is empty")]
    Empty,

    #[error("dates out of order at index {index}: {date} follows {previous}")]
    NonMonotonicDate {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },

    #[error("duplicate bar for {date} at index {index}")]
    DuplicateDate { index: usize, date: NaiveDate },

    #[error("non-positive {field} price {value} on {date}")]
    NonPositivePrice {
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    #[error("inconsistent OHLC on {date} (high {high}, low {low})")]
    InvalidOhlc { date: NaiveDate, high: f64, low: f64 },

    #[error("{date} is not a trading day")]
    NonTradingDay { date: NaiveDate },
}

/// Invalid rule table.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuleError {
    #[error("{rule}: moving-average window must be >= 1 (got {window})")]
    InvalidWindow { rule: &'static str, window: usize },

    #[error("{rule}: ratio bounds inverted (min {min} > max {max})")]
    InvertedRatioBounds {
        rule: &'static str,
        min: f64,
        max: f64,
    },

    #[error("{rule}: ratio {ratio} must be below the window size {window}")]
    RatioOutOfRange {
        rule: &'static str,
        ratio: f64,
        window: usize,
    },

    #[error("{rule}: ratio and rate parameters must be positive (got {value})")]
    NonPositiveRatio { rule: &'static str, value: f64 },

    #[error("{rule}: at least one trigger weekday is required")]
    EmptyWeekdays { rule: &'static str },

    #[error("{rule}: month {month} is outside 1-12")]
    InvalidMonth { rule: &'static str, month: u32 },
}

/// Failure to resolve the observation bar for an evaluation date.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluateError {
    #[error("no bar on or before {as_of}")]
    NoObservation { as_of: NaiveDate },

    #[error("latest bar on or before the evaluation date ({date}) is a warmup bar")]
    WarmupObservation { date: NaiveDate },
}

/// Quote reconciliation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuoteError {
    #[error("no usable quotes (every source failed or returned a non-positive price)")]
    NoQuotes,

    #[error("quote from {provider} has non-positive price {price}")]
    NonPositivePrice { provider: String, price: f64 },
}
