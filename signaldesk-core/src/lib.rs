//! SignalDesk Core: the calendar/price-ratio rule engine.
//!
//! Pure, synchronous and clock-free:
//! - Domain types (bars, validated series snapshots, normalized quotes)
//! - Quarterly delivery calendar, contract inference, trading sessions
//! - Rolling-mean feature rows
//! - Immutable rule tables for the futures and ETF strategies
//! - Signal verdicts that keep "indeterminate" apart from "failed"
//! - Tradeable price bands solved from the trailing window sum

pub mod band;
pub mod calendar;
pub mod domain;
pub mod error;
pub mod features;
pub mod indicators;
pub mod rules;
pub mod signals;

pub use band::{etf_band, futures_bands, solve_band, FuturesBands, PriceBand};
pub use calendar::DeliverySchedule;
pub use domain::{Bar, BarSeries, Quote};
pub use error::{EvaluateError, QuoteError, RuleError, SeriesError};
pub use features::{build_features, FeatureRow};
pub use rules::{EtfRules, FuturesRules};
pub use signals::{EtfSignals, FuturesSignals, SignalVerdict};
