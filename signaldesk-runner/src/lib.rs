//! SignalDesk Runner — configuration, data loading, reports and history.
//!
//! This crate builds on `signaldesk-core` to provide:
//! - TOML configuration with per-instrument data files and rule overrides
//! - CSV loading with column normalization, backfill splicing, contract
//!   inference and warmup tagging
//! - BLAKE3 fingerprints of loaded snapshots
//! - The two-instrument evaluation report (JSON and plain text)
//! - Parallel verdict history with CSV export

pub mod config;
pub mod data_loader;
pub mod history;
pub mod report;

pub use config::{AppConfig, BackfillConfig, ConfigError, Instrument, InstrumentConfig};
pub use data_loader::{load_instrument, load_series, LoadError, LoadOptions, LoadedSeries};
pub use history::{etf_history, futures_history, DateRange, FuturesHistory, FuturesHistoryRow};
pub use report::{
    build_report, render_text, EtfReport, FuturesReport, InstrumentInput, Report, ReportError,
};
