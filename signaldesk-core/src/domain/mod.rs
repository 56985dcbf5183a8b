//! Domain types: bars, validated series snapshots, live quotes.

pub mod bar;
pub mod quote;
pub mod series;

pub use bar::Bar;
pub use quote::{reconcile_quotes, Quote, ReconciledQuote, DEFAULT_QUOTE_TOLERANCE};
pub use series::BarSeries;
