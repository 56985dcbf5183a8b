//! Normalized live quotes and multi-source reconciliation.
//!
//! Each provider adapter (outside this crate) turns its raw payload into a
//! `Quote`. The engine only ever sees this fixed shape.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::QuoteError;

/// Maximum spread, in price points, for quotes from different sources to be
/// considered consistent. Intraday timing differences easily account for this.
pub const DEFAULT_QUOTE_TOLERANCE: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Provider name, in priority order position when reconciled.
    pub source: String,
    pub price: f64,
    #[serde(default)]
    pub open: Option<f64>,
    #[serde(default)]
    pub high: Option<f64>,
    #[serde(default)]
    pub low: Option<f64>,
    /// Trading date the price belongs to.
    pub date: NaiveDate,
    #[serde(default)]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub contract: Option<String>,
}

impl Quote {
    pub fn validate(&self) -> Result<(), QuoteError> {
        if self.price.is_nan() || self.price <= 0.0 {
            return Err(QuoteError::NonPositivePrice {
                provider: self.source.clone(),
                price: self.price,
            });
        }
        Ok(())
    }
}

/// Outcome of reconciling quotes from several providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledQuote {
    /// The selected quote (highest-priority usable source).
    pub quote: Quote,
    /// Number of usable sources.
    pub sources_count: usize,
    /// max(price) - min(price) across usable sources.
    pub price_spread: f64,
    pub consistent: bool,
    /// Sources dropped for carrying an unusable price.
    pub rejected: Vec<String>,
}

/// Reconcile quotes given in provider priority order.
///
/// Unusable quotes are dropped; the first remaining one is selected.
pub fn reconcile_quotes(
    quotes: Vec<Quote>,
    tolerance: f64,
) -> Result<ReconciledQuote, QuoteError> {
    let (usable, rejected): (Vec<Quote>, Vec<Quote>) =
        quotes.into_iter().partition(|q| q.validate().is_ok());

    let mut usable = usable.into_iter();
    let selected = usable.next().ok_or(QuoteError::NoQuotes)?;

    let (mut lo, mut hi) = (selected.price, selected.price);
    let mut sources_count = 1;
    for q in usable {
        lo = lo.min(q.price);
        hi = hi.max(q.price);
        sources_count += 1;
    }
    let price_spread = hi - lo;

    Ok(ReconciledQuote {
        quote: selected,
        sources_count,
        price_spread,
        consistent: price_spread <= tolerance,
        rejected: rejected.into_iter().map(|q| q.source).collect(),
    })
}
