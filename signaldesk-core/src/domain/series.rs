//! BarSeries — a validated, immutable, date-ascending snapshot of bars.
//!
//! Callers hand the engine a fully-loaded snapshot. Updates (a new day, a live
//! quote) produce a new snapshot; an existing one is never mutated.

use chrono::NaiveDate;
use serde::Serialize;

use super::{Bar, Quote};
use crate::calendar::is_weekend;
use crate::error::SeriesError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate and wrap a bar vector.
    ///
    /// Rejects empty input, dates that are not strictly increasing, duplicate
    /// dates, non-positive prices, and bars whose high is below their low.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        if bars.is_empty() {
            return Err(SeriesError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            check_prices(bar)?;
            if index > 0 {
                let previous = bars[index - 1].date;
                if bar.date == previous {
                    return Err(SeriesError::DuplicateDate {
                        index,
                        date: bar.date,
                    });
                }
                if bar.date < previous {
                    return Err(SeriesError::NonMonotonicDate {
                        index,
                        previous,
                        date: bar.date,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    /// Index of the bar dated exactly `date`.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Index of the latest bar dated on or before `date`.
    pub fn index_on_or_before(&self, date: NaiveDate) -> Option<usize> {
        let after = self.bars.partition_point(|b| b.date <= date);
        after.checked_sub(1)
    }

    /// Index of the first non-warmup bar.
    pub fn first_live_index(&self) -> Option<usize> {
        self.bars.iter().position(|b| !b.is_warmup)
    }

    /// Index of the last non-warmup bar.
    pub fn last_live_index(&self) -> Option<usize> {
        self.bars.iter().rposition(|b| !b.is_warmup)
    }

    /// Number of warmup bars in the snapshot.
    pub fn warmup_count(&self) -> usize {
        self.bars.iter().filter(|b| b.is_warmup).count()
    }

    /// New snapshot with a live quote folded in as the observation for the
    /// quote's own trading date.
    ///
    /// Same date as the last bar: that bar's close is replaced and its range
    /// widened to include the quote. Later date: a provisional bar is appended.
    /// Earlier date or a weekend date: rejected.
    pub fn with_quote(&self, quote: &Quote) -> Result<BarSeries, SeriesError> {
        if is_weekend(quote.date) {
            return Err(SeriesError::NonTradingDay { date: quote.date });
        }
        if quote.price.is_nan() || quote.price <= 0.0 {
            return Err(SeriesError::NonPositivePrice {
                date: quote.date,
                field: "quote",
                value: quote.price,
            });
        }

        let last = self.last();
        let mut bars = self.bars.clone();

        if quote.date == last.date {
            let bar = bars.last_mut().ok_or(SeriesError::Empty)?;
            bar.close = quote.price;
            bar.high = bar.high.max(quote.high.unwrap_or(quote.price)).max(quote.price);
            bar.low = bar.low.min(quote.low.unwrap_or(quote.price)).min(quote.price);
            if let Some(contract) = &quote.contract {
                bar.contract_id = contract.clone();
            }
        } else if quote.date > last.date {
            let open = quote.open.unwrap_or(quote.price);
            let high = quote.high.unwrap_or(quote.price).max(quote.price).max(open);
            let low = quote.low.unwrap_or(quote.price).min(quote.price).min(open);
            bars.push(Bar {
                date: quote.date,
                open,
                high,
                low,
                close: quote.price,
                contract_id: quote
                    .contract
                    .clone()
                    .unwrap_or_else(|| last.contract_id.clone()),
                is_warmup: false,
            });
        } else {
            return Err(SeriesError::NonMonotonicDate {
                index: bars.len(),
                previous: last.date,
                date: quote.date,
            });
        }

        BarSeries::new(bars)
    }
}

fn check_prices(bar: &Bar) -> Result<(), SeriesError> {
    if let Some((field, value)) = bar.first_non_positive() {
        return Err(SeriesError::NonPositivePrice {
            date: bar.date,
            field,
            value,
        });
    }
    if bar.high < bar.low {
        return Err(SeriesError::InvalidOhlc {
            date: bar.date,
            high: bar.high,
            low: bar.low,
        });
    }
    Ok(())
}
