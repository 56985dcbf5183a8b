//! Feature rows: one per bar, derived fresh from a `BarSeries`.
//!
//! A row carries the calendar facts of the bar's own date, the close, and one
//! moving average per requested window (`None` until the window is full).
//! Rows are never patched in place; a changed series means rebuilding them.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::calendar::DeliverySchedule;
use crate::domain::{Bar, BarSeries};
use crate::indicators::{trailing_sum, Indicator, Sma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub date: NaiveDate,
    /// 0 = Monday .. 6 = Sunday.
    pub weekday: u8,
    pub month: u32,
    pub close: f64,
    pub moving_averages: BTreeMap<usize, Option<f64>>,
    /// Always false when no delivery schedule applies (ETF).
    pub is_delivery_week: bool,
    pub is_warmup: bool,
}

impl FeatureRow {
    /// Row for `series[index]`, computing each moving average from the
    /// trailing closes only.
    pub fn at(
        series: &BarSeries,
        index: usize,
        windows: &[usize],
        schedule: Option<&DeliverySchedule>,
    ) -> Option<Self> {
        let bar = series.get(index)?;
        let closes = series.closes();
        let moving_averages = windows
            .iter()
            .map(|&w| {
                let mean = if w == 0 {
                    None
                } else {
                    trailing_sum(&closes, index + 1, w).map(|s| s / w as f64)
                };
                (w, mean)
            })
            .collect();
        Some(Self::from_parts(bar, moving_averages, schedule))
    }

    fn from_parts(
        bar: &Bar,
        moving_averages: BTreeMap<usize, Option<f64>>,
        schedule: Option<&DeliverySchedule>,
    ) -> Self {
        Self {
            date: bar.date,
            weekday: bar.date.weekday().num_days_from_monday() as u8,
            month: bar.date.month(),
            close: bar.close,
            moving_averages,
            is_delivery_week: schedule.map_or(false, |s| s.is_delivery_week(bar.date)),
            is_warmup: bar.is_warmup,
        }
    }

    pub fn day(&self) -> Weekday {
        self.date.weekday()
    }

    /// Moving average for `window`; `None` if not requested or not yet defined.
    pub fn ma(&self, window: usize) -> Option<f64> {
        self.moving_averages.get(&window).copied().flatten()
    }

    /// `close / MA(window)`.
    pub fn ratio(&self, window: usize) -> Option<f64> {
        self.ma(window).map(|ma| self.close / ma)
    }
}

/// Rows for every bar of the series, each window computed independently.
pub fn build_features(
    series: &BarSeries,
    windows: &[usize],
    schedule: Option<&DeliverySchedule>,
) -> Vec<FeatureRow> {
    let columns: Vec<(usize, Vec<Option<f64>>)> = windows
        .iter()
        .map(|&w| (w, Sma::new(w).compute(series.bars())))
        .collect();

    series
        .bars()
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let mas = columns.iter().map(|(w, col)| (*w, col[i])).collect();
            FeatureRow::from_parts(bar, mas, schedule)
        })
        .collect()
}

/// Close of the last bar of the ISO week before the one containing
/// `bars[index]`. Scans backward until the week identifier changes.
pub fn prior_week_close(bars: &[Bar], index: usize) -> Option<f64> {
    let current = bars.get(index)?.date.iso_week();
    bars[..index]
        .iter()
        .rev()
        .find(|b| b.date.iso_week() != current)
        .map(|b| b.close)
}

/// High of the bar `days_back` sessions before `index`.
pub fn prior_high(bars: &[Bar], index: usize, days_back: usize) -> Option<f64> {
    if days_back == 0 || index >= bars.len() {
        return None;
    }
    index.checked_sub(days_back).map(|i| bars[i].high)
}

/// Relative change from `reference` to `close`.
pub fn week_change(close: f64, reference: f64) -> f64 {
    (close - reference) / reference
}
