//! Moving-average feature builder.
//!
//! Indicators are pure functions: bar history in, one optional value per bar
//! out. `None` means the window is not yet full. It is never coerced to zero
//! or NaN downstream.
//!
//! # Look-ahead guard
//! No value at bar t may depend on bar t+1 or later.

pub mod sma;

pub use sma::{rolling_mean, trailing_sum, Sma};

use crate::domain::Bar;

/// Trait for precomputed indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "ma_60").
    fn name(&self) -> &str;

    /// Number of bars before the first defined value.
    fn lookback(&self) -> usize;

    /// Compute over the full series. Output has the same length as `bars`;
    /// the first `lookback()` entries are `None`.
    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>>;
}

/// Synthetic bars from closes, one calendar day apart, for tests.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::new(
                base_date + chrono::Duration::days(i as i64),
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
            )
        })
        .collect()
}

#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
