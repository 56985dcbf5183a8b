//! Tradeable price bands.
//!
//! Inverts the moving-average ratio condition: given the sum `S` of the
//! `window - 1` closes before the target day, the ratio for a target close
//! `P` is `window * P / (S + P)`, so the bound for ratio `r` is
//! `P = r * S / (window - r)`.
//!
//! The target day is the observation bar itself, so at least `window` bars
//! (warmup included) must exist up to it.

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::domain::BarSeries;
use crate::indicators::trailing_sum;
use crate::rules::{EtfRules, FuturesRules, RatioBounds};

/// Closing-price interval; an absent side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceBand {
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl PriceBand {
    pub fn contains(&self, price: f64) -> bool {
        self.lower.map_or(true, |l| price >= l) && self.upper.map_or(true, |u| price <= u)
    }

    /// True when both sides exist and cross.
    pub fn is_empty(&self) -> bool {
        matches!((self.lower, self.upper), (Some(l), Some(u)) if l > u)
    }

    pub fn intersect(&self, other: &PriceBand) -> PriceBand {
        PriceBand {
            lower: tighter(self.lower, other.lower, f64::max),
            upper: tighter(self.upper, other.upper, f64::min),
        }
    }
}

fn tighter(a: Option<f64>, b: Option<f64>, pick: fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(pick(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

/// Close that puts `close / MA(window)` exactly at `ratio`.
pub fn price_for_ratio(trailing_sum: f64, window: usize, ratio: f64) -> f64 {
    ratio * trailing_sum / (window as f64 - ratio)
}

/// `close / MA(window)` for a target close `price` after `trailing_sum`.
pub fn ratio_for_price(trailing_sum: f64, window: usize, price: f64) -> f64 {
    window as f64 * price / (trailing_sum + price)
}

pub fn solve_band(trailing_sum: f64, window: usize, bounds: &RatioBounds) -> PriceBand {
    PriceBand {
        lower: bounds.min.map(|r| price_for_ratio(trailing_sum, window, r)),
        upper: bounds.max.map(|r| price_for_ratio(trailing_sum, window, r)),
    }
}

/// Band for the close at `index`. `None` when fewer than `window` closes
/// exist up to and including it.
pub fn band_at(
    closes: &[f64],
    index: usize,
    window: usize,
    bounds: &RatioBounds,
) -> Option<PriceBand> {
    if window == 0 || index >= closes.len() {
        return None;
    }
    if index + 1 < window {
        return None;
    }
    let sum = trailing_sum(closes, index, window - 1)?;
    Some(solve_band(sum, window, bounds))
}

/// Futures bands at one observation. The short band follows the same month
/// selection as the short verdict.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FuturesBands {
    pub long: Option<PriceBand>,
    pub short: Option<PriceBand>,
}

pub fn futures_bands(series: &BarSeries, index: usize, rules: &FuturesRules) -> FuturesBands {
    let closes = series.closes();
    let short_rule = match series.get(index) {
        Some(bar) if rules.uses_short_b(bar.date.month()) => &rules.short_b,
        _ => &rules.short_a,
    };
    FuturesBands {
        long: band_at(&closes, index, rules.ma_window, &rules.long.ratio),
        short: band_at(&closes, index, rules.ma_window, &short_rule.ratio),
    }
}

/// Intersection of the slow, fast and mid ratio bands of the ETF gate.
/// `None` when any window is not yet full.
pub fn etf_band(series: &BarSeries, index: usize, rules: &EtfRules) -> Option<PriceBand> {
    let closes = series.closes();
    let slow = band_at(&closes, index, rules.slow_window, &rules.slow_bounds())?;
    let fast = band_at(&closes, index, rules.fast_window, &rules.fast_bounds())?;
    let mid = band_at(&closes, index, rules.mid_window, &rules.mid_bounds())?;
    Some(slow.intersect(&fast).intersect(&mid))
}
