//! Simple moving average over closes.
//!
//! Lookback: window - 1 (first defined value at index window-1).

use super::Indicator;
use crate::domain::Bar;

/// Arithmetic mean of `closes[i-window+1..=i]` for every `i >= window-1`,
/// `None` before that. A zero window yields all `None`.
pub fn rolling_mean(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if window == 0 || n < window {
        return result;
    }

    let mut sum: f64 = closes[..window].iter().sum();
    result[window - 1] = Some(sum / window as f64);

    for i in window..n {
        sum += closes[i] - closes[i - window];
        result[i] = Some(sum / window as f64);
    }
    result
}

/// Sum of the `count` closes immediately before `end` (exclusive).
///
/// `None` when fewer than `count` closes precede `end` or `end` is past the
/// series.
pub fn trailing_sum(closes: &[f64], end: usize, count: usize) -> Option<f64> {
    if end > closes.len() || end < count {
        return None;
    }
    Some(closes[end - count..end].iter().sum())
}

#[derive(Debug, Clone)]
pub struct Sma {
    window: usize,
    name: String,
}

impl Sma {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            name: format!("ma_{window}"),
        }
    }
}

impl Indicator for Sma {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.window.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<Option<f64>> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rolling_mean(&closes, self.window)
    }
}
