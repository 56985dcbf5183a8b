//! Rule tables for both strategies.
//!
//! Immutable, serializable configuration passed into every evaluation call.
//! `Default` reproduces the production thresholds; alternative parameter sets
//! can be evaluated side by side.

use chrono::Weekday;
use serde::{Deserialize, Serialize};

use crate::error::RuleError;

/// Trade direction of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Long,
    Short,
}

/// Month gate for a variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonthFilter {
    Any,
    Exclude(Vec<u32>),
    Only(Vec<u32>),
}

impl MonthFilter {
    pub fn allows(&self, month: u32) -> bool {
        match self {
            MonthFilter::Any => true,
            MonthFilter::Exclude(months) => !months.contains(&month),
            MonthFilter::Only(months) => months.contains(&month),
        }
    }

    fn validate(&self, rule: &'static str) -> Result<(), RuleError> {
        let months = match self {
            MonthFilter::Any => return Ok(()),
            MonthFilter::Exclude(m) | MonthFilter::Only(m) => m,
        };
        match months.iter().find(|m| !(1..=12).contains(*m)) {
            Some(&month) => Err(RuleError::InvalidMonth { rule, month }),
            None => Ok(()),
        }
    }
}

/// Inclusive bounds on `close / MA`. An absent side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioBounds {
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

impl RatioBounds {
    pub fn between(min: f64, max: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn at_most(max: f64) -> Self {
        Self {
            min: None,
            max: Some(max),
        }
    }

    pub fn contains(&self, ratio: f64) -> bool {
        self.min.map_or(true, |min| ratio >= min) && self.max.map_or(true, |max| ratio <= max)
    }

    /// Bounds must be positive, ordered, and below the window size (the
    /// price-band inversion divides by `window - r`).
    pub fn validate(&self, rule: &'static str, window: usize) -> Result<(), RuleError> {
        for r in [self.min, self.max].into_iter().flatten() {
            if r.is_nan() || r <= 0.0 {
                return Err(RuleError::NonPositiveRatio { rule, value: r });
            }
            if r >= window as f64 {
                return Err(RuleError::RatioOutOfRange {
                    rule,
                    ratio: r,
                    window,
                });
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(RuleError::InvertedRatioBounds { rule, min, max });
            }
        }
        Ok(())
    }
}

/// One row of the futures decision table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesVariantRule {
    pub direction: Direction,
    pub weekdays: Vec<Weekday>,
    pub months: MonthFilter,
    pub ratio: RatioBounds,
    pub hold_days: u32,
    /// Stop distance as a fraction of the entry price (0.02 = 2%).
    pub stop_loss_pct: f64,
    /// Weekdays on which the variant is blocked during a delivery week.
    #[serde(default)]
    pub delivery_week_blocked: Vec<Weekday>,
}

impl FuturesVariantRule {
    /// Stop-loss price for an entry at `close`: below for longs, above for shorts.
    pub fn stop_loss_price(&self, close: f64) -> f64 {
        match self.direction {
            Direction::Long => close * (1.0 - self.stop_loss_pct),
            Direction::Short => close * (1.0 + self.stop_loss_pct),
        }
    }

    fn validate(&self, rule: &'static str, window: usize) -> Result<(), RuleError> {
        if self.weekdays.is_empty() {
            return Err(RuleError::EmptyWeekdays { rule });
        }
        if self.stop_loss_pct.is_nan() || self.stop_loss_pct <= 0.0 {
            return Err(RuleError::NonPositiveRatio {
                rule,
                value: self.stop_loss_pct,
            });
        }
        self.months.validate(rule)?;
        self.ratio.validate(rule, window)
    }
}

/// Futures strategy: long, short-A (outside the short-B months), short-B.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FuturesRules {
    pub ma_window: usize,
    pub long: FuturesVariantRule,
    pub short_a: FuturesVariantRule,
    /// Evaluated instead of short-A whenever its month filter admits the month.
    pub short_b: FuturesVariantRule,
}

impl Default for FuturesRules {
    fn default() -> Self {
        Self {
            ma_window: 60,
            long: FuturesVariantRule {
                direction: Direction::Long,
                weekdays: vec![Weekday::Wed, Weekday::Thu],
                months: MonthFilter::Any,
                ratio: RatioBounds::between(0.99, 1.10),
                hold_days: 3,
                stop_loss_pct: 0.02,
                delivery_week_blocked: vec![Weekday::Thu],
            },
            short_a: FuturesVariantRule {
                direction: Direction::Short,
                weekdays: vec![Weekday::Mon],
                months: MonthFilter::Exclude(vec![12]),
                ratio: RatioBounds::between(0.98, 1.10),
                hold_days: 4,
                stop_loss_pct: 0.015,
                delivery_week_blocked: Vec::new(),
            },
            short_b: FuturesVariantRule {
                direction: Direction::Short,
                weekdays: vec![Weekday::Fri],
                months: MonthFilter::Only(vec![12]),
                ratio: RatioBounds::at_most(1.00),
                hold_days: 5,
                stop_loss_pct: 0.02,
                delivery_week_blocked: Vec::new(),
            },
        }
    }
}

impl FuturesRules {
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.ma_window == 0 {
            return Err(RuleError::InvalidWindow {
                rule: "futures",
                window: 0,
            });
        }
        self.long.validate("futures.long", self.ma_window)?;
        self.short_a.validate("futures.short_a", self.ma_window)?;
        self.short_b.validate("futures.short_b", self.ma_window)
    }

    /// Whether `month` selects short-B over short-A.
    pub fn uses_short_b(&self, month: u32) -> bool {
        self.short_b.months.allows(month)
    }
}

/// Thursday holding period by week-over-week change: the first tier whose
/// `max_change` is at or above the observed change applies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldTier {
    pub max_change: f64,
    pub days: u32,
}

/// ETF strategy: Thursday, Friday and supplemental (sharp-drop) buys sharing
/// one moving-average distance gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtfRules {
    pub fast_window: usize,
    pub mid_window: usize,
    pub slow_window: usize,
    /// Close must be strictly above `MA_slow * slow_floor_ratio`.
    pub slow_floor_ratio: f64,
    pub slow_max_distance: f64,
    pub fast_max_distance: f64,
    pub mid_max_distance: f64,
    pub months: MonthFilter,
    pub thursday: Weekday,
    pub friday: Weekday,
    /// Thursday requires the week-over-week change to be at or below this.
    pub thursday_max_week_change: f64,
    /// Supplemental buy fires on a drop of at least this fraction from the
    /// high one or two sessions back.
    pub drop_threshold: f64,
    /// Stop-loss price as a multiple of the entry (0.965 = 3.5% below).
    pub stop_loss_rate: f64,
    pub thursday_hold_tiers: Vec<HoldTier>,
    #[serde(default)]
    pub friday_hold_days: Option<u32>,
    pub supplemental_hold_days: u32,
}

impl Default for EtfRules {
    fn default() -> Self {
        Self {
            fast_window: 5,
            mid_window: 10,
            slow_window: 30,
            slow_floor_ratio: 0.99,
            slow_max_distance: 0.20,
            fast_max_distance: 0.05,
            mid_max_distance: 0.12,
            months: MonthFilter::Exclude(vec![12]),
            thursday: Weekday::Thu,
            friday: Weekday::Fri,
            thursday_max_week_change: -0.02,
            drop_threshold: 0.05,
            stop_loss_rate: 0.965,
            thursday_hold_tiers: vec![
                HoldTier {
                    max_change: -0.04,
                    days: 7,
                },
                HoldTier {
                    max_change: -0.02,
                    days: 5,
                },
            ],
            friday_hold_days: None,
            supplemental_hold_days: 2,
        }
    }
}

impl EtfRules {
    pub fn validate(&self) -> Result<(), RuleError> {
        for window in [self.fast_window, self.mid_window, self.slow_window] {
            if window == 0 {
                return Err(RuleError::InvalidWindow { rule: "etf", window });
            }
        }
        for value in [
            self.slow_floor_ratio,
            self.slow_max_distance,
            self.fast_max_distance,
            self.mid_max_distance,
            self.drop_threshold,
            self.stop_loss_rate,
        ] {
            if value.is_nan() || value <= 0.0 {
                return Err(RuleError::NonPositiveRatio { rule: "etf", value });
            }
        }
        self.months.validate("etf")?;
        self.slow_bounds().validate("etf.slow", self.slow_window)?;
        self.fast_bounds().validate("etf.fast", self.fast_window)?;
        self.mid_bounds().validate("etf.mid", self.mid_window)
    }

    /// Ratio window on `close / MA_slow`. The floor is strict in the rule
    /// itself; as a band edge it is reported inclusively.
    pub fn slow_bounds(&self) -> RatioBounds {
        RatioBounds::between(self.slow_floor_ratio, 1.0 + self.slow_max_distance)
    }

    pub fn fast_bounds(&self) -> RatioBounds {
        RatioBounds::at_most(1.0 + self.fast_max_distance)
    }

    pub fn mid_bounds(&self) -> RatioBounds {
        RatioBounds::at_most(1.0 + self.mid_max_distance)
    }

    /// Windows that must be filled for the distance gate to be decidable.
    pub fn windows(&self) -> [usize; 3] {
        [self.fast_window, self.mid_window, self.slow_window]
    }

    pub fn thursday_hold_days(&self, week_change: f64) -> Option<u32> {
        let mut tiers = self.thursday_hold_tiers.clone();
        tiers.sort_by(|a, b| a.max_change.total_cmp(&b.max_change));
        tiers
            .iter()
            .find(|t| week_change <= t.max_change)
            .map(|t| t.days)
    }

    pub fn stop_loss_price(&self, close: f64) -> f64 {
        close * self.stop_loss_rate
    }
}
