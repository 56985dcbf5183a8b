//! Signal evaluation: a pure function of one feature row, a few extra inputs,
//! and a rule table.
//!
//! Every variant yields a `SignalVerdict`. Missing history is reported as
//! `Indeterminate`, never as a failed condition.

pub mod etf;
pub mod futures;

pub use etf::{evaluate_etf, evaluate_etf_at, EtfInputs, EtfSignals};
pub use futures::{evaluate_futures, evaluate_futures_at, FuturesSignals};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::BarSeries;
use crate::error::EvaluateError;
use crate::rules::Direction;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    FuturesLong,
    FuturesShortA,
    FuturesShortB,
    EtfThursday,
    EtfFriday,
    EtfSupplemental,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Variant::FuturesLong => "futures long",
            Variant::FuturesShortA => "futures short-A",
            Variant::FuturesShortB => "futures short-B",
            Variant::EtfThursday => "ETF Thursday buy",
            Variant::EtfFriday => "ETF Friday buy",
            Variant::EtfSupplemental => "ETF supplemental buy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Weekday,
    Month,
    /// `close / MA` inside the variant's ratio bounds.
    MaRatio,
    /// Not a blocked weekday of a delivery week.
    DeliveryWeek,
    /// `close > MA_slow * floor` (strict).
    MaFloor,
    MaSlowDistance,
    MaFastDistance,
    MaMidDistance,
    WeekChange,
    HighDrop,
}

/// One named sub-condition. `observed` carries the measured value
/// (weekday number, month, ratio, distance, change) for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub kind: ConditionKind,
    pub passed: bool,
    pub observed: Option<f64>,
}

impl Condition {
    pub fn new(kind: ConditionKind, passed: bool, observed: Option<f64>) -> Self {
        Self {
            kind,
            passed,
            observed,
        }
    }
}

/// Input that was unavailable for a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingInput {
    MovingAverage { window: usize },
    PriorWeekClose,
    PriorHigh,
}

/// A fully decided verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub variant: Variant,
    pub direction: Direction,
    pub date: NaiveDate,
    pub close: f64,
    pub conditions: Vec<Condition>,
    /// AND of every condition.
    pub overall: bool,
    /// Present only when `overall` is true.
    pub stop_loss_price: Option<f64>,
    pub hold_days: Option<u32>,
}

impl Evaluation {
    pub(crate) fn new(
        variant: Variant,
        direction: Direction,
        date: NaiveDate,
        close: f64,
        conditions: Vec<Condition>,
        stop_loss_price: f64,
        hold_days: Option<u32>,
    ) -> Self {
        let overall = conditions.iter().all(|c| c.passed);
        Self {
            variant,
            direction,
            date,
            close,
            conditions,
            overall,
            stop_loss_price: overall.then_some(stop_loss_price),
            hold_days,
        }
    }

    pub fn condition(&self, kind: ConditionKind) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.kind == kind)
    }

    pub fn failed(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| !c.passed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SignalVerdict {
    Indeterminate {
        variant: Variant,
        missing: Vec<MissingInput>,
    },
    Evaluated(Evaluation),
}

impl SignalVerdict {
    pub fn variant(&self) -> Variant {
        match self {
            SignalVerdict::Indeterminate { variant, .. } => *variant,
            SignalVerdict::Evaluated(e) => e.variant,
        }
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, SignalVerdict::Indeterminate { .. })
    }

    /// `None` when indeterminate.
    pub fn overall(&self) -> Option<bool> {
        self.evaluation().map(|e| e.overall)
    }

    pub fn fired(&self) -> bool {
        self.overall() == Some(true)
    }

    pub fn evaluation(&self) -> Option<&Evaluation> {
        match self {
            SignalVerdict::Evaluated(e) => Some(e),
            SignalVerdict::Indeterminate { .. } => None,
        }
    }

    pub fn stop_loss_price(&self) -> Option<f64> {
        self.evaluation().and_then(|e| e.stop_loss_price)
    }
}

/// Index of the observation bar for `as_of`: the latest bar dated on or
/// before it, which must not be a warmup bar.
pub fn resolve_observation(series: &BarSeries, as_of: NaiveDate) -> Result<usize, EvaluateError> {
    let index = series
        .index_on_or_before(as_of)
        .ok_or(EvaluateError::NoObservation { as_of })?;
    match series.get(index) {
        Some(bar) if bar.is_warmup => Err(EvaluateError::WarmupObservation { date: bar.date }),
        Some(_) => Ok(index),
        None => Err(EvaluateError::NoObservation { as_of }),
    }
}
