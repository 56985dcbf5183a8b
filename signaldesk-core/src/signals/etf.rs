//! ETF strategy: Thursday, Friday and supplemental buys.
//!
//! All three variants share one moving-average distance gate (`ma_all_ok`),
//! computed once per day, and the December exclusion.

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use super::{
    resolve_observation, Condition, ConditionKind, Evaluation, MissingInput, SignalVerdict, Variant,
};
use crate::domain::{Bar, BarSeries};
use crate::error::EvaluateError;
use crate::features::{prior_high, prior_week_close, week_change, FeatureRow};
use crate::rules::{Direction, EtfRules};

/// Inputs beyond the feature row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EtfInputs {
    pub prior_week_close: Option<f64>,
    /// High one session back.
    pub prior_high_1: Option<f64>,
    /// High two sessions back.
    pub prior_high_2: Option<f64>,
}

impl EtfInputs {
    pub fn at(bars: &[Bar], index: usize) -> Self {
        Self {
            prior_week_close: prior_week_close(bars, index),
            prior_high_1: prior_high(bars, index, 1),
            prior_high_2: prior_high(bars, index, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfSignals {
    pub date: NaiveDate,
    pub close: f64,
    /// Change against the prior ISO week's last close; shown on every day.
    pub week_change: Option<f64>,
    /// `None` when any of the gate's moving averages is undefined.
    pub ma_all_ok: Option<bool>,
    pub ma_conditions: Vec<Condition>,
    pub thursday: SignalVerdict,
    pub friday: SignalVerdict,
    pub supplemental: SignalVerdict,
    /// Reported whichever variant fires.
    pub stop_loss_price: f64,
}

impl EtfSignals {
    pub fn verdicts(&self) -> [&SignalVerdict; 3] {
        [&self.thursday, &self.friday, &self.supplemental]
    }

    pub fn any_fired(&self) -> bool {
        self.verdicts().iter().any(|v| v.fired())
    }
}

pub fn evaluate_etf(row: &FeatureRow, inputs: &EtfInputs, rules: &EtfRules) -> EtfSignals {
    let close = row.close;
    let missing_ma: Vec<MissingInput> = rules
        .windows()
        .iter()
        .filter(|&&w| row.ma(w).is_none())
        .map(|&window| MissingInput::MovingAverage { window })
        .collect();

    let gate = match (
        row.ma(rules.fast_window),
        row.ma(rules.mid_window),
        row.ma(rules.slow_window),
    ) {
        (Some(fast), Some(mid), Some(slow)) => Some(ma_gate(close, fast, mid, slow, rules)),
        _ => None,
    };
    let ma_all_ok = gate.as_ref().map(|g| g.iter().all(|c| c.passed));
    let change = inputs.prior_week_close.map(|p| week_change(close, p));

    let base = |day: Weekday| -> Vec<Condition> {
        vec![
            Condition::new(
                ConditionKind::Weekday,
                row.day() == day,
                Some(f64::from(row.weekday)),
            ),
            month_condition(row, rules),
        ]
    };

    let thursday = match (&gate, change) {
        (Some(gate), Some(change)) => {
            let mut conditions = base(rules.thursday);
            conditions.extend(gate.iter().cloned());
            conditions.push(Condition::new(
                ConditionKind::WeekChange,
                change <= rules.thursday_max_week_change,
                Some(change),
            ));
            evaluated(
                Variant::EtfThursday,
                row,
                conditions,
                rules,
                rules.thursday_hold_days(change),
            )
        }
        // Off the trigger weekday the verdict is decided without the weekly change.
        (Some(gate), None) if row.day() != rules.thursday => {
            let mut conditions = base(rules.thursday);
            conditions.extend(gate.iter().cloned());
            conditions.push(Condition::new(ConditionKind::WeekChange, false, None));
            evaluated(Variant::EtfThursday, row, conditions, rules, None)
        }
        _ => {
            let mut missing = missing_ma.clone();
            if change.is_none() {
                missing.push(MissingInput::PriorWeekClose);
            }
            SignalVerdict::Indeterminate {
                variant: Variant::EtfThursday,
                missing,
            }
        }
    };

    let friday = match &gate {
        Some(gate) => {
            let mut conditions = base(rules.friday);
            conditions.extend(gate.iter().cloned());
            evaluated(
                Variant::EtfFriday,
                row,
                conditions,
                rules,
                rules.friday_hold_days,
            )
        }
        None => SignalVerdict::Indeterminate {
            variant: Variant::EtfFriday,
            missing: missing_ma.clone(),
        },
    };

    let drop = high_drop(
        close,
        inputs.prior_high_1,
        inputs.prior_high_2,
        rules.drop_threshold,
    );
    let supplemental = match (&gate, drop) {
        (Some(gate), Some(drop)) => {
            let mut conditions = vec![month_condition(row, rules)];
            conditions.extend(gate.iter().cloned());
            conditions.push(drop);
            evaluated(
                Variant::EtfSupplemental,
                row,
                conditions,
                rules,
                Some(rules.supplemental_hold_days),
            )
        }
        (_, drop) => {
            let mut missing = missing_ma;
            if drop.is_none() {
                missing.push(MissingInput::PriorHigh);
            }
            SignalVerdict::Indeterminate {
                variant: Variant::EtfSupplemental,
                missing,
            }
        }
    };

    EtfSignals {
        date: row.date,
        close,
        week_change: change,
        ma_all_ok,
        ma_conditions: gate.unwrap_or_default(),
        thursday,
        friday,
        supplemental,
        stop_loss_price: rules.stop_loss_price(close),
    }
}

/// Evaluate at the observation bar for `as_of`.
pub fn evaluate_etf_at(
    series: &BarSeries,
    as_of: NaiveDate,
    rules: &EtfRules,
) -> Result<EtfSignals, EvaluateError> {
    let index = resolve_observation(series, as_of)?;
    let row = FeatureRow::at(series, index, &rules.windows(), None)
        .ok_or(EvaluateError::NoObservation { as_of })?;
    let inputs = EtfInputs::at(series.bars(), index);
    Ok(evaluate_etf(&row, &inputs, rules))
}

fn ma_gate(close: f64, fast: f64, mid: f64, slow: f64, rules: &EtfRules) -> Vec<Condition> {
    let slow_distance = (close - slow) / slow;
    let fast_distance = (close - fast) / fast;
    let mid_distance = (close - mid) / mid;
    vec![
        Condition::new(
            ConditionKind::MaFloor,
            close > slow * rules.slow_floor_ratio,
            Some(close / slow),
        ),
        Condition::new(
            ConditionKind::MaSlowDistance,
            slow_distance <= rules.slow_max_distance,
            Some(slow_distance),
        ),
        Condition::new(
            ConditionKind::MaFastDistance,
            fast_distance <= rules.fast_max_distance,
            Some(fast_distance),
        ),
        Condition::new(
            ConditionKind::MaMidDistance,
            mid_distance <= rules.mid_max_distance,
            Some(mid_distance),
        ),
    ]
}

fn month_condition(row: &FeatureRow, rules: &EtfRules) -> Condition {
    Condition::new(
        ConditionKind::Month,
        rules.months.allows(row.month),
        Some(f64::from(row.month)),
    )
}

/// Drop from the high one session back; the high two sessions back is only
/// consulted when the first did not trigger.
fn high_drop(
    close: f64,
    high_1: Option<f64>,
    high_2: Option<f64>,
    threshold: f64,
) -> Option<Condition> {
    let drop = |high: f64| (close - high) / high;
    let condition = |d: f64| Condition::new(ConditionKind::HighDrop, d <= -threshold, Some(d));
    match (high_1.map(drop), high_2.map(drop)) {
        (Some(d1), _) if d1 <= -threshold => Some(condition(d1)),
        (_, Some(d2)) => Some(condition(d2)),
        (Some(d1), None) => Some(condition(d1)),
        (None, None) => None,
    }
}

fn evaluated(
    variant: Variant,
    row: &FeatureRow,
    conditions: Vec<Condition>,
    rules: &EtfRules,
    hold_days: Option<u32>,
) -> SignalVerdict {
    SignalVerdict::Evaluated(Evaluation::new(
        variant,
        Direction::Long,
        row.date,
        row.close,
        conditions,
        rules.stop_loss_price(row.close),
        hold_days,
    ))
}
