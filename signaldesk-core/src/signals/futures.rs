//! Futures strategy: long, plus exactly one of short-A / short-B chosen by month.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::{
    resolve_observation, Condition, ConditionKind, Evaluation, MissingInput, SignalVerdict, Variant,
};
use crate::calendar::DeliverySchedule;
use crate::domain::BarSeries;
use crate::error::EvaluateError;
use crate::features::FeatureRow;
use crate::rules::{FuturesRules, FuturesVariantRule};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesSignals {
    pub date: NaiveDate,
    pub long: SignalVerdict,
    /// Short-B in its months, short-A otherwise. Never both.
    pub short: SignalVerdict,
}

/// Evaluate all futures variants for one feature row. `row` must carry the
/// rule table's MA window; otherwise every verdict is indeterminate.
pub fn evaluate_futures(row: &FeatureRow, rules: &FuturesRules) -> FuturesSignals {
    let (short_variant, short_rule) = if rules.uses_short_b(row.month) {
        (Variant::FuturesShortB, &rules.short_b)
    } else {
        (Variant::FuturesShortA, &rules.short_a)
    };

    let (long, short) = match row.ratio(rules.ma_window) {
        Some(ratio) => (
            evaluate_variant(Variant::FuturesLong, &rules.long, row, ratio),
            evaluate_variant(short_variant, short_rule, row, ratio),
        ),
        None => {
            let missing = vec![MissingInput::MovingAverage {
                window: rules.ma_window,
            }];
            (
                SignalVerdict::Indeterminate {
                    variant: Variant::FuturesLong,
                    missing: missing.clone(),
                },
                SignalVerdict::Indeterminate {
                    variant: short_variant,
                    missing,
                },
            )
        }
    };

    FuturesSignals {
        date: row.date,
        long,
        short,
    }
}

/// Evaluate at the observation bar for `as_of`.
pub fn evaluate_futures_at(
    series: &BarSeries,
    as_of: NaiveDate,
    rules: &FuturesRules,
    schedule: &DeliverySchedule,
) -> Result<FuturesSignals, EvaluateError> {
    let index = resolve_observation(series, as_of)?;
    let row = FeatureRow::at(series, index, &[rules.ma_window], Some(schedule))
        .ok_or(EvaluateError::NoObservation { as_of })?;
    Ok(evaluate_futures(&row, rules))
}

fn evaluate_variant(
    variant: Variant,
    rule: &FuturesVariantRule,
    row: &FeatureRow,
    ratio: f64,
) -> SignalVerdict {
    let day = row.date.weekday();
    let mut conditions = vec![
        Condition::new(
            ConditionKind::Weekday,
            rule.weekdays.contains(&day),
            Some(f64::from(row.weekday)),
        ),
        Condition::new(
            ConditionKind::Month,
            rule.months.allows(row.month),
            Some(f64::from(row.month)),
        ),
        Condition::new(ConditionKind::MaRatio, rule.ratio.contains(ratio), Some(ratio)),
    ];
    if !rule.delivery_week_blocked.is_empty() {
        let blocked = row.is_delivery_week && rule.delivery_week_blocked.contains(&day);
        conditions.push(Condition::new(ConditionKind::DeliveryWeek, !blocked, None));
    }

    SignalVerdict::Evaluated(Evaluation::new(
        variant,
        rule.direction,
        row.date,
        row.close,
        conditions,
        rule.stop_loss_price(row.close),
        Some(rule.hold_days),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::indicators::{assert_approx, make_bars};
    use crate::rules::Direction;

    fn row(date: NaiveDate, close: f64, ma60: Option<f64>, delivery: bool) -> FeatureRow {
        FeatureRow {
            date,
            weekday: date.weekday().num_days_from_monday() as u8,
            month: date.month(),
            close,
            moving_averages: BTreeMap::from([(60, ma60)]),
            is_delivery_week: delivery,
            is_warmup: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn long_fires_midweek_inside_band() {
        // Wednesday 2024-06-12.
        let signals = evaluate_futures(
            &row(date(2024, 6, 12), 4200.0, Some(4150.0), false),
            &FuturesRules::default(),
        );
        assert!(signals.long.fired());
        assert_approx(signals.long.stop_loss_price().unwrap(), 4116.0, 1e-9);
        let eval = signals.long.evaluation().unwrap();
        assert_eq!(eval.direction, Direction::Long);
        assert_eq!(eval.hold_days, Some(3));
        assert_eq!(signals.short.variant(), Variant::FuturesShortA);
        assert_eq!(signals.short.overall(), Some(false));
    }

    #[test]
    fn delivery_thursday_blocks_long() {
        // Thursday 2024-06-20, delivery week of 2024-06-21.
        let signals = evaluate_futures(
            &row(date(2024, 6, 20), 4200.0, Some(4150.0), true),
            &FuturesRules::default(),
        );
        let eval = signals.long.evaluation().unwrap();
        assert!(!eval.overall);
        assert!(eval.condition(ConditionKind::Weekday).unwrap().passed);
        assert!(eval.condition(ConditionKind::MaRatio).unwrap().passed);
        assert!(!eval.condition(ConditionKind::DeliveryWeek).unwrap().passed);
        assert_eq!(eval.stop_loss_price, None);
    }

    #[test]
    fn delivery_wednesday_still_allowed() {
        let signals = evaluate_futures(
            &row(date(2024, 6, 19), 4200.0, Some(4150.0), true),
            &FuturesRules::default(),
        );
        assert!(signals.long.fired());
    }

    #[test]
    fn december_friday_selects_short_b() {
        // Friday 2024-12-06.
        let signals = evaluate_futures(
            &row(date(2024, 12, 6), 3980.0, Some(4000.0), false),
            &FuturesRules::default(),
        );
        assert_eq!(signals.short.variant(), Variant::FuturesShortB);
        assert!(signals.short.fired());
        assert_approx(signals.short.stop_loss_price().unwrap(), 3980.0 * 1.02, 1e-9);
        assert_eq!(signals.short.evaluation().unwrap().hold_days, Some(5));
    }

    #[test]
    fn monday_short_a_outside_december() {
        // Monday 2024-06-10, ratio 1.0.
        let signals = evaluate_futures(
            &row(date(2024, 6, 10), 4000.0, Some(4000.0), false),
            &FuturesRules::default(),
        );
        assert_eq!(signals.short.variant(), Variant::FuturesShortA);
        assert!(signals.short.fired());
        assert_approx(signals.short.stop_loss_price().unwrap(), 4060.0, 1e-9);
        assert!(!signals.long.fired());
    }

    #[test]
    fn ratio_bounds_inclusive() {
        let rules = FuturesRules::default();
        let wed = date(2024, 6, 12);
        let at_min = evaluate_futures(&row(wed, 99.0, Some(100.0), false), &rules);
        assert!(at_min.long.fired());
        let at_max = evaluate_futures(&row(wed, 110.0, Some(100.0), false), &rules);
        assert!(at_max.long.fired());
        let above = evaluate_futures(&row(wed, 110.01, Some(100.0), false), &rules);
        assert_eq!(above.long.overall(), Some(false));
    }

    #[test]
    fn missing_ma_is_indeterminate_for_all_variants() {
        let signals = evaluate_futures(
            &row(date(2024, 12, 6), 4000.0, None, false),
            &FuturesRules::default(),
        );
        assert!(signals.long.is_indeterminate());
        assert!(signals.short.is_indeterminate());
        assert_eq!(signals.short.variant(), Variant::FuturesShortB);
    }

    #[test]
    fn evaluate_at_resolves_observation() {
        let closes: Vec<f64> = (0..70).map(|i| 4000.0 + i as f64).collect();
        let series = BarSeries::new(make_bars(&closes)).unwrap();
        let schedule = DeliverySchedule::covering(series.first().date, series.last().date);
        let rules = FuturesRules::default();

        let last = series.last().date;
        let signals = evaluate_futures_at(&series, last, &rules, &schedule).unwrap();
        assert_eq!(signals.date, last);
        assert!(!signals.long.is_indeterminate());

        let early = series.get(10).unwrap().date;
        let signals = evaluate_futures_at(&series, early, &rules, &schedule).unwrap();
        assert!(signals.long.is_indeterminate());
    }
}
