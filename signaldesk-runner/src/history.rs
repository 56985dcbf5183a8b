//! Verdict history — one verdict set per non-warmup bar, for chart overlays.
//!
//! Features are built once for the whole series; each day is then an
//! independent pure evaluation and runs on the rayon pool. Output order
//! follows the series.

use anyhow::Result;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use signaldesk_core::calendar::{contract_segments, ContractSegment, DeliverySchedule};
use signaldesk_core::domain::BarSeries;
use signaldesk_core::features::build_features;
use signaldesk_core::signals::{
    evaluate_etf, evaluate_futures, EtfInputs, EtfSignals, SignalVerdict,
};
use signaldesk_core::{EtfRules, FuturesRules, FuturesSignals};
use tracing::debug;

/// Inclusive date filter; an absent side is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesHistoryRow {
    pub close: f64,
    pub contract: String,
    pub ma: Option<f64>,
    pub ratio: Option<f64>,
    pub is_delivery_week: bool,
    pub signals: FuturesSignals,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesHistory {
    pub rows: Vec<FuturesHistoryRow>,
    /// Contract runs over the whole series, warmup included.
    pub segments: Vec<ContractSegment>,
}

/// Bar indices eligible for evaluation: non-warmup and inside `range`.
fn live_indices(series: &BarSeries, range: &DateRange) -> Vec<usize> {
    series
        .bars()
        .iter()
        .enumerate()
        .filter(|(_, b)| !b.is_warmup && range.contains(b.date))
        .map(|(i, _)| i)
        .collect()
}

pub fn futures_history(
    series: &BarSeries,
    rules: &FuturesRules,
    schedule: &DeliverySchedule,
    range: &DateRange,
) -> FuturesHistory {
    let rows = build_features(series, &[rules.ma_window], Some(schedule));
    let indices = live_indices(series, range);
    debug!(days = indices.len(), "evaluating futures history");

    let bars = series.bars();
    let history = indices
        .par_iter()
        .map(|&i| {
            let row = &rows[i];
            FuturesHistoryRow {
                close: row.close,
                contract: bars[i].contract_id.clone(),
                ma: row.ma(rules.ma_window),
                ratio: row.ratio(rules.ma_window),
                is_delivery_week: row.is_delivery_week,
                signals: evaluate_futures(row, rules),
            }
        })
        .collect();

    FuturesHistory {
        rows: history,
        segments: contract_segments(bars),
    }
}

pub fn etf_history(series: &BarSeries, rules: &EtfRules, range: &DateRange) -> Vec<EtfSignals> {
    let rows = build_features(series, &rules.windows(), None);
    let indices = live_indices(series, range);
    debug!(days = indices.len(), "evaluating ETF history");

    let bars = series.bars();
    indices
        .par_iter()
        .map(|&i| evaluate_etf(&rows[i], &EtfInputs::at(bars, i), rules))
        .collect()
}

/// `fired`, `not_fired` or `indeterminate`.
pub fn verdict_cell(verdict: &SignalVerdict) -> &'static str {
    match verdict.overall() {
        Some(true) => "fired",
        Some(false) => "not_fired",
        None => "indeterminate",
    }
}

fn opt_cell(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.4}")).unwrap_or_default()
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Columns: date, close, contract, ma, ratio, delivery_week, long,
/// short_variant, short
pub fn futures_history_csv(history: &FuturesHistory) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "close",
        "contract",
        "ma",
        "ratio",
        "delivery_week",
        "long",
        "short_variant",
        "short",
    ])?;
    for row in &history.rows {
        wtr.write_record([
            row.signals.date.to_string(),
            format!("{:.4}", row.close),
            row.contract.clone(),
            opt_cell(row.ma),
            opt_cell(row.ratio),
            row.is_delivery_week.to_string(),
            verdict_cell(&row.signals.long).to_string(),
            row.signals.short.variant().label().to_string(),
            verdict_cell(&row.signals.short).to_string(),
        ])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

/// Columns: date, close, week_change, ma_all_ok, thursday, friday,
/// supplemental, stop_loss
pub fn etf_history_csv(history: &[EtfSignals]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "close",
        "week_change",
        "ma_all_ok",
        "thursday",
        "friday",
        "supplemental",
        "stop_loss",
    ])?;
    for s in history {
        wtr.write_record([
            s.date.to_string(),
            format!("{:.4}", s.close),
            opt_cell(s.week_change),
            s.ma_all_ok.map(|ok| ok.to_string()).unwrap_or_default(),
            verdict_cell(&s.thursday).to_string(),
            verdict_cell(&s.friday).to_string(),
            verdict_cell(&s.supplemental).to_string(),
            format!("{:.4}", s.stop_loss_price),
        ])?;
    }
    Ok(String::from_utf8(wtr.into_inner()?)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};
    use signaldesk_core::domain::Bar;
    use signaldesk_core::signals::evaluate_futures_at;

    fn weekday_series(start: NaiveDate, n: usize, warmup: usize) -> BarSeries {
        let mut bars = Vec::with_capacity(n);
        let mut d = start;
        while bars.len() < n {
            if d.weekday().num_days_from_monday() < 5 {
                let close = 4000.0 + (bars.len() as f64 * 0.37).sin() * 80.0;
                let mut bar = Bar::new(d, close, close + 10.0, close - 10.0, close);
                bar.is_warmup = bars.len() < warmup;
                bar.contract_id = if d.month() <= 3 { "IF2403" } else { "IF2406" }.into();
                bars.push(bar);
            }
            d += Duration::days(1);
        }
        BarSeries::new(bars).unwrap()
    }

    #[test]
    fn skips_warmup_and_matches_single_day_evaluation() {
        let series = weekday_series(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 120, 30);
        let rules = FuturesRules::default();
        let schedule = DeliverySchedule::covering(series.first().date, series.last().date);
        let history = futures_history(&series, &rules, &schedule, &DateRange::default());

        assert_eq!(history.rows.len(), 90);
        assert_eq!(history.rows[0].signals.date, series.bars()[30].date);
        assert!(history
            .rows
            .windows(2)
            .all(|w| w[0].signals.date < w[1].signals.date));

        for row in history.rows.iter().step_by(7) {
            let single =
                evaluate_futures_at(&series, row.signals.date, &rules, &schedule).unwrap();
            assert_eq!(row.signals.long.overall(), single.long.overall());
            assert_eq!(row.signals.short.variant(), single.short.variant());
            assert_eq!(row.signals.short.overall(), single.short.overall());
        }
        assert_eq!(history.segments.len(), 2);
    }

    #[test]
    fn range_filters_days() {
        let series = weekday_series(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 80, 0);
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let range = DateRange::new(Some(start), Some(end));
        let history = etf_history(&series, &EtfRules::default(), &range);
        assert_eq!(history.len(), 6);
        assert!(history.iter().all(|s| s.date >= start && s.date <= end));
    }

    #[test]
    fn csv_export_has_header_and_rows() {
        let series = weekday_series(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 70, 0);
        let rules = FuturesRules::default();
        let schedule = DeliverySchedule::covering(series.first().date, series.last().date);
        let history = futures_history(&series, &rules, &schedule, &DateRange::default());
        let csv = futures_history_csv(&history).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 71);
        assert!(lines[0].starts_with("date,close,contract,ma,ratio"));
        // First bar has no 60-day mean yet.
        assert!(lines[1].ends_with("indeterminate"));

        let etf = etf_history(&series, &EtfRules::default(), &DateRange::default());
        let csv = etf_history_csv(&etf).unwrap();
        assert_eq!(csv.lines().count(), 71);
    }
}
