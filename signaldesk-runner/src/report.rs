//! Two-instrument evaluation report.
//!
//! Resolves the observation bar for an `as_of` date, optionally folds in a
//! reconciled live quote, evaluates every variant and solves the price bands.
//! Exported as pretty JSON or rendered as plain text for a terminal.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use signaldesk_core::calendar::DeliverySchedule;
use signaldesk_core::domain::{reconcile_quotes, BarSeries, Quote, ReconciledQuote};
use signaldesk_core::features::FeatureRow;
use signaldesk_core::signals::{
    evaluate_etf, evaluate_futures, resolve_observation, EtfInputs, SignalVerdict,
};
use signaldesk_core::{
    etf_band, futures_bands, EtfRules, EtfSignals, EvaluateError, FuturesBands, FuturesRules,
    FuturesSignals, PriceBand, QuoteError, SeriesError,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, Instrument};
use crate::data_loader::LoadedSeries;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{instrument}: {source}")]
    Evaluate {
        instrument: &'static str,
        #[source]
        source: EvaluateError,
    },

    #[error("{instrument}: live quote rejected: {source}")]
    Quote {
        instrument: &'static str,
        #[source]
        source: QuoteError,
    },

    #[error("{instrument}: live quote does not fit the series: {source}")]
    QuoteSeries {
        instrument: &'static str,
        #[source]
        source: SeriesError,
    },

    #[error("{0}: moving-average row unavailable for the observation bar")]
    MissingRow(&'static str),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuturesReport {
    pub as_of: NaiveDate,
    pub observation_date: NaiveDate,
    /// The observation bar is older than `as_of`.
    pub stale: bool,
    pub close: f64,
    pub contract: Option<String>,
    pub ma: Option<f64>,
    pub ratio: Option<f64>,
    pub is_delivery_week: bool,
    pub next_delivery: Option<NaiveDate>,
    pub signals: FuturesSignals,
    pub bands: FuturesBands,
    pub live_quote: Option<ReconciledQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfReport {
    pub as_of: NaiveDate,
    pub observation_date: NaiveDate,
    pub stale: bool,
    pub close: f64,
    pub moving_averages: BTreeMap<usize, Option<f64>>,
    pub signals: EtfSignals,
    /// Closes that keep every moving-average distance condition true.
    pub buy_band: Option<PriceBand>,
    pub live_quote: Option<ReconciledQuote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub instrument: Instrument,
    pub hash: String,
    pub bars: usize,
    pub warmup_bars: usize,
    pub first: NaiveDate,
    pub last: NaiveDate,
}

impl DatasetSummary {
    pub fn of(instrument: Instrument, loaded: &LoadedSeries) -> Self {
        Self {
            instrument,
            hash: loaded.dataset_hash.clone(),
            bars: loaded.series.len(),
            warmup_bars: loaded.warmup_rows,
            first: loaded.series.first().date,
            last: loaded.series.last().date,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub generated_for: NaiveDate,
    pub futures: Option<FuturesReport>,
    pub etf: Option<EtfReport>,
    pub datasets: Vec<DatasetSummary>,
}

/// One instrument's loaded data plus any live quotes, in provider priority
/// order.
#[derive(Debug, Clone, Copy)]
pub struct InstrumentInput<'a> {
    pub loaded: &'a LoadedSeries,
    pub quotes: &'a [Quote],
}

/// Reconcile `quotes` and fold the selected one into a new snapshot.
/// No quotes leaves the series as is.
pub fn apply_quotes(
    instrument: Instrument,
    series: &BarSeries,
    quotes: &[Quote],
    tolerance: f64,
) -> Result<(BarSeries, Option<ReconciledQuote>), ReportError> {
    if quotes.is_empty() {
        return Ok((series.clone(), None));
    }
    let reconciled =
        reconcile_quotes(quotes.to_vec(), tolerance).map_err(|source| ReportError::Quote {
            instrument: instrument.label(),
            source,
        })?;
    if !reconciled.consistent {
        warn!(
            instrument = instrument.label(),
            spread = reconciled.price_spread,
            tolerance,
            "live quote sources disagree"
        );
    }
    for source in &reconciled.rejected {
        warn!(instrument = instrument.label(), source = %source, "dropped unusable quote");
    }
    let live = series
        .with_quote(&reconciled.quote)
        .map_err(|source| ReportError::QuoteSeries {
            instrument: instrument.label(),
            source,
        })?;
    info!(
        instrument = instrument.label(),
        source = %reconciled.quote.source,
        price = reconciled.quote.price,
        date = %reconciled.quote.date,
        "folded live quote"
    );
    Ok((live, Some(reconciled)))
}

pub fn futures_report(
    series: &BarSeries,
    as_of: NaiveDate,
    rules: &FuturesRules,
    schedule: &DeliverySchedule,
) -> Result<FuturesReport, ReportError> {
    let label = Instrument::Futures.label();
    let index = resolve_observation(series, as_of).map_err(|source| ReportError::Evaluate {
        instrument: label,
        source,
    })?;
    let row = FeatureRow::at(series, index, &[rules.ma_window], Some(schedule))
        .ok_or(ReportError::MissingRow(label))?;
    let bar = &series.bars()[index];

    Ok(FuturesReport {
        as_of,
        observation_date: row.date,
        stale: row.date < as_of,
        close: row.close,
        contract: bar.has_contract().then(|| bar.contract_id.clone()),
        ma: row.ma(rules.ma_window),
        ratio: row.ratio(rules.ma_window),
        is_delivery_week: row.is_delivery_week,
        next_delivery: schedule.next_delivery_on_or_after(row.date),
        signals: evaluate_futures(&row, rules),
        bands: futures_bands(series, index, rules),
        live_quote: None,
    })
}

pub fn etf_report(
    series: &BarSeries,
    as_of: NaiveDate,
    rules: &EtfRules,
) -> Result<EtfReport, ReportError> {
    let label = Instrument::Etf.label();
    let index = resolve_observation(series, as_of).map_err(|source| ReportError::Evaluate {
        instrument: label,
        source,
    })?;
    let row = FeatureRow::at(series, index, &rules.windows(), None)
        .ok_or(ReportError::MissingRow(label))?;
    let signals = evaluate_etf(&row, &EtfInputs::at(series.bars(), index), rules);

    Ok(EtfReport {
        as_of,
        observation_date: row.date,
        stale: row.date < as_of,
        close: row.close,
        moving_averages: row.moving_averages,
        signals,
        buy_band: etf_band(series, index, rules),
        live_quote: None,
    })
}

/// Evaluate every supplied instrument for `as_of`.
pub fn build_report(
    config: &AppConfig,
    as_of: NaiveDate,
    futures: Option<InstrumentInput<'_>>,
    etf: Option<InstrumentInput<'_>>,
) -> Result<Report, ReportError> {
    let mut datasets = Vec::new();

    let futures = match futures {
        Some(input) => {
            datasets.push(DatasetSummary::of(Instrument::Futures, input.loaded));
            let (series, quote) = apply_quotes(
                Instrument::Futures,
                &input.loaded.series,
                input.quotes,
                config.quote_tolerance,
            )?;
            let schedule = DeliverySchedule::covering(series.first().date, series.last().date);
            let mut report = futures_report(&series, as_of, &config.futures_rules, &schedule)?;
            report.live_quote = quote;
            Some(report)
        }
        None => None,
    };

    let etf = match etf {
        Some(input) => {
            datasets.push(DatasetSummary::of(Instrument::Etf, input.loaded));
            let (series, quote) = apply_quotes(
                Instrument::Etf,
                &input.loaded.series,
                input.quotes,
                config.quote_tolerance,
            )?;
            let mut report = etf_report(&series, as_of, &config.etf_rules)?;
            report.live_quote = quote;
            Some(report)
        }
        None => None,
    };

    Ok(Report {
        generated_for: as_of,
        futures,
        etf,
        datasets,
    })
}

// ─── Export ─────────────────────────────────────────────────────────

pub fn export_json(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).context("failed to serialize report to JSON")
}

pub fn import_json(json: &str) -> Result<Report> {
    serde_json::from_str(json).context("failed to deserialize report from JSON")
}

fn verdict_line(verdict: &SignalVerdict) -> String {
    match verdict {
        SignalVerdict::Indeterminate { missing, .. } => {
            format!("indeterminate (missing {missing:?})")
        }
        SignalVerdict::Evaluated(eval) if eval.overall => {
            let mut line = "FIRED".to_string();
            if let Some(stop) = eval.stop_loss_price {
                let _ = write!(line, "  stop {stop:.2}");
            }
            if let Some(days) = eval.hold_days {
                let _ = write!(line, "  hold {days}d");
            }
            line
        }
        SignalVerdict::Evaluated(eval) => {
            let failed: Vec<String> = eval.failed().map(|c| format!("{:?}", c.kind)).collect();
            format!("no (failed: {})", failed.join(", "))
        }
    }
}

fn band_text(band: Option<&PriceBand>) -> String {
    match band {
        None => "n/a".to_string(),
        Some(b) if b.is_empty() => "empty".to_string(),
        Some(b) => {
            let side = |v: Option<f64>| v.map_or("-".to_string(), |v| format!("{v:.2}"));
            format!("[{}, {}]", side(b.lower), side(b.upper))
        }
    }
}

fn opt(value: Option<f64>, precision: usize) -> String {
    value.map_or("n/a".to_string(), |v| format!("{v:.precision$}"))
}

/// Plain-text rendering for terminals.
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Signals for {}", report.generated_for);

    if let Some(f) = &report.futures {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "FUTURES  {}{}  close {:.2}  contract {}",
            f.observation_date,
            if f.stale { " (stale)" } else { "" },
            f.close,
            f.contract.as_deref().unwrap_or("-"),
        );
        let _ = writeln!(
            out,
            "  MA {}  ratio {}  delivery week {}  next delivery {}",
            opt(f.ma, 2),
            opt(f.ratio, 4),
            if f.is_delivery_week { "yes" } else { "no" },
            f.next_delivery.map_or("-".to_string(), |d| d.to_string()),
        );
        let _ = writeln!(
            out,
            "  {:<18} {}",
            f.signals.long.variant().label(),
            verdict_line(&f.signals.long)
        );
        let _ = writeln!(
            out,
            "  {:<18} {}",
            f.signals.short.variant().label(),
            verdict_line(&f.signals.short)
        );
        let _ = writeln!(out, "  long band  {}", band_text(f.bands.long.as_ref()));
        let _ = writeln!(out, "  short band {}", band_text(f.bands.short.as_ref()));
    }

    if let Some(e) = &report.etf {
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "ETF      {}{}  close {:.3}",
            e.observation_date,
            if e.stale { " (stale)" } else { "" },
            e.close,
        );
        let mas: Vec<String> = e
            .moving_averages
            .iter()
            .map(|(w, v)| format!("MA{w} {}", opt(*v, 3)))
            .collect();
        let _ = writeln!(
            out,
            "  {}  week change {}  MA gate {}",
            mas.join("  "),
            e.signals
                .week_change
                .map_or("n/a".to_string(), |c| format!("{:+.2}%", c * 100.0)),
            match e.signals.ma_all_ok {
                Some(true) => "ok",
                Some(false) => "blocked",
                None => "n/a",
            },
        );
        for verdict in e.signals.verdicts() {
            let _ = writeln!(
                out,
                "  {:<18} {}",
                verdict.variant().label(),
                verdict_line(verdict)
            );
        }
        let _ = writeln!(out, "  buy band   {}", band_text(e.buy_band.as_ref()));
        let _ = writeln!(out, "  stop loss  {:.3}", e.signals.stop_loss_price);
    }

    for d in &report.datasets {
        let _ = writeln!(out);
        let _ = write!(
            out,
            "data {}: {} bars ({} warmup) {}..{}  {}",
            d.instrument.label(),
            d.bars,
            d.warmup_bars,
            d.first,
            d.last,
            &d.hash[..d.hash.len().min(16)],
        );
    }
    out.push('\n');
    out
}
