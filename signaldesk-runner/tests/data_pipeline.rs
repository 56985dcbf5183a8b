//! End-to-end: TOML config -> CSV files -> loaded series -> report.
//!
//! Fixtures are written into a fresh temp directory per test.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{Datelike, Duration, NaiveDate};
use signaldesk_core::calendar::DeliverySchedule;
use signaldesk_core::domain::Quote;
use signaldesk_core::EvaluateError;
use signaldesk_runner::config::{AppConfig, Instrument};
use signaldesk_runner::data_loader::{load_instrument, LoadError};
use signaldesk_runner::history::{futures_history, futures_history_csv, DateRange};
use signaldesk_runner::report::{build_report, render_text, InstrumentInput, ReportError};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn weekdays_from(start: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = start;
    while out.len() < n {
        if d.weekday().num_days_from_monday() < 5 {
            out.push(d);
        }
        d += Duration::days(1);
    }
    out
}

fn weekdays_ending(last: NaiveDate, n: usize) -> Vec<NaiveDate> {
    let mut out = Vec::with_capacity(n);
    let mut d = last;
    while out.len() < n {
        if d.weekday().num_days_from_monday() < 5 {
            out.push(d);
        }
        d -= Duration::days(1);
    }
    out.reverse();
    out
}

fn write_csv(path: &Path, header: &str, dates: &[NaiveDate], close: f64) {
    let mut text = format!("{header}\n");
    for d in dates {
        let _ = writeln!(
            text,
            "{d},{close},{},{},{close}",
            close + 10.0,
            close - 10.0
        );
    }
    std::fs::write(path, text).unwrap();
}

/// Futures primary from 2017-01-03 with no contract column, index backfill
/// ending 2016-12-30.
fn futures_fixture(dir: &Path) -> AppConfig {
    write_csv(
        &dir.join("if.csv"),
        "日期,开盘价,最高价,最低价,收盘价",
        &weekdays_from(date(2017, 1, 3), 30),
        3400.0,
    );
    write_csv(
        &dir.join("index.csv"),
        "date,open,high,low,close",
        &weekdays_ending(date(2016, 12, 30), 70),
        3380.0,
    );
    let config_path = dir.join("signaldesk.toml");
    std::fs::write(
        &config_path,
        "[futures]\ndata_file = \"if.csv\"\n\n[futures.backfill]\npath = \"index.csv\"\n",
    )
    .unwrap();
    AppConfig::from_file(&config_path).unwrap()
}

#[test]
fn futures_backfill_splice_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let config = futures_fixture(dir.path());

    let loaded = load_instrument(&config, Instrument::Futures).unwrap();
    assert_eq!(loaded.primary_rows, 30);
    assert_eq!(loaded.backfill_rows, 70);
    assert_eq!(loaded.warmup_rows, 70);
    assert_eq!(loaded.inferred_contracts, 30);
    assert_eq!(loaded.series.len(), 100);

    let bars = loaded.series.bars();
    assert_eq!(bars[0].contract_id, "IF主连");
    assert!(bars[0].is_warmup);
    assert_eq!(bars[70].date, date(2017, 1, 3));
    assert_eq!(bars[70].contract_id, "IF1703");
    assert!(!bars[70].is_warmup);

    let as_of = loaded.series.last().date;
    let input = InstrumentInput {
        loaded: &loaded,
        quotes: &[],
    };
    let report = build_report(&config, as_of, Some(input), None).unwrap();
    let futures = report.futures.as_ref().unwrap();
    assert!(!futures.stale);
    assert!(futures.ma.is_some());
    assert!(!futures.signals.long.is_indeterminate());
    assert!(futures.bands.long.is_some());
    assert_eq!(report.datasets.len(), 1);
    assert_eq!(report.datasets[0].hash, loaded.dataset_hash);

    let text = render_text(&report);
    assert!(text.contains("FUTURES"));
    assert!(text.contains("70 warmup"));
}

#[test]
fn warmup_observation_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = futures_fixture(dir.path());
    let loaded = load_instrument(&config, Instrument::Futures).unwrap();
    let input = InstrumentInput {
        loaded: &loaded,
        quotes: &[],
    };
    let err = build_report(&config, date(2016, 12, 30), Some(input), None).unwrap_err();
    assert!(matches!(
        err,
        ReportError::Evaluate {
            source: EvaluateError::WarmupObservation { .. },
            ..
        }
    ));
}

#[test]
fn live_quote_becomes_the_observation() {
    let dir = tempfile::tempdir().unwrap();
    let config = futures_fixture(dir.path());
    let loaded = load_instrument(&config, Instrument::Futures).unwrap();
    let last = loaded.series.last().date;
    let next = weekdays_from(last + Duration::days(1), 1)[0];
    let quotes = [Quote {
        source: "primary".into(),
        price: 3410.0,
        open: None,
        high: None,
        low: None,
        date: next,
        time: None,
        contract: None,
    }];
    let input = InstrumentInput {
        loaded: &loaded,
        quotes: &quotes,
    };
    let report = build_report(&config, next, Some(input), None).unwrap();
    let futures = report.futures.unwrap();
    assert_eq!(futures.observation_date, next);
    assert_eq!(futures.close, 3410.0);
    assert_eq!(futures.live_quote.unwrap().sources_count, 1);
}

#[test]
fn etf_report_from_csv() {
    let dir = tempfile::tempdir().unwrap();
    let thursday = date(2018, 3, 15);
    write_csv(
        &dir.path().join("etf.csv"),
        "日期,开盘,最高,最低,收盘",
        &weekdays_ending(thursday, 40),
        3.0,
    );
    let config_path = dir.path().join("signaldesk.toml");
    std::fs::write(&config_path, "[etf]\ndata_file = \"etf.csv\"\n").unwrap();
    let config = AppConfig::from_file(&config_path).unwrap();

    let loaded = load_instrument(&config, Instrument::Etf).unwrap();
    assert_eq!(loaded.inferred_contracts, 0);
    assert_eq!(loaded.warmup_rows, 0);

    let input = InstrumentInput {
        loaded: &loaded,
        quotes: &[],
    };
    let report = build_report(&config, thursday, None, Some(input)).unwrap();
    let etf = report.etf.unwrap();
    assert_eq!(etf.signals.ma_all_ok, Some(true));
    // Flat prices: no weekly decline, so Thursday does not fire.
    assert_eq!(etf.signals.thursday.overall(), Some(false));
    assert!(etf.buy_band.unwrap().contains(3.0));
}

#[test]
fn dataset_hash_is_stable_and_content_sensitive() {
    let dir = tempfile::tempdir().unwrap();
    let config = futures_fixture(dir.path());
    let a = load_instrument(&config, Instrument::Futures).unwrap();
    let b = load_instrument(&config, Instrument::Futures).unwrap();
    assert_eq!(a.dataset_hash, b.dataset_hash);

    write_csv(
        &dir.path().join("if.csv"),
        "日期,开盘价,最高价,最低价,收盘价",
        &weekdays_from(date(2017, 1, 3), 30),
        3401.0,
    );
    let c = load_instrument(&config, Instrument::Futures).unwrap();
    assert_ne!(a.dataset_hash, c.dataset_hash);
}

#[test]
fn unconfigured_and_broken_inputs() {
    let config = AppConfig::default();
    assert!(matches!(
        load_instrument(&config, Instrument::Etf).unwrap_err(),
        LoadError::NotConfigured("etf")
    ));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dup.csv");
    let d = date(2018, 3, 15);
    write_csv(&path, "date,open,high,low,close", &[d, d], 3.0);
    let mut config = AppConfig::default();
    config.instrument_mut(Instrument::Etf).data_file = Some(path);
    assert!(matches!(
        load_instrument(&config, Instrument::Etf).unwrap_err(),
        LoadError::Series(_)
    ));
}

#[test]
fn history_over_loaded_series() {
    let dir = tempfile::tempdir().unwrap();
    let config = futures_fixture(dir.path());
    let loaded = load_instrument(&config, Instrument::Futures).unwrap();
    let series = &loaded.series;
    let schedule = DeliverySchedule::covering(series.first().date, series.last().date);
    let rules = &config.futures_rules;
    let history = futures_history(series, rules, &schedule, &DateRange::default());
    assert_eq!(history.rows.len(), 30);
    assert!(history.rows.iter().all(|r| !r.signals.long.is_indeterminate()));
    let segments: Vec<&str> = history.segments.iter().map(|s| s.contract.as_str()).collect();
    assert_eq!(segments, vec!["IF主连", "IF1703"]);

    let csv = futures_history_csv(&history).unwrap();
    assert_eq!(csv.lines().count(), 31);
}
