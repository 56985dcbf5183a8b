//! CSV bar loading and schema normalization.
//!
//! Turns exported daily files into one validated `BarSeries`:
//! 1. Map alternately-named columns onto the canonical bar shape
//! 2. Sort by date (duplicates and bad prices are rejected, not repaired)
//! 3. Optionally prepend older history from a backfill file
//! 4. Fill missing contract ids from the quarterly delivery calendar
//! 5. Tag bars before the warmup cutoff
//!
//! The result carries a BLAKE3 hash of the snapshot so reports can name
//! exactly which data they were computed from.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use signaldesk_core::calendar::infer_quarterly_contract;
use signaldesk_core::domain::{Bar, BarSeries};
use signaldesk_core::SeriesError;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, BackfillConfig, Instrument, InstrumentConfig};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse CSV {origin}: {source}")]
    Csv {
        origin: String,
        #[source]
        source: csv::Error,
    },

    #[error("{origin}: no column for '{field}' (accepted names: {accepted})")]
    MissingColumn {
        origin: String,
        field: &'static str,
        accepted: String,
    },

    #[error("{origin} line {line}: unrecognized date '{value}'")]
    BadDate {
        origin: String,
        line: u64,
        value: String,
    },

    #[error("{origin} line {line}: '{value}' is not a number in column '{field}'")]
    BadNumber {
        origin: String,
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("{origin}: no data rows")]
    NoRows { origin: String },

    #[error("no data file configured for {0}")]
    NotConfigured(&'static str),

    #[error("invalid bar series: {0}")]
    Series(#[from] SeriesError),
}

/// Canonical fields and the header names accepted for each, in priority
/// order. When several are present, the first non-blank cell wins.
const DATE_COLUMNS: &[&str] = &["date", "日期"];
const OPEN_COLUMNS: &[&str] = &["open", "开盘", "开盘价"];
const HIGH_COLUMNS: &[&str] = &["high", "最高", "最高价"];
const LOW_COLUMNS: &[&str] = &["low", "最低", "最低价"];
const CLOSE_COLUMNS: &[&str] = &["close", "收盘", "收盘价"];
const CONTRACT_COLUMNS: &[&str] = &["contract", "合约"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];

/// Options controlling how one instrument's bars are assembled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadOptions {
    pub backfill: Option<BackfillConfig>,
    pub warmup_before: Option<NaiveDate>,
    /// Prefix for inferring missing contract ids; `None` leaves them empty.
    pub contract_prefix: Option<String>,
}

impl LoadOptions {
    pub fn for_instrument(instrument: Instrument, config: &InstrumentConfig) -> Self {
        Self {
            backfill: config.backfill.clone(),
            warmup_before: config.warmup_cutoff(instrument),
            contract_prefix: config.contract_prefix(instrument).map(str::to_string),
        }
    }
}

/// A loaded snapshot with provenance counts.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedSeries {
    pub series: BarSeries,
    /// BLAKE3 over every bar field, hex encoded.
    pub dataset_hash: String,
    pub primary_rows: usize,
    pub backfill_rows: usize,
    pub warmup_rows: usize,
    pub inferred_contracts: usize,
}

/// Load the configured data file for `instrument`.
pub fn load_instrument(config: &AppConfig, instrument: Instrument) -> Result<LoadedSeries, LoadError> {
    let cfg = config.instrument(instrument);
    let path = cfg
        .data_file
        .as_deref()
        .ok_or(LoadError::NotConfigured(instrument.label()))?;
    load_series(path, &LoadOptions::for_instrument(instrument, cfg))
}

/// Load a primary file, splice, infer contracts and tag warmup bars.
pub fn load_series(path: &Path, opts: &LoadOptions) -> Result<LoadedSeries, LoadError> {
    let mut bars = read_bars_file(path)?;
    let primary_rows = bars.len();
    info!(path = %path.display(), rows = primary_rows, "loaded primary bars");

    let mut backfill_rows = 0;
    if let Some(backfill) = &opts.backfill {
        let older = read_bars_file(&backfill.path)?;
        let spliced = splice_backfill(bars, older, backfill);
        backfill_rows = spliced.len() - primary_rows;
        bars = spliced;
        info!(
            path = %backfill.path.display(),
            rows = backfill_rows,
            scaled = backfill.scale_to_primary,
            "prepended backfill bars"
        );
    }

    let inferred_contracts = match &opts.contract_prefix {
        Some(prefix) => fill_contracts(&mut bars, prefix),
        None => 0,
    };
    if inferred_contracts > 0 {
        debug!(count = inferred_contracts, "inferred quarterly contract ids");
    }

    if let Some(cutoff) = opts.warmup_before {
        tag_warmup(&mut bars, cutoff);
    }
    let warmup_rows = bars.iter().filter(|b| b.is_warmup).count();

    let series = BarSeries::new(bars)?;
    let dataset_hash = dataset_hash(&series);
    info!(
        bars = series.len(),
        warmup = warmup_rows,
        first = %series.first().date,
        last = %series.last().date,
        hash = %dataset_hash,
        "series ready"
    );

    Ok(LoadedSeries {
        series,
        dataset_hash,
        primary_rows,
        backfill_rows,
        warmup_rows,
        inferred_contracts,
    })
}

/// Read and normalize a CSV file into date-sorted bars.
pub fn read_bars_file(path: &Path) -> Result<Vec<Bar>, LoadError> {
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_bars(file, &path.display().to_string())
}

/// Read and normalize CSV content. `origin` names the source in errors.
pub fn read_bars<R: Read>(reader: R, origin: &str) -> Result<Vec<Bar>, LoadError> {
    let csv_err = |source| LoadError::Csv {
        origin: origin.to_string(),
        source,
    };
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(normalize_header)
        .collect();
    let columns = ColumnMap::resolve(&headers, origin)?;

    let mut bars = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(csv_err)?;
        let line = record.position().map_or(0, |p| p.line());
        let Some(date_text) = columns.cell(&record, &columns.date) else {
            warn!(origin, line, "skipping row without a date");
            continue;
        };
        let date = parse_date(date_text).ok_or_else(|| LoadError::BadDate {
            origin: origin.to_string(),
            line,
            value: date_text.to_string(),
        })?;
        let number = |field: &'static str, idx: &[usize]| -> Result<f64, LoadError> {
            let text = columns.cell(&record, idx).unwrap_or("");
            text.parse::<f64>().map_err(|_| LoadError::BadNumber {
                origin: origin.to_string(),
                line,
                field,
                value: text.to_string(),
            })
        };
        let mut bar = Bar::new(
            date,
            number("open", &columns.open)?,
            number("high", &columns.high)?,
            number("low", &columns.low)?,
            number("close", &columns.close)?,
        );
        if let Some(contract) = columns.cell(&record, &columns.contract) {
            bar.contract_id = contract.to_string();
        }
        bars.push(bar);
    }

    if bars.is_empty() {
        return Err(LoadError::NoRows {
            origin: origin.to_string(),
        });
    }
    bars.sort_by_key(|b| b.date);
    debug!(origin, rows = bars.len(), "parsed bars");
    Ok(bars)
}

/// Header indices for each canonical field.
struct ColumnMap {
    date: Vec<usize>,
    open: Vec<usize>,
    high: Vec<usize>,
    low: Vec<usize>,
    close: Vec<usize>,
    contract: Vec<usize>,
}

impl ColumnMap {
    fn resolve(headers: &[String], origin: &str) -> Result<Self, LoadError> {
        let find = |names: &[&str]| -> Vec<usize> {
            names
                .iter()
                .filter_map(|name| headers.iter().position(|h| h.eq_ignore_ascii_case(name)))
                .collect()
        };
        let require = |field: &'static str, names: &[&str]| -> Result<Vec<usize>, LoadError> {
            let found = find(names);
            if found.is_empty() {
                return Err(LoadError::MissingColumn {
                    origin: origin.to_string(),
                    field,
                    accepted: names.join("|"),
                });
            }
            Ok(found)
        };
        Ok(Self {
            date: require("date", DATE_COLUMNS)?,
            open: require("open", OPEN_COLUMNS)?,
            high: require("high", HIGH_COLUMNS)?,
            low: require("low", LOW_COLUMNS)?,
            close: require("close", CLOSE_COLUMNS)?,
            contract: find(CONTRACT_COLUMNS),
        })
    }

    /// First non-blank cell among the candidate columns.
    fn cell<'r>(&self, record: &'r csv::StringRecord, candidates: &[usize]) -> Option<&'r str> {
        candidates
            .iter()
            .filter_map(|&i| record.get(i))
            .find(|v| !v.is_empty())
    }
}

fn normalize_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

/// Accepts `YYYY-MM-DD`, `YYYY/MM/DD`, and either with a `HH:MM:SS` suffix.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(text, f).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|f| NaiveDateTime::parse_from_str(text, f).ok())
                .map(|dt| dt.date())
        })
}

/// Prepend backfill bars dated strictly before the primary's first bar.
///
/// With `scale_to_primary`, prices are multiplied by
/// `primary_first_close / backfill_close_on_that_date` (1.0 when the backfill
/// has no bar on that date) and every spliced bar is marked warmup.
pub fn splice_backfill(primary: Vec<Bar>, older: Vec<Bar>, cfg: &BackfillConfig) -> Vec<Bar> {
    let Some(first) = primary.first() else {
        return older;
    };
    let start = first.date;

    let ratio = if cfg.scale_to_primary {
        older
            .iter()
            .find(|b| b.date == start)
            .map_or(1.0, |b| first.close / b.close)
    } else {
        1.0
    };

    let mut prefix: Vec<Bar> = older.into_iter().filter(|b| b.date < start).collect();
    if let Some(max) = cfg.max_bars {
        let skip = prefix.len().saturating_sub(max);
        prefix.drain(..skip);
    }
    for bar in &mut prefix {
        if cfg.scale_to_primary {
            bar.open *= ratio;
            bar.high *= ratio;
            bar.low *= ratio;
            bar.close *= ratio;
            bar.is_warmup = true;
        }
        if bar.contract_id.is_empty() {
            bar.contract_id = cfg.label.clone();
        }
    }
    if cfg.scale_to_primary && (ratio - 1.0).abs() > f64::EPSILON {
        debug!(ratio, "scaled backfill prices to the primary series");
    }

    prefix.extend(primary);
    prefix
}

/// Fill empty contract ids; returns how many were filled.
pub fn fill_contracts(bars: &mut [Bar], prefix: &str) -> usize {
    let mut filled = 0;
    for bar in bars.iter_mut().filter(|b| !b.has_contract()) {
        bar.contract_id = infer_quarterly_contract(bar.date, prefix);
        filled += 1;
    }
    filled
}

/// Mark bars dated before `cutoff` as warmup. Bars already marked stay marked.
pub fn tag_warmup(bars: &mut [Bar], cutoff: NaiveDate) {
    for bar in bars.iter_mut().filter(|b| b.date < cutoff) {
        bar.is_warmup = true;
    }
}

/// BLAKE3 over every bar field, in order.
pub fn dataset_hash(series: &BarSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in series.bars() {
        hasher.update(bar.date.to_string().as_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close] {
            hasher.update(&v.to_le_bytes());
        }
        hasher.update(bar.contract_id.as_bytes());
        hasher.update(&[0, u8::from(bar.is_warmup)]);
    }
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn chinese_headers_with_bom() {
        let csv = "\u{feff}日期 ,开盘,最高,最低,收盘,合约\n\
                   2024-06-12,4000,4010,3990,4005,IF2406\n\
                   2024-06-11,3990,4000,3980,3995,\n";
        let bars = read_bars(csv.as_bytes(), "test").unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 6, 11));
        assert_eq!(bars[0].contract_id, "");
        assert_eq!(bars[1].contract_id, "IF2406");
        assert_eq!(bars[1].close, 4005.0);
    }

    #[test]
    fn short_name_wins_long_name_fills_blanks() {
        let csv = "日期,开盘,开盘价,最高价,最低价,收盘价\n\
                   2024/06/11,,3990,4000,3980,3995\n\
                   2024/06/12,4001,4000,4010,3990,4005\n";
        let bars = read_bars(csv.as_bytes(), "test").unwrap();
        assert_eq!(bars[0].open, 3990.0);
        assert_eq!(bars[1].open, 4001.0);
    }

    #[test]
    fn english_headers_and_datetime_dates() {
        let csv = "Date,Open,High,Low,Close\n2024-06-12 00:00:00,1.0,1.2,0.9,1.1\n";
        let bars = read_bars(csv.as_bytes(), "test").unwrap();
        assert_eq!(bars[0].date, date(2024, 6, 12));
    }

    #[test]
    fn missing_column_is_named() {
        let csv = "日期,开盘,最高,最低\n2024-06-12,1,2,0.5\n";
        match read_bars(csv.as_bytes(), "f.csv").unwrap_err() {
            LoadError::MissingColumn { field, accepted, .. } => {
                assert_eq!(field, "close");
                assert!(accepted.contains("收盘价"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_cells_are_errors() {
        let csv = "date,open,high,low,close\n12-06-2024,1,2,0.5,1\n";
        assert!(matches!(
            read_bars(csv.as_bytes(), "t").unwrap_err(),
            LoadError::BadDate { line: 2, .. }
        ));

        let csv = "date,open,high,low,close\n2024-06-12,1,abc,0.5,1\n";
        assert!(matches!(
            read_bars(csv.as_bytes(), "t").unwrap_err(),
            LoadError::BadNumber { field: "high", .. }
        ));

        let csv = "date,open,high,low,close\n";
        assert!(matches!(
            read_bars(csv.as_bytes(), "t").unwrap_err(),
            LoadError::NoRows { .. }
        ));
    }

    #[test]
    fn blank_date_rows_skipped() {
        let csv = "date,open,high,low,close\n2024-06-12,1,2,0.5,1\n,,,,\n";
        assert_eq!(read_bars(csv.as_bytes(), "t").unwrap().len(), 1);
    }

    #[test]
    fn parse_date_formats() {
        assert_eq!(parse_date("2024-06-12"), Some(date(2024, 6, 12)));
        assert_eq!(parse_date("2024/6/12"), Some(date(2024, 6, 12)));
        assert_eq!(parse_date("2024-06-12 15:00:00"), Some(date(2024, 6, 12)));
        assert_eq!(parse_date("June 12"), None);
    }

    fn flat(dates: &[NaiveDate], close: f64) -> Vec<Bar> {
        dates
            .iter()
            .map(|&d| Bar::new(d, close, close + 1.0, close - 1.0, close))
            .collect()
    }

    #[test]
    fn splice_keeps_only_older_rows() {
        let primary = flat(&[date(2024, 1, 3), date(2024, 1, 4)], 100.0);
        let older = flat(&[date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)], 50.0);
        let cfg = BackfillConfig {
            path: PathBuf::new(),
            label: "IF主连".into(),
            scale_to_primary: false,
            max_bars: None,
        };
        let bars = splice_backfill(primary, older, &cfg);
        assert_eq!(bars.len(), 4);
        assert_eq!(bars[0].contract_id, "IF主连");
        assert_eq!(bars[1].close, 50.0);
        assert!(!bars[1].is_warmup);
        assert_eq!(bars[2].close, 100.0);
    }

    #[test]
    fn scaled_splice_joins_primary_level() {
        let primary = flat(&[date(2024, 1, 3)], 4000.0);
        let older = flat(&[date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 3)], 2000.0);
        let cfg = BackfillConfig {
            path: PathBuf::new(),
            label: String::new(),
            scale_to_primary: true,
            max_bars: Some(1),
        };
        let bars = splice_backfill(primary, older, &cfg);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2024, 1, 2));
        assert_eq!(bars[0].close, 4000.0);
        assert!(bars[0].is_warmup);
        assert!(!bars[1].is_warmup);
    }

    #[test]
    fn contracts_and_warmup() {
        let mut bars = flat(&[date(2016, 12, 30), date(2024, 3, 15), date(2024, 3, 18)], 10.0);
        bars[2].contract_id = "IF2404".into();
        assert_eq!(fill_contracts(&mut bars, "IF"), 2);
        assert_eq!(bars[0].contract_id, "IF1703");
        assert_eq!(bars[1].contract_id, "IF2403");
        assert_eq!(bars[2].contract_id, "IF2404");

        tag_warmup(&mut bars, date(2017, 1, 1));
        assert!(bars[0].is_warmup);
        assert!(!bars[1].is_warmup);
    }

    #[test]
    fn hash_tracks_content() {
        let a = BarSeries::new(flat(&[date(2024, 1, 2)], 10.0)).unwrap();
        let b = BarSeries::new(flat(&[date(2024, 1, 2)], 10.5)).unwrap();
        assert_eq!(dataset_hash(&a), dataset_hash(&a.clone()));
        assert_ne!(dataset_hash(&a), dataset_hash(&b));
        assert_eq!(dataset_hash(&a).len(), 64);
    }
}
