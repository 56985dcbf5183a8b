//! SignalDesk CLI — daily signal report and supporting views.
//!
//! Commands:
//! - `signal` — evaluate both strategies for a date, optionally with live quotes
//! - `history` — verdicts for every non-warmup day, as CSV or JSON
//! - `features` — moving-average rows for the most recent bars
//! - `calendar` — quarterly delivery dates and the contract trading on a date
//! - `session` — where a timestamp falls in the trading day
//! - `config` — print the default configuration as TOML
//!
//! This is the only place the system clock is read.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate, NaiveDateTime};
use clap::{Parser, Subcommand, ValueEnum};
use signaldesk_core::calendar::{
    infer_quarterly_contract, is_weekend, session_day_on_or_before, DeliverySchedule,
};
use signaldesk_core::domain::Quote;
use signaldesk_core::features::build_features;
use signaldesk_runner::config::{AppConfig, Instrument, DEFAULT_CONTRACT_PREFIX};
use signaldesk_runner::data_loader::{load_instrument, LoadedSeries};
use signaldesk_runner::history::{
    etf_history, etf_history_csv, futures_history, futures_history_csv, DateRange,
};
use signaldesk_runner::report::{build_report, export_json, render_text, InstrumentInput};
use tracing::{debug, info, warn};

const DEFAULT_CONFIG_FILE: &str = "signaldesk.toml";

#[derive(Parser)]
#[command(
    name = "signaldesk",
    about = "SignalDesk — rule-based daily signals for index futures and an index ETF"
)]
struct Cli {
    /// TOML config file. Defaults to ./signaldesk.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Which {
    Futures,
    Etf,
    Both,
}

impl Which {
    fn includes(self, instrument: Instrument) -> bool {
        match self {
            Which::Both => true,
            Which::Futures => instrument == Instrument::Futures,
            Which::Etf => instrument == Instrument::Etf,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Single {
    Futures,
    Etf,
}

impl From<Single> for Instrument {
    fn from(value: Single) -> Self {
        match value {
            Single::Futures => Instrument::Futures,
            Single::Etf => Instrument::Etf,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the strategies for a date.
    Signal {
        /// Evaluation date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        as_of: Option<String>,

        /// Instruments to evaluate.
        #[arg(long, value_enum, default_value = "both")]
        instrument: Which,

        /// Live futures quote as SOURCE:PRICE, in priority order. Repeatable.
        #[arg(long = "futures-quote")]
        futures_quotes: Vec<String>,

        /// Live ETF quote as SOURCE:PRICE, in priority order. Repeatable.
        #[arg(long = "etf-quote")]
        etf_quotes: Vec<String>,

        /// Trading date the live quotes belong to (YYYY-MM-DD). Defaults to
        /// the last session day on or before the evaluation date.
        #[arg(long)]
        quote_date: Option<String>,

        /// Print the report as JSON instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Verdicts for every non-warmup day.
    History {
        #[arg(long, value_enum)]
        instrument: Single,

        /// First date to include (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// Last date to include (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        /// Print JSON instead of CSV.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Moving-average feature rows for the latest bars.
    Features {
        #[arg(long, value_enum)]
        instrument: Single,

        /// Number of most recent rows to print.
        #[arg(long, default_value_t = 10)]
        last: usize,
    },
    /// Quarterly delivery dates and the contract trading on a date.
    Calendar {
        /// First year to list. Defaults to the current year.
        #[arg(long)]
        year_start: Option<i32>,

        /// Last year to list. Defaults to the first year.
        #[arg(long)]
        year_end: Option<i32>,

        /// Also report delivery-week status and contract for this date.
        #[arg(long)]
        date: Option<String>,
    },
    /// Classify a timestamp against the trading session.
    Session {
        /// Local exchange time (YYYY-MM-DD HH:MM). Defaults to now.
        #[arg(long)]
        at: Option<String>,
    },
    /// Print the default configuration as TOML.
    Config,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Signal {
            as_of,
            instrument,
            futures_quotes,
            etf_quotes,
            quote_date,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            let quotes = QuoteArgs {
                futures: &futures_quotes,
                etf: &etf_quotes,
                date: quote_date,
            };
            run_signal(&config, as_of, instrument, quotes, json)
        }
        Commands::History {
            instrument,
            start,
            end,
            json,
        } => {
            let config = load_config(cli.config.as_deref())?;
            run_history(&config, instrument.into(), start, end, json)
        }
        Commands::Features { instrument, last } => {
            let config = load_config(cli.config.as_deref())?;
            run_features(&config, instrument.into(), last)
        }
        Commands::Calendar {
            year_start,
            year_end,
            date,
        } => run_calendar(year_start, year_end, date),
        Commands::Session { at } => {
            let config = load_config(cli.config.as_deref())?;
            run_session(&config, at)
        }
        Commands::Config => {
            print!("{}", AppConfig::default().to_toml()?);
            Ok(())
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(p) => {
            AppConfig::from_file(p).with_context(|| format!("loading config {}", p.display()))
        }
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            debug!(path = DEFAULT_CONFIG_FILE, "using config from working directory");
            Ok(AppConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))?)
        }
        None => {
            debug!("no config file; using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// `SOURCE:PRICE` for `date`. The quote carries the current time only when it
/// is for today.
fn parse_quote(spec: &str, date: NaiveDate) -> Result<Quote> {
    let Some((source, price)) = spec.rsplit_once(':') else {
        bail!("quote '{spec}' must look like SOURCE:PRICE");
    };
    if source.is_empty() {
        bail!("quote '{spec}' has no source name");
    }
    let price: f64 = price
        .trim()
        .parse()
        .with_context(|| format!("quote '{spec}' has an invalid price"))?;
    let now = Local::now().naive_local();
    Ok(Quote {
        source: source.to_string(),
        price,
        open: None,
        high: None,
        low: None,
        date,
        time: (now.date() == date).then(|| now.time()),
        contract: None,
    })
}

/// Trading date for live quotes: explicit, or the last session day on or
/// before `as_of`. Weekend dates never carry a price.
fn resolve_quote_date(as_of: NaiveDate, explicit: Option<&str>) -> Result<NaiveDate> {
    let date = match explicit {
        Some(s) => parse_date(s)?,
        None => session_day_on_or_before(as_of),
    };
    if is_weekend(date) {
        bail!("--quote-date {date} is not a trading day");
    }
    if date > as_of {
        bail!("quote date {date} is after the evaluation date {as_of}");
    }
    Ok(date)
}

struct QuoteArgs<'a> {
    futures: &'a [String],
    etf: &'a [String],
    date: Option<String>,
}

fn load(config: &AppConfig, instrument: Instrument) -> Result<LoadedSeries> {
    load_instrument(config, instrument)
        .with_context(|| format!("loading {} data", instrument.label()))
}

fn run_signal(
    config: &AppConfig,
    as_of: Option<String>,
    which: Which,
    quotes: QuoteArgs<'_>,
    json: bool,
) -> Result<()> {
    let as_of = match as_of.as_deref() {
        Some(s) => parse_date(s)?,
        None => today(),
    };
    let (futures_quotes, etf_quotes) = if quotes.futures.is_empty() && quotes.etf.is_empty() {
        (Vec::new(), Vec::new())
    } else {
        let quote_date = resolve_quote_date(as_of, quotes.date.as_deref())?;
        if quote_date != as_of {
            warn!(
                as_of = %as_of,
                quote_date = %quote_date,
                "live quotes dated to the last session day"
            );
        }
        let parse_all = |specs: &[String]| {
            specs
                .iter()
                .map(|q| parse_quote(q, quote_date))
                .collect::<Result<Vec<_>>>()
        };
        (parse_all(quotes.futures)?, parse_all(quotes.etf)?)
    };

    let futures = if which.includes(Instrument::Futures) {
        Some(load(config, Instrument::Futures)?)
    } else {
        None
    };
    let etf = if which.includes(Instrument::Etf) {
        Some(load(config, Instrument::Etf)?)
    } else {
        None
    };

    let report = build_report(
        config,
        as_of,
        futures.as_ref().map(|loaded| InstrumentInput {
            loaded,
            quotes: &futures_quotes,
        }),
        etf.as_ref().map(|loaded| InstrumentInput {
            loaded,
            quotes: &etf_quotes,
        }),
    )?;
    info!(as_of = %as_of, "report ready");

    if json {
        println!("{}", export_json(&report)?);
    } else {
        print!("{}", render_text(&report));
    }
    Ok(())
}

fn run_history(
    config: &AppConfig,
    instrument: Instrument,
    start: Option<String>,
    end: Option<String>,
    json: bool,
) -> Result<()> {
    let range = DateRange::new(
        start.as_deref().map(parse_date).transpose()?,
        end.as_deref().map(parse_date).transpose()?,
    );
    if let (Some(s), Some(e)) = (range.start, range.end) {
        if s > e {
            bail!("--start {s} is after --end {e}");
        }
    }
    let loaded = load(config, instrument)?;
    let series = &loaded.series;

    let output = match instrument {
        Instrument::Futures => {
            let schedule = DeliverySchedule::covering(series.first().date, series.last().date);
            let history = futures_history(series, &config.futures_rules, &schedule, &range);
            info!(days = history.rows.len(), "futures history ready");
            if json {
                serde_json::to_string_pretty(&history)?
            } else {
                futures_history_csv(&history)?
            }
        }
        Instrument::Etf => {
            let history = etf_history(series, &config.etf_rules, &range);
            info!(days = history.len(), "ETF history ready");
            if json {
                serde_json::to_string_pretty(&history)?
            } else {
                etf_history_csv(&history)?
            }
        }
    };
    print!("{output}");
    if json {
        println!();
    }
    Ok(())
}

fn run_features(config: &AppConfig, instrument: Instrument, last: usize) -> Result<()> {
    let loaded = load(config, instrument)?;
    let series = &loaded.series;
    let (windows, schedule) = match instrument {
        Instrument::Futures => (
            vec![config.futures_rules.ma_window],
            Some(DeliverySchedule::covering(series.first().date, series.last().date)),
        ),
        Instrument::Etf => (config.etf_rules.windows().to_vec(), None),
    };
    let rows = build_features(series, &windows, schedule.as_ref());

    let mut header = format!("{:<12} {:<4} {:>10}", "Date", "Day", "Close");
    for w in &windows {
        header.push_str(&format!(" {:>10}", format!("MA{w}")));
    }
    header.push_str("  Delivery  Warmup");
    println!("{header}");
    println!("{}", "-".repeat(header.len()));

    for row in rows.iter().skip(rows.len().saturating_sub(last)) {
        let mut line = format!(
            "{:<12} {:<4} {:>10.3}",
            row.date.to_string(),
            row.day().to_string(),
            row.close
        );
        for w in &windows {
            let cell = row.ma(*w).map_or("-".to_string(), |v| format!("{v:.3}"));
            line.push_str(&format!(" {cell:>10}"));
        }
        line.push_str(&format!(
            "  {:<8}  {}",
            if row.is_delivery_week { "yes" } else { "" },
            if row.is_warmup { "yes" } else { "" }
        ));
        println!("{line}");
    }
    Ok(())
}

fn run_calendar(year_start: Option<i32>, year_end: Option<i32>, date: Option<String>) -> Result<()> {
    let start = year_start.unwrap_or_else(|| today().year());
    let end = year_end.unwrap_or(start);
    if end < start {
        bail!("--year-end {end} is before --year-start {start}");
    }
    let schedule = DeliverySchedule::new(start, end);

    println!("{:<12} {:<8}", "Delivery", "Contract");
    println!("{}", "-".repeat(21));
    for d in schedule.delivery_dates() {
        println!(
            "{:<12} {:<8}",
            d.to_string(),
            infer_quarterly_contract(*d, DEFAULT_CONTRACT_PREFIX)
        );
    }

    if let Some(date) = date.as_deref() {
        let date = parse_date(date)?;
        let schedule = DeliverySchedule::covering(date, date);
        println!();
        println!(
            "{date} ({}): contract {}, delivery week {}, next delivery {}",
            date.weekday(),
            infer_quarterly_contract(date, DEFAULT_CONTRACT_PREFIX),
            if schedule.is_delivery_week(date) { "yes" } else { "no" },
            schedule
                .next_delivery_on_or_after(date)
                .map_or("-".to_string(), |d| d.to_string()),
        );
    }
    Ok(())
}

fn run_session(config: &AppConfig, at: Option<String>) -> Result<()> {
    let at = match at.as_deref() {
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .with_context(|| format!("invalid timestamp '{s}' (expected YYYY-MM-DD HH:MM)"))?,
        None => Local::now().naive_local(),
    };
    let phase = config.session.phase(at);
    println!("{} {}: {}", at.format("%Y-%m-%d %H:%M"), at.weekday(), phase.hint());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_spec_parsing() {
        let day = NaiveDate::from_ymd_opt(2020, 6, 12).unwrap();
        let q = parse_quote("sina:3600.5", day).unwrap();
        assert_eq!(q.source, "sina");
        assert_eq!(q.price, 3600.5);
        assert_eq!(q.date, day);
        assert!(q.time.is_none());

        // Source names may themselves contain a colon.
        assert_eq!(parse_quote("http://x:10", day).unwrap().source, "http://x");
        assert!(parse_quote("3600", day).is_err());
        assert!(parse_quote(":3600", day).is_err());
        assert!(parse_quote("a:abc", day).is_err());
    }

    #[test]
    fn weekend_quotes_are_dated_to_friday() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 6, day).unwrap();
        // 2024-06-15 is a Saturday.
        assert_eq!(resolve_quote_date(d(15), None).unwrap(), d(14));
        assert_eq!(resolve_quote_date(d(16), None).unwrap(), d(14));
        assert_eq!(resolve_quote_date(d(12), None).unwrap(), d(12));
        assert_eq!(resolve_quote_date(d(15), Some("2024-06-13")).unwrap(), d(13));
        assert!(resolve_quote_date(d(16), Some("2024-06-15")).is_err());
        assert!(resolve_quote_date(d(12), Some("2024-06-13")).is_err());

        let q = parse_quote("sina:4200", resolve_quote_date(d(15), None).unwrap()).unwrap();
        assert_eq!(q.date, d(14));
    }

    #[test]
    fn instrument_selection() {
        assert!(Which::Both.includes(Instrument::Etf));
        assert!(Which::Futures.includes(Instrument::Futures));
        assert!(!Which::Futures.includes(Instrument::Etf));
        assert_eq!(Instrument::from(Single::Etf), Instrument::Etf);
    }

    #[test]
    fn cli_parses() {
        let cli = Cli::try_parse_from([
            "signaldesk",
            "signal",
            "--as-of",
            "2024-06-12",
            "--futures-quote",
            "a:4000",
            "--futures-quote",
            "b:4000.4",
            "--json",
        ])
        .unwrap();
        match cli.command {
            Commands::Signal {
                futures_quotes,
                json,
                instrument,
                ..
            } => {
                assert_eq!(futures_quotes.len(), 2);
                assert!(json);
                assert!(instrument == Which::Both);
            }
            _ => panic!("expected signal command"),
        }
    }
}
