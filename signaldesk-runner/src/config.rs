//! TOML application configuration.
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Rule tables may be overridden field by field:
//!
//! ```toml
//! [futures]
//! data_file = "data/IF_day.csv"
//! warmup_before = "2017-01-01"
//!
//! [futures.backfill]
//! path = "data/IF_index_day.csv"
//!
//! [futures_rules]
//! ma_window = 60
//!
//! [etf_rules]
//! drop_threshold = 0.05
//! ```

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use signaldesk_core::calendar::TradingSession;
use signaldesk_core::domain::DEFAULT_QUOTE_TOLERANCE;
use signaldesk_core::{EtfRules, FuturesRules, RuleError};
use thiserror::Error;

/// Label given to backfilled bars that carry no contract id.
pub const DEFAULT_CONTINUOUS_LABEL: &str = "IF主连";

/// Prefix for inferred quarterly futures contract codes.
pub const DEFAULT_CONTRACT_PREFIX: &str = "IF";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid rule table: {0}")]
    Rules(#[from] RuleError),

    #[error("quote tolerance must be a non-negative number (got {0})")]
    InvalidTolerance(f64),
}

/// The two instruments the strategies run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instrument {
    Futures,
    Etf,
}

impl Instrument {
    pub fn label(self) -> &'static str {
        match self {
            Instrument::Futures => "futures",
            Instrument::Etf => "etf",
        }
    }

    /// Bars before this date only seed moving-average windows.
    pub fn default_warmup_cutoff(self) -> Option<NaiveDate> {
        match self {
            Instrument::Futures => NaiveDate::from_ymd_opt(2017, 1, 1),
            Instrument::Etf => NaiveDate::from_ymd_opt(2018, 1, 1),
        }
    }

    pub fn default_contract_prefix(self) -> Option<&'static str> {
        match self {
            Instrument::Futures => Some(DEFAULT_CONTRACT_PREFIX),
            Instrument::Etf => None,
        }
    }
}

/// Secondary history prepended before the primary file's first date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackfillConfig {
    pub path: PathBuf,
    /// Contract id for backfilled rows that have none.
    #[serde(default = "default_continuous_label")]
    pub label: String,
    /// Rescale backfilled prices so the series joins the primary's first close.
    /// Scaled rows are always warmup.
    #[serde(default)]
    pub scale_to_primary: bool,
    /// Keep only this many backfilled rows (the most recent ones).
    #[serde(default)]
    pub max_bars: Option<usize>,
}

fn default_continuous_label() -> String {
    DEFAULT_CONTINUOUS_LABEL.to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub data_file: Option<PathBuf>,
    pub backfill: Option<BackfillConfig>,
    /// Overrides the instrument's default warmup cutoff.
    pub warmup_before: Option<NaiveDate>,
    /// Overrides the instrument's default contract prefix; empty disables
    /// contract inference.
    pub contract_prefix: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub futures: InstrumentConfig,
    pub etf: InstrumentConfig,
    pub futures_rules: FuturesRules,
    pub etf_rules: EtfRules,
    pub session: TradingSession,
    pub quote_tolerance: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            futures: InstrumentConfig::default(),
            etf: InstrumentConfig::default(),
            futures_rules: FuturesRules::default(),
            etf_rules: EtfRules::default(),
            session: TradingSession::default(),
            quote_tolerance: DEFAULT_QUOTE_TOLERANCE,
        }
    }
}

impl AppConfig {
    /// Load from a TOML file. Relative data paths resolve against the
    /// file's directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml(&content)?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    /// Parse and validate TOML content.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.futures_rules.validate()?;
        self.etf_rules.validate()?;
        if self.quote_tolerance.is_nan() || self.quote_tolerance < 0.0 {
            return Err(ConfigError::InvalidTolerance(self.quote_tolerance));
        }
        Ok(())
    }

    pub fn instrument(&self, instrument: Instrument) -> &InstrumentConfig {
        match instrument {
            Instrument::Futures => &self.futures,
            Instrument::Etf => &self.etf,
        }
    }

    pub fn instrument_mut(&mut self, instrument: Instrument) -> &mut InstrumentConfig {
        match instrument {
            Instrument::Futures => &mut self.futures,
            Instrument::Etf => &mut self.etf,
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        for cfg in [&mut self.futures, &mut self.etf] {
            if let Some(p) = cfg.data_file.as_mut() {
                *p = resolve(base, p);
            }
            if let Some(b) = cfg.backfill.as_mut() {
                b.path = resolve(base, &b.path);
            }
        }
    }
}

impl InstrumentConfig {
    pub fn warmup_cutoff(&self, instrument: Instrument) -> Option<NaiveDate> {
        self.warmup_before
            .or_else(|| instrument.default_warmup_cutoff())
    }

    pub fn contract_prefix(&self, instrument: Instrument) -> Option<&str> {
        match self.contract_prefix.as_deref() {
            Some("") => None,
            Some(prefix) => Some(prefix),
            None => instrument.default_contract_prefix(),
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(
            config.futures.warmup_cutoff(Instrument::Futures),
            NaiveDate::from_ymd_opt(2017, 1, 1)
        );
        assert_eq!(
            config.etf.warmup_cutoff(Instrument::Etf),
            NaiveDate::from_ymd_opt(2018, 1, 1)
        );
        assert_eq!(config.futures.contract_prefix(Instrument::Futures), Some("IF"));
        assert_eq!(config.etf.contract_prefix(Instrument::Etf), None);
    }

    #[test]
    fn partial_rule_override_keeps_other_defaults() {
        let config = AppConfig::from_toml(
            r#"
            [futures_rules]
            ma_window = 40

            [etf_rules]
            drop_threshold = 0.04
            "#,
        )
        .unwrap();
        assert_eq!(config.futures_rules.ma_window, 40);
        assert_eq!(config.futures_rules.long, FuturesRules::default().long);
        assert_eq!(config.etf_rules.drop_threshold, 0.04);
        assert_eq!(config.etf_rules.slow_window, 30);
    }

    #[test]
    fn instrument_tables() {
        let config = AppConfig::from_toml(
            r#"
            [futures]
            data_file = "if.csv"
            warmup_before = "2016-06-01"
            contract_prefix = ""

            [futures.backfill]
            path = "index.csv"
            scale_to_primary = true
            max_bars = 120
            "#,
        )
        .unwrap();
        let futures = config.instrument(Instrument::Futures);
        assert_eq!(futures.data_file.as_deref(), Some(Path::new("if.csv")));
        assert_eq!(
            futures.warmup_cutoff(Instrument::Futures),
            NaiveDate::from_ymd_opt(2016, 6, 1)
        );
        assert_eq!(futures.contract_prefix(Instrument::Futures), None);
        let backfill = futures.backfill.as_ref().unwrap();
        assert_eq!(backfill.label, DEFAULT_CONTINUOUS_LABEL);
        assert!(backfill.scale_to_primary);
        assert_eq!(backfill.max_bars, Some(120));
    }

    #[test]
    fn invalid_rules_rejected() {
        let err = AppConfig::from_toml("[futures_rules]\nma_window = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Rules(_)));

        let err = AppConfig::from_toml("quote_tolerance = -1.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidTolerance(_)));

        let err = AppConfig::from_toml("futures = 3\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn toml_roundtrip() {
        let config = AppConfig::default();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("signaldesk.toml");
        std::fs::write(
            &path,
            "[etf]\ndata_file = \"etf.csv\"\n\n[etf.backfill]\npath = \"/abs/older.csv\"\n",
        )
        .unwrap();
        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.etf.data_file, Some(dir.path().join("etf.csv")));
        assert_eq!(
            config.etf.backfill.unwrap().path,
            PathBuf::from("/abs/older.csv")
        );
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = AppConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
