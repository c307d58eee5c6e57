//! TOML backtest configuration.
//!
//! Only `[backtest]` is required; every other section has defaults. Unknown
//! `type` / `source` tags are rejected by serde, everything else by
//! [`BacktestConfig::validate`].

use chrono::NaiveDate;
use eventlab_core::domain::RunId;
use eventlab_core::execution::CommissionModel;
use eventlab_core::persistence::{is_file_safe_series, is_reserved_ticker};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete configuration of one backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub sizer: SizerConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// `[backtest]`: universe, capital, and an optional inclusive date window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    pub tickers: Vec<String>,
    pub initial_capital: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

/// `[data]`: where bars come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum DataConfig {
    /// One `<TICKER>.csv` per ticker under `path`.
    Csv {
        #[serde(default = "default_data_path")]
        path: PathBuf,
    },
    /// Seeded random walk.
    Synthetic {
        #[serde(default = "default_bars")]
        bars: usize,
        #[serde(default = "default_seed")]
        seed: u64,
        #[serde(default = "default_start_price")]
        start_price: f64,
        #[serde(default = "default_volatility")]
        volatility: f64,
    },
}

impl Default for DataConfig {
    fn default() -> Self {
        DataConfig::Synthetic {
            bars: default_bars(),
            seed: default_seed(),
            start_price: default_start_price(),
            volatility: default_volatility(),
        }
    }
}

/// `[strategy]`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    #[default]
    BuyAndHold,
    MaCrossover {
        #[serde(default = "default_fast")]
        fast: usize,
        #[serde(default = "default_slow")]
        slow: usize,
        #[serde(default)]
        allow_short: bool,
    },
}

/// `[sizer]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SizerConfig {
    FixedQuantity { quantity: u64 },
    FixedNotional { amount: f64 },
    FixedFraction { fraction: f64 },
}

impl Default for SizerConfig {
    fn default() -> Self {
        SizerConfig::FixedQuantity { quantity: 100 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionKind {
    #[default]
    Zero,
    Flat,
    PerShare,
}

/// `[execution]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub commission: CommissionKind,
    /// Per share for `per_share`, per fill for `flat`.
    pub rate: f64,
    pub minimum: f64,
    pub slippage_bps: f64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            commission: CommissionKind::Zero,
            rate: 0.0,
            minimum: 0.0,
            slippage_bps: 0.0,
        }
    }
}

impl ExecutionConfig {
    pub fn commission_model(&self) -> CommissionModel {
        match self.commission {
            CommissionKind::Zero => CommissionModel::Zero,
            CommissionKind::Flat => CommissionModel::Flat(self.rate),
            CommissionKind::PerShare => CommissionModel::PerShare {
                rate: self.rate,
                minimum: self.minimum,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    /// Do not persist series.
    None,
}

/// `[output]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("results"),
            format: OutputFormat::Csv,
        }
    }
}

fn default_data_path() -> PathBuf {
    PathBuf::from("data")
}

fn default_bars() -> usize {
    252
}

fn default_seed() -> u64 {
    42
}

fn default_start_price() -> f64 {
    100.0
}

fn default_volatility() -> f64 {
    0.02
}

fn default_fast() -> usize {
    10
}

fn default_slow() -> usize {
    30
}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(msg.into())
}

impl BacktestConfig {
    /// Read, parse and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| invalid(format!("serialize config: {e}")))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let bt = &self.backtest;
        if bt.tickers.is_empty() {
            return Err(invalid("backtest.tickers must not be empty"));
        }
        if let Some(t) = bt.tickers.iter().find(|t| t.trim().is_empty()) {
            return Err(invalid(format!("blank ticker {t:?}")));
        }
        // Tickers name output files and series.
        if let Some(t) = bt.tickers.iter().find(|t| is_reserved_ticker(t)) {
            return Err(invalid(format!("ticker {t:?} is reserved for the equity curve")));
        }
        if let Some(t) = bt.tickers.iter().find(|t| !is_file_safe_series(t)) {
            return Err(invalid(format!("ticker {t:?} is not a plain file name")));
        }
        let mut seen = std::collections::HashSet::new();
        if let Some(dup) = bt.tickers.iter().find(|t| !seen.insert(t.as_str())) {
            return Err(invalid(format!("duplicate ticker {dup}")));
        }
        if !(bt.initial_capital.is_finite() && bt.initial_capital > 0.0) {
            return Err(invalid(format!(
                "initial_capital must be positive, got {}",
                bt.initial_capital
            )));
        }
        if let (Some(start), Some(end)) = (bt.start_date, bt.end_date) {
            if start > end {
                return Err(invalid(format!("start_date {start} is after end_date {end}")));
            }
        }

        if let DataConfig::Synthetic {
            bars,
            start_price,
            volatility,
            ..
        } = &self.data
        {
            if *bars == 0 {
                return Err(invalid("data.bars must be positive"));
            }
            if !(start_price.is_finite() && *start_price > 0.0) {
                return Err(invalid("data.start_price must be positive"));
            }
            if !(0.0..0.5).contains(volatility) {
                return Err(invalid("data.volatility must be in [0, 0.5)"));
            }
        }

        if let StrategyConfig::MaCrossover { fast, slow, .. } = &self.strategy {
            if *fast == 0 || fast >= slow {
                return Err(invalid(format!(
                    "ma_crossover needs 0 < fast < slow, got fast={fast} slow={slow}"
                )));
            }
        }

        match &self.sizer {
            SizerConfig::FixedQuantity { quantity } if *quantity == 0 => {
                return Err(invalid("sizer.quantity must be positive"));
            }
            SizerConfig::FixedNotional { amount } if !(amount.is_finite() && *amount > 0.0) => {
                return Err(invalid("sizer.amount must be positive"));
            }
            SizerConfig::FixedFraction { fraction } if !(*fraction > 0.0 && *fraction <= 1.0) => {
                return Err(invalid(format!(
                    "sizer.fraction must be in (0, 1], got {fraction}"
                )));
            }
            _ => {}
        }

        let ex = &self.execution;
        for (name, v) in [
            ("rate", ex.rate),
            ("minimum", ex.minimum),
            ("slippage_bps", ex.slippage_bps),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                return Err(invalid(format!("execution.{name} must be non-negative")));
            }
        }
        Ok(())
    }

    /// Deterministic identifier: BLAKE3 of the canonical JSON form.
    /// `[output]` is excluded so redirecting results keeps the same id.
    pub fn run_id(&self) -> Result<RunId, ConfigError> {
        let identity = Self {
            output: OutputConfig::default(),
            ..self.clone()
        };
        let json = serde_json::to_string(&identity)?;
        Ok(RunId::new(blake3::hash(json.as_bytes()).to_hex().to_string()))
    }
}
