//! TOML run settings.
//!
//! ```toml
//! [engine]
//! starting_capital = 10000.0
//! commission_rate = 0.0004
//! fill_timing = "next_bar_open"
//!
//! [strategy]
//! preset = "aggressive"
//! threshold = 0.0015      # overrides the preset value
//!
//! [columns]
//! oscillator = "rsi"
//!
//! [search]
//! objective = "sharpe"
//! parallel = true
//!
//! [search.grid]
//! thresholds = [0.001, 0.002]
//! ```
//!
//! Every section and field is optional; missing values take the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use scalplab_core::{ConfigError, EngineConfig, IndicatorColumns, StrategyConfig};

use crate::data_loader::LoadOptions;
use crate::fitness::FitnessMetric;
use crate::search::ParamGrid;
use crate::synthetic::SyntheticSpec;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A preset name plus optional per-field overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySettings {
    pub preset: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oversold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overbought: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_size: Option<f64>,
}

impl Default for StrategySettings {
    fn default() -> Self {
        Self {
            preset: "default".into(),
            name: None,
            threshold: None,
            oversold: None,
            overbought: None,
            stop_loss_pct: None,
            take_profit_pct: None,
            position_size: None,
        }
    }
}

impl StrategySettings {
    /// The preset with overrides applied, validated.
    pub fn resolve(&self) -> Result<StrategyConfig, ConfigError> {
        let preset = StrategyConfig::preset(&self.preset)?;
        let config = StrategyConfig {
            name: self.name.clone().unwrap_or(preset.name),
            threshold: self.threshold.unwrap_or(preset.threshold),
            oversold: self.oversold.unwrap_or(preset.oversold),
            overbought: self.overbought.unwrap_or(preset.overbought),
            stop_loss_pct: self.stop_loss_pct.unwrap_or(preset.stop_loss_pct),
            take_profit_pct: self.take_profit_pct.unwrap_or(preset.take_profit_pct),
            position_size: self.position_size.unwrap_or(preset.position_size),
        };
        config.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub objective: FitnessMetric,
    pub parallel: bool,
    pub grid: ParamGrid,
}

/// Everything a run, comparison or search reads from the settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineConfig,
    pub strategy: StrategySettings,
    pub columns: IndicatorColumns,
    pub search: SearchSettings,
    pub data: LoadOptions,
    pub synthetic: SyntheticSpec,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml(&self) -> Result<String, SettingsError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.strategy.resolve()?;
        self.synthetic.validate()?;
        Ok(())
    }

    pub fn strategy_config(&self) -> Result<StrategyConfig, ConfigError> {
        self.strategy.resolve()
    }
}
