//! Strategy and engine configuration.
//!
//! Both structs are plain immutable inputs to a run. Strategy variants
//! ("aggressive", "conservative") are different value sets for the same
//! policy, not separate code paths.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::execution::IntrabarPolicy;

/// A config value or relationship that makes a run meaningless.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be finite (got {value})")]
    NonFinite { field: &'static str, value: f64 },

    #[error("threshold must be >= 0 (got {0})")]
    NegativeThreshold(f64),

    #[error("{field} must be > 0 (got {value})")]
    NonPositive { field: &'static str, value: f64 },

    #[error("{field} must be >= 0 (got {value})")]
    Negative { field: &'static str, value: f64 },

    #[error("position_size must be in (0, 1] (got {0})")]
    PositionSize(f64),

    #[error("take_profit_pct ({take_profit_pct}) must exceed stop_loss_pct ({stop_loss_pct})")]
    RewardNotAboveRisk {
        stop_loss_pct: f64,
        take_profit_pct: f64,
    },

    #[error("oversold bound ({oversold}) must be below overbought bound ({overbought})")]
    BoundsInverted { oversold: f64, overbought: f64 },

    #[error("commission_rate must be in [0, 1) (got {0})")]
    CommissionRate(f64),

    #[error("unknown strategy preset '{0}' (expected one of: default, aggressive, conservative)")]
    UnknownPreset(String),
}

/// Named parameter set for the forecast-confirmation policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    /// Minimum forecast-implied change (fraction) to act on.
    pub threshold: f64,
    /// Short entries require the oscillator above this bound.
    pub oversold: f64,
    /// Long entries require the oscillator below this bound.
    pub overbought: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    /// Fraction of equity committed per entry.
    pub position_size: f64,
}

impl StrategyConfig {
    pub const PRESET_NAMES: [&'static str; 3] = ["default", "aggressive", "conservative"];

    /// The reference parameterization.
    pub fn baseline() -> Self {
        Self {
            name: "default".into(),
            threshold: 0.002,
            oversold: 30.0,
            overbought: 70.0,
            stop_loss_pct: 0.005,
            take_profit_pct: 0.01,
            position_size: 0.95,
        }
    }

    /// Lower threshold, tighter stop and target, larger size.
    pub fn aggressive() -> Self {
        Self {
            name: "aggressive".into(),
            threshold: 0.001,
            stop_loss_pct: 0.003,
            take_profit_pct: 0.006,
            position_size: 0.98,
            ..Self::baseline()
        }
    }

    /// Higher threshold, wider stop and target, smaller size.
    pub fn conservative() -> Self {
        Self {
            name: "conservative".into(),
            threshold: 0.004,
            stop_loss_pct: 0.01,
            take_profit_pct: 0.02,
            position_size: 0.5,
            ..Self::baseline()
        }
    }

    /// Look up a preset by name.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "default" | "baseline" => Ok(Self::baseline()),
            "aggressive" => Ok(Self::aggressive()),
            "conservative" => Ok(Self::conservative()),
            other => Err(ConfigError::UnknownPreset(other.to_string())),
        }
    }

    /// Check every required relationship. Called before any simulation starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("threshold", self.threshold),
            ("oversold", self.oversold),
            ("overbought", self.overbought),
            ("stop_loss_pct", self.stop_loss_pct),
            ("take_profit_pct", self.take_profit_pct),
            ("position_size", self.position_size),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.threshold < 0.0 {
            return Err(ConfigError::NegativeThreshold(self.threshold));
        }
        if self.stop_loss_pct <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "stop_loss_pct",
                value: self.stop_loss_pct,
            });
        }
        if self.take_profit_pct <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "take_profit_pct",
                value: self.take_profit_pct,
            });
        }
        if self.position_size <= 0.0 || self.position_size > 1.0 {
            return Err(ConfigError::PositionSize(self.position_size));
        }
        if self.take_profit_pct <= self.stop_loss_pct {
            return Err(ConfigError::RewardNotAboveRisk {
                stop_loss_pct: self.stop_loss_pct,
                take_profit_pct: self.take_profit_pct,
            });
        }
        if self.oversold >= self.overbought {
            return Err(ConfigError::BoundsInverted {
                oversold: self.oversold,
                overbought: self.overbought,
            });
        }
        Ok(())
    }

    /// Compact parameter label for logs and tables.
    pub fn label(&self) -> String {
        format!(
            "thr={:.4} sl={:.4} tp={:.4} size={:.2}",
            self.threshold, self.stop_loss_pct, self.take_profit_pct, self.position_size
        )
    }

    /// Exact identity: BLAKE3 over the canonical JSON of every field.
    pub fn full_hash(&self) -> String {
        // Field order is fixed by the struct definition, so the JSON is canonical.
        let json = serde_json::to_string(self).unwrap_or_default();
        blake3::hash(json.as_bytes()).to_hex().to_string()
    }
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self::baseline()
    }
}

/// When a signal turns into a fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillTiming {
    /// Fill at the close of the bar that produced the signal.
    SameBarClose,
    /// Fill at the open of the following bar.
    #[default]
    NextBarOpen,
}

/// Engine-wide settings for a run. Missing fields deserialize to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub starting_capital: f64,
    /// Fraction of notional charged on every fill, entry and exit.
    pub commission_rate: f64,
    pub fill_timing: FillTiming,
    pub intrabar_policy: IntrabarPolicy,
}

impl EngineConfig {
    pub fn new(starting_capital: f64, commission_rate: f64, fill_timing: FillTiming) -> Self {
        Self {
            starting_capital,
            commission_rate,
            fill_timing,
            intrabar_policy: IntrabarPolicy::WorstCase,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.starting_capital.is_finite() {
            return Err(ConfigError::NonFinite {
                field: "starting_capital",
                value: self.starting_capital,
            });
        }
        if self.starting_capital <= 0.0 {
            return Err(ConfigError::NonPositive {
                field: "starting_capital",
                value: self.starting_capital,
            });
        }
        if !self.commission_rate.is_finite()
            || self.commission_rate < 0.0
            || self.commission_rate >= 1.0
        {
            return Err(ConfigError::CommissionRate(self.commission_rate));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(10_000.0, 0.0004, FillTiming::NextBarOpen)
    }
}
