//! SignalPolicy: forecast signal confirmed by momentum and trend indicators.
//!
//! A pure function of (bar, position side, config). It reads only the current
//! bar: the forecast-implied change is measured against the current close, so
//! no future data can leak into a decision.
//!
//! Long entry: implied change > threshold, oscillator < overbought, trend line
//! above its signal line, flat. Short entry is the mirror image. An open
//! position is exited early when the forecast reverses past the threshold
//! against it.

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, StrategyConfig};
use crate::domain::{Bar, PositionSide, ProtectiveLevels};

/// What the policy wants done on this bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

/// Names of the indicator columns the policy reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorColumns {
    /// Bounded momentum oscillator (e.g. RSI).
    pub oscillator: String,
    /// Trend-momentum line (e.g. MACD).
    pub trend: String,
    /// Signal line of the trend-momentum line.
    pub trend_signal: String,
}

impl IndicatorColumns {
    pub fn names(&self) -> [&str; 3] {
        [
            self.oscillator.as_str(),
            self.trend.as_str(),
            self.trend_signal.as_str(),
        ]
    }
}

impl Default for IndicatorColumns {
    fn default() -> Self {
        Self {
            oscillator: "rsi".into(),
            trend: "macd".into(),
            trend_signal: "macd_signal".into(),
        }
    }
}

/// The per-bar inputs a decision is made from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalInputs {
    pub implied_change: f64,
    pub oscillator: f64,
    pub trend: f64,
    pub trend_signal: f64,
}

/// `(forecast - close) / close`
pub fn implied_change(forecast: f64, close: f64) -> f64 {
    (forecast - close) / close
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalPolicy {
    config: StrategyConfig,
    columns: IndicatorColumns,
}

impl SignalPolicy {
    /// Build a policy; the config is validated here, before any simulation.
    pub fn new(config: StrategyConfig, columns: IndicatorColumns) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config, columns })
    }

    pub fn with_default_columns(config: StrategyConfig) -> Result<Self, ConfigError> {
        Self::new(config, IndicatorColumns::default())
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    pub fn columns(&self) -> &IndicatorColumns {
        &self.columns
    }

    /// Indicator columns a bar must define to be tradeable under this policy.
    pub fn required_columns(&self) -> [&str; 3] {
        self.columns.names()
    }

    /// Stop-loss and take-profit prices for an entry at `entry_price`.
    pub fn protective_levels(&self, side: PositionSide, entry_price: f64) -> ProtectiveLevels {
        let sl = self.config.stop_loss_pct;
        let tp = self.config.take_profit_pct;
        let (stop_price, take_profit_price) = match side {
            PositionSide::Long => (entry_price * (1.0 - sl), entry_price * (1.0 + tp)),
            PositionSide::Short => (entry_price * (1.0 + sl), entry_price * (1.0 - tp)),
        };
        ProtectiveLevels {
            stop_price,
            take_profit_price,
        }
    }

    /// Units to buy or sell when committing `position_size` of `equity` at `price`.
    pub fn entry_size(&self, equity: f64, price: f64) -> f64 {
        equity * self.config.position_size / price
    }

    /// Read this bar's inputs; `None` if any is undefined.
    pub fn inputs(&self, bar: &Bar) -> Option<SignalInputs> {
        Some(SignalInputs {
            implied_change: implied_change(bar.forecast_value()?, bar.close),
            oscillator: bar.indicator(&self.columns.oscillator)?,
            trend: bar.indicator(&self.columns.trend)?,
            trend_signal: bar.indicator(&self.columns.trend_signal)?,
        })
    }

    /// Decide the action for `bar` given the current position side.
    ///
    /// Bars with undefined inputs yield `Hold`.
    pub fn decide(&self, bar: &Bar, position: Option<PositionSide>) -> Action {
        match self.inputs(bar) {
            Some(inputs) => self.decide_from(&inputs, position),
            None => Action::Hold,
        }
    }

    pub fn decide_from(&self, inputs: &SignalInputs, position: Option<PositionSide>) -> Action {
        let threshold = self.config.threshold;
        match position {
            Some(PositionSide::Long) if inputs.implied_change < -threshold => Action::Exit,
            Some(PositionSide::Short) if inputs.implied_change > threshold => Action::Exit,
            Some(_) => Action::Hold,
            None if self.should_go_long(inputs) => Action::EnterLong,
            None if self.should_go_short(inputs) => Action::EnterShort,
            None => Action::Hold,
        }
    }

    fn should_go_long(&self, inputs: &SignalInputs) -> bool {
        inputs.implied_change > self.config.threshold
            && inputs.oscillator < self.config.overbought
            && inputs.trend > inputs.trend_signal
    }

    fn should_go_short(&self, inputs: &SignalInputs) -> bool {
        inputs.implied_change < -self.config.threshold
            && inputs.oscillator > self.config.oversold
            && inputs.trend < inputs.trend_signal
    }
}
