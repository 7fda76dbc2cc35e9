//! Bar: one OHLCV sample plus the indicator and forecast columns produced upstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OHLCV bar for a single interval.
///
/// Indicator values and the forecast come from external collaborators and are
/// consumed as plain numbers. A missing or NaN value means "not yet defined"
/// (warm-up); such bars are filtered out before simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Indicator name → value. `BTreeMap` keeps serialization order stable.
    #[serde(default)]
    pub indicators: BTreeMap<String, f64>,
    /// Forecast of a future price, if the model produced one for this bar.
    #[serde(default)]
    pub forecast: Option<f64>,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: BTreeMap::new(),
            forecast: None,
        }
    }

    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    pub fn with_forecast(mut self, forecast: f64) -> Self {
        self.forecast = Some(forecast);
        self
    }

    /// Indicator value, or `None` if absent or not finite.
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied().filter(|v| v.is_finite())
    }

    /// Forecast value, or `None` if absent or not finite.
    pub fn forecast_value(&self) -> Option<f64> {
        self.forecast.filter(|v| v.is_finite())
    }

    /// Returns true if any OHLC field is NaN.
    pub fn is_void(&self) -> bool {
        self.open.is_nan() || self.high.is_nan() || self.low.is_nan() || self.close.is_nan()
    }

    /// OHLCV sanity: positive finite prices, `high >= max(open, close)`,
    /// `low <= min(open, close)`, non-negative volume.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return false;
        }
        self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.volume.is_finite()
            && self.volume >= 0.0
    }
}
