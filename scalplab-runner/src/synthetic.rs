//! Deterministic synthetic minute bars for demos, tests and benches.
//!
//! A seeded random walk with RSI(14), MACD(12, 26, 9) and a noisy forecast of
//! the next close. Same seed, same bars. Indicators are left undefined during
//! their warm-up, and the final bar has no forecast.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use scalplab_core::{Bar, BarSeries, ConfigError};

use crate::data_loader::{DataSource, LoadedData};

pub const RSI_PERIOD: usize = 14;
pub const MACD_FAST: usize = 12;
pub const MACD_SLOW: usize = 26;
pub const MACD_SIGNAL: usize = 9;

/// Shape of a synthetic series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticSpec {
    pub bars: usize,
    pub seed: u64,
    pub start_price: f64,
    /// Maximum absolute per-bar return.
    pub volatility: f64,
    /// Maximum relative error of the forecast against the true next close.
    pub forecast_noise: f64,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            bars: 2_000,
            seed: 42,
            start_price: 100.0,
            volatility: 0.002,
            forecast_noise: 0.002,
        }
    }
}

impl SyntheticSpec {
    /// Reject values that leave the sampling ranges empty or undefined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(ConfigError::NonPositive {
                field: "synthetic.start_price",
                value: self.start_price,
            });
        }
        for (field, value) in [
            ("synthetic.volatility", self.volatility),
            ("synthetic.forecast_noise", self.forecast_noise),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
            if value < 0.0 {
                return Err(ConfigError::Negative { field, value });
            }
        }
        Ok(())
    }
}

fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Generate the series described by `spec`.
///
/// # Panics
///
/// If `spec` fails [`SyntheticSpec::validate`]. Settings loaded through
/// [`Settings`](crate::settings::Settings) are already validated.
pub fn generate(spec: &SyntheticSpec) -> LoadedData {
    // Seed derived through blake3 so nearby seeds give unrelated walks.
    let seed: [u8; 32] = *blake3::hash(&spec.seed.to_le_bytes()).as_bytes();
    let mut rng = StdRng::from_seed(seed);

    let mut ohlcv = Vec::with_capacity(spec.bars);
    let mut price = spec.start_price;
    for _ in 0..spec.bars {
        let ret: f64 = rng.gen_range(-spec.volatility..=spec.volatility);
        let open = price;
        let close = price * (1.0 + ret);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..=spec.volatility / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..=spec.volatility / 2.0));
        let volume = rng.gen_range(1.0..100.0);
        ohlcv.push((open, high, low, close, volume));
        price = close;
    }

    let closes: Vec<f64> = ohlcv.iter().map(|b| b.3).collect();
    let rsi = rsi(&closes, RSI_PERIOD);
    let (macd, macd_signal) = macd(&closes, MACD_FAST, MACD_SLOW, MACD_SIGNAL);

    let t0 = start_time();
    let bars = ohlcv
        .iter()
        .enumerate()
        .map(|(i, &(open, high, low, close, volume))| {
            let ts = t0 + Duration::minutes(i as i64);
            let mut bar = Bar::new(ts, open, high, low, close, volume);
            let indicators = [
                ("rsi", rsi[i]),
                ("macd", macd[i]),
                ("macd_signal", macd_signal[i]),
            ];
            for (name, value) in indicators {
                if value.is_finite() {
                    bar = bar.with_indicator(name, value);
                }
            }
            if let Some(&next) = closes.get(i + 1) {
                let noise = rng.gen_range(-spec.forecast_noise..=spec.forecast_noise);
                bar = bar.with_forecast(next * (1.0 + noise));
            }
            bar
        })
        .collect();

    LoadedData::new(
        BarSeries::from_unordered(bars),
        DataSource::Synthetic { seed: spec.seed },
    )
}

/// EMA seeded with the SMA of the first `period` values; NaN before that.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    result[period - 1] = prev;
    for i in period..n {
        prev = alpha * values[i] + (1.0 - alpha) * prev;
        result[i] = prev;
    }
    result
}

/// Wilder RSI; first defined at index `period`.
pub fn rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let n = closes.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n <= period {
        return result;
    }

    let change = |i: usize| closes[i] - closes[i - 1];
    let (mut avg_gain, mut avg_loss) = (1..=period).fold((0.0, 0.0), |(g, l), i| {
        let ch = change(i);
        (g + ch.max(0.0), l + (-ch).max(0.0))
    });
    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = rsi_value(avg_gain, avg_loss);

    let alpha = 1.0 / period as f64;
    for i in (period + 1)..n {
        let ch = change(i);
        avg_gain = alpha * ch.max(0.0) + (1.0 - alpha) * avg_gain;
        avg_loss = alpha * (-ch).max(0.0) + (1.0 - alpha) * avg_loss;
        result[i] = rsi_value(avg_gain, avg_loss);
    }
    result
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        if avg_gain == 0.0 {
            50.0
        } else {
            100.0
        }
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// MACD line (fast EMA − slow EMA) and its signal EMA.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<f64>, Vec<f64>) {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);
    let line: Vec<f64> = fast_ema.iter().zip(&slow_ema).map(|(f, s)| f - s).collect();

    let mut signal_line = vec![f64::NAN; closes.len()];
    let first = slow.saturating_sub(1);
    if first < line.len() {
        for (offset, value) in ema(&line[first..], signal).into_iter().enumerate() {
            signal_line[first + offset] = value;
        }
    }
    (line, signal_line)
}
