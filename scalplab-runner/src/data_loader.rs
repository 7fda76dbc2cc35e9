//! Bar loading for the runner.
//!
//! Reads a CSV file of bars into a validated [`BarSeries`]:
//! - `timestamp` (RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or `YYYY-MM-DD`)
//! - `open, high, low, close` (required), `volume` (optional, defaults to 0)
//! - the forecast column (default `predicted_price`)
//! - every other column becomes an indicator; empty, NaN or non-numeric
//!   cells leave that indicator undefined for the bar
//!
//! Header matching for the fixed columns is case-insensitive.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use scalplab_core::{Bar, BarSeries, SeriesError};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing required column '{0}'")]
    MissingColumn(String),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}: column '{column}' is not a number: '{value}'")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error("invalid bar series: {0}")]
    Series(#[from] SeriesError),
}

/// Options controlling how bars are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    pub timestamp_column: String,
    pub forecast_column: String,
    /// Sort rows and drop duplicates/insane bars instead of failing on them.
    pub repair: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            timestamp_column: "timestamp".into(),
            forecast_column: "predicted_price".into(),
            repair: false,
        }
    }
}

/// Where a series came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Csv { path: PathBuf },
    Synthetic { seed: u64 },
}

/// Result of loading bars, including provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub series: BarSeries,
    pub source: DataSource,
    /// BLAKE3 over every bar, for run fingerprinting.
    pub dataset_hash: String,
}

impl LoadedData {
    pub fn new(series: BarSeries, source: DataSource) -> Self {
        let dataset_hash = dataset_hash(&series);
        Self {
            series,
            source,
            dataset_hash,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self.source, DataSource::Synthetic { .. })
    }
}

/// Load a CSV file of bars.
pub fn load_csv(path: &Path, opts: &LoadOptions) -> Result<LoadedData, LoadError> {
    let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_path(path)?;
    let series = read_records(reader, opts)?;
    info!(path = %path.display(), bars = series.len(), "loaded bars");
    Ok(LoadedData::new(
        series,
        DataSource::Csv {
            path: path.to_path_buf(),
        },
    ))
}

/// Read bars from any CSV source.
pub fn read_bars<R: Read>(source: R, opts: &LoadOptions) -> Result<BarSeries, LoadError> {
    let reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    read_records(reader, opts)
}

struct Layout {
    timestamp: usize,
    open: usize,
    high: usize,
    low: usize,
    close: usize,
    volume: Option<usize>,
    forecast: Option<usize>,
    indicators: Vec<(usize, String)>,
}

impl Layout {
    fn from_headers(headers: &csv::StringRecord, opts: &LoadOptions) -> Result<Self, LoadError> {
        let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
        let require = |name: &str| find(name).ok_or_else(|| LoadError::MissingColumn(name.into()));

        let timestamp = require(&opts.timestamp_column)?;
        let open = require("open")?;
        let high = require("high")?;
        let low = require("low")?;
        let close = require("close")?;
        let volume = find("volume");
        let forecast = find(&opts.forecast_column);

        let fixed = [
            Some(timestamp),
            Some(open),
            Some(high),
            Some(low),
            Some(close),
            volume,
            forecast,
        ];
        let indicators = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| !fixed.contains(&Some(*i)))
            .map(|(i, name)| (i, name.to_string()))
            .collect();

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            forecast,
            indicators,
        })
    }
}

fn read_records<R: Read>(
    mut reader: csv::Reader<R>,
    opts: &LoadOptions,
) -> Result<BarSeries, LoadError> {
    let headers = reader.headers()?.clone();
    let layout = Layout::from_headers(&headers, opts)?;
    debug!(
        indicators = ?layout.indicators.iter().map(|(_, n)| n.as_str()).collect::<Vec<_>>(),
        has_forecast = layout.forecast.is_some(),
        "csv layout"
    );

    let mut bars = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let cell = |i: usize| record.get(i).unwrap_or("");
        let price = |i: usize| -> Result<f64, LoadError> {
            cell(i).parse::<f64>().map_err(|_| LoadError::BadNumber {
                row,
                column: headers.get(i).unwrap_or("").to_string(),
                value: cell(i).to_string(),
            })
        };

        let raw_ts = cell(layout.timestamp);
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: raw_ts.to_string(),
        })?;

        let mut bar = Bar::new(
            timestamp,
            price(layout.open)?,
            price(layout.high)?,
            price(layout.low)?,
            price(layout.close)?,
            layout.volume.and_then(|i| parse_optional(cell(i))).unwrap_or(0.0),
        );
        bar.forecast = layout.forecast.and_then(|i| parse_optional(cell(i)));
        bar.indicators = layout
            .indicators
            .iter()
            .filter_map(|(i, name)| parse_optional(cell(*i)).map(|v| (name.clone(), v)))
            .collect::<BTreeMap<_, _>>();
        bars.push(bar);
    }

    if opts.repair {
        let before = bars.len();
        let series = BarSeries::from_unordered(bars);
        if series.len() < before {
            debug!(dropped = before - series.len(), "repair dropped rows");
        }
        Ok(series)
    } else {
        Ok(BarSeries::new(bars)?)
    }
}

/// A cell that may legitimately be undefined: empty, NaN, or unparseable.
fn parse_optional(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse the supported timestamp forms; naive forms are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Compute a deterministic BLAKE3 hash over all bar data.
///
/// Covers timestamps, OHLCV, the forecast and every indicator in name order.
pub fn dataset_hash(series: &BarSeries) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in series {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        for value in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&value.to_le_bytes());
        }
        hasher.update(&bar.forecast.unwrap_or(f64::NAN).to_le_bytes());
        for (name, value) in &bar.indicators {
            hasher.update(name.as_bytes());
            hasher.update(&value.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
