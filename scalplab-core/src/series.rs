//! BarSeries: immutable, time-ordered view over bars.
//!
//! Construction enforces strictly increasing timestamps (which also rules out
//! duplicates) and OHLC sanity. Filtering to the bars a policy can actually
//! trade happens once, up front, so the engine loop never sees undefined inputs.

use std::ops::Index;
use std::slice::Iter;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Bar;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SeriesError {
    #[error("bar {index}: timestamp {current} is not after previous {previous}")]
    OutOfOrder {
        index: usize,
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("bar {index}: duplicate timestamp {timestamp}")]
    DuplicateTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
    },

    #[error("bar {index} at {timestamp}: OHLCV fails sanity checks")]
    InsaneBar {
        index: usize,
        timestamp: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    /// Validate ordering and OHLC sanity.
    pub fn new(bars: Vec<Bar>) -> Result<Self, SeriesError> {
        for (index, bar) in bars.iter().enumerate() {
            if !bar.is_sane() {
                return Err(SeriesError::InsaneBar {
                    index,
                    timestamp: bar.timestamp,
                });
            }
            if index > 0 {
                let previous = bars[index - 1].timestamp;
                if bar.timestamp == previous {
                    return Err(SeriesError::DuplicateTimestamp {
                        index,
                        timestamp: bar.timestamp,
                    });
                }
                if bar.timestamp < previous {
                    return Err(SeriesError::OutOfOrder {
                        index,
                        previous,
                        current: bar.timestamp,
                    });
                }
            }
        }
        Ok(Self { bars })
    }

    /// Sort by timestamp and drop later duplicates and insane bars, then build.
    ///
    /// For upstream sources that are only approximately clean.
    pub fn from_unordered(mut bars: Vec<Bar>) -> Self {
        bars.retain(Bar::is_sane);
        bars.sort_by_key(|b| b.timestamp);
        bars.dedup_by_key(|b| b.timestamp);
        Self { bars }
    }

    /// Bars that define every `columns` indicator and a finite forecast.
    ///
    /// Order is preserved, so the result keeps the series invariants.
    pub fn tradeable(&self, columns: &[&str]) -> BarSeries {
        let bars = self
            .tradeable_indices(columns)
            .into_iter()
            .map(|i| self.bars[i].clone())
            .collect();
        BarSeries { bars }
    }

    /// Indices of the bars [`tradeable`](Self::tradeable) would keep.
    pub fn tradeable_indices(&self, columns: &[&str]) -> Vec<usize> {
        self.bars
            .iter()
            .enumerate()
            .filter(|(_, bar)| {
                bar.forecast_value().is_some()
                    && columns.iter().all(|c| bar.indicator(c).is_some())
            })
            .map(|(i, _)| i)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    pub fn iter(&self) -> Iter<'_, Bar> {
        self.bars.iter()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first(&self) -> Option<&Bar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Prefix of the first `len` bars (clamped).
    pub fn truncated(&self, len: usize) -> BarSeries {
        BarSeries {
            bars: self.bars[..len.min(self.bars.len())].to_vec(),
        }
    }
}

impl Index<usize> for BarSeries {
    type Output = Bar;

    fn index(&self, index: usize) -> &Bar {
        &self.bars[index]
    }
}

impl<'a> IntoIterator for &'a BarSeries {
    type Item = &'a Bar;
    type IntoIter = Iter<'a, Bar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.iter()
    }
}
