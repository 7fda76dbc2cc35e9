//! Error types raised by the simulation core.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::config::ConfigError;
use crate::domain::PositionSide;

/// Errors from a simulation run.
///
/// Degenerate numeric outcomes (no trades, zero variance) are not errors;
/// the analyzer returns defined values for them.
#[derive(Debug, Error)]
pub enum SimError {
    /// Nothing left to simulate after dropping bars with undefined inputs.
    #[error("insufficient data: none of {total_bars} bars define all of [{}]", required.join(", "))]
    InsufficientData {
        total_bars: usize,
        required: Vec<String>,
    },

    /// Two opens without an intervening close. Engine bug, never user-recoverable.
    #[error("position already open: {side:?} since {entry_time}")]
    PositionAlreadyOpen {
        side: PositionSide,
        entry_time: DateTime<Utc>,
    },

    #[error("no open position to close")]
    NoOpenPosition,

    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("engine already finished; build a new engine for another run")]
    AlreadyFinished,
}

impl SimError {
    /// Whether this error is a bad-parameter rejection rather than an engine fault.
    pub fn is_invalid_config(&self) -> bool {
        matches!(self, SimError::InvalidConfig(_))
    }
}
