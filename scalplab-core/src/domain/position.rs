//! Open position state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of an open position. Flat is modelled as "no position".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// +1 for long, -1 for short.
    pub fn direction(self) -> f64 {
        match self {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        }
    }
}

/// Stop-loss and take-profit prices attached to an entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveLevels {
    pub stop_price: f64,
    pub take_profit_price: f64,
}

/// The single open position held by the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,
    pub entry_price: f64,
    /// Quantity in units of the instrument (always positive).
    pub size: f64,
    pub stop_price: f64,
    pub take_profit_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Index of the entry bar within the simulated series.
    pub entry_bar: usize,
    /// Commission charged on the entry fill.
    pub entry_commission: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    /// Signed market value: positive for longs, negative (a liability) for shorts.
    pub fn market_value(&self, price: f64) -> f64 {
        self.side.direction() * self.size * price
    }

    /// Gross P&L if closed at `price`, before any commission.
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        (price - self.entry_price) * self.size * self.side.direction()
    }

    pub fn entry_notional(&self) -> f64 {
        self.entry_price * self.size
    }
}
