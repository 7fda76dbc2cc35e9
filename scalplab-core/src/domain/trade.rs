//! Trade: a completed round trip, immutable once recorded.

use super::position::PositionSide;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExitReason {
    /// The forecast reversed past the threshold against the position.
    SignalReversal,
    StopLoss,
    TakeProfit,
    /// Force-closed at the final bar.
    EndOfData,
    /// Liquidated because equity fell to zero.
    OutOfMoney,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitReason::SignalReversal => "signal_reversal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfData => "end_of_data",
            ExitReason::OutOfMoney => "out_of_money",
        };
        f.write_str(s)
    }
}

/// A complete round-trip trade record: entry → exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: PositionSide,

    // ── Entry ──
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub entry_bar: usize,

    // ── Exit ──
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    pub exit_bar: usize,

    // ── Size ──
    pub size: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    /// Entry plus exit commission.
    pub commission: f64,
    /// Realized P&L: gross minus commission.
    pub pnl: f64,
}

impl Trade {
    /// Return on the trade as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        if self.entry_price == 0.0 || self.size == 0.0 {
            return 0.0;
        }
        self.pnl / (self.entry_price * self.size)
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    pub fn duration(&self) -> Duration {
        self.exit_time - self.entry_time
    }

    pub fn bars_held(&self) -> usize {
        self.exit_bar.saturating_sub(self.entry_bar)
    }
}
