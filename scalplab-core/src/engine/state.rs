//! Engine phase, pending orders, and the run result.

use serde::{Deserialize, Serialize};

use crate::config::FillTiming;
use crate::domain::{equity_values, EquityPoint, PositionSide, Trade};

/// Lifecycle of a [`SimulationEngine`](super::SimulationEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnginePhase {
    /// Built and validated, no bar consumed yet.
    Idle,
    Running,
    /// Every bar consumed and the ledger is flat.
    Finished,
}

/// An order decided at one bar's close and filled at the next bar's open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOrder {
    Enter(PositionSide),
    Exit,
}

/// Output of one completed simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Completed round trips in chronological order.
    pub trades: Vec<Trade>,
    /// Equity at each simulated bar's close.
    pub equity_curve: Vec<EquityPoint>,
    pub starting_capital: f64,
    pub final_equity: f64,
    /// Bars simulated (after dropping bars with undefined inputs).
    pub bar_count: usize,
    /// Bars dropped because an indicator or the forecast was undefined.
    pub skipped_bars: usize,
    /// Non-hold actions the policy emitted.
    pub signal_count: usize,
    pub commission_paid: f64,
    pub fill_timing: FillTiming,
    /// Equity reached zero and the run stopped trading.
    #[serde(default)]
    pub out_of_money: bool,
}

impl RunResult {
    pub fn equity_values(&self) -> Vec<f64> {
        equity_values(&self.equity_curve)
    }

    pub fn total_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}
