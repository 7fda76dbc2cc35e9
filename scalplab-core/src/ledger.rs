//! PositionLedger: cash, the single open position, and the trade log.
//!
//! Accounting identity at every point: `equity == cash + position market value`.
//! Opening a long debits notional, opening a short credits it; commission is
//! always a debit. After every close, `cash == starting capital + Σ trade P&L`.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::EngineConfig;
use crate::domain::{Bar, ExitReason, Position, PositionSide, ProtectiveLevels, Trade};
use crate::error::SimError;
use crate::execution::{protective_exit, CommissionModel, IntrabarPolicy};

#[derive(Debug, Clone)]
pub struct PositionLedger {
    starting_capital: f64,
    cash: f64,
    commission: CommissionModel,
    position: Option<Position>,
    trades: Vec<Trade>,
    commission_paid: f64,
}

impl PositionLedger {
    pub fn new(starting_capital: f64, commission: CommissionModel) -> Self {
        Self {
            starting_capital,
            cash: starting_capital,
            commission,
            position: None,
            trades: Vec::new(),
            commission_paid: 0.0,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.starting_capital,
            CommissionModel::new(config.commission_rate),
        )
    }

    /// Open a position. Exclusive: fails if one is already open.
    ///
    /// `bar_index` is the fill bar's position in the simulated series.
    pub fn open(
        &mut self,
        side: PositionSide,
        price: f64,
        size: f64,
        levels: ProtectiveLevels,
        timestamp: DateTime<Utc>,
        bar_index: usize,
    ) -> Result<&Position, SimError> {
        if let Some(existing) = &self.position {
            return Err(SimError::PositionAlreadyOpen {
                side: existing.side,
                entry_time: existing.entry_time,
            });
        }

        let entry_commission = self.commission.compute_commission(price, size);
        let position = Position {
            side,
            entry_price: price,
            size,
            stop_price: levels.stop_price,
            take_profit_price: levels.take_profit_price,
            entry_time: timestamp,
            entry_bar: bar_index,
            entry_commission,
        };
        self.cash -= position.market_value(price) + entry_commission;
        self.commission_paid += entry_commission;

        debug!(
            ?side,
            price,
            size,
            stop_price = levels.stop_price,
            take_profit_price = levels.take_profit_price,
            %timestamp,
            "position opened"
        );
        Ok(&*self.position.insert(position))
    }

    /// Equity if marked at `price`. No state change.
    pub fn mark(&self, price: f64) -> f64 {
        self.cash
            + self
                .position
                .as_ref()
                .map_or(0.0, |p| p.market_value(price))
    }

    /// Gross unrealized P&L of the open position at `price` (0 when flat).
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        self.position
            .as_ref()
            .map_or(0.0, |p| p.unrealized_pnl(price))
    }

    /// Close the position if `bar` touches its stop-loss or take-profit.
    ///
    /// Which level wins when both are touched is decided by `policy`.
    pub fn check_protective_orders(
        &mut self,
        bar: &Bar,
        bar_index: usize,
        policy: IntrabarPolicy,
    ) -> Result<Option<&Trade>, SimError> {
        let Some(position) = &self.position else {
            return Ok(None);
        };
        match protective_exit(position, bar, policy) {
            None => Ok(None),
            Some(fill) => {
                if fill.gapped {
                    debug!(reason = %fill.reason, price = fill.price, "protective order gapped");
                }
                self.close(fill.price, bar.timestamp, bar_index, fill.reason)
                    .map(Some)
            }
        }
    }

    /// Realize the open position at `price` and append the trade.
    pub fn close(
        &mut self,
        price: f64,
        timestamp: DateTime<Utc>,
        bar_index: usize,
        reason: ExitReason,
    ) -> Result<&Trade, SimError> {
        let position = self.position.take().ok_or(SimError::NoOpenPosition)?;

        let exit_commission = self.commission.compute_commission(price, position.size);
        let gross_pnl = position.unrealized_pnl(price);
        let commission = position.entry_commission + exit_commission;

        self.cash += position.market_value(price) - exit_commission;
        self.commission_paid += exit_commission;

        let trade = Trade {
            side: position.side,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            entry_bar: position.entry_bar,
            exit_time: timestamp,
            exit_price: price,
            exit_reason: reason,
            exit_bar: bar_index,
            size: position.size,
            gross_pnl,
            commission,
            pnl: gross_pnl - commission,
        };
        debug!(%reason, price, pnl = trade.pnl, %timestamp, "position closed");

        self.trades.push(trade);
        Ok(&self.trades[self.trades.len() - 1])
    }

    pub fn position(&self) -> Option<&Position> {
        self.position.as_ref()
    }

    pub fn position_side(&self) -> Option<PositionSide> {
        self.position.as_ref().map(|p| p.side)
    }

    pub fn is_flat(&self) -> bool {
        self.position.is_none()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn starting_capital(&self) -> f64 {
        self.starting_capital
    }

    pub fn commission_paid(&self) -> f64 {
        self.commission_paid
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<Trade> {
        self.trades
    }
}
