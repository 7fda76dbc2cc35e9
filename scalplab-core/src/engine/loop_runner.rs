//! Bar-by-bar event loop.
//!
//! The engine borrows the series, the policy and the engine config; each run
//! owns a fresh [`PositionLedger`]. Nothing here reads a bar beyond the one
//! being processed, so the decision at bar `t` only sees data up to `t`.

use tracing::{debug, trace, warn};

use crate::config::{EngineConfig, FillTiming};
use crate::domain::{Bar, EquityPoint, ExitReason, PositionSide};
use crate::error::SimError;
use crate::ledger::PositionLedger;
use crate::policy::{Action, SignalPolicy};
use crate::series::BarSeries;

use super::state::{EnginePhase, PendingOrder, RunResult};

/// Single-run simulation state machine: `Idle → Running → Finished`.
#[derive(Debug)]
pub struct SimulationEngine<'a> {
    series: &'a BarSeries,
    policy: &'a SignalPolicy,
    config: &'a EngineConfig,
    /// Indices into `series` of the bars that define every policy input.
    rows: Vec<usize>,
    cursor: usize,
    phase: EnginePhase,
    ledger: PositionLedger,
    pending: Option<PendingOrder>,
    equity_curve: Vec<EquityPoint>,
    signal_count: usize,
    /// Set once equity reaches zero; every later bar records zero equity.
    out_of_money: bool,
}

impl<'a> SimulationEngine<'a> {
    /// Validate both configs and select the tradeable bars.
    ///
    /// Fails with `InvalidConfig` before any bar is touched, or with
    /// `InsufficientData` when no bar defines every input the policy reads.
    pub fn new(
        series: &'a BarSeries,
        policy: &'a SignalPolicy,
        config: &'a EngineConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;
        policy.config().validate()?;

        let required = policy.required_columns();
        let rows = series.tradeable_indices(&required);
        if rows.is_empty() {
            return Err(SimError::InsufficientData {
                total_bars: series.len(),
                required: required.iter().map(|c| c.to_string()).collect(),
            });
        }

        Ok(Self {
            series,
            policy,
            config,
            cursor: 0,
            phase: EnginePhase::Idle,
            ledger: PositionLedger::from_config(config),
            pending: None,
            equity_curve: Vec::with_capacity(rows.len()),
            signal_count: 0,
            out_of_money: false,
            rows,
        })
    }

    pub fn phase(&self) -> EnginePhase {
        self.phase
    }

    pub fn ledger(&self) -> &PositionLedger {
        &self.ledger
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn pending(&self) -> Option<PendingOrder> {
        self.pending
    }

    /// Number of bars that will be simulated.
    pub fn bar_count(&self) -> usize {
        self.rows.len()
    }

    pub fn bars_remaining(&self) -> usize {
        self.rows.len() - self.cursor
    }

    pub fn is_out_of_money(&self) -> bool {
        self.out_of_money
    }

    /// Process the next bar. Returns the phase after the bar.
    pub fn step(&mut self) -> Result<EnginePhase, SimError> {
        if self.phase == EnginePhase::Finished {
            return Err(SimError::AlreadyFinished);
        }
        self.phase = EnginePhase::Running;

        let t = self.cursor;
        let series = self.series;
        let bar = &series[self.rows[t]];
        let is_last = t + 1 == self.rows.len();
        let mut entered = false;
        let mut exited = false;

        if self.out_of_money {
            return Ok(self.finish_bar(bar, is_last, 0.0));
        }

        // ─── Start-of-bar: fill the order pending from the previous close ───
        if let Some(order) = self.pending.take() {
            match order {
                PendingOrder::Exit => {
                    self.ledger
                        .close(bar.open, bar.timestamp, t, ExitReason::SignalReversal)?;
                    exited = true;
                }
                PendingOrder::Enter(side) => {
                    entered = self.enter(side, bar.open, bar, t)?;
                }
            }
        }

        // ─── Intrabar: protective orders (not on the entry bar) ───
        if !entered && !exited {
            let triggered = self
                .ledger
                .check_protective_orders(bar, t, self.config.intrabar_policy)?
                .is_some();
            exited = triggered;
        }

        // ─── Close: policy decision (bar 0 is warm-up; no entry on an exit bar) ───
        if t > 0 && !exited {
            let action = self.policy.decide(bar, self.ledger.position_side());
            if action != Action::Hold {
                self.signal_count += 1;
                trace!(bar = t, ?action, "signal");
            }
            self.act(action, bar, t)?;
        }

        // ─── End of data: force-close before the final mark ───
        if is_last && !self.ledger.is_flat() {
            self.ledger
                .close(bar.close, bar.timestamp, t, ExitReason::EndOfData)?;
        }

        // ─── Out of money: liquidate and stop trading ───
        // A position entered on this bar is left to the next bar so that
        // its exit stays strictly after its entry.
        let equity = self.ledger.mark(bar.close);
        if equity <= 0.0 && !entered {
            if !self.ledger.is_flat() {
                self.ledger
                    .close(bar.close, bar.timestamp, t, ExitReason::OutOfMoney)?;
            }
            self.pending = None;
            self.out_of_money = true;
            warn!(bar = t, equity, "equity exhausted; no further trading");
        }

        // ─── Post-bar: mark-to-market, floored at zero ───
        let equity = if self.out_of_money { 0.0 } else { equity.max(0.0) };
        Ok(self.finish_bar(bar, is_last, equity))
    }

    fn finish_bar(&mut self, bar: &Bar, is_last: bool, equity: f64) -> EnginePhase {
        self.equity_curve.push(EquityPoint {
            timestamp: bar.timestamp,
            equity,
        });

        self.cursor += 1;
        if is_last {
            self.phase = EnginePhase::Finished;
            debug!(
                bars = self.rows.len(),
                trades = self.ledger.trades().len(),
                final_equity = equity,
                out_of_money = self.out_of_money,
                "simulation finished"
            );
        }
        self.phase
    }

    /// Run every remaining bar and return the result.
    pub fn run(mut self) -> Result<RunResult, SimError> {
        while self.phase != EnginePhase::Finished {
            self.step()?;
        }
        Ok(self.into_result())
    }

    fn act(&mut self, action: Action, bar: &Bar, t: usize) -> Result<(), SimError> {
        let last = self.rows.len() - 1;
        match (action, self.config.fill_timing) {
            (Action::Hold, _) => {}
            (Action::Exit, FillTiming::SameBarClose) => {
                self.ledger
                    .close(bar.close, bar.timestamp, t, ExitReason::SignalReversal)?;
            }
            (Action::Exit, FillTiming::NextBarOpen) => {
                // On the final bar the end-of-data close covers it.
                if t < last {
                    self.pending = Some(PendingOrder::Exit);
                }
            }
            (Action::EnterLong | Action::EnterShort, timing) => {
                let side = if action == Action::EnterLong {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };
                // An entry filled on the final bar could only close at the same timestamp.
                match timing {
                    FillTiming::SameBarClose if t < last => {
                        self.enter(side, bar.close, bar, t)?;
                    }
                    FillTiming::NextBarOpen if t + 1 < last => {
                        self.pending = Some(PendingOrder::Enter(side));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Open at `price` sized from current equity. Returns false when the
    /// computed size is unusable (equity wiped out).
    fn enter(
        &mut self,
        side: PositionSide,
        price: f64,
        bar: &Bar,
        t: usize,
    ) -> Result<bool, SimError> {
        let equity = self.ledger.mark(price);
        let size = self.policy.entry_size(equity, price);
        if !(size.is_finite() && size > 0.0) {
            debug!(bar = t, equity, price, "entry skipped: no capital to size from");
            return Ok(false);
        }
        let levels = self.policy.protective_levels(side, price);
        self.ledger
            .open(side, price, size, levels, bar.timestamp, t)?;
        Ok(true)
    }

    fn into_result(self) -> RunResult {
        let final_equity = self
            .equity_curve
            .last()
            .map_or(self.config.starting_capital, |p| p.equity);
        RunResult {
            starting_capital: self.config.starting_capital,
            final_equity,
            bar_count: self.rows.len(),
            skipped_bars: self.series.len() - self.rows.len(),
            signal_count: self.signal_count,
            commission_paid: self.ledger.commission_paid(),
            fill_timing: self.config.fill_timing,
            out_of_money: self.out_of_money,
            equity_curve: self.equity_curve,
            trades: self.ledger.into_trades(),
        }
    }
}

/// Simulate `policy` over `series` from start to finish.
pub fn run_simulation(
    series: &BarSeries,
    policy: &SignalPolicy,
    config: &EngineConfig,
) -> Result<RunResult, SimError> {
    SimulationEngine::new(series, policy, config)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StrategyConfig;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
    }

    /// Flat-ish bars with indicators that never confirm an entry.
    fn quiet_series(n: usize) -> BarSeries {
        let bars = (0..n)
            .map(|i| {
                Bar::new(t0() + Duration::minutes(i as i64), 100.0, 100.1, 99.9, 100.0, 1.0)
                    .with_indicator("rsi", 50.0)
                    .with_indicator("macd", 0.0)
                    .with_indicator("macd_signal", 0.0)
                    .with_forecast(100.0)
            })
            .collect();
        BarSeries::new(bars).unwrap()
    }

    fn policy() -> SignalPolicy {
        SignalPolicy::with_default_columns(StrategyConfig::baseline()).unwrap()
    }

    #[test]
    fn phases_advance_idle_running_finished() {
        let series = quiet_series(3);
        let policy = policy();
        let config = EngineConfig::default();
        let mut engine = SimulationEngine::new(&series, &policy, &config).unwrap();
        assert_eq!(engine.phase(), EnginePhase::Idle);
        assert_eq!(engine.step().unwrap(), EnginePhase::Running);
        assert_eq!(engine.step().unwrap(), EnginePhase::Running);
        assert_eq!(engine.step().unwrap(), EnginePhase::Finished);
        assert_eq!(engine.bars_remaining(), 0);
        assert!(matches!(engine.step(), Err(SimError::AlreadyFinished)));
    }

    #[test]
    fn quiet_market_keeps_capital() {
        let series = quiet_series(10);
        let result = run_simulation(&series, &policy(), &EngineConfig::default()).unwrap();
        assert!(result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), 10);
        assert!(result.equity_values().iter().all(|&e| e == 10_000.0));
        assert_eq!(result.final_equity, 10_000.0);
        assert_eq!(result.signal_count, 0);
    }

    #[test]
    fn invalid_engine_config_fails_before_running() {
        let series = quiet_series(3);
        let config = EngineConfig {
            starting_capital: -1.0,
            ..EngineConfig::default()
        };
        let err = SimulationEngine::new(&series, &policy(), &config).unwrap_err();
        assert!(err.is_invalid_config());
    }

    #[test]
    fn bars_without_forecast_are_skipped() {
        let mut bars: Vec<Bar> = quiet_series(5).bars().to_vec();
        bars[1].forecast = None;
        bars[3].indicators.remove("rsi");
        let series = BarSeries::new(bars).unwrap();
        let result = run_simulation(&series, &policy(), &EngineConfig::default()).unwrap();
        assert_eq!(result.bar_count, 3);
        assert_eq!(result.skipped_bars, 2);
        assert_eq!(result.equity_curve.len(), 3);
    }
}
