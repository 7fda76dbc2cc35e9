//! Integration tests for the simulation engine.
//!
//! Tests:
//! 1. Same-bar-close fills: take-profit and signal-reversal round trips
//! 2. Next-bar-open fills: pending entries/exits, entry-bar protection
//! 3. Intrabar tie-break through the engine (worst case vs best case)
//! 4. End of data: forced close, no entry on the final bar
//! 5. Accounting: equity[0], final equity == capital + Σ P&L, determinism
//! 6. Out of money: liquidation, equity floored at zero

use chrono::{DateTime, Duration, TimeZone, Utc};
use scalplab_core::{
    run_simulation, Bar, BarSeries, EngineConfig, ExitReason, FillTiming, IntrabarPolicy,
    PositionSide, RunResult, SignalPolicy, SimError, StrategyConfig,
};

fn t(i: usize) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::minutes(i as i64)
}

/// A bar whose indicators confirm nothing and whose forecast equals the close.
fn bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar::new(t(i), open, high, low, close, 1_000.0)
        .with_indicator("rsi", 50.0)
        .with_indicator("macd", 0.0)
        .with_indicator("macd_signal", 0.0)
        .with_forecast(close)
}

fn quiet(i: usize, price: f64) -> Bar {
    bar(i, price, price + 0.05, price - 0.05, price)
}

/// Trend confirmed up and forecast above the close by more than the threshold.
fn bullish(b: Bar, forecast: f64) -> Bar {
    b.with_indicator("macd", 1.0).with_forecast(forecast)
}

fn bearish(b: Bar, forecast: f64) -> Bar {
    b.with_indicator("macd", -1.0).with_forecast(forecast)
}

fn engine(fill_timing: FillTiming) -> EngineConfig {
    EngineConfig::new(10_000.0, 0.0004, fill_timing)
}

fn baseline() -> SignalPolicy {
    SignalPolicy::with_default_columns(StrategyConfig::baseline()).unwrap()
}

fn run(bars: Vec<Bar>, config: &EngineConfig) -> RunResult {
    let series = BarSeries::new(bars).unwrap();
    run_simulation(&series, &baseline(), config).unwrap()
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

// ──────────────────────────────────────────────
// Same-bar-close fills
// ──────────────────────────────────────────────

#[test]
fn take_profit_round_trip() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 100.2, 101.5, 100.1, 101.2),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, PositionSide::Long);
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_eq!(trade.entry_time, t(1));
    assert_eq!(trade.exit_time, t(2));
    assert_close(trade.entry_price, 100.0);
    assert_close(trade.exit_price, 101.0);
    // 95% of 10_000 at 100
    assert_close(trade.size, 95.0);

    // entry × size × tp_pct − commission on both notionals
    let expected = 100.0 * 95.0 * 0.01 - 0.0004 * (100.0 * 95.0) - 0.0004 * (101.0 * 95.0);
    assert_close(trade.pnl, expected);
    assert_close(result.final_equity, 10_000.0 + expected);

    let equity = result.equity_values();
    assert_eq!(equity.len(), 3);
    assert_eq!(equity[0], 10_000.0);
    // Marked at the entry close: only the entry commission is lost
    assert_close(equity[1], 10_000.0 - 0.0004 * 9_500.0);
}

#[test]
fn forecast_reversal_exits_with_signal_reversal() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 100.0, 100.4, 99.7, 100.2).with_forecast(99.8),
        quiet(3, 100.2),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::SignalReversal);
    assert_eq!(trade.exit_time, t(2));
    assert_close(trade.exit_price, 100.2);
    assert_eq!(trade.bars_held(), 1);
}

#[test]
fn short_entry_profits_on_decline() {
    let bars = vec![
        quiet(0, 100.0),
        bearish(quiet(1, 100.0), 99.5),
        bar(2, 99.8, 99.9, 98.8, 99.0),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, PositionSide::Short);
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_close(trade.exit_price, 99.0);
    assert!(trade.gross_pnl > 0.0);
}

#[test]
fn stop_loss_exit_loses() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 99.9, 100.0, 99.2, 99.4),
        quiet(3, 99.4),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_close(result.trades[0].exit_price, 99.5);
    assert!(result.trades[0].pnl < 0.0);
}

#[test]
fn gap_through_stop_fills_at_open() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 98.0, 98.5, 97.5, 98.2),
        quiet(3, 98.2),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_close(result.trades[0].exit_price, 98.0);
}

#[test]
fn intrabar_policy_breaks_ties() {
    let bars = vec![
        quiet(0, 100.0),
        bearish(quiet(1, 100.0), 99.5),
        // Touches both the short stop (100.5) and target (99.0)
        bar(2, 99.8, 100.6, 98.9, 99.5),
        quiet(3, 99.5),
    ];

    let worst = run(bars.clone(), &engine(FillTiming::SameBarClose));
    assert_eq!(worst.trades[0].exit_reason, ExitReason::StopLoss);
    assert_close(worst.trades[0].exit_price, 100.5);

    let config = EngineConfig {
        intrabar_policy: IntrabarPolicy::BestCase,
        ..engine(FillTiming::SameBarClose)
    };
    let best = run(bars, &config);
    assert_eq!(best.trades[0].exit_reason, ExitReason::TakeProfit);
    assert_close(best.trades[0].exit_price, 99.0);
}

#[test]
fn no_new_entry_on_exit_bar() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        // Stops out, yet still looks bullish at the close
        bullish(bar(2, 99.9, 100.0, 99.2, 99.6), 100.2),
        quiet(3, 99.6),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
}

#[test]
fn positions_are_exclusive() {
    // Every bar after the first screams "buy"; only one position may exist.
    let mut bars = vec![quiet(0, 100.0)];
    for i in 1..6 {
        bars.push(bullish(quiet(i, 100.0), 100.5));
    }
    let result = run(bars, &engine(FillTiming::SameBarClose));
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
    assert_eq!(result.trades[0].entry_time, t(1));
}

// ──────────────────────────────────────────────
// Next-bar-open fills
// ──────────────────────────────────────────────

#[test]
fn next_bar_open_fills_entry_at_following_open() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        // Entry bar dips through the would-be stop; not checked on the entry bar
        bar(2, 100.4, 100.6, 99.0, 100.5),
        bar(3, 100.5, 101.5, 100.3, 101.2),
    ];
    let result = run(bars, &engine(FillTiming::NextBarOpen));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_time, t(2));
    assert_close(trade.entry_price, 100.4);
    assert_close(trade.size, 10_000.0 * 0.95 / 100.4);
    assert_eq!(trade.exit_reason, ExitReason::TakeProfit);
    assert_close(trade.exit_price, 100.4 * 1.01);
    assert_eq!(trade.exit_time, t(3));
}

#[test]
fn next_bar_open_fills_exit_at_following_open() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 100.0, 100.4, 99.7, 100.2).with_forecast(99.8),
        bar(3, 100.1, 100.3, 99.9, 100.0),
        quiet(4, 100.0),
    ];
    let result = run(bars, &engine(FillTiming::NextBarOpen));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.entry_time, t(2));
    assert_eq!(trade.exit_reason, ExitReason::SignalReversal);
    assert_eq!(trade.exit_time, t(3));
    assert_close(trade.exit_price, 100.1);
}

#[test]
fn fill_timing_changes_entry_price() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        quiet(2, 100.3),
        quiet(3, 100.3),
    ];
    let close_fill = run(bars.clone(), &engine(FillTiming::SameBarClose));
    let open_fill = run(bars, &engine(FillTiming::NextBarOpen));
    assert_close(close_fill.trades[0].entry_price, 100.0);
    assert_close(open_fill.trades[0].entry_price, 100.3);
}

// ──────────────────────────────────────────────
// End of data
// ──────────────────────────────────────────────

#[test]
fn open_position_force_closed_at_final_close() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        quiet(2, 100.2),
        quiet(3, 100.4),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, ExitReason::EndOfData);
    assert_eq!(trade.exit_time, t(3));
    assert_close(trade.exit_price, 100.4);
    assert_close(*result.equity_values().last().unwrap(), 10_000.0 + trade.pnl);
}

#[test]
fn no_entry_filled_on_final_bar() {
    let same_bar = vec![quiet(0, 100.0), bullish(quiet(1, 100.0), 100.5)];
    assert!(run(same_bar, &engine(FillTiming::SameBarClose))
        .trades
        .is_empty());

    // The fill would land on the final bar
    let next_bar = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        quiet(2, 100.0),
    ];
    assert!(run(next_bar, &engine(FillTiming::NextBarOpen))
        .trades
        .is_empty());
}

#[test]
fn first_bar_is_never_traded() {
    let bars = vec![bullish(quiet(0, 100.0), 100.5), quiet(1, 100.0), quiet(2, 100.0)];
    let result = run(bars, &engine(FillTiming::SameBarClose));
    assert!(result.trades.is_empty());
    assert_eq!(result.signal_count, 0);
}

// ──────────────────────────────────────────────
// Errors and accounting
// ──────────────────────────────────────────────

#[test]
fn no_qualifying_bars_is_insufficient_data() {
    let bars: Vec<Bar> = (0..5)
        .map(|i| Bar::new(t(i), 100.0, 100.1, 99.9, 100.0, 1.0).with_indicator("rsi", 50.0))
        .collect();
    let series = BarSeries::new(bars).unwrap();
    let err = run_simulation(&series, &baseline(), &EngineConfig::default()).unwrap_err();
    match err {
        SimError::InsufficientData {
            total_bars,
            required,
        } => {
            assert_eq!(total_bars, 5);
            assert_eq!(required, vec!["rsi", "macd", "macd_signal"]);
        }
        other => panic!("expected InsufficientData, got {other:?}"),
    }
}

#[test]
fn empty_series_is_insufficient_data() {
    let series = BarSeries::new(Vec::new()).unwrap();
    let err = run_simulation(&series, &baseline(), &EngineConfig::default()).unwrap_err();
    assert!(matches!(err, SimError::InsufficientData { total_bars: 0, .. }));
}

#[test]
fn final_equity_is_capital_plus_realized_pnl() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 100.0, 100.4, 99.7, 100.2).with_forecast(99.8),
        bearish(quiet(3, 100.2), 99.7),
        bar(4, 100.0, 100.1, 99.0, 99.1),
        quiet(5, 99.1),
    ];
    for timing in [FillTiming::SameBarClose, FillTiming::NextBarOpen] {
        let result = run(bars.clone(), &engine(timing));
        assert!(!result.trades.is_empty());
        assert_close(result.final_equity, 10_000.0 + result.total_pnl());
        assert_eq!(result.equity_curve[0].equity, 10_000.0);
        assert_eq!(result.equity_curve.len(), result.bar_count);
    }
}

#[test]
fn identical_inputs_identical_results() {
    let bars: Vec<Bar> = (0..300)
        .map(|i| {
            let close = 100.0 + (i as f64 * 0.17).sin() * 2.0;
            let forecast = close * (1.0 + (i as f64 * 0.31).cos() * 0.006);
            Bar::new(t(i), close - 0.1, close + 0.4, close - 0.5, close, 500.0)
                .with_indicator("rsi", 50.0 + (i as f64 * 0.05).sin() * 30.0)
                .with_indicator("macd", (i as f64 * 0.11).sin())
                .with_indicator("macd_signal", (i as f64 * 0.09).sin())
                .with_forecast(forecast)
        })
        .collect();
    let series = BarSeries::new(bars).unwrap();
    let policy = baseline();
    let config = EngineConfig::default();

    let a = run_simulation(&series, &policy, &config).unwrap();
    let b = run_simulation(&series, &policy, &config).unwrap();
    assert!(!a.trades.is_empty());
    assert_eq!(a, b);
}

// ──────────────────────────────────────────────
// Out of money
// ──────────────────────────────────────────────

fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    equity
        .iter()
        .map(|&e| {
            peak = peak.max(e);
            (e - peak) / peak
        })
        .fold(0.0, f64::min)
}

#[test]
fn gap_through_short_stop_floors_equity_at_zero() {
    let bars = vec![
        quiet(0, 100.0),
        bearish(quiet(1, 100.0), 99.5),
        // Opens far above the 100.5 stop: the fill at the open wipes out the account
        bar(2, 300.0, 301.0, 299.0, 300.0),
        bearish(quiet(3, 300.0), 298.0),
        quiet(4, 300.0),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));

    assert!(result.out_of_money);
    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].exit_reason, ExitReason::StopLoss);
    assert_close(result.trades[0].exit_price, 300.0);
    assert!(result.trades[0].pnl < -10_000.0);

    let equity = result.equity_values();
    assert_eq!(equity.len(), 5);
    assert_close(equity[1], 10_000.0 - 0.0004 * 9_500.0);
    assert_eq!(&equity[2..], &[0.0, 0.0, 0.0]);
    assert_eq!(result.final_equity, 0.0);
    assert!(max_drawdown(&equity) >= -1.0);
}

#[test]
fn ruin_on_entry_bar_liquidates_on_the_following_bar() {
    let bars = vec![
        quiet(0, 100.0),
        bearish(quiet(1, 100.0), 99.5),
        // Short filled at this open, then the close runs far past the stop
        bar(2, 100.0, 301.0, 99.9, 300.0),
        quiet(3, 300.0),
    ];
    let result = run(bars, &engine(FillTiming::NextBarOpen));

    assert!(result.out_of_money);
    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.side, PositionSide::Short);
    assert_eq!(trade.entry_time, t(2));
    assert!(trade.exit_time > trade.entry_time);

    let equity = result.equity_values();
    assert!(equity.iter().all(|&e| e >= 0.0));
    assert_eq!(equity[2], 0.0);
    assert_eq!(result.final_equity, 0.0);
    assert!(max_drawdown(&equity) >= -1.0);
}

#[test]
fn solvent_runs_are_not_out_of_money() {
    let bars = vec![
        quiet(0, 100.0),
        bullish(quiet(1, 100.0), 100.5),
        bar(2, 100.2, 101.5, 100.1, 101.2),
    ];
    let result = run(bars, &engine(FillTiming::SameBarClose));
    assert!(!result.out_of_money);
}
