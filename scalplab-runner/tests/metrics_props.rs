//! Property tests for performance metrics.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use scalplab_core::{ExitReason, PositionSide, Trade};
use scalplab_runner::metrics::{drawdown_series, max_drawdown, profit_factor, sharpe_ratio};
use scalplab_runner::PerformanceMetrics;

const CAPITAL: f64 = 10_000.0;

fn trade(i: usize, pnl: f64) -> Trade {
    let entry_time =
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(10 * i as i64);
    Trade {
        side: PositionSide::Short,
        entry_time,
        entry_price: 100.0,
        entry_bar: 10 * i,
        exit_time: entry_time + Duration::minutes(3),
        exit_price: 100.0 - pnl / 10.0,
        exit_reason: ExitReason::SignalReversal,
        exit_bar: 10 * i + 3,
        size: 10.0,
        gross_pnl: pnl,
        commission: 0.0,
        pnl,
    }
}

/// Trades from P&Ls, plus the equity curve they produce after each trade.
fn book(pnls: &[f64]) -> (Vec<Trade>, Vec<f64>) {
    let trades: Vec<Trade> = pnls.iter().enumerate().map(|(i, &p)| trade(i, p)).collect();
    let mut equity = vec![CAPITAL];
    for p in pnls {
        let last = equity[equity.len() - 1];
        equity.push(last + p);
    }
    (trades, equity)
}

fn arb_pnls() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-150.0..150.0_f64, 0..60)
}

proptest! {
    #[test]
    fn counts_and_rates_are_consistent(pnls in arb_pnls()) {
        let (trades, equity) = book(&pnls);
        let m = PerformanceMetrics::compute(&trades, &equity, CAPITAL);

        prop_assert_eq!(m.total_trades, pnls.len());
        prop_assert!(m.winning_trades + m.losing_trades <= m.total_trades);
        prop_assert!((0.0..=1.0).contains(&m.win_rate));
        prop_assert!(m.max_consecutive_wins <= m.winning_trades);
        prop_assert!(m.max_consecutive_losses <= m.total_trades - m.winning_trades);
        prop_assert!((m.final_equity - (CAPITAL + m.total_pnl)).abs() < 1e-6);
        prop_assert!((m.total_return - m.total_pnl / CAPITAL).abs() < 1e-12);
    }

    #[test]
    fn drawdown_is_bounded(pnls in arb_pnls()) {
        let (_, equity) = book(&pnls);
        let dd = drawdown_series(&equity);
        prop_assert_eq!(dd.len(), equity.len());
        for d in &dd {
            prop_assert!((-1.0..=0.0).contains(d));
        }
        let max = max_drawdown(&equity);
        prop_assert!((-1.0..=0.0).contains(&max));

        let never_falls = equity.windows(2).all(|w| w[1] >= w[0]);
        prop_assert_eq!(max == 0.0, never_falls);
    }

    #[test]
    fn profit_factor_is_non_negative(pnls in arb_pnls()) {
        let (trades, _) = book(&pnls);
        let pf = profit_factor(&trades);
        prop_assert!(pf >= 0.0);
        let has_loser = pnls.iter().any(|p| *p < 0.0);
        if has_loser {
            prop_assert!(pf.is_finite());
        } else {
            prop_assert_eq!(pf, f64::INFINITY);
        }
    }

    #[test]
    fn sharpe_is_finite_and_scale_free(returns in prop::collection::vec(-0.05..0.05_f64, 2..40)) {
        let s = sharpe_ratio(&returns);
        prop_assert!(s.is_finite());

        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let spread = returns.iter().map(|r| (r - mean).abs()).fold(0.0, f64::max);
        prop_assume!(spread > 1e-9);
        let scaled: Vec<f64> = returns.iter().map(|r| r * 3.0).collect();
        prop_assert!((s - sharpe_ratio(&scaled)).abs() < 1e-6 * s.abs().max(1.0));
    }
}
