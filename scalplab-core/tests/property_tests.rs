//! Property tests for engine invariants.
//!
//! Uses proptest to verify, for arbitrary bar paths under both fill timings:
//! 1. Every run ends flat: final equity == capital + Σ trade P&L
//! 2. Every trade exits strictly after it enters, and trades never overlap
//! 3. One equity point per simulated bar, the first equal to starting capital
//! 4. No NaN anywhere in the equity curve or trade log

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use scalplab_core::{
    run_simulation, Bar, BarSeries, EngineConfig, FillTiming, SignalPolicy, StrategyConfig,
};

/// (return, range, oscillator, trend, forecast noise) per bar.
type Step = (f64, f64, f64, f64, f64);

fn build_series(steps: &[Step]) -> BarSeries {
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut price = 100.0;
    let bars = steps
        .iter()
        .enumerate()
        .map(|(i, &(ret, range, oscillator, trend, noise))| {
            let open = price;
            let close = price * (1.0 + ret);
            let high = open.max(close) * (1.0 + range);
            let low = open.min(close) * (1.0 - range);
            price = close;
            Bar::new(t0 + Duration::minutes(i as i64), open, high, low, close, 1_000.0)
                .with_indicator("rsi", oscillator)
                .with_indicator("macd", trend)
                .with_indicator("macd_signal", 0.0)
                .with_forecast(close * (1.0 + noise))
        })
        .collect();
    BarSeries::new(bars).unwrap()
}

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_steps() -> impl Strategy<Value = Vec<Step>> {
    prop::collection::vec(
        (
            -0.01..0.01_f64,
            0.0..0.008_f64,
            0.0..100.0_f64,
            -1.0..1.0_f64,
            -0.01..0.01_f64,
        ),
        2..150,
    )
}

fn arb_timing() -> impl Strategy<Value = FillTiming> {
    prop_oneof![Just(FillTiming::SameBarClose), Just(FillTiming::NextBarOpen)]
}

fn arb_preset() -> impl Strategy<Value = StrategyConfig> {
    prop_oneof![
        Just(StrategyConfig::baseline()),
        Just(StrategyConfig::aggressive()),
        Just(StrategyConfig::conservative()),
    ]
}

proptest! {
    #[test]
    fn runs_end_flat_with_consistent_accounting(
        steps in arb_steps(),
        timing in arb_timing(),
        preset in arb_preset(),
    ) {
        let series = build_series(&steps);
        let policy = SignalPolicy::with_default_columns(preset).unwrap();
        let config = EngineConfig::new(10_000.0, 0.0004, timing);
        let result = run_simulation(&series, &policy, &config).unwrap();

        // Recorded equity is floored at zero once the account is exhausted.
        let expected = (config.starting_capital + result.total_pnl()).max(0.0);
        prop_assert!((result.final_equity - expected).abs() < 1e-6 * expected.abs().max(1.0));
        prop_assert!(result.equity_curve.iter().all(|p| p.equity >= 0.0));
    }

    #[test]
    fn trades_exit_after_entry_and_never_overlap(
        steps in arb_steps(),
        timing in arb_timing(),
    ) {
        let series = build_series(&steps);
        let policy = SignalPolicy::with_default_columns(StrategyConfig::aggressive()).unwrap();
        let config = EngineConfig::new(10_000.0, 0.0004, timing);
        let result = run_simulation(&series, &policy, &config).unwrap();

        for trade in &result.trades {
            prop_assert!(trade.exit_time > trade.entry_time);
            prop_assert!(trade.exit_bar > trade.entry_bar);
            prop_assert!(trade.size > 0.0);
        }
        for pair in result.trades.windows(2) {
            prop_assert!(pair[0].exit_time <= pair[1].entry_time);
        }
    }

    #[test]
    fn equity_curve_shape(
        steps in arb_steps(),
        timing in arb_timing(),
    ) {
        let series = build_series(&steps);
        let policy = SignalPolicy::with_default_columns(StrategyConfig::baseline()).unwrap();
        let config = EngineConfig::new(10_000.0, 0.0004, timing);
        let result = run_simulation(&series, &policy, &config).unwrap();

        prop_assert_eq!(result.equity_curve.len(), steps.len());
        prop_assert_eq!(result.bar_count, steps.len());
        prop_assert_eq!(result.equity_curve[0].equity, 10_000.0);
        prop_assert!(result.equity_curve.iter().all(|p| p.equity.is_finite()));
        prop_assert!(result.trades.iter().all(|t| t.pnl.is_finite()));
    }

    #[test]
    fn frictionless_flat_market_keeps_capital(n in 2..100_usize) {
        let steps: Vec<Step> = (0..n).map(|_| (0.0, 0.0, 50.0, 1.0, 0.0)).collect();
        let series = build_series(&steps);
        let policy = SignalPolicy::with_default_columns(StrategyConfig::baseline()).unwrap();
        let config = EngineConfig::new(10_000.0, 0.0, FillTiming::NextBarOpen);
        let result = run_simulation(&series, &policy, &config).unwrap();

        prop_assert!(result.trades.is_empty());
        prop_assert!(result.equity_curve.iter().all(|p| p.equity == 10_000.0));
    }
}
