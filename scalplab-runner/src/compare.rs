//! Side-by-side comparison of strategy presets on one series.

use std::fmt::Write as _;

use serde::Serialize;

use scalplab_core::{EngineConfig, IndicatorColumns, StrategyConfig};

use crate::data_loader::LoadedData;
use crate::runner::{run_backtest, BacktestResult, RunError};

/// One row of the comparison table, in display units.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub strategy: String,
    pub return_pct: f64,
    pub sharpe: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub trades: usize,
}

impl From<&BacktestResult> for ComparisonRow {
    fn from(result: &BacktestResult) -> Self {
        let m = &result.metrics;
        Self {
            strategy: result.strategy.name.clone(),
            return_pct: m.total_return * 100.0,
            sharpe: m.sharpe,
            max_drawdown_pct: m.max_drawdown * 100.0,
            win_rate_pct: m.win_rate * 100.0,
            trades: m.total_trades,
        }
    }
}

/// Run each of `strategies` over the same data, preserving order.
pub fn compare(
    data: &LoadedData,
    strategies: &[StrategyConfig],
    engine: &EngineConfig,
    columns: &IndicatorColumns,
) -> Result<Vec<BacktestResult>, RunError> {
    strategies
        .iter()
        .map(|strategy| run_backtest(data, strategy, engine, columns))
        .collect()
}

/// The three presets, in the order they are reported.
pub fn presets() -> Vec<StrategyConfig> {
    vec![
        StrategyConfig::baseline(),
        StrategyConfig::aggressive(),
        StrategyConfig::conservative(),
    ]
}

pub fn compare_presets(
    data: &LoadedData,
    engine: &EngineConfig,
    columns: &IndicatorColumns,
) -> Result<Vec<ComparisonRow>, RunError> {
    let results = compare(data, &presets(), engine, columns)?;
    Ok(results.iter().map(ComparisonRow::from).collect())
}

/// Fixed-width table of comparison rows.
pub fn format_table(rows: &[ComparisonRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<14} {:>10} {:>8} {:>12} {:>10} {:>7}",
        "Strategy", "Return %", "Sharpe", "Max DD %", "Win Rate %", "Trades"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<14} {:>10.2} {:>8.2} {:>12.2} {:>10.2} {:>7}",
            row.strategy,
            row.return_pct,
            row.sharpe,
            row.max_drawdown_pct,
            row.win_rate_pct,
            row.trades
        );
    }
    out
}
