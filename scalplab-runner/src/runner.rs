//! Single-run orchestration: settings + data in, [`BacktestResult`] out.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use scalplab_core::{
    run_simulation, ConfigError, EngineConfig, IndicatorColumns, RunResult, SignalPolicy,
    SimError, StrategyConfig, Trade,
};

use crate::data_loader::{LoadError, LoadedData};
use crate::metrics::PerformanceMetrics;
use crate::settings::{Settings, SettingsError};

/// Content-addressed identifier of a run.
pub type RunId = String;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("settings error: {0}")]
    Settings(#[from] SettingsError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("simulation failed: {0}")]
    Simulation(#[from] SimError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub strategy: StrategyConfig,
    pub engine: EngineConfig,
    pub columns: IndicatorColumns,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub run: RunResult,
    pub metrics: PerformanceMetrics,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// BLAKE3 over the canonical JSON of the inputs that determine a run.
pub fn run_id(
    strategy: &StrategyConfig,
    engine: &EngineConfig,
    columns: &IndicatorColumns,
    dataset_hash: &str,
) -> RunId {
    let mut hasher = blake3::Hasher::new();
    for part in [
        serde_json::to_string(strategy),
        serde_json::to_string(engine),
        serde_json::to_string(columns),
    ] {
        // These types contain only plain fields; serialization cannot fail.
        hasher.update(part.unwrap_or_default().as_bytes());
    }
    hasher.update(dataset_hash.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Run one strategy over pre-loaded data. No I/O.
pub fn run_backtest(
    data: &LoadedData,
    strategy: &StrategyConfig,
    engine: &EngineConfig,
    columns: &IndicatorColumns,
) -> Result<BacktestResult, RunError> {
    let policy = SignalPolicy::new(strategy.clone(), columns.clone())?;
    let run = run_simulation(&data.series, &policy, engine)?;
    let metrics = PerformanceMetrics::from_run(&run);

    info!(
        strategy = %strategy.name,
        bars = run.bar_count,
        skipped = run.skipped_bars,
        trades = metrics.total_trades,
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: run_id(strategy, engine, columns, &data.dataset_hash),
        strategy: strategy.clone(),
        engine: engine.clone(),
        columns: columns.clone(),
        dataset_hash: data.dataset_hash.clone(),
        has_synthetic: data.is_synthetic(),
        start: run.equity_curve.first().map(|p| p.timestamp),
        end: run.equity_curve.last().map(|p| p.timestamp),
        run,
        metrics,
    })
}

/// Run the strategy named by `settings` over `data`.
pub fn run_from_settings(
    settings: &Settings,
    data: &LoadedData,
) -> Result<BacktestResult, RunError> {
    let strategy = settings.strategy_config()?;
    run_backtest(data, &strategy, &settings.engine, &settings.columns)
}

impl BacktestResult {
    pub fn trades(&self) -> &[Trade] {
        &self.run.trades
    }

    /// Plain-text results block for terminal output.
    pub fn summary(&self) -> String {
        let m = &self.metrics;
        let rule = "=".repeat(60);
        let trade_pct = |f: fn(f64, f64) -> f64, init: f64| {
            let value = self
                .run
                .trades
                .iter()
                .map(|t| t.return_pct() * 100.0)
                .fold(init, f);
            if value.is_finite() {
                value
            } else {
                0.0
            }
        };
        let avg_trade_pct = if self.run.trades.is_empty() {
            0.0
        } else {
            self.run.trades.iter().map(|t| t.return_pct()).sum::<f64>() * 100.0
                / self.run.trades.len() as f64
        };

        let mut out = String::new();
        let _ = writeln!(out, "{rule}");
        let _ = writeln!(out, "BACKTEST RESULTS: {}", self.strategy.name);
        let _ = writeln!(out, "{rule}");
        if self.has_synthetic {
            let _ = writeln!(out, "  Data:                     SYNTHETIC");
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            let _ = writeln!(out, "  Period:                   {start} to {end}");
        }
        let _ = writeln!(
            out,
            "  Bars:                     {} ({} skipped)",
            self.run.bar_count, self.run.skipped_bars
        );
        let _ = writeln!(out, "\nPerformance:");
        let _ = writeln!(out, "  Start Value:              ${:.2}", self.run.starting_capital);
        let _ = writeln!(out, "  End Value:                ${:.2}", self.run.final_equity);
        let _ = writeln!(out, "  Return:                   {:.2}%", m.total_return * 100.0);
        let _ = writeln!(out, "  Max Drawdown:             {:.2}%", m.max_drawdown * 100.0);
        let _ = writeln!(out, "  Sharpe Ratio:             {:.2}", m.sharpe);
        let _ = writeln!(out, "\nTrades:");
        let _ = writeln!(out, "  Total Trades:             {}", m.total_trades);
        let _ = writeln!(out, "  Win Rate:                 {:.2}%", m.win_rate * 100.0);
        let best = trade_pct(f64::max, f64::NEG_INFINITY);
        let worst = trade_pct(f64::min, f64::INFINITY);
        let _ = writeln!(out, "  Best Trade:               {best:.2}%");
        let _ = writeln!(out, "  Worst Trade:              {worst:.2}%");
        let _ = writeln!(out, "  Avg Trade:                {avg_trade_pct:.2}%");
        let _ = writeln!(out, "  Profit Factor:            {:.2}", m.profit_factor);
        let _ = writeln!(out, "  Commission Paid:          ${:.2}", self.run.commission_paid);
        let _ = writeln!(out, "{rule}");
        out
    }
}
