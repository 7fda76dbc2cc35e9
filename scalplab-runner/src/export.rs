//! Artifact export: JSON and CSV.
//!
//! - **JSON**: full `BacktestResult` with `schema_version`; metrics dictionary
//! - **CSV**: trade log, equity curve, search candidates
//!
//! Unknown (newer) schema versions are rejected on load.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use scalplab_core::domain::{EquityPoint, Trade};

use crate::runner::{BacktestResult, SCHEMA_VERSION};
use crate::search::SearchOutcome;

// ─── JSON ───────────────────────────────────────────────────────────

pub fn export_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to serialize BacktestResult to JSON")
}

/// Deserialize a `BacktestResult`, rejecting unknown schema versions.
pub fn import_json(json: &str) -> Result<BacktestResult> {
    let result: BacktestResult =
        serde_json::from_str(json).context("failed to deserialize BacktestResult from JSON")?;
    if result.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            result.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(result)
}

/// The display-form metrics dictionary as pretty JSON.
pub fn export_metrics_json(result: &BacktestResult) -> Result<String> {
    serde_json::to_string_pretty(&result.metrics.to_dictionary())
        .context("failed to serialize metrics dictionary")
}

// ─── CSV ────────────────────────────────────────────────────────────

pub fn export_trades_csv(trades: &[Trade]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "side",
        "entry_bar",
        "entry_time",
        "entry_price",
        "exit_bar",
        "exit_time",
        "exit_price",
        "exit_reason",
        "size",
        "gross_pnl",
        "commission",
        "pnl",
        "return_pct",
        "bars_held",
    ])?;

    for t in trades {
        wtr.write_record([
            &format!("{:?}", t.side),
            &t.entry_bar.to_string(),
            &t.entry_time.to_rfc3339(),
            &format!("{:.6}", t.entry_price),
            &t.exit_bar.to_string(),
            &t.exit_time.to_rfc3339(),
            &format!("{:.6}", t.exit_price),
            &t.exit_reason.to_string(),
            &format!("{:.8}", t.size),
            &format!("{:.4}", t.gross_pnl),
            &format!("{:.4}", t.commission),
            &format!("{:.4}", t.pnl),
            &format!("{:.4}", t.return_pct() * 100.0),
            &t.bars_held().to_string(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn export_equity_csv(equity_curve: &[EquityPoint]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["bar_index", "timestamp", "equity"])?;
    for (i, point) in equity_curve.iter().enumerate() {
        wtr.write_record([
            &i.to_string(),
            &point.timestamp.to_rfc3339(),
            &format!("{:.2}", point.equity),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Every scored combination, best first.
pub fn export_search_csv(outcome: &SearchOutcome) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "rank",
        "index",
        "threshold",
        "stop_loss_pct",
        "take_profit_pct",
        "position_size",
        "score",
        "total_return_pct",
        "sharpe",
        "max_drawdown_pct",
        "win_rate_pct",
        "trades",
    ])?;
    for (rank, c) in outcome.ranked().into_iter().enumerate() {
        let m = &c.metrics;
        wtr.write_record([
            &(rank + 1).to_string(),
            &c.index.to_string(),
            &c.config.threshold.to_string(),
            &c.config.stop_loss_pct.to_string(),
            &c.config.take_profit_pct.to_string(),
            &c.config.position_size.to_string(),
            &format!("{:.6}", c.score),
            &format!("{:.4}", m.total_return * 100.0),
            &format!("{:.4}", m.sharpe),
            &format!("{:.4}", m.max_drawdown * 100.0),
            &format!("{:.2}", m.win_rate * 100.0),
            &m.total_trades.to_string(),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

// ─── Artifact bundle ────────────────────────────────────────────────

/// Save the artifact set for one run under `output_dir`.
///
/// Creates `{strategy}_{run_id prefix}/` containing `manifest.json`,
/// `metrics.json`, `trades.csv` and `equity.csv`. Returns the directory.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<PathBuf> {
    let short_id: String = result.run_id.chars().take(12).collect();
    let run_dir = output_dir.join(format!("{}_{}", result.strategy.name, short_id));
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("failed to create artifact dir: {}", run_dir.display()))?;

    write(&run_dir.join("manifest.json"), &export_json(result)?)?;
    write(&run_dir.join("metrics.json"), &export_metrics_json(result)?)?;
    write(&run_dir.join("trades.csv"), &export_trades_csv(result.trades())?)?;
    write(&run_dir.join("equity.csv"), &export_equity_csv(&result.run.equity_curve)?)?;

    Ok(run_dir)
}

/// Load a `BacktestResult` from an artifact directory's manifest.json.
pub fn load_artifacts(dir: &Path) -> Result<BacktestResult> {
    let manifest_path = dir.join("manifest.json");
    let json = std::fs::read_to_string(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    import_json(&json)
}

fn write(path: &Path, contents: &str) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
