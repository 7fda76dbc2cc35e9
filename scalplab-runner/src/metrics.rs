//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: trade log and/or equity curve in, scalar
//! out. Trade returns are P&L over starting capital, so Sharpe here is a
//! per-trade ratio annualized with √252, not a per-bar one.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use scalplab_core::{RunResult, Trade};

const ANNUALIZATION: f64 = 252.0;

/// Aggregate performance metrics for a single run.
///
/// Fractions are stored as fractions; [`PerformanceMetrics::to_dictionary`]
/// produces the display form with `*_pct` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_return: f64,
    pub avg_win: f64,
    /// Mean P&L of losing trades (negative, or 0 without losers).
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    /// `+inf` when there are winners but no losers.
    #[serde(with = "unbounded")]
    pub profit_factor: f64,
    pub avg_trade_return: f64,
    pub std_trade_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub avg_drawdown: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_trade_duration_secs: Option<f64>,
    pub max_trade_duration_secs: Option<f64>,
    pub min_trade_duration_secs: Option<f64>,
    pub avg_bars_held: f64,
    pub final_equity: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a trade log, an equity curve and starting capital.
    pub fn compute(trades: &[Trade], equity_curve: &[f64], starting_capital: f64) -> Self {
        let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
        let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
        let returns = trade_returns(trades, starting_capital);
        let drawdowns = drawdown_series(equity_curve);
        let durations: Vec<f64> = trades
            .iter()
            .map(|t| t.duration().num_milliseconds() as f64 / 1_000.0)
            .collect();
        let total_pnl: f64 = trades.iter().map(|t| t.pnl).sum();

        Self {
            total_trades: trades.len(),
            winning_trades: wins.len(),
            losing_trades: losses.len(),
            win_rate: win_rate(trades),
            total_pnl,
            total_return: if starting_capital > 0.0 {
                total_pnl / starting_capital
            } else {
                0.0
            },
            avg_win: mean_f64(&wins),
            avg_loss: mean_f64(&losses),
            largest_win: trades.iter().map(|t| t.pnl).fold(None, max_opt).unwrap_or(0.0),
            largest_loss: trades.iter().map(|t| t.pnl).fold(None, min_opt).unwrap_or(0.0),
            profit_factor: profit_factor(trades),
            avg_trade_return: mean_f64(&returns),
            std_trade_return: std_dev(&returns),
            sharpe: sharpe_ratio(&returns),
            max_drawdown: drawdowns.iter().copied().fold(0.0, f64::min),
            avg_drawdown: avg_drawdown(&drawdowns),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            avg_trade_duration_secs: (!durations.is_empty()).then(|| mean_f64(&durations)),
            max_trade_duration_secs: durations.iter().copied().fold(None, max_opt),
            min_trade_duration_secs: durations.iter().copied().fold(None, min_opt),
            avg_bars_held: mean_f64(
                &trades.iter().map(|t| t.bars_held() as f64).collect::<Vec<_>>(),
            ),
            final_equity: equity_curve.last().copied().unwrap_or(starting_capital),
        }
    }

    pub fn from_run(result: &RunResult) -> Self {
        Self::compute(
            &result.trades,
            &result.equity_values(),
            result.starting_capital,
        )
    }

    /// Display form: fractions become `*_pct` percentages, durations become text.
    pub fn to_dictionary(&self) -> BTreeMap<&'static str, MetricValue> {
        use MetricValue::{Count, Text, Value};

        let duration = |secs: Option<f64>| Text(secs.map_or_else(|| "n/a".into(), format_duration));
        BTreeMap::from([
            ("total_trades", Count(self.total_trades)),
            ("winning_trades", Count(self.winning_trades)),
            ("losing_trades", Count(self.losing_trades)),
            ("win_rate_pct", Value(self.win_rate * 100.0)),
            ("total_pnl", Value(self.total_pnl)),
            ("total_return_pct", Value(self.total_return * 100.0)),
            ("avg_win", Value(self.avg_win)),
            ("avg_loss", Value(self.avg_loss)),
            ("largest_win", Value(self.largest_win)),
            ("largest_loss", Value(self.largest_loss)),
            ("profit_factor", Value(self.profit_factor)),
            ("avg_return_pct", Value(self.avg_trade_return * 100.0)),
            ("std_return_pct", Value(self.std_trade_return * 100.0)),
            ("sharpe_ratio", Value(self.sharpe)),
            ("max_drawdown_pct", Value(self.max_drawdown * 100.0)),
            ("avg_drawdown_pct", Value(self.avg_drawdown * 100.0)),
            ("max_consecutive_wins", Count(self.max_consecutive_wins)),
            ("max_consecutive_losses", Count(self.max_consecutive_losses)),
            ("avg_trade_duration", duration(self.avg_trade_duration_secs)),
            ("max_trade_duration", duration(self.max_trade_duration_secs)),
            ("min_trade_duration", duration(self.min_trade_duration_secs)),
            ("avg_bars_held", Value(self.avg_bars_held)),
            ("final_equity", Value(self.final_equity)),
        ])
    }
}

/// JSON has no infinity: `+inf` is written as `null` and read back as `+inf`.
mod unbounded {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::INFINITY))
    }
}

/// One entry of the metrics dictionary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Count(usize),
    Value(f64),
    Text(String),
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Count(n) => write!(f, "{n}"),
            MetricValue::Value(v) => write!(f, "{v:.4}"),
            MetricValue::Text(s) => f.write_str(s),
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Fraction of trades with positive P&L.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64
}

/// `|avg_win × wins / (avg_loss × losses)|`.
///
/// `+inf` whenever no trade lost (including an empty log); 0.0 with losers
/// but no winners.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_loss: f64 = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).sum();
    if gross_loss == 0.0 {
        return f64::INFINITY;
    }
    let gross_profit: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
    (gross_profit / gross_loss).abs()
}

/// Per-trade returns: P&L over starting capital.
pub fn trade_returns(trades: &[Trade], starting_capital: f64) -> Vec<f64> {
    if starting_capital <= 0.0 {
        return vec![0.0; trades.len()];
    }
    trades.iter().map(|t| t.pnl / starting_capital).collect()
}

/// Annualized Sharpe over trade returns: mean / sample std × √252.
///
/// Returns 0.0 with fewer than two trades or zero variance.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(returns) / std * ANNUALIZATION.sqrt()
}

/// `(equity − running max) / running max` at every point; each entry ≤ 0.
pub fn drawdown_series(equity_curve: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    equity_curve
        .iter()
        .map(|&eq| {
            peak = peak.max(eq);
            if peak > 0.0 {
                (eq - peak) / peak
            } else {
                0.0
            }
        })
        .collect()
}

/// Maximum drawdown as a negative fraction (e.g. -0.15 = 15% drawdown).
///
/// Returns 0.0 if equity never falls below a previous peak.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    drawdown_series(equity_curve)
        .into_iter()
        .fold(0.0, f64::min)
}

/// Mean of the strictly negative drawdown entries, 0.0 if there are none.
pub fn avg_drawdown(drawdowns: &[f64]) -> f64 {
    let underwater: Vec<f64> = drawdowns.iter().copied().filter(|d| *d < 0.0).collect();
    mean_f64(&underwater)
}

pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    max_consecutive(trades, true)
}

/// Longest run of non-winning trades (a break-even trade extends a losing run).
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    max_consecutive(trades, false)
}

/// `H:MM:SS`, with a day prefix past 24 hours.
pub fn format_duration(secs: f64) -> String {
    let total = secs.round().max(0.0) as u64;
    let (days, rem) = (total / 86_400, total % 86_400);
    let (h, m, s) = (rem / 3_600, (rem % 3_600) / 60, rem % 60);
    if days > 0 {
        format!("{days}d {h}:{m:02}:{s:02}")
    } else {
        format!("{h}:{m:02}:{s:02}")
    }
}

// ─── Helpers ────────────────────────────────────────────────────────

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n − 1).
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_opt(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(acc.map_or(v, |a| a.max(v)))
}

fn min_opt(acc: Option<f64>, v: f64) -> Option<f64> {
    Some(acc.map_or(v, |a| a.min(v)))
}

fn max_consecutive(trades: &[Trade], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
