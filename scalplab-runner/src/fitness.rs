//! Fitness function: configurable metric selector for parameter search.

use crate::metrics::PerformanceMetrics;
use serde::{Deserialize, Serialize};

/// Which metric to optimize.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitnessMetric {
    #[default]
    Sharpe,
    TotalReturn,
    WinRate,
    ProfitFactor,
    MaxDrawdown,
    FinalEquity,
}

impl FitnessMetric {
    /// Extract the relevant metric value from a PerformanceMetrics struct.
    pub fn extract(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            Self::Sharpe => metrics.sharpe,
            Self::TotalReturn => metrics.total_return,
            Self::WinRate => metrics.win_rate,
            Self::ProfitFactor => metrics.profit_factor,
            Self::MaxDrawdown => metrics.max_drawdown,
            Self::FinalEquity => metrics.final_equity,
        }
    }

    /// Compare two metric values. Returns true if `a` is strictly better than `b`.
    ///
    /// `a > b` holds for every metric: for MaxDrawdown, -0.05 > -0.20 means
    /// the smaller drawdown wins. Strictness keeps the first of equal values.
    pub fn is_better(&self, a: f64, b: f64) -> bool {
        a > b
    }
}

impl std::str::FromStr for FitnessMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sharpe" => Ok(Self::Sharpe),
            "total_return" | "return" => Ok(Self::TotalReturn),
            "win_rate" => Ok(Self::WinRate),
            "profit_factor" => Ok(Self::ProfitFactor),
            "max_drawdown" => Ok(Self::MaxDrawdown),
            "final_equity" => Ok(Self::FinalEquity),
            other => Err(format!("unknown fitness metric '{other}'")),
        }
    }
}
