use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Equity at one bar close: cash plus the marked value of the open position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Project an equity curve onto its values.
pub fn equity_values(curve: &[EquityPoint]) -> Vec<f64> {
    curve.iter().map(|p| p.equity).collect()
}
