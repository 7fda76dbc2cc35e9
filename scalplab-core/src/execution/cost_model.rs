//! Cost model: proportional commission on every fill.
//!
//! Commission is symmetric: the same rate applies to entry and exit notional.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CommissionModel {
    /// Fraction of notional, e.g. 0.0004 = 4 bps.
    pub rate: f64,
}

impl CommissionModel {
    pub fn new(rate: f64) -> Self {
        Self { rate }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0)
    }

    /// `commission = rate * price * quantity`
    pub fn compute_commission(&self, fill_price: f64, quantity: f64) -> f64 {
        self.rate * fill_price * quantity
    }
}
