//! Path policy: resolve bars whose range touches a protective level.
//!
//! A bar only reports open/high/low/close, so when its range spans both the
//! stop-loss and the take-profit the order of touches is unknown. The policy
//! decides which one is assumed to have filled. A level the bar *opens*
//! beyond is resolved first regardless of policy, and fills at the open.

use serde::{Deserialize, Serialize};

use crate::domain::{Bar, ExitReason, Position, PositionSide};

/// Intrabar ambiguity resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntrabarPolicy {
    /// Stop-loss before take-profit (assume the worse outcome).
    #[default]
    WorstCase,
    /// Take-profit before stop-loss.
    BestCase,
}

/// A protective order that fired on a bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProtectiveFill {
    pub reason: ExitReason,
    pub price: f64,
    /// True when the bar opened beyond the level and filled at the open.
    pub gapped: bool,
}

/// Determine whether `bar` triggers the position's stop-loss or take-profit.
pub fn protective_exit(
    position: &Position,
    bar: &Bar,
    policy: IntrabarPolicy,
) -> Option<ProtectiveFill> {
    let stop = position.stop_price;
    let target = position.take_profit_price;

    let (stop_gapped, target_gapped, stop_hit, target_hit) = match position.side {
        PositionSide::Long => (
            bar.open <= stop,
            bar.open >= target,
            bar.low <= stop,
            bar.high >= target,
        ),
        PositionSide::Short => (
            bar.open >= stop,
            bar.open <= target,
            bar.high >= stop,
            bar.low <= target,
        ),
    };

    if stop_gapped {
        return Some(ProtectiveFill {
            reason: ExitReason::StopLoss,
            price: bar.open,
            gapped: true,
        });
    }
    if target_gapped {
        return Some(ProtectiveFill {
            reason: ExitReason::TakeProfit,
            price: bar.open,
            gapped: true,
        });
    }

    let stop_fill = stop_hit.then_some(ProtectiveFill {
        reason: ExitReason::StopLoss,
        price: stop,
        gapped: false,
    });
    let target_fill = target_hit.then_some(ProtectiveFill {
        reason: ExitReason::TakeProfit,
        price: target,
        gapped: false,
    });

    match policy {
        IntrabarPolicy::WorstCase => stop_fill.or(target_fill),
        IntrabarPolicy::BestCase => target_fill.or(stop_fill),
    }
}
