//! Domain types for ScalpLab

pub mod bar;
pub mod equity;
pub mod position;
pub mod trade;

pub use bar::Bar;
pub use equity::{equity_values, EquityPoint};
pub use position::{Position, PositionSide, ProtectiveLevels};
pub use trade::{ExitReason, Trade};
