//! Simulation engine: the bar-by-bar loop that drives the ledger.
//!
//! Per bar, in order:
//! 0. Start-of-bar: fill the order left pending by the previous bar (next-bar-open only)
//! 1. Intrabar: stop-loss / take-profit checks on the open position
//! 2. Close: consult the signal policy, exit or enter
//! 3. Post-bar: mark-to-market and record equity
//!
//! The final bar force-closes anything still open.

pub mod loop_runner;
pub mod state;

pub use loop_runner::{run_simulation, SimulationEngine};
pub use state::{EnginePhase, PendingOrder, RunResult};
