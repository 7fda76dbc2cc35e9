//! ScalpLab Core: bar series, position ledger, signal policy, simulation engine.
//!
//! This crate is the deterministic heart of the backtester:
//! - Domain types (bars, positions, trades, equity points)
//! - `BarSeries` with ordering/sanity validation and input filtering
//! - `PositionLedger` with exclusive positions and commission accounting
//! - `SignalPolicy`, a pure forecast-confirmation decision rule
//! - `SimulationEngine`, the bar-by-bar state machine
//!
//! No I/O happens here; loading, metrics and search live in `scalplab-runner`.

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod ledger;
pub mod policy;
pub mod series;

pub use config::{ConfigError, EngineConfig, FillTiming, StrategyConfig};
pub use domain::{Bar, EquityPoint, ExitReason, Position, PositionSide, Trade};
pub use engine::{run_simulation, EnginePhase, RunResult, SimulationEngine};
pub use error::SimError;
pub use execution::IntrabarPolicy;
pub use ledger::PositionLedger;
pub use policy::{Action, IndicatorColumns, SignalPolicy};
pub use series::{BarSeries, SeriesError};
