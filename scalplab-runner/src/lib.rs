//! ScalpLab Runner: backtest orchestration, metrics, parameter search, I/O.
//!
//! This crate builds on `scalplab-core` to provide:
//! - CSV bar loading and deterministic synthetic series
//! - TOML run settings
//! - Single-run orchestration with content-addressed run ids
//! - Performance metrics and a fitness selector
//! - Grid parameter search (optionally on rayon) and preset comparison
//! - JSON / CSV artifact export

pub mod compare;
pub mod data_loader;
pub mod export;
pub mod fitness;
pub mod metrics;
pub mod runner;
pub mod search;
pub mod settings;
pub mod synthetic;

pub use compare::{compare, compare_presets, format_table, ComparisonRow};
pub use data_loader::{
    dataset_hash, load_csv, read_bars, DataSource, LoadError, LoadOptions, LoadedData,
};
pub use fitness::FitnessMetric;
pub use metrics::{MetricValue, PerformanceMetrics};
pub use runner::{run_backtest, run_from_settings, BacktestResult, RunError, RunId, SCHEMA_VERSION};
pub use search::{
    reward_exceeds_risk, Candidate, ParamGrid, ParameterSearch, SearchError, SearchOutcome,
    SkippedCombination,
};
pub use settings::{SearchSettings, Settings, SettingsError, StrategySettings};
pub use synthetic::SyntheticSpec;
