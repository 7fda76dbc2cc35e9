//! ScalpLab CLI: run, compare and optimize commands.
//!
//! Commands:
//! - `run`: backtest one strategy and save its artifacts
//! - `compare`: backtest the default/aggressive/conservative presets side by side
//! - `optimize`: grid-search strategy parameters for the best objective value
//!
//! Bars come from `--data <csv>` or, with `--synthetic`, from a seeded random walk.
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use scalplab_core::FillTiming;
use scalplab_runner::export::{export_search_csv, save_artifacts};
use scalplab_runner::synthetic::generate;
use scalplab_runner::{
    compare_presets, format_table, load_csv, run_from_settings, FitnessMetric, LoadedData,
    ParameterSearch, Settings,
};

#[derive(Parser)]
#[command(
    name = "scalplab",
    about = "ScalpLab CLI: forecast-driven intraday strategy backtester"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Input {
    /// Path to a TOML settings file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// CSV file of bars with indicator and forecast columns.
    #[arg(long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Use a deterministic synthetic series instead of a CSV file.
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Synthetic series length (overrides the settings file).
    #[arg(long, requires = "synthetic")]
    bars: Option<usize>,

    /// Synthetic series seed (overrides the settings file).
    #[arg(long, requires = "synthetic")]
    seed: Option<u64>,

    /// Fill timing override: same_bar_close or next_bar_open.
    #[arg(long)]
    fill_timing: Option<String>,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest one strategy.
    Run {
        #[command(flatten)]
        input: Input,

        /// Strategy preset override: default, aggressive, conservative.
        #[arg(long)]
        preset: Option<String>,
    },
    /// Compare the three strategy presets on the same bars.
    Compare {
        #[command(flatten)]
        input: Input,
    },
    /// Grid-search strategy parameters.
    Optimize {
        #[command(flatten)]
        input: Input,

        /// Objective: sharpe, total_return, win_rate, profit_factor, max_drawdown, final_equity.
        #[arg(long)]
        objective: Option<String>,

        /// Evaluate combinations in parallel.
        #[arg(long, default_value_t = false)]
        parallel: bool,

        /// How many top combinations to print.
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { input, preset } => run_cmd(&input, preset),
        Commands::Compare { input } => compare_cmd(&input),
        Commands::Optimize {
            input,
            objective,
            parallel,
            top,
        } => optimize_cmd(&input, objective, parallel, top),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Settings file (or defaults) with command-line overrides applied.
fn load_settings(input: &Input) -> Result<Settings> {
    let mut settings = match &input.config {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(timing) = &input.fill_timing {
        settings.engine.fill_timing = parse_fill_timing(timing)?;
    }
    if let Some(bars) = input.bars {
        settings.synthetic.bars = bars;
    }
    if let Some(seed) = input.seed {
        settings.synthetic.seed = seed;
    }
    Ok(settings)
}

fn parse_fill_timing(value: &str) -> Result<FillTiming> {
    match value {
        "same_bar_close" | "close" => Ok(FillTiming::SameBarClose),
        "next_bar_open" | "open" => Ok(FillTiming::NextBarOpen),
        other => bail!("unknown fill timing '{other}' (expected same_bar_close or next_bar_open)"),
    }
}

fn load_data(input: &Input, settings: &Settings) -> Result<LoadedData> {
    let data = match (&input.data, input.synthetic) {
        (Some(path), false) => load_csv(path, &settings.data)
            .with_context(|| format!("failed to load bars from {}", path.display())),
        (None, true) => Ok(generate(&settings.synthetic)),
        (None, false) => bail!("one of --data or --synthetic is required"),
        (Some(_), true) => bail!("--data and --synthetic are mutually exclusive"),
    }?;
    info!(
        source = ?data.source,
        bars = data.series.len(),
        dataset_hash = %data.dataset_hash,
        "bars ready"
    );
    Ok(data)
}

fn run_cmd(input: &Input, preset: Option<String>) -> Result<()> {
    let mut settings = load_settings(input)?;
    if let Some(preset) = preset {
        settings.strategy.preset = preset;
        settings.validate()?;
    }
    let data = load_data(input, &settings)?;

    let result = run_from_settings(&settings, &data).context("backtest failed")?;
    print!("{}", result.summary());

    let run_dir = save_artifacts(&result, &input.output_dir)?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn compare_cmd(input: &Input) -> Result<()> {
    let settings = load_settings(input)?;
    let data = load_data(input, &settings)?;

    let rows = compare_presets(&data, &settings.engine, &settings.columns)
        .context("strategy comparison failed")?;
    println!("STRATEGY COMPARISON");
    print!("{}", format_table(&rows));

    let path = input.output_dir.join("comparison.json");
    write_json(&path, &rows)?;
    println!("Comparison saved to: {}", path.display());
    Ok(())
}

fn optimize_cmd(
    input: &Input,
    objective: Option<String>,
    parallel: bool,
    top: usize,
) -> Result<()> {
    let settings = load_settings(input)?;
    let data = load_data(input, &settings)?;
    let objective: FitnessMetric = match objective {
        Some(name) => name.parse().map_err(anyhow::Error::msg)?,
        None => settings.search.objective,
    };

    let outcome = ParameterSearch::new(&data.series, settings.engine.clone())
        .with_columns(settings.columns.clone())
        .with_base(settings.strategy_config()?)
        .with_objective(objective)
        .with_parallelism(parallel || settings.search.parallel)
        .run(&settings.search.grid, None)
        .context("parameter search failed")?;

    println!(
        "Evaluated {} of {} combinations ({} excluded, {} invalid)",
        outcome.candidates.len(),
        outcome.total_combinations,
        outcome.excluded,
        outcome.skipped.len()
    );
    println!("{:>4} {:>10}  parameters", "rank", objective_label(objective));
    for (rank, candidate) in outcome.ranked().into_iter().take(top).enumerate() {
        println!(
            "{:>4} {:>10.4}  {}",
            rank + 1,
            candidate.score,
            candidate.config.label()
        );
    }
    println!("\nBest: {}", outcome.best.config.label());

    std::fs::create_dir_all(&input.output_dir)
        .with_context(|| format!("failed to create {}", input.output_dir.display()))?;
    let csv_path = input.output_dir.join("search.csv");
    std::fs::write(&csv_path, export_search_csv(&outcome)?)
        .with_context(|| format!("failed to write {}", csv_path.display()))?;
    let best_path = input.output_dir.join("best_config.json");
    write_json(&best_path, &outcome.best.config)?;
    println!("Search results saved to: {}", csv_path.display());
    Ok(())
}

fn objective_label(objective: FitnessMetric) -> &'static str {
    match objective {
        FitnessMetric::Sharpe => "sharpe",
        FitnessMetric::TotalReturn => "return",
        FitnessMetric::WinRate => "win_rate",
        FitnessMetric::ProfitFactor => "pf",
        FitnessMetric::MaxDrawdown => "max_dd",
        FitnessMetric::FinalEquity => "equity",
    }
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value).context("failed to serialize JSON")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}
