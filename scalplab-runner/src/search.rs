//! Parameter search: exhaustive grid over strategy parameters.
//!
//! Enumeration order is fixed (threshold outermost, position size innermost)
//! and results are always collected in that order, so "first best wins" tie
//! breaking is identical with and without parallelism.

use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use scalplab_core::{
    run_simulation, BarSeries, EngineConfig, IndicatorColumns, SignalPolicy, SimError,
    StrategyConfig,
};

use crate::fitness::FitnessMetric;
use crate::metrics::PerformanceMetrics;

/// Values to try for each searchable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    pub thresholds: Vec<f64>,
    pub stop_loss_pcts: Vec<f64>,
    pub take_profit_pcts: Vec<f64>,
    pub position_sizes: Vec<f64>,
}

impl Default for ParamGrid {
    /// 4 × 4 × 4 × 4 grid around the preset values.
    fn default() -> Self {
        Self {
            thresholds: vec![0.001, 0.002, 0.003, 0.004],
            stop_loss_pcts: vec![0.003, 0.005, 0.007, 0.01],
            take_profit_pcts: vec![0.006, 0.01, 0.015, 0.02],
            position_sizes: vec![0.5, 0.7, 0.9, 0.95],
        }
    }
}

impl ParamGrid {
    /// Number of combinations before the constraint filter.
    pub fn size(&self) -> usize {
        self.thresholds.len()
            * self.stop_loss_pcts.len()
            * self.take_profit_pcts.len()
            * self.position_sizes.len()
    }

    /// Cartesian product applied to `base`, threshold outermost.
    pub fn combinations(&self, base: &StrategyConfig) -> Vec<StrategyConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &threshold in &self.thresholds {
            for &stop_loss_pct in &self.stop_loss_pcts {
                for &take_profit_pct in &self.take_profit_pcts {
                    for &position_size in &self.position_sizes {
                        configs.push(StrategyConfig {
                            name: format!("{}#{}", base.name, configs.len()),
                            threshold,
                            stop_loss_pct,
                            take_profit_pct,
                            position_size,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        configs
    }
}

/// Default constraint: the target must be further away than the stop.
pub fn reward_exceeds_risk(config: &StrategyConfig) -> bool {
    config.take_profit_pct > config.stop_loss_pct
}

type Constraint = dyn Fn(&StrategyConfig) -> bool + Send + Sync;

/// A combination that was simulated and scored.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    /// Position in grid enumeration order.
    pub index: usize,
    pub config: StrategyConfig,
    pub metrics: PerformanceMetrics,
    pub score: f64,
}

/// A combination rejected by config validation.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedCombination {
    pub index: usize,
    pub config: StrategyConfig,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub objective: FitnessMetric,
    pub best: Candidate,
    /// Every scored combination, in grid order.
    pub candidates: Vec<Candidate>,
    pub skipped: Vec<SkippedCombination>,
    /// Combinations removed by the constraint predicate.
    pub excluded: usize,
    pub total_combinations: usize,
    /// True when the cancel flag stopped the search early.
    pub cancelled: bool,
}

impl SearchOutcome {
    /// Candidates best-first; equal scores keep grid order.
    pub fn ranked(&self) -> Vec<&Candidate> {
        let mut ranked: Vec<&Candidate> = self.candidates.iter().collect();
        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(
        "no combination produced a result ({total} in grid, {excluded} excluded, {skipped} invalid)"
    )]
    NoCandidates {
        total: usize,
        excluded: usize,
        skipped: usize,
    },

    #[error("engine config rejected: {0}")]
    Engine(#[source] SimError),

    #[error("combination {index} ({label}) failed: {source}")]
    Simulation {
        index: usize,
        label: String,
        #[source]
        source: SimError,
    },
}

enum Evaluation {
    Scored(Candidate),
    Skipped(SkippedCombination),
    Cancelled,
}

/// Grid search over one series with one engine config.
pub struct ParameterSearch<'a> {
    series: &'a BarSeries,
    engine: EngineConfig,
    columns: IndicatorColumns,
    base: StrategyConfig,
    objective: FitnessMetric,
    constraint: Box<Constraint>,
    parallel: bool,
}

impl<'a> ParameterSearch<'a> {
    pub fn new(series: &'a BarSeries, engine: EngineConfig) -> Self {
        Self {
            series,
            engine,
            columns: IndicatorColumns::default(),
            base: StrategyConfig::baseline(),
            objective: FitnessMetric::default(),
            constraint: Box::new(reward_exceeds_risk),
            parallel: false,
        }
    }

    pub fn with_columns(mut self, columns: IndicatorColumns) -> Self {
        self.columns = columns;
        self
    }

    /// Values for the parameters the grid does not vary (oscillator bounds).
    pub fn with_base(mut self, base: StrategyConfig) -> Self {
        self.base = base;
        self
    }

    pub fn with_objective(mut self, objective: FitnessMetric) -> Self {
        self.objective = objective;
        self
    }

    pub fn with_constraint<F>(mut self, constraint: F) -> Self
    where
        F: Fn(&StrategyConfig) -> bool + Send + Sync + 'static,
    {
        self.constraint = Box::new(constraint);
        self
    }

    /// Evaluate combinations on the rayon pool.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every admissible combination and pick the best.
    ///
    /// `cancel` is checked before each combination; when set, the search
    /// stops and returns the best of what finished.
    pub fn run(
        &self,
        grid: &ParamGrid,
        cancel: Option<&AtomicBool>,
    ) -> Result<SearchOutcome, SearchError> {
        self.engine.validate().map_err(|e| SearchError::Engine(e.into()))?;

        // Filter once; every combination reads the same columns. An empty
        // selection falls through so the engine reports the full bar count.
        let tradeable = self.series.tradeable(&self.columns.names());
        let series = if tradeable.is_empty() {
            self.series
        } else {
            &tradeable
        };

        let all = grid.combinations(&self.base);
        let total_combinations = all.len();
        let admissible: Vec<(usize, StrategyConfig)> = all
            .into_iter()
            .enumerate()
            .filter(|(_, config)| (self.constraint)(config))
            .collect();
        let excluded = total_combinations - admissible.len();
        info!(
            total = total_combinations,
            excluded,
            bars = series.len(),
            objective = ?self.objective,
            parallel = self.parallel,
            "parameter search started"
        );

        let evaluations: Vec<Evaluation> = if self.parallel {
            admissible
                .into_par_iter()
                .map(|(index, config)| self.evaluate(series, index, config, cancel))
                .collect::<Result<Vec<_>, SearchError>>()?
        } else {
            admissible
                .into_iter()
                .map(|(index, config)| self.evaluate(series, index, config, cancel))
                .collect::<Result<Vec<_>, SearchError>>()?
        };

        let mut candidates = Vec::new();
        let mut skipped = Vec::new();
        let mut cancelled = false;
        for evaluation in evaluations {
            match evaluation {
                Evaluation::Scored(candidate) => candidates.push(candidate),
                Evaluation::Skipped(skip) => skipped.push(skip),
                Evaluation::Cancelled => cancelled = true,
            }
        }

        let mut best: Option<&Candidate> = None;
        for candidate in &candidates {
            if candidate.score.is_nan() {
                continue;
            }
            if best.map_or(true, |b| self.objective.is_better(candidate.score, b.score)) {
                best = Some(candidate);
            }
        }
        let best = best.cloned().ok_or(SearchError::NoCandidates {
            total: total_combinations,
            excluded,
            skipped: skipped.len(),
        })?;

        info!(
            evaluated = candidates.len(),
            skipped = skipped.len(),
            cancelled,
            best = %best.config.label(),
            score = best.score,
            "parameter search finished"
        );

        Ok(SearchOutcome {
            objective: self.objective,
            best,
            candidates,
            skipped,
            excluded,
            total_combinations,
            cancelled,
        })
    }

    fn evaluate(
        &self,
        series: &BarSeries,
        index: usize,
        config: StrategyConfig,
        cancel: Option<&AtomicBool>,
    ) -> Result<Evaluation, SearchError> {
        if cancel.is_some_and(|f| f.load(Ordering::Relaxed)) {
            return Ok(Evaluation::Cancelled);
        }

        let policy = match SignalPolicy::new(config.clone(), self.columns.clone()) {
            Ok(policy) => policy,
            Err(e) => return Ok(self.skip(index, config, e.to_string())),
        };

        match run_simulation(series, &policy, &self.engine) {
            Ok(result) => {
                let metrics = PerformanceMetrics::from_run(&result);
                let score = self.objective.extract(&metrics);
                debug!(index, params = %config.label(), score, "combination scored");
                Ok(Evaluation::Scored(Candidate {
                    index,
                    config,
                    metrics,
                    score,
                }))
            }
            Err(e) if e.is_invalid_config() => Ok(self.skip(index, config, e.to_string())),
            Err(source) => Err(SearchError::Simulation {
                index,
                label: config.label(),
                source,
            }),
        }
    }

    fn skip(&self, index: usize, config: StrategyConfig, reason: String) -> Evaluation {
        warn!(index, params = %config.label(), %reason, "skipping invalid combination");
        Evaluation::Skipped(SkippedCombination {
            index,
            config,
            reason,
        })
    }
}
