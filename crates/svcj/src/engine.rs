//! Panel orchestration.
//!
//! Every (asset, window) pair is an independent task. Tasks are flattened
//! into one list, estimated on a rayon pool and collected in task order, so
//! the assembled matrix does not depend on scheduling. A single writer then
//! lays the results out on the panel-wide grid.

use crate::error::EngineError;
use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use svcj_data::{DataError, ReturnPanel, Window, WindowSlicer};
use svcj_model::{EstimationError, EstimationResult, EstimatorConfig, WindowEstimator};
use svcj_output::{FactorMatrix, FactorMatrixAssembler};
use tracing::{debug, info, warn};

/// Smallest window the engine accepts
pub const MIN_WINDOW_SIZE: usize = EstimatorConfig::MIN_OBSERVATIONS;

/// Outcome of one (asset, window) task
pub type TaskOutcome = Result<EstimationResult, EstimationError>;

/// Panel run configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Observations per window (default: 126)
    pub window_size: usize,

    /// Observations between consecutive window starts (default: 1)
    pub step_size: usize,

    /// Worker threads; `None` uses all available cores
    pub threads: Option<usize>,

    /// Tasks not started within this time after the run begins are cancelled
    pub timeout: Option<Duration>,

    /// Single-window estimator settings
    pub estimator: EstimatorConfig,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            window_size: 126,
            step_size: 1,
            threads: None,
            timeout: None,
            estimator: EstimatorConfig::default(),
        }
    }
}

impl PanelConfig {
    /// Default configuration with the given window and step
    pub fn new(window_size: usize, step_size: usize) -> Self {
        Self {
            window_size,
            step_size,
            ..Default::default()
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns [`EngineError::InvalidConfiguration`] if the window is shorter
    /// than [`MIN_WINDOW_SIZE`], the step or thread count is zero, or the
    /// estimator settings are invalid.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.window_size < MIN_WINDOW_SIZE {
            return Err(EngineError::InvalidConfiguration(format!(
                "window_size must be at least {}, got {}",
                MIN_WINDOW_SIZE, self.window_size
            )));
        }
        if self.step_size == 0 {
            return Err(EngineError::InvalidConfiguration(
                "step_size must be at least 1".to_string(),
            ));
        }
        if self.threads == Some(0) {
            return Err(EngineError::InvalidConfiguration(
                "threads must be at least 1".to_string(),
            ));
        }
        self.estimator
            .validate()
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))
    }
}

/// A window that produced no estimate
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    /// Asset identifier
    pub asset: String,
    /// As-of date of the window
    pub as_of: NaiveDate,
    /// Why no estimate was produced
    pub error: EstimationError,
}

/// Everything a panel run produced
#[derive(Debug, Clone)]
pub struct PanelEstimate {
    /// Assembled factor matrix
    pub matrix: FactorMatrix,
    /// Successful estimations in task order
    pub results: Vec<EstimationResult>,
    /// Failed and cancelled windows in task order
    pub failures: Vec<CellFailure>,
    /// Assets shorter than one window
    pub insufficient_assets: Vec<String>,
    /// Number of tasks cancelled by the timeout
    pub cancelled: usize,
}

impl PanelEstimate {
    /// Number of (asset, window) tasks in the run
    pub fn n_tasks(&self) -> usize {
        self.results.len() + self.failures.len()
    }

    /// Consume the estimate, keeping only the matrix
    pub fn into_matrix(self) -> FactorMatrix {
        self.matrix
    }
}

/// Rolling-window estimator over a whole panel.
#[derive(Debug)]
pub struct PanelEstimator {
    config: PanelConfig,
    estimator: WindowEstimator,
    pool: rayon::ThreadPool,
}

impl PanelEstimator {
    /// Create a panel estimator and its worker pool.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the pool cannot
    /// be built.
    pub fn new(config: PanelConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let estimator = WindowEstimator::new(config.estimator.clone())
            .map_err(|e| EngineError::InvalidConfiguration(e.to_string()))?;

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads.unwrap_or(0))
            .thread_name(|i| format!("svcj-worker-{}", i))
            .build()?;

        Ok(Self {
            config,
            estimator,
            pool,
        })
    }

    /// Configuration in use
    pub const fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Number of worker threads
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Number of tasks a run over `panel` would schedule
    pub fn task_count(&self, panel: &ReturnPanel) -> usize {
        panel
            .series()
            .iter()
            .map(|s| svcj_data::window_count(s.len(), self.config.window_size, self.config.step_size))
            .sum()
    }

    /// Estimate every window of every asset.
    ///
    /// # Errors
    /// Only setup problems are errors; failed windows become missing cells.
    pub fn run(&self, panel: &ReturnPanel) -> Result<PanelEstimate, EngineError> {
        self.run_with_observer(panel, |_, _| {})
    }

    /// Like [`PanelEstimator::run`], calling `observer` as each task finishes.
    ///
    /// The observer runs on worker threads in completion order.
    ///
    /// # Errors
    /// Only setup problems are errors; failed windows become missing cells.
    #[tracing::instrument(skip_all, fields(assets = panel.n_assets(), window = self.config.window_size, step = self.config.step_size))]
    pub fn run_with_observer<F>(&self, panel: &ReturnPanel, observer: F) -> Result<PanelEstimate, EngineError>
    where
        F: Fn(&Window<'_>, &TaskOutcome) + Sync,
    {
        let started = Instant::now();
        let deadline = self.config.timeout.and_then(|t| started.checked_add(t));

        let mut insufficient_assets = Vec::new();
        let mut tasks: Vec<Window<'_>> = Vec::with_capacity(self.task_count(panel));
        for series in panel.series() {
            match WindowSlicer::new(series, self.config.window_size, self.config.step_size) {
                Ok(slicer) => tasks.extend(slicer.iter()),
                Err(DataError::InsufficientData {
                    asset,
                    required,
                    actual,
                }) => {
                    warn!(%asset, required, actual, "Asset shorter than one window, skipping");
                    insufficient_assets.push(asset);
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            tasks = tasks.len(),
            threads = self.threads(),
            "Starting panel estimation"
        );

        let timed_out = AtomicBool::new(false);
        let outcomes: Vec<TaskOutcome> = self.pool.install(|| {
            tasks
                .par_iter()
                .map(|window| {
                    let outcome = if is_cancelled(&timed_out, deadline) {
                        Err(EstimationError::Cancelled)
                    } else {
                        self.estimator.estimate(window)
                    };
                    observer(window, &outcome);
                    outcome
                })
                .collect()
        });

        let assets: Vec<String> = panel.assets().map(str::to_string).collect();
        let mut assembler = FactorMatrixAssembler::new(tasks.iter().map(|w| w.as_of()), assets)?;

        let mut results = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        let mut cancelled = 0usize;

        for (window, outcome) in tasks.iter().zip(outcomes) {
            match outcome {
                Ok(result) => {
                    assembler.insert(&result)?;
                    results.push(result);
                }
                Err(error) => {
                    match &error {
                        EstimationError::Cancelled => cancelled += 1,
                        EstimationError::DegenerateWindow { .. } => {
                            debug!(asset = window.asset(), as_of = %window.as_of(), %error, "Window skipped");
                        }
                        _ => {
                            warn!(asset = window.asset(), as_of = %window.as_of(), %error, "Window estimation failed");
                        }
                    }
                    failures.push(CellFailure {
                        asset: window.asset().to_string(),
                        as_of: window.as_of(),
                        error,
                    });
                }
            }
        }

        let matrix = assembler.finish();

        if cancelled > 0 {
            warn!(cancelled, "Tasks cancelled by timeout");
        }
        info!(
            rows = matrix.n_rows(),
            estimated = results.len(),
            failed = failures.len() - cancelled,
            cancelled,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Panel estimation finished"
        );

        Ok(PanelEstimate {
            matrix,
            results,
            failures,
            insufficient_assets,
            cancelled,
        })
    }
}

fn is_cancelled(flag: &AtomicBool, deadline: Option<Instant>) -> bool {
    if flag.load(Ordering::Relaxed) {
        return true;
    }
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            flag.store(true, Ordering::Relaxed);
            true
        }
        _ => false,
    }
}

/// Estimate the factor matrix of `panel` with default settings.
///
/// # Errors
/// Returns [`EngineError::InvalidConfiguration`] before any work if
/// `window_size < 16` or `step_size == 0`.
pub fn estimate_factor_matrix(
    panel: &ReturnPanel,
    window_size: usize,
    step_size: usize,
) -> Result<FactorMatrix, EngineError> {
    estimate_factor_matrix_with(panel, PanelConfig::new(window_size, step_size))
}

/// Estimate the factor matrix of `panel` with explicit settings.
///
/// # Errors
/// Returns an error if the configuration is invalid or the worker pool
/// cannot be created.
pub fn estimate_factor_matrix_with(panel: &ReturnPanel, config: PanelConfig) -> Result<FactorMatrix, EngineError> {
    Ok(PanelEstimator::new(config)?.run(panel)?.into_matrix())
}
