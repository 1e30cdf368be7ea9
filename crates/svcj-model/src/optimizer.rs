//! Nelder-Mead simplex minimizer.
//!
//! Derivative-free, deterministic and allocation-light: the simplex is kept
//! as `n + 1` points with their objective values, sorted with
//! [`f64::total_cmp`] on every iteration so ties always resolve the same way.
//!
//! Coefficients are the standard ones: reflection 1, expansion 2,
//! contraction 0.5, shrink 0.5.

use crate::error::EstimationError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const REFLECTION: f64 = 1.0;
const EXPANSION: f64 = 2.0;
const CONTRACTION: f64 = 0.5;
const SHRINK: f64 = 0.5;

/// Optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Maximum number of simplex iterations (default: 2000)
    pub max_iterations: usize,

    /// Relative spread of the simplex values at convergence (default: 1e-10)
    pub tolerance: f64,

    /// Iterations without improving the best value before giving up (default: 200)
    pub stagnation_limit: usize,

    /// Edge length of the initial simplex (default: 0.5)
    pub initial_step: f64,

    /// Optional wall-clock budget per minimization
    pub max_duration: Option<Duration>,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 2000,
            tolerance: 1e-10,
            stagnation_limit: 200,
            initial_step: 0.5,
            max_duration: None,
        }
    }
}

impl OptimizerConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns [`EstimationError::InvalidParameter`] for zero limits or a
    /// non-positive tolerance or step.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if self.max_iterations == 0 {
            return Err(EstimationError::InvalidParameter(
                "max_iterations must be positive".to_string(),
            ));
        }
        if self.stagnation_limit == 0 {
            return Err(EstimationError::InvalidParameter(
                "stagnation_limit must be positive".to_string(),
            ));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "initial_step must be positive, got {}",
                self.initial_step
            )));
        }
        Ok(())
    }
}

/// Why a minimization stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// The simplex values agree within tolerance
    Converged,
    /// The iteration limit was reached
    MaxIterations,
    /// The best value stopped improving
    Stagnation,
    /// The wall-clock budget ran out
    TimeBudget,
}

impl Termination {
    /// Whether the tolerance criterion was met
    pub const fn is_converged(&self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Short label used in reports
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Converged => "converged",
            Self::MaxIterations => "max_iterations",
            Self::Stagnation => "stagnation",
            Self::TimeBudget => "time_budget",
        }
    }
}

/// Result of one minimization
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationOutcome {
    /// Best point found
    pub point: Array1<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Simplex iterations performed
    pub iterations: usize,
    /// Objective evaluations performed
    pub evaluations: usize,
    /// Stopping reason
    pub termination: Termination,
}

/// A minimization stopped by an objective error
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{error} (after {iterations} iterations)")]
pub struct OptimizationFailure {
    /// Error that stopped the search
    pub error: EstimationError,
    /// Simplex iterations completed before the error
    pub iterations: usize,
    /// Objective evaluations performed, including the failing one
    pub evaluations: usize,
}

impl From<OptimizationFailure> for EstimationError {
    fn from(failure: OptimizationFailure) -> Self {
        failure.error
    }
}

/// Nelder-Mead minimizer
#[derive(Debug, Clone)]
pub struct NelderMead {
    config: OptimizerConfig,
}

impl NelderMead {
    /// Create a minimizer.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: OptimizerConfig) -> Result<Self, EstimationError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self, EstimationError> {
        Self::new(OptimizerConfig::default())
    }

    /// Configuration in use
    pub const fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Minimize `objective` starting from `start`.
    ///
    /// # Errors
    /// Returns an [`OptimizationFailure`] carrying the objective error, or
    /// [`EstimationError::NumericDivergence`] if the objective yields a
    /// non-finite value, together with the work done before stopping.
    pub fn minimize<F>(&self, mut objective: F, start: &Array1<f64>) -> Result<OptimizationOutcome, OptimizationFailure>
    where
        F: FnMut(&Array1<f64>) -> Result<f64, EstimationError>,
    {
        let mut progress = Progress::default();
        match self.search(&mut objective, start, &mut progress) {
            Ok((point, value, termination)) => Ok(OptimizationOutcome {
                point,
                value,
                iterations: progress.iterations,
                evaluations: progress.evaluations,
                termination,
            }),
            Err(error) => Err(OptimizationFailure {
                error,
                iterations: progress.iterations,
                evaluations: progress.evaluations,
            }),
        }
    }

    fn search<F>(
        &self,
        objective: &mut F,
        start: &Array1<f64>,
        progress: &mut Progress,
    ) -> Result<(Array1<f64>, f64, Termination), EstimationError>
    where
        F: FnMut(&Array1<f64>) -> Result<f64, EstimationError>,
    {
        let n = start.len();
        if n == 0 {
            return Err(EstimationError::InvalidParameter(
                "cannot minimize over zero dimensions".to_string(),
            ));
        }

        let started = Instant::now();
        let evaluations = &mut progress.evaluations;
        let mut eval = |x: &Array1<f64>| -> Result<f64, EstimationError> {
            *evaluations += 1;
            let value = objective(x)?;
            if value.is_finite() {
                Ok(value)
            } else {
                Err(EstimationError::NumericDivergence(format!(
                    "objective returned {} at evaluation {}",
                    value, evaluations
                )))
            }
        };

        let mut simplex: Vec<(Array1<f64>, f64)> = Vec::with_capacity(n + 1);
        simplex.push((start.clone(), eval(start)?));
        for i in 0..n {
            let mut vertex = start.clone();
            vertex[i] += self.config.initial_step;
            let value = eval(&vertex)?;
            simplex.push((vertex, value));
        }

        let iterations = &mut progress.iterations;
        let mut since_improvement = 0usize;
        let mut best_so_far = f64::INFINITY;

        let termination = loop {
            simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

            let best = simplex[0].1;
            let worst = simplex[n].1;

            if best_so_far - best > self.config.tolerance {
                since_improvement = 0;
            } else if *iterations > 0 {
                since_improvement += 1;
            }
            best_so_far = best_so_far.min(best);

            if worst - best <= self.config.tolerance * (1.0 + best.abs()) {
                break Termination::Converged;
            }
            if *iterations >= self.config.max_iterations {
                break Termination::MaxIterations;
            }
            if since_improvement >= self.config.stagnation_limit {
                break Termination::Stagnation;
            }
            if self
                .config
                .max_duration
                .is_some_and(|budget| started.elapsed() >= budget)
            {
                break Termination::TimeBudget;
            }

            *iterations += 1;

            let mut centroid = Array1::<f64>::zeros(n);
            for (vertex, _) in &simplex[..n] {
                centroid += vertex;
            }
            centroid /= n as f64;

            let worst_point = simplex[n].0.clone();
            let second_worst = simplex[n - 1].1;

            let reflected = &centroid + &((&centroid - &worst_point) * REFLECTION);
            let f_reflected = eval(&reflected)?;

            if f_reflected < best {
                let expanded = &centroid + &((&reflected - &centroid) * EXPANSION);
                let f_expanded = eval(&expanded)?;
                simplex[n] = if f_expanded < f_reflected {
                    (expanded, f_expanded)
                } else {
                    (reflected, f_reflected)
                };
                continue;
            }

            if f_reflected < second_worst {
                simplex[n] = (reflected, f_reflected);
                continue;
            }

            let (contracted, f_contracted, accept) = if f_reflected < worst {
                let outside = &centroid + &((&reflected - &centroid) * CONTRACTION);
                let f = eval(&outside)?;
                (outside, f, f <= f_reflected)
            } else {
                let inside = &centroid + &((&worst_point - &centroid) * CONTRACTION);
                let f = eval(&inside)?;
                (inside, f, f < worst)
            };

            if accept {
                simplex[n] = (contracted, f_contracted);
                continue;
            }

            let anchor = simplex[0].0.clone();
            for vertex in simplex.iter_mut().skip(1) {
                let shrunk = &anchor + &((&vertex.0 - &anchor) * SHRINK);
                let value = eval(&shrunk)?;
                *vertex = (shrunk, value);
            }
        };

        let (point, value) = simplex.swap_remove(0);
        Ok((point, value, termination))
    }
}

#[derive(Debug, Default)]
struct Progress {
    iterations: usize,
    evaluations: usize,
}
