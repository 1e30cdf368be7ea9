//! Single-window SVCJ estimator.
//!
//! One estimation is:
//!
//! 1. compute the sample moments of the window and reject flat windows,
//! 2. seed a starting point from those moments,
//! 3. minimize `kernel loss + prior_weight * |u - u0|^2` with Nelder-Mead in
//!    the unconstrained space,
//! 4. if the run fails or ends above `max_acceptable_loss`, retry once from a
//!    fixed fallback start.

use crate::error::EstimationError;
use crate::kernel::{KernelConfig, MomentKernel};
use crate::moments::SampleMoments;
use crate::optimizer::{NelderMead, OptimizationFailure, OptimizationOutcome, OptimizerConfig, Termination};
use crate::params::{NUM_PARAMS, Parameter, ParameterBounds, ParameterVector};
use chrono::NaiveDate;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use svcj_data::Window;
use tracing::debug;

/// Starting point used when the moment-based seed fails.
const FALLBACK_START: [f64; NUM_PARAMS] = [0.05, 2.0, 0.04, 0.5, -0.6, 0.2, -0.03, 0.05];

/// Largest leverage correlation the seed will propose.
const MAX_SEED_RHO: f64 = 0.9;

/// Jump intensities per period below this are treated as "no jumps" by the seed.
const MIN_SEED_INTENSITY: f64 = 1e-12;

/// Estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Parameter boxes
    pub bounds: ParameterBounds,

    /// Moment kernel settings
    pub kernel: KernelConfig,

    /// Nelder-Mead settings
    pub optimizer: OptimizerConfig,

    /// Weight of the anchor to the starting point (default: 1e-3)
    pub prior_weight: f64,

    /// Runs ending above this loss count as failed (default: 50.0)
    pub max_acceptable_loss: f64,

    /// Assumed jump size in sample standard deviations (default: 3.0)
    pub jump_size_multiple: f64,

    /// Cap on the share of variance the seed attributes to jumps (default: 0.5)
    pub max_jump_variance_share: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            bounds: ParameterBounds::default(),
            kernel: KernelConfig::default(),
            optimizer: OptimizerConfig::default(),
            prior_weight: 1e-3,
            max_acceptable_loss: 50.0,
            jump_size_multiple: 3.0,
            max_jump_variance_share: 0.5,
        }
    }
}

impl EstimatorConfig {
    /// Minimum window length accepted by the estimator
    pub const MIN_OBSERVATIONS: usize = 2 * NUM_PARAMS;

    /// Validate every nested configuration.
    ///
    /// # Errors
    /// Returns [`EstimationError::InvalidParameter`] naming the first bad setting.
    pub fn validate(&self) -> Result<(), EstimationError> {
        self.bounds.validate()?;
        self.kernel.validate()?;
        self.optimizer.validate()?;

        if !(self.prior_weight.is_finite() && self.prior_weight >= 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "prior_weight must be non-negative, got {}",
                self.prior_weight
            )));
        }
        if !(self.max_acceptable_loss.is_finite() && self.max_acceptable_loss > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "max_acceptable_loss must be positive, got {}",
                self.max_acceptable_loss
            )));
        }
        if !(self.jump_size_multiple.is_finite() && self.jump_size_multiple > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "jump_size_multiple must be positive, got {}",
                self.jump_size_multiple
            )));
        }
        if !(0.0..1.0).contains(&self.max_jump_variance_share) {
            return Err(EstimationError::InvalidParameter(format!(
                "max_jump_variance_share must be in [0, 1), got {}",
                self.max_jump_variance_share
            )));
        }
        Ok(())
    }
}

/// Outcome of one successful window estimation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EstimationResult {
    /// Asset identifier
    pub asset: String,
    /// Date of the last observation in the window
    pub as_of: NaiveDate,
    /// Fitted parameters
    pub params: ParameterVector,
    /// Whether the accepted run met the tolerance criterion
    pub converged: bool,
    /// Iterations used across all attempts
    pub iterations: usize,
    /// Final objective value
    pub loss: f64,
    /// Why the accepted run stopped
    pub termination: Termination,
    /// Number of attempts (1 or 2)
    pub attempts: usize,
}

/// Fits SVCJ parameters to one window at a time.
#[derive(Debug, Clone)]
pub struct WindowEstimator {
    config: EstimatorConfig,
    optimizer: NelderMead,
}

impl WindowEstimator {
    /// Create an estimator.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: EstimatorConfig) -> Result<Self, EstimationError> {
        config.validate()?;
        let optimizer = NelderMead::new(config.optimizer.clone())?;
        Ok(Self { config, optimizer })
    }

    /// Create with default configuration.
    ///
    /// # Errors
    /// Returns an error if the default configuration is invalid (should not happen).
    pub fn try_default() -> Result<Self, EstimationError> {
        Self::new(EstimatorConfig::default())
    }

    /// Configuration in use
    pub const fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Estimate the parameters of one window.
    ///
    /// # Errors
    /// See [`WindowEstimator::estimate_returns`].
    pub fn estimate(&self, window: &Window<'_>) -> Result<EstimationResult, EstimationError> {
        self.estimate_returns(window.asset(), window.as_of(), window.returns())
    }

    /// Estimate the parameters of a raw return slice.
    ///
    /// # Errors
    /// - [`EstimationError::InsufficientObservations`] for fewer than
    ///   [`EstimatorConfig::MIN_OBSERVATIONS`] returns
    /// - [`EstimationError::DegenerateWindow`] if the sample variance is below the floor
    /// - [`EstimationError::NumericDivergence`] if no attempt produced a finite loss
    /// - [`EstimationError::ConvergenceFailure`] with the best finite loss if
    ///   no attempt reached an acceptable one
    pub fn estimate_returns(
        &self,
        asset: &str,
        as_of: NaiveDate,
        returns: &[f64],
    ) -> Result<EstimationResult, EstimationError> {
        if returns.len() < EstimatorConfig::MIN_OBSERVATIONS {
            return Err(EstimationError::InsufficientObservations {
                required: EstimatorConfig::MIN_OBSERVATIONS,
                actual: returns.len(),
            });
        }

        let kernel = MomentKernel::new(returns, self.config.kernel.clone())?;
        if kernel.is_degenerate() {
            return Err(EstimationError::DegenerateWindow {
                variance: kernel.sample().variance,
            });
        }

        let starts = [
            self.initial_guess(kernel.sample()),
            self.fallback_guess(kernel.sample()),
        ];

        let mut iterations = 0usize;
        let mut best_loss: Option<f64> = None;
        let mut last_error = None;

        for (attempt, start) in starts.iter().enumerate() {
            match self.run_attempt(&kernel, start) {
                Ok((outcome, params)) => {
                    iterations += outcome.iterations;
                    if outcome.value <= self.config.max_acceptable_loss {
                        debug!(
                            asset,
                            %as_of,
                            attempt = attempt + 1,
                            loss = outcome.value,
                            iterations = outcome.iterations,
                            termination = outcome.termination.as_str(),
                            "Window estimated"
                        );
                        return Ok(EstimationResult {
                            asset: asset.to_string(),
                            as_of,
                            params,
                            converged: outcome.termination.is_converged(),
                            iterations,
                            loss: outcome.value,
                            termination: outcome.termination,
                            attempts: attempt + 1,
                        });
                    }
                    debug!(asset, %as_of, attempt = attempt + 1, loss = outcome.value, "Loss above threshold");
                    best_loss = Some(best_loss.map_or(outcome.value, |l| l.min(outcome.value)));
                }
                Err(failure) => {
                    iterations += failure.iterations;
                    debug!(asset, %as_of, attempt = attempt + 1, error = %failure, "Attempt failed");
                    last_error = Some(failure.error);
                }
            }
        }

        Err(rejection(best_loss, last_error, iterations))
    }

    fn run_attempt(
        &self,
        kernel: &MomentKernel,
        start: &ParameterVector,
    ) -> Result<(OptimizationOutcome, ParameterVector), OptimizationFailure> {
        let bounds = &self.config.bounds;
        let anchor = start.to_unconstrained(bounds);
        let prior_weight = self.config.prior_weight;

        let objective = |u: &Array1<f64>| -> Result<f64, EstimationError> {
            let params = ParameterVector::from_unconstrained(u, bounds)?;
            let prior: f64 = u
                .iter()
                .zip(anchor.iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            Ok(kernel.loss(&params)? + prior_weight * prior)
        };

        let outcome = self.optimizer.minimize(objective, &anchor)?;
        match ParameterVector::from_unconstrained(&outcome.point, bounds) {
            Ok(params) => Ok((outcome, params)),
            Err(error) => Err(OptimizationFailure {
                error,
                iterations: outcome.iterations,
                evaluations: outcome.evaluations,
            }),
        }
    }

    /// Starting point derived from the sample moments of a window.
    ///
    /// Excess kurtosis sets the jump intensity (jumps assumed to be
    /// `jump_size_multiple` standard deviations), skewness sets the jump
    /// mean, the remaining variance goes to `theta`, squared-return
    /// persistence sets `sigma_v` and the leverage covariance sets `rho`.
    /// Every value is clamped into the bounds.
    pub fn initial_guess(&self, sample: &SampleMoments) -> ParameterVector {
        let bounds = &self.config.bounds;
        let dt = self.config.kernel.dt();
        let var = sample.variance.max(self.config.kernel.variance_floor);
        let sd = var.sqrt();

        let multiple = self.config.jump_size_multiple;
        let jump_size = multiple * sd;
        let excess = sample.excess_kurtosis.max(0.0);

        let mut intensity = excess / (3.0 * multiple.powi(4));
        let max_share = self.config.max_jump_variance_share;
        if intensity * multiple * multiple > max_share {
            intensity = max_share / (multiple * multiple);
        }
        let jump_share = intensity * multiple * multiple;

        let mu_j = if intensity > MIN_SEED_INTENSITY {
            (sample.skewness * var * sd / (3.0 * intensity * jump_size * jump_size))
                .clamp(-jump_size, jump_size)
        } else {
            0.0
        };
        let lambda = bounds.clamp(Parameter::Lambda, intensity / dt);
        let sigma_j = bounds.clamp(Parameter::SigmaJ, jump_size);
        let mu_j = bounds.clamp(Parameter::MuJ, mu_j);

        let theta = bounds.clamp(Parameter::Theta, var * (1.0 - jump_share) / dt);

        let annual_vol = (var / dt).sqrt();
        let kappa = bounds.clamp(Parameter::Kappa, 1.5 + (annual_vol - 0.2) * 8.0);

        let kappa_dt = (kappa * dt).min(1.0);
        let phi = 1.0 - kappa_dt;
        let sigma_v = if sample.squared_autocovariance > 0.0 && phi > 0.0 {
            let var_v = sample.squared_autocovariance / (dt * dt * phi);
            (var_v * kappa * (2.0 - kappa_dt) / theta).sqrt()
        } else {
            0.3 + (annual_vol - 0.2) * 3.0
        };
        let sigma_v = bounds.clamp(Parameter::SigmaV, sigma_v);

        let leverage_scale = sigma_v * theta * dt * dt;
        let rho = if leverage_scale > 0.0 {
            (sample.leverage_covariance / leverage_scale).clamp(-MAX_SEED_RHO, MAX_SEED_RHO)
        } else {
            0.0
        };
        let rho = bounds.clamp(Parameter::Rho, rho);

        let mu = sample.mean / dt - lambda * mu_j;

        ParameterVector::clamped([mu, kappa, theta, sigma_v, rho, lambda, mu_j, sigma_j], bounds)
    }

    /// Fixed starting point with `theta` set from the sample variance.
    pub fn fallback_guess(&self, sample: &SampleMoments) -> ParameterVector {
        let mut values = FALLBACK_START;
        values[Parameter::Theta.index()] = sample.variance / self.config.kernel.dt();
        ParameterVector::clamped(values, &self.config.bounds)
    }
}

/// Error for a window whose attempts all fell short.
///
/// A finite loss from any attempt wins over a later divergence.
fn rejection(best_loss: Option<f64>, last_error: Option<EstimationError>, iterations: usize) -> EstimationError {
    match (best_loss, last_error) {
        (Some(loss), _) => EstimationError::ConvergenceFailure { loss, iterations },
        (None, Some(error)) => error,
        (None, None) => EstimationError::ConvergenceFailure {
            loss: f64::NAN,
            iterations,
        },
    }
}
