//! Moment-matching objective for one window.
//!
//! The loss is a weighted sum of squared, dimensionless discrepancies
//! between the sample moments of the window and the moments implied by a
//! candidate [`ParameterVector`]:
//!
//! | term | discrepancy |
//! |---|---|
//! | mean | `(mean_s - mean_m) / sd_s` |
//! | variance | `(var_m - var_s) / var_s` |
//! | skewness | `skew_s - skew_m` |
//! | kurtosis | `exkurt_s - exkurt_m` |
//! | autocorrelation | `acov_s / var_s` (the model implies zero) |
//! | squared autocovariance | `(sq_s - sq_m) / var_s^2` |
//! | leverage | `(lev_s - lev_m) / var_s^1.5` |
//!
//! `var_s` is floored at [`KernelConfig::variance_floor`] so a flat window
//! still yields a finite loss.

use crate::error::EstimationError;
use crate::moments::{ModelMoments, SampleMoments};
use crate::params::ParameterVector;
use serde::{Deserialize, Serialize};

/// Number of moment conditions in the loss
pub const NUM_MOMENTS: usize = 7;

/// Weights of the individual moment conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentWeights {
    /// Weight of the mean condition (default: 1.0)
    pub mean: f64,
    /// Weight of the variance condition (default: 4.0)
    pub variance: f64,
    /// Weight of the skewness condition (default: 1.0)
    pub skewness: f64,
    /// Weight of the excess kurtosis condition (default: 0.25)
    pub kurtosis: f64,
    /// Weight of the lag-1 autocorrelation condition (default: 1.0)
    pub autocorrelation: f64,
    /// Weight of the squared-return autocovariance condition (default: 1.0)
    pub squared_autocovariance: f64,
    /// Weight of the leverage condition (default: 1.0)
    pub leverage: f64,
}

impl Default for MomentWeights {
    fn default() -> Self {
        Self {
            mean: 1.0,
            variance: 4.0,
            skewness: 1.0,
            kurtosis: 0.25,
            autocorrelation: 1.0,
            squared_autocovariance: 1.0,
            leverage: 1.0,
        }
    }
}

impl MomentWeights {
    /// Weights in the order of [`MomentKernel::discrepancies`]
    pub const fn to_array(&self) -> [f64; NUM_MOMENTS] {
        [
            self.mean,
            self.variance,
            self.skewness,
            self.kurtosis,
            self.autocorrelation,
            self.squared_autocovariance,
            self.leverage,
        ]
    }
}

/// Kernel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// Observations per year; `dt = 1 / periods_per_year` (default: 252)
    pub periods_per_year: f64,

    /// Moment weights
    pub weights: MomentWeights,

    /// Sample variances below this are treated as degenerate (default: 1e-14)
    pub variance_floor: f64,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            periods_per_year: 252.0,
            weights: MomentWeights::default(),
            variance_floor: 1e-14,
        }
    }
}

impl KernelConfig {
    /// Observation interval in years
    pub fn dt(&self) -> f64 {
        1.0 / self.periods_per_year
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns [`EstimationError::InvalidParameter`] for a non-positive
    /// frequency or floor, or a negative or non-finite weight.
    pub fn validate(&self) -> Result<(), EstimationError> {
        if !(self.periods_per_year.is_finite() && self.periods_per_year > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "periods_per_year must be positive, got {}",
                self.periods_per_year
            )));
        }
        if !(self.variance_floor.is_finite() && self.variance_floor > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "variance_floor must be positive, got {}",
                self.variance_floor
            )));
        }
        if self
            .weights
            .to_array()
            .iter()
            .any(|w| !w.is_finite() || *w < 0.0)
        {
            return Err(EstimationError::InvalidParameter(
                "moment weights must be finite and non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// Objective function of one window.
///
/// Sample moments are computed once at construction; evaluating the loss is
/// then a handful of closed-form expressions and never allocates.
#[derive(Debug, Clone)]
pub struct MomentKernel {
    sample: SampleMoments,
    config: KernelConfig,
}

impl MomentKernel {
    /// Build the kernel of `returns`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid, the window has
    /// fewer than two observations or contains non-finite values.
    pub fn new(returns: &[f64], config: KernelConfig) -> Result<Self, EstimationError> {
        config.validate()?;
        let sample = SampleMoments::from_returns(returns, config.variance_floor)?;
        Ok(Self { sample, config })
    }

    /// Sample moments of the window
    pub const fn sample(&self) -> &SampleMoments {
        &self.sample
    }

    /// Kernel configuration
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Observation interval in years
    pub fn dt(&self) -> f64 {
        self.config.dt()
    }

    /// Whether the sample variance is below the floor
    pub fn is_degenerate(&self) -> bool {
        self.sample.variance < self.config.variance_floor
    }

    /// Unweighted discrepancies, in the order of [`MomentWeights::to_array`].
    ///
    /// # Errors
    /// Returns [`EstimationError::NumericDivergence`] if the implied moments
    /// are not finite.
    pub fn discrepancies(&self, params: &ParameterVector) -> Result<[f64; NUM_MOMENTS], EstimationError> {
        let model = ModelMoments::from_params(params, self.dt())?;
        let s = &self.sample;

        let var = s.variance.max(self.config.variance_floor);
        let sd = var.sqrt();

        Ok([
            (s.mean - model.mean) / sd,
            (model.variance - var) / var,
            s.skewness - model.skewness,
            s.excess_kurtosis - model.excess_kurtosis,
            (s.autocovariance - model.autocovariance) / var,
            (s.squared_autocovariance - model.squared_autocovariance) / (var * var),
            (s.leverage_covariance - model.leverage_covariance) / (var * sd),
        ])
    }

    /// Weighted moment loss of `params`; always finite and non-negative.
    ///
    /// # Errors
    /// Returns [`EstimationError::NumericDivergence`] instead of a
    /// non-finite loss.
    pub fn loss(&self, params: &ParameterVector) -> Result<f64, EstimationError> {
        let g = self.discrepancies(params)?;
        let loss: f64 = self
            .config
            .weights
            .to_array()
            .iter()
            .zip(g.iter())
            .map(|(w, g)| w * g * g)
            .sum();

        if loss.is_finite() {
            Ok(loss)
        } else {
            Err(EstimationError::NumericDivergence(format!(
                "non-finite moment loss for {:?}",
                params.to_array()
            )))
        }
    }
}
