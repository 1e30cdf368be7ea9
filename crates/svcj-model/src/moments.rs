//! Sample and model-implied moments.
//!
//! Both sides of the moment-matching objective live here. The model side
//! uses an Euler discretization of SVCJ with interval `dt`, the variance
//! taken at the start of each period, and Poisson jumps with normal sizes:
//!
//! ```text
//! y_t = mu*dt + sqrt(V_{t-1}*dt)*e_t + sum_{i<=N_t} Z_i
//! V_t = V_{t-1} + kappa*(theta - V_{t-1})*dt + sigma_v*sqrt(V_{t-1}*dt)*u_t
//! corr(e, u) = rho,  N_t ~ Poisson(lambda*dt),  Z ~ N(mu_j, sigma_j^2)
//! ```
//!
//! With `phi = 1 - kappa*dt` and `Var[V] = sigma_v^2*theta / (kappa*(2 - kappa*dt))`
//! the stationary moments of the demeaned return `x_t` are:
//!
//! ```text
//! E[y]             = (mu + lambda*mu_j)*dt
//! Var[y]           = theta*dt + lambda*dt*(mu_j^2 + sigma_j^2)
//! k3               = lambda*dt*(mu_j^3 + 3*mu_j*sigma_j^2)
//! k4               = 3*dt^2*Var[V] + lambda*dt*(mu_j^4 + 6*mu_j^2*sigma_j^2 + 3*sigma_j^4)
//! Cov(x_t, x_t-1)  = 0
//! Cov(x_t^2, x_t-1^2) = dt^2 * Var[V] * phi
//! Cov(x_t-1, x_t^2)   = rho * sigma_v * theta * dt^2
//! ```

use crate::error::EstimationError;
use crate::params::ParameterVector;
use serde::Serialize;

/// `kappa * dt` is clamped to this range to keep `phi` in `[0, 1)`.
const MIN_KAPPA_DT: f64 = 1e-12;

/// Summary statistics of one window of returns.
///
/// All moments are population moments (divided by `n`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SampleMoments {
    /// Number of observations
    pub n: usize,
    /// Mean
    pub mean: f64,
    /// Variance
    pub variance: f64,
    /// Skewness (0 when the variance is below the floor)
    pub skewness: f64,
    /// Excess kurtosis (0 when the variance is below the floor)
    pub excess_kurtosis: f64,
    /// Lag-1 autocovariance of returns
    pub autocovariance: f64,
    /// Lag-1 autocovariance of squared demeaned returns
    pub squared_autocovariance: f64,
    /// `Cov(x_{t-1}, x_t^2)` of demeaned returns
    pub leverage_covariance: f64,
}

impl SampleMoments {
    /// Compute moments of `returns`.
    ///
    /// Standardized moments are only formed when the variance exceeds
    /// `variance_floor`; otherwise they are reported as zero.
    ///
    /// # Errors
    /// Returns an error for fewer than two observations or non-finite input.
    pub fn from_returns(returns: &[f64], variance_floor: f64) -> Result<Self, EstimationError> {
        let n = returns.len();
        if n < 2 {
            return Err(EstimationError::InsufficientObservations {
                required: 2,
                actual: n,
            });
        }
        if returns.iter().any(|r| !r.is_finite()) {
            return Err(EstimationError::NumericDivergence(
                "window contains non-finite returns".to_string(),
            ));
        }

        let nf = n as f64;
        let mean = returns.iter().sum::<f64>() / nf;

        let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
        for &r in returns {
            let d = r - mean;
            let d2 = d * d;
            m2 += d2;
            m3 += d2 * d;
            m4 += d2 * d2;
        }
        m2 /= nf;
        m3 /= nf;
        m4 /= nf;

        let (skewness, excess_kurtosis) = if m2 > variance_floor {
            (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
        } else {
            (0.0, 0.0)
        };

        let (mut acov, mut sq_acov, mut lev) = (0.0, 0.0, 0.0);
        for pair in returns.windows(2) {
            let prev = pair[0] - mean;
            let cur = pair[1] - mean;
            acov += prev * cur;
            sq_acov += (prev * prev - m2) * (cur * cur - m2);
            lev += prev * (cur * cur - m2);
        }

        Ok(Self {
            n,
            mean,
            variance: m2,
            skewness,
            excess_kurtosis,
            autocovariance: acov / nf,
            squared_autocovariance: sq_acov / nf,
            leverage_covariance: lev / nf,
        })
    }

    /// Standard deviation
    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }
}

/// Moments implied by a parameter vector at observation interval `dt`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelMoments {
    /// Mean return per period
    pub mean: f64,
    /// Return variance per period
    pub variance: f64,
    /// Third cumulant
    pub third_cumulant: f64,
    /// Fourth cumulant
    pub fourth_cumulant: f64,
    /// Skewness
    pub skewness: f64,
    /// Excess kurtosis
    pub excess_kurtosis: f64,
    /// Lag-1 autocovariance of returns
    pub autocovariance: f64,
    /// Lag-1 autocovariance of squared demeaned returns
    pub squared_autocovariance: f64,
    /// `Cov(x_{t-1}, x_t^2)`
    pub leverage_covariance: f64,
    /// Stationary variance of the latent variance
    pub variance_of_variance: f64,
}

impl ModelMoments {
    /// Implied moments of `params` sampled every `dt` years.
    ///
    /// # Errors
    /// Returns [`EstimationError::NumericDivergence`] if any moment is
    /// non-finite or the implied variance is not positive.
    pub fn from_params(params: &ParameterVector, dt: f64) -> Result<Self, EstimationError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(EstimationError::InvalidParameter(format!(
                "dt must be positive, got {}",
                dt
            )));
        }

        let kappa_dt = (params.kappa() * dt).clamp(MIN_KAPPA_DT, 1.0);
        let kappa = kappa_dt / dt;
        let phi = 1.0 - kappa_dt;
        let theta = params.theta();
        let sigma_v = params.sigma_v();

        let variance_of_variance = sigma_v * sigma_v * theta / (kappa * (2.0 - kappa_dt));

        let intensity = params.lambda() * dt;
        let mj = params.mu_j();
        let sj2 = params.sigma_j() * params.sigma_j();
        let mj2 = mj * mj;

        let mean = (params.mu() + params.lambda() * mj) * dt;
        let variance = theta * dt + intensity * (mj2 + sj2);
        let third_cumulant = intensity * (mj2 * mj + 3.0 * mj * sj2);
        let fourth_cumulant = 3.0 * dt * dt * variance_of_variance
            + intensity * (mj2 * mj2 + 6.0 * mj2 * sj2 + 3.0 * sj2 * sj2);

        if !(variance.is_finite() && variance > 0.0) {
            return Err(EstimationError::NumericDivergence(format!(
                "implied variance {} is not positive",
                variance
            )));
        }

        let moments = Self {
            mean,
            variance,
            third_cumulant,
            fourth_cumulant,
            skewness: third_cumulant / variance.powf(1.5),
            excess_kurtosis: fourth_cumulant / (variance * variance),
            autocovariance: 0.0,
            squared_autocovariance: dt * dt * variance_of_variance * phi,
            leverage_covariance: params.rho() * sigma_v * theta * dt * dt,
            variance_of_variance,
        };

        if moments.is_finite() {
            Ok(moments)
        } else {
            Err(EstimationError::NumericDivergence(
                "implied moments are not finite".to_string(),
            ))
        }
    }

    fn is_finite(&self) -> bool {
        [
            self.mean,
            self.variance,
            self.skewness,
            self.excess_kurtosis,
            self.squared_autocovariance,
            self.leverage_covariance,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterBounds;
    use approx::assert_relative_eq;

    const DT: f64 = 1.0 / 252.0;

    #[test]
    fn test_sample_moments_simple() {
        let returns = [1.0, 2.0, 3.0, 4.0, 5.0];
        let m = SampleMoments::from_returns(&returns, 1e-14).unwrap();

        assert_eq!(m.n, 5);
        assert_relative_eq!(m.mean, 3.0);
        // Population variance of 1..5 is 2
        assert_relative_eq!(m.variance, 2.0);
        assert_relative_eq!(m.skewness, 0.0, epsilon = 1e-12);
        // m4 = (16 + 1 + 0 + 1 + 16) / 5 = 6.8 -> 6.8 / 4 - 3 = -1.3
        assert_relative_eq!(m.excess_kurtosis, -1.3, epsilon = 1e-12);
        // (-2*-1 + -1*0 + 0*1 + 1*2) / 5 = 0.8
        assert_relative_eq!(m.autocovariance, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_window_has_zero_standardized_moments() {
        let returns = [0.0; 50];
        let m = SampleMoments::from_returns(&returns, 1e-14).unwrap();
        assert_eq!(m.variance, 0.0);
        assert_eq!(m.skewness, 0.0);
        assert_eq!(m.excess_kurtosis, 0.0);
    }

    #[test]
    fn test_sample_moments_reject_short_and_non_finite() {
        assert!(SampleMoments::from_returns(&[0.1], 1e-14).is_err());
        assert!(SampleMoments::from_returns(&[0.1, f64::NAN], 1e-14).is_err());
    }

    #[test]
    fn test_model_moments_without_jumps() {
        let bounds = ParameterBounds::default();
        let params =
            ParameterVector::new([0.0, 2.0, 0.04, 0.5, -0.5, 0.0, 0.0, 0.05], &bounds).unwrap();
        let m = ModelMoments::from_params(&params, DT).unwrap();

        assert_relative_eq!(m.mean, 0.0);
        assert_relative_eq!(m.variance, 0.04 * DT, epsilon = 1e-15);
        assert_relative_eq!(m.skewness, 0.0);

        let var_v = 0.25 * 0.04 / (2.0 * (2.0 - 2.0 * DT));
        assert_relative_eq!(m.variance_of_variance, var_v, epsilon = 1e-12);
        assert_relative_eq!(
            m.excess_kurtosis,
            3.0 * var_v / (0.04 * 0.04),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            m.leverage_covariance,
            -0.5 * 0.5 * 0.04 * DT * DT,
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_negative_jumps_give_negative_skew() {
        let bounds = ParameterBounds::default();
        let params =
            ParameterVector::new([0.0, 2.0, 0.04, 0.3, 0.0, 5.0, -0.05, 0.03], &bounds).unwrap();
        let m = ModelMoments::from_params(&params, DT).unwrap();
        assert!(m.skewness < 0.0);
        assert!(m.excess_kurtosis > 0.0);
        assert!(m.variance > 0.04 * DT);
    }

    #[test]
    fn test_model_moments_at_bound_corners_are_finite() {
        let bounds = ParameterBounds::default();
        for use_upper in [false, true] {
            let values = crate::params::Parameter::ALL.map(|p| {
                let (lo, hi) = bounds.get(p);
                if use_upper { hi } else { lo }
            });
            let params = ParameterVector::new(values, &bounds).unwrap();
            let m = ModelMoments::from_params(&params, DT).unwrap();
            assert!(m.variance > 0.0);
            assert!(m.is_finite());
        }
    }
}
