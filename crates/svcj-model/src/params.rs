//! SVCJ parameters, their box constraints and the unconstrained transform.
//!
//! The optimizer works in an unconstrained space `u ∈ R^8`. Each coordinate
//! is mapped onto its box `[lo, hi]` with a scaled logistic function:
//!
//! ```text
//! p = lo + (hi - lo) * sigmoid(u)
//! u = logit((p - lo) / (hi - lo))
//! ```
//!
//! so any finite `u` yields a parameter inside its bounds and no constraint
//! checks are needed during the search.

use crate::error::EstimationError;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of SVCJ parameters
pub const NUM_PARAMS: usize = 8;

/// Fractions closer than this to 0 or 1 are clamped before taking the logit.
const LOGIT_EDGE: f64 = 1e-9;

/// Model family being estimated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelFamily {
    /// Stochastic volatility with correlated jumps
    #[default]
    Svcj,
}

impl ModelFamily {
    /// Parameters of the family in canonical order
    pub const fn parameters(&self) -> &'static [Parameter] {
        match self {
            Self::Svcj => &Parameter::ALL,
        }
    }

    /// Short name of the family
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Svcj => "svcj",
        }
    }
}

/// One SVCJ parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Parameter {
    /// Drift of the log-price
    Mu,
    /// Mean-reversion speed of the variance
    Kappa,
    /// Long-run variance level
    Theta,
    /// Volatility of variance
    SigmaV,
    /// Correlation between return and variance shocks
    Rho,
    /// Jump intensity
    Lambda,
    /// Mean jump size
    MuJ,
    /// Jump size volatility
    SigmaJ,
}

impl Parameter {
    /// All parameters in canonical order
    pub const ALL: [Self; NUM_PARAMS] = [
        Self::Mu,
        Self::Kappa,
        Self::Theta,
        Self::SigmaV,
        Self::Rho,
        Self::Lambda,
        Self::MuJ,
        Self::SigmaJ,
    ];

    /// Column name used in outputs
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Mu => "mu",
            Self::Kappa => "kappa",
            Self::Theta => "theta",
            Self::SigmaV => "sigma_v",
            Self::Rho => "rho",
            Self::Lambda => "lambda",
            Self::MuJ => "mu_j",
            Self::SigmaJ => "sigma_j",
        }
    }

    /// One-line description
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Mu => "Drift of the log-price (per year)",
            Self::Kappa => "Mean-reversion speed of the variance (per year)",
            Self::Theta => "Long-run variance level (per year)",
            Self::SigmaV => "Volatility of variance",
            Self::Rho => "Correlation between return and variance shocks",
            Self::Lambda => "Jump intensity (jumps per year)",
            Self::MuJ => "Mean log-return jump size",
            Self::SigmaJ => "Standard deviation of log-return jump size",
        }
    }

    /// Position in the canonical order
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Look up a parameter by its column name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Box bounds for every parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterBounds {
    /// Drift bounds
    pub mu: (f64, f64),
    /// Mean-reversion bounds (lower bound must be positive)
    pub kappa: (f64, f64),
    /// Long-run variance bounds (lower bound must be positive)
    pub theta: (f64, f64),
    /// Vol-of-vol bounds (lower bound must be positive)
    pub sigma_v: (f64, f64),
    /// Correlation bounds (inside (-1, 1))
    pub rho: (f64, f64),
    /// Jump intensity bounds (lower bound non-negative)
    pub lambda: (f64, f64),
    /// Jump mean bounds
    pub mu_j: (f64, f64),
    /// Jump volatility bounds (lower bound must be positive)
    pub sigma_j: (f64, f64),
}

impl Default for ParameterBounds {
    fn default() -> Self {
        Self {
            mu: (-2.0, 2.0),
            kappa: (1e-3, 50.0),
            theta: (1e-8, 5.0),
            sigma_v: (1e-4, 5.0),
            rho: (-0.999, 0.999),
            lambda: (0.0, 100.0),
            mu_j: (-0.5, 0.5),
            sigma_j: (1e-4, 0.5),
        }
    }
}

impl ParameterBounds {
    /// Bounds of one parameter
    pub const fn get(&self, parameter: Parameter) -> (f64, f64) {
        match parameter {
            Parameter::Mu => self.mu,
            Parameter::Kappa => self.kappa,
            Parameter::Theta => self.theta,
            Parameter::SigmaV => self.sigma_v,
            Parameter::Rho => self.rho,
            Parameter::Lambda => self.lambda,
            Parameter::MuJ => self.mu_j,
            Parameter::SigmaJ => self.sigma_j,
        }
    }

    /// Check that every box is well formed and respects the parameter domain.
    pub fn validate(&self) -> Result<(), EstimationError> {
        for parameter in Parameter::ALL {
            let (lo, hi) = self.get(parameter);
            if !lo.is_finite() || !hi.is_finite() || lo >= hi {
                return Err(EstimationError::InvalidParameter(format!(
                    "bounds for {} must be finite with lower < upper, got ({}, {})",
                    parameter, lo, hi
                )));
            }
            let domain_ok = match parameter {
                Parameter::Kappa | Parameter::Theta | Parameter::SigmaV | Parameter::SigmaJ => {
                    lo > 0.0
                }
                Parameter::Lambda => lo >= 0.0,
                Parameter::Rho => lo > -1.0 && hi < 1.0,
                Parameter::Mu | Parameter::MuJ => true,
            };
            if !domain_ok {
                return Err(EstimationError::InvalidParameter(format!(
                    "bounds ({}, {}) for {} leave its domain",
                    lo, hi, parameter
                )));
            }
        }
        Ok(())
    }

    /// Whether `value` lies inside the box of `parameter`
    pub fn contains(&self, parameter: Parameter, value: f64) -> bool {
        let (lo, hi) = self.get(parameter);
        value.is_finite() && value >= lo && value <= hi
    }

    /// Clamp `value` into the box of `parameter`; NaN maps to the midpoint.
    ///
    /// An inverted or NaN box yields its upper bound.
    pub(crate) fn clamp(&self, parameter: Parameter, value: f64) -> f64 {
        let (lo, hi) = self.get(parameter);
        if value.is_nan() {
            0.5 * (lo + hi)
        } else if lo <= hi {
            value.clamp(lo, hi)
        } else {
            hi
        }
    }
}

/// A validated SVCJ parameter set.
///
/// Construction checks every value against a [`ParameterBounds`], so a
/// vector that exists is always inside its constraints.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterVector {
    mu: f64,
    kappa: f64,
    theta: f64,
    sigma_v: f64,
    rho: f64,
    lambda: f64,
    mu_j: f64,
    sigma_j: f64,
}

impl ParameterVector {
    /// Build from values in canonical order.
    ///
    /// # Errors
    /// Returns [`EstimationError::InvalidParameter`] if any value is
    /// non-finite or outside its bounds.
    pub fn new(values: [f64; NUM_PARAMS], bounds: &ParameterBounds) -> Result<Self, EstimationError> {
        for parameter in Parameter::ALL {
            let value = values[parameter.index()];
            if !bounds.contains(parameter, value) {
                let (lo, hi) = bounds.get(parameter);
                return Err(EstimationError::InvalidParameter(format!(
                    "{} = {} outside [{}, {}]",
                    parameter, value, lo, hi
                )));
            }
        }
        let [mu, kappa, theta, sigma_v, rho, lambda, mu_j, sigma_j] = values;
        Ok(Self {
            mu,
            kappa,
            theta,
            sigma_v,
            rho,
            lambda,
            mu_j,
            sigma_j,
        })
    }

    /// Build from values, clamping each into its bounds first.
    ///
    /// `bounds` must have passed [`ParameterBounds::validate`].
    pub(crate) fn clamped(values: [f64; NUM_PARAMS], bounds: &ParameterBounds) -> Self {
        let mut clamped = values;
        for parameter in Parameter::ALL {
            clamped[parameter.index()] = bounds.clamp(parameter, values[parameter.index()]);
        }
        let [mu, kappa, theta, sigma_v, rho, lambda, mu_j, sigma_j] = clamped;
        Self {
            mu,
            kappa,
            theta,
            sigma_v,
            rho,
            lambda,
            mu_j,
            sigma_j,
        }
    }

    /// Value of one parameter
    pub const fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::Mu => self.mu,
            Parameter::Kappa => self.kappa,
            Parameter::Theta => self.theta,
            Parameter::SigmaV => self.sigma_v,
            Parameter::Rho => self.rho,
            Parameter::Lambda => self.lambda,
            Parameter::MuJ => self.mu_j,
            Parameter::SigmaJ => self.sigma_j,
        }
    }

    /// Values in canonical order
    pub const fn to_array(&self) -> [f64; NUM_PARAMS] {
        [
            self.mu,
            self.kappa,
            self.theta,
            self.sigma_v,
            self.rho,
            self.lambda,
            self.mu_j,
            self.sigma_j,
        ]
    }

    /// `(parameter, value)` pairs in canonical order
    pub fn iter(&self) -> impl Iterator<Item = (Parameter, f64)> + '_ {
        Parameter::ALL.into_iter().map(|p| (p, self.get(p)))
    }

    /// Drift
    pub const fn mu(&self) -> f64 {
        self.mu
    }

    /// Mean-reversion speed
    pub const fn kappa(&self) -> f64 {
        self.kappa
    }

    /// Long-run variance
    pub const fn theta(&self) -> f64 {
        self.theta
    }

    /// Vol-of-vol
    pub const fn sigma_v(&self) -> f64 {
        self.sigma_v
    }

    /// Leverage correlation
    pub const fn rho(&self) -> f64 {
        self.rho
    }

    /// Jump intensity
    pub const fn lambda(&self) -> f64 {
        self.lambda
    }

    /// Jump mean
    pub const fn mu_j(&self) -> f64 {
        self.mu_j
    }

    /// Jump volatility
    pub const fn sigma_j(&self) -> f64 {
        self.sigma_j
    }

    /// Map onto the unconstrained optimization space.
    pub fn to_unconstrained(&self, bounds: &ParameterBounds) -> Array1<f64> {
        Parameter::ALL
            .iter()
            .map(|&p| {
                let (lo, hi) = bounds.get(p);
                let frac = ((self.get(p) - lo) / (hi - lo)).clamp(LOGIT_EDGE, 1.0 - LOGIT_EDGE);
                (frac / (1.0 - frac)).ln()
            })
            .collect()
    }

    /// Map a point of the unconstrained space back onto the bounds.
    ///
    /// # Errors
    /// Returns [`EstimationError::NumericDivergence`] if `u` has the wrong
    /// length or holds a non-finite coordinate.
    pub fn from_unconstrained(u: &Array1<f64>, bounds: &ParameterBounds) -> Result<Self, EstimationError> {
        if u.len() != NUM_PARAMS {
            return Err(EstimationError::NumericDivergence(format!(
                "expected {} coordinates, got {}",
                NUM_PARAMS,
                u.len()
            )));
        }

        let mut values = [0.0; NUM_PARAMS];
        for p in Parameter::ALL {
            let x = u[p.index()];
            if !x.is_finite() {
                return Err(EstimationError::NumericDivergence(format!(
                    "non-finite coordinate for {}",
                    p
                )));
            }
            let (lo, hi) = bounds.get(p);
            values[p.index()] = bounds.clamp(p, lo + (hi - lo) * sigmoid(x));
        }

        Self::new(values, bounds)
    }
}

/// Logistic function that does not overflow for large `|x|`.
fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn typical() -> [f64; NUM_PARAMS] {
        [0.05, 2.0, 0.04, 0.5, -0.6, 0.2, -0.03, 0.05]
    }

    #[test]
    fn test_canonical_order() {
        let names: Vec<&str> = Parameter::ALL.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec!["mu", "kappa", "theta", "sigma_v", "rho", "lambda", "mu_j", "sigma_j"]
        );
        for (i, p) in Parameter::ALL.iter().enumerate() {
            assert_eq!(p.index(), i);
            assert_eq!(Parameter::from_name(p.name()), Some(*p));
        }
        assert_eq!(ModelFamily::Svcj.parameters().len(), NUM_PARAMS);
    }

    #[test]
    fn test_default_bounds_are_valid() {
        assert!(ParameterBounds::default().validate().is_ok());
    }

    #[test]
    fn test_bounds_outside_domain_rejected() {
        let bounds = ParameterBounds {
            kappa: (0.0, 10.0),
            ..Default::default()
        };
        assert!(bounds.validate().is_err());

        let bounds = ParameterBounds {
            rho: (-1.0, 0.5),
            ..Default::default()
        };
        assert!(bounds.validate().is_err());

        let bounds = ParameterBounds {
            theta: (1.0, 0.5),
            ..Default::default()
        };
        assert!(bounds.validate().is_err());
    }

    #[test]
    fn test_inverted_bounds_are_an_error_not_a_panic() {
        let bounds = ParameterBounds {
            theta: (1.0, 0.5),
            ..Default::default()
        };
        assert_eq!(bounds.clamp(Parameter::Theta, 0.7), 0.5);
        assert_eq!(bounds.clamp(Parameter::Theta, 2.0), 0.5);

        let result = ParameterVector::from_unconstrained(&Array1::zeros(NUM_PARAMS), &bounds);
        assert!(matches!(result, Err(EstimationError::InvalidParameter(_))));
    }

    #[test]
    fn test_vector_outside_bounds_rejected() {
        let bounds = ParameterBounds::default();
        let mut values = typical();
        values[Parameter::Kappa.index()] = -1.0;
        assert!(ParameterVector::new(values, &bounds).is_err());

        values = typical();
        values[Parameter::SigmaV.index()] = f64::NAN;
        assert!(ParameterVector::new(values, &bounds).is_err());
    }

    #[test]
    fn test_clamped_vector_is_valid() {
        let bounds = ParameterBounds::default();
        let v = ParameterVector::clamped([10.0, -5.0, 100.0, 0.0, -2.0, -1.0, 1.0, f64::NAN], &bounds);
        for (p, value) in v.iter() {
            assert!(bounds.contains(p, value), "{} = {}", p, value);
        }
    }

    #[test]
    fn test_unconstrained_round_trip() {
        let bounds = ParameterBounds::default();
        let v = ParameterVector::new(typical(), &bounds).unwrap();
        let u = v.to_unconstrained(&bounds);
        let back = ParameterVector::from_unconstrained(&u, &bounds).unwrap();
        for p in Parameter::ALL {
            assert_relative_eq!(back.get(p), v.get(p), epsilon = 1e-9);
        }
    }

    #[test]
    fn test_extreme_coordinates_stay_in_bounds() {
        let bounds = ParameterBounds::default();
        for x in [-1e6, -50.0, 0.0, 50.0, 1e6] {
            let u = Array1::from_elem(NUM_PARAMS, x);
            let v = ParameterVector::from_unconstrained(&u, &bounds).unwrap();
            for (p, value) in v.iter() {
                assert!(bounds.contains(p, value));
            }
            assert!(v.kappa() > 0.0);
            assert!(v.theta() > 0.0);
        }
    }

    #[test]
    fn test_non_finite_coordinate_is_divergence() {
        let bounds = ParameterBounds::default();
        let mut u = Array1::zeros(NUM_PARAMS);
        u[3] = f64::NAN;
        assert!(matches!(
            ParameterVector::from_unconstrained(&u, &bounds),
            Err(EstimationError::NumericDivergence(_))
        ));
    }
}
