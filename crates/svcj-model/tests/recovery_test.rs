//! Parameter recovery on simulated return series.

use chrono::NaiveDate;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use svcj_model::{EstimationError, WindowEstimator};

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
}

fn gaussian(n: usize, sd: f64, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sd).unwrap();
    (0..n).map(|_| normal.sample(&mut rng)).collect()
}

#[test]
fn test_gaussian_series_has_no_jumps() {
    let estimator = WindowEstimator::try_default().unwrap();
    let sd = 0.01;
    let returns = gaussian(500, sd, 42);

    let result = estimator.estimate_returns("SIM", as_of(), &returns).unwrap();
    let dt = estimator.config().kernel.dt();
    let p = result.params;

    let true_variance = sd * sd;
    let diffusion_variance = p.theta() * dt;
    assert!(
        (diffusion_variance - true_variance).abs() / true_variance < 0.2,
        "theta*dt = {:e}, expected about {:e}",
        diffusion_variance,
        true_variance
    );

    let intensity = p.lambda() * dt;
    let jump_variance = intensity * (p.mu_j() * p.mu_j() + p.sigma_j() * p.sigma_j());
    assert!(intensity < 0.05, "lambda*dt = {}", intensity);
    assert!(jump_variance / true_variance < 0.1);
}

#[test]
fn test_negative_jumps_raise_intensity_and_skew_jump_mean() {
    let estimator = WindowEstimator::try_default().unwrap();
    let mut returns = gaussian(500, 0.008, 7);
    for i in (25..500).step_by(50) {
        returns[i] -= 0.06;
    }

    let baseline = estimator
        .estimate_returns("CALM", as_of(), &gaussian(500, 0.008, 7))
        .unwrap();
    let jumpy = estimator.estimate_returns("JUMPY", as_of(), &returns).unwrap();

    assert!(jumpy.params.lambda() > baseline.params.lambda());
    assert!(jumpy.params.mu_j() < 0.0);
}

#[test]
fn test_flat_series_is_degenerate() {
    let estimator = WindowEstimator::try_default().unwrap();
    let result = estimator.estimate_returns("FLAT", as_of(), &[0.0; 252]);
    assert!(matches!(result, Err(EstimationError::DegenerateWindow { .. })));
}
