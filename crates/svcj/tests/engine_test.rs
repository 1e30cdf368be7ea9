//! End-to-end tests of the panel engine.

use chrono::{Duration, NaiveDate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::sync::atomic::{AtomicUsize, Ordering};
use svcj::data::{ReturnPanel, ReturnSeries};
use svcj::model::{EstimationError, Parameter};
use svcj::{EngineError, PanelConfig, PanelEstimator, estimate_factor_matrix};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn gaussian_series(asset: &str, offset: i64, n: usize, sd: f64, seed: u64) -> ReturnSeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::new(0.0, sd).unwrap();
    let dates = (0..n)
        .map(|i| start() + Duration::days(offset + i as i64))
        .collect();
    let returns = (0..n).map(|_| normal.sample(&mut rng)).collect();
    ReturnSeries::new(asset, dates, returns).unwrap()
}

fn small_config(window: usize, step: usize) -> PanelConfig {
    let mut config = PanelConfig::new(window, step);
    config.threads = Some(2);
    config.estimator.optimizer.max_iterations = 400;
    config
}

#[test]
fn test_window_grid_for_single_asset() {
    let panel = ReturnPanel::from_series(vec![gaussian_series("SPY", 0, 300, 0.01, 1)]).unwrap();
    let estimate = PanelEstimator::new(PanelConfig::new(126, 5))
        .unwrap()
        .run(&panel)
        .unwrap();

    let matrix = &estimate.matrix;
    assert_eq!(matrix.n_rows(), 35);
    assert_eq!(estimate.n_tasks(), 35);
    assert_eq!(matrix.dates()[0], start() + Duration::days(125));
    assert_eq!(matrix.dates()[34], start() + Duration::days(125 + 170));
    assert!(estimate.failures.is_empty(), "{:?}", estimate.failures);
    assert_eq!(estimate.results.len(), 35);
    assert_eq!(matrix.asset_rows("SPY"), Some(35));
    assert_eq!(matrix.missing_count(), 0);
    assert_eq!(estimate.cancelled, 0);
}

#[test]
fn test_short_asset_is_entirely_missing() {
    let panel = ReturnPanel::from_series(vec![
        gaussian_series("LONG", 0, 200, 0.01, 2),
        gaussian_series("SHORT", 150, 50, 0.02, 3),
    ])
    .unwrap();

    let estimate = PanelEstimator::new(small_config(126, 10))
        .unwrap()
        .run(&panel)
        .unwrap();

    assert_eq!(estimate.insufficient_assets, vec!["SHORT".to_string()]);
    assert_eq!(estimate.matrix.n_rows(), 8);
    assert_eq!(estimate.matrix.asset_rows("SHORT"), Some(0));
    assert!(estimate.matrix.asset_rows("LONG").unwrap() > 0);
    assert_eq!(estimate.matrix.n_cols(), 16);
}

#[test]
fn test_ragged_assets_share_union_grid() {
    let panel = ReturnPanel::from_series(vec![
        gaussian_series("A", 0, 140, 0.01, 4),
        gaussian_series("B", 10, 140, 0.01, 5),
    ])
    .unwrap();

    let estimate = PanelEstimator::new(PanelConfig::new(126, 7))
        .unwrap()
        .run(&panel)
        .unwrap();

    // Each asset yields 3 windows; B's as-of dates are shifted by 10 days
    assert_eq!(estimate.n_tasks(), 6);
    assert!(estimate.failures.is_empty(), "{:?}", estimate.failures);

    let matrix = &estimate.matrix;
    assert_eq!(matrix.n_rows(), 6);
    assert_eq!(matrix.asset_rows("A"), Some(3));
    assert_eq!(matrix.asset_rows("B"), Some(3));

    let first = matrix.dates()[0];
    let last = matrix.dates()[5];
    assert_eq!(first, start() + Duration::days(125));
    assert_eq!(last, start() + Duration::days(10 + 139));
    assert!(matrix.get(first, "A", Parameter::Kappa).is_some());
    assert!(matrix.get(first, "B", Parameter::Kappa).is_none());
    assert!(matrix.get(last, "A", Parameter::Kappa).is_none());
    assert!(matrix.get(last, "B", Parameter::Kappa).is_some());
}

#[test]
fn test_factor_matrix_skips_asset_shorter_than_window() {
    let panel = ReturnPanel::from_series(vec![
        gaussian_series("A", 0, 200, 0.01, 2),
        gaussian_series("B", 150, 50, 0.02, 3),
    ])
    .unwrap();

    let matrix = estimate_factor_matrix(&panel, 126, 1).unwrap();

    assert_eq!(matrix.n_rows(), 75);
    assert_eq!(matrix.asset_rows("A"), Some(75));
    assert_eq!(matrix.asset_rows("B"), Some(0));
    assert_eq!(matrix.missing_count(), 75 * 8);
}

#[test]
fn test_runs_are_identical() {
    let panel = ReturnPanel::from_series(vec![
        gaussian_series("X", 0, 180, 0.012, 6),
        gaussian_series("Y", 0, 180, 0.02, 7),
    ])
    .unwrap();

    let first = PanelEstimator::new(small_config(126, 9)).unwrap().run(&panel).unwrap();
    let second = PanelEstimator::new(PanelConfig {
        threads: Some(1),
        ..small_config(126, 9)
    })
    .unwrap()
    .run(&panel)
    .unwrap();

    assert_eq!(first.matrix, second.matrix);
    assert_eq!(first.results, second.results);
}

#[test]
fn test_flat_window_is_missing_not_fatal() {
    let dates: Vec<NaiveDate> = (0..130).map(|i| start() + Duration::days(i)).collect();
    let flat = ReturnSeries::new("FLAT", dates, vec![0.0; 130]).unwrap();
    let panel = ReturnPanel::from_series(vec![flat]).unwrap();

    let estimate = PanelEstimator::new(small_config(126, 1))
        .unwrap()
        .run(&panel)
        .unwrap();

    assert_eq!(estimate.matrix.n_rows(), 5);
    assert_eq!(estimate.matrix.missing_count(), 5 * 8);
    assert_eq!(estimate.failures.len(), 5);
    assert!(
        estimate
            .failures
            .iter()
            .all(|f| matches!(f.error, EstimationError::DegenerateWindow { .. }))
    );
}

#[test]
fn test_zero_timeout_cancels_everything() {
    let panel = ReturnPanel::from_series(vec![
        gaussian_series("A", 0, 150, 0.01, 8),
        gaussian_series("B", 0, 150, 0.01, 9),
    ])
    .unwrap();

    let config = PanelConfig {
        timeout: Some(std::time::Duration::ZERO),
        ..small_config(126, 4)
    };
    let estimate = PanelEstimator::new(config).unwrap().run(&panel).unwrap();

    assert_eq!(estimate.cancelled, 14);
    assert!(estimate.results.is_empty());
    assert_eq!(estimate.matrix.n_rows(), 7);
    assert_eq!(estimate.matrix.missing_count(), 7 * 16);
}

#[test]
fn test_observer_sees_every_task() {
    let panel = ReturnPanel::from_series(vec![gaussian_series("Q", 0, 160, 0.01, 10)]).unwrap();
    let engine = PanelEstimator::new(small_config(126, 2)).unwrap();
    let seen = AtomicUsize::new(0);

    let estimate = engine
        .run_with_observer(&panel, |_, _| {
            seen.fetch_add(1, Ordering::Relaxed);
        })
        .unwrap();

    assert_eq!(engine.task_count(&panel), 18);
    assert_eq!(seen.load(Ordering::Relaxed), 18);
    assert_eq!(estimate.n_tasks(), 18);
}

#[test]
fn test_invalid_configuration_fails_before_work() {
    let panel = ReturnPanel::from_series(vec![gaussian_series("Z", 0, 50, 0.01, 11)]).unwrap();
    assert!(matches!(
        estimate_factor_matrix(&panel, 8, 1),
        Err(EngineError::InvalidConfiguration(_))
    ));
    assert!(matches!(
        estimate_factor_matrix(&panel, 20, 0),
        Err(EngineError::InvalidConfiguration(_))
    ));
}
