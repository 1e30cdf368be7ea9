//! Estimation errors.
//!
//! None of these abort a panel run: the orchestrator turns each one into a
//! missing cell and keeps it for diagnostics.

use thiserror::Error;

/// Errors that can occur while estimating one window
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EstimationError {
    /// Invalid parameter value or configuration
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// The window is too short for moment estimation
    #[error("Insufficient observations: need at least {required}, got {actual}")]
    InsufficientObservations {
        /// Required number of observations
        required: usize,
        /// Actual number of observations
        actual: usize,
    },

    /// The kernel or optimizer produced a non-finite value
    #[error("Numeric divergence: {0}")]
    NumericDivergence(String),

    /// No acceptable loss was reached after the retry
    #[error("Convergence failure: loss {loss:.6e} after {iterations} iterations")]
    ConvergenceFailure {
        /// Best loss of the last attempt
        loss: f64,
        /// Iterations used across all attempts
        iterations: usize,
    },

    /// The window has (numerically) zero variance
    #[error("Degenerate window: sample variance {variance:.3e} below floor")]
    DegenerateWindow {
        /// Sample variance of the window
        variance: f64,
    },

    /// The task was not started before the caller's deadline
    #[error("Cancelled before estimation started")]
    Cancelled,
}
