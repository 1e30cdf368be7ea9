//! Engine errors.

use svcj_data::DataError;
use svcj_output::MatrixError;
use thiserror::Error;

/// Errors that abort a panel run.
///
/// Per-window estimation failures never surface here; they are recorded as
/// missing cells in the result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Window, step, thread or estimator settings are invalid
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The worker pool could not be created
    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// The panel could not be sliced
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Results could not be placed on the grid
    #[error("Assembly error: {0}")]
    Assembly(#[from] MatrixError),
}
