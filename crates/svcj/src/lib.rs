#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/svcj/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod engine;
pub mod error;

// Re-export main types from sub-crates
pub use svcj_data as data;
pub use svcj_model as model;
pub use svcj_output as output;

pub use engine::{
    CellFailure, MIN_WINDOW_SIZE, PanelConfig, PanelEstimate, PanelEstimator, TaskOutcome,
    estimate_factor_matrix, estimate_factor_matrix_with,
};
pub use error::EngineError;

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
