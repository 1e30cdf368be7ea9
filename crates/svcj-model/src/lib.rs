#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/svcj/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod estimator;
pub mod kernel;
pub mod moments;
pub mod optimizer;
pub mod params;

// Re-export main types
pub use error::EstimationError;
pub use estimator::{EstimationResult, EstimatorConfig, WindowEstimator};
pub use kernel::{KernelConfig, MomentKernel, MomentWeights};
pub use moments::{ModelMoments, SampleMoments};
pub use optimizer::{NelderMead, OptimizationFailure, OptimizationOutcome, OptimizerConfig, Termination};
pub use params::{ModelFamily, NUM_PARAMS, Parameter, ParameterBounds, ParameterVector};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
