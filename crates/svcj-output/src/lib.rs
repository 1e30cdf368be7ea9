#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/svcj/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod export;
pub mod matrix;
pub mod summary;

pub use export::{ExportError, ExportFormat, Exporter};
pub use matrix::{FactorMatrix, FactorMatrixAssembler, MatrixError};
pub use summary::{AssetSummary, FactorSummary, ParameterSummary};
