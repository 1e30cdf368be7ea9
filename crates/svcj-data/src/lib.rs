#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/svcj/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod panel;
pub mod series;
pub mod window;

pub use error::{DataError, Result};
pub use panel::{PanelLoadOptions, ReturnPanel, ValueKind};
pub use series::ReturnSeries;
pub use window::{Window, WindowSlicer, Windows, window_count};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
