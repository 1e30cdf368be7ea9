//! Per-asset coverage and parameter summary of a factor matrix.

use crate::matrix::FactorMatrix;
use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use svcj_model::Parameter;

/// Mean and latest value of one parameter of one asset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParameterSummary {
    /// Parameter
    pub parameter: Parameter,
    /// Mean over estimated dates
    pub mean: Option<f64>,
    /// Value at the last estimated date
    pub latest: Option<f64>,
}

/// Coverage and parameter summary of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetSummary {
    /// Asset identifier
    pub asset: String,
    /// Number of dates with an estimate
    pub estimated_rows: usize,
    /// Share of the grid with an estimate
    pub coverage: f64,
    /// Last date with an estimate
    pub latest_date: Option<NaiveDate>,
    /// One entry per parameter in canonical order
    pub parameters: Vec<ParameterSummary>,
}

impl AssetSummary {
    /// Summary of `parameter`, if present
    pub fn parameter(&self, parameter: Parameter) -> Option<&ParameterSummary> {
        self.parameters.iter().find(|p| p.parameter == parameter)
    }
}

/// Summary of a whole factor matrix.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FactorSummary {
    /// Number of grid dates
    pub n_dates: usize,
    /// First grid date
    pub first_date: Option<NaiveDate>,
    /// Last grid date
    pub last_date: Option<NaiveDate>,
    /// Number of missing cells
    pub missing_cells: usize,
    /// Total number of cells
    pub total_cells: usize,
    /// Per-asset summaries in column order
    pub assets: Vec<AssetSummary>,
}

impl FactorSummary {
    /// Summarize `matrix`.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use svcj_output::{FactorMatrixAssembler, FactorSummary};
    ///
    /// let grid = [NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()];
    /// let matrix = FactorMatrixAssembler::new(grid, vec!["SPY".to_string()])
    ///     .unwrap()
    ///     .finish();
    ///
    /// let summary = FactorSummary::from_matrix(&matrix);
    /// assert_eq!(summary.assets[0].estimated_rows, 0);
    /// assert_eq!(summary.missing_cells, 8);
    /// ```
    pub fn from_matrix(matrix: &FactorMatrix) -> Self {
        let dates = matrix.dates();
        let assets = matrix
            .assets()
            .iter()
            .map(|asset| summarize_asset(matrix, asset))
            .collect();

        Self {
            n_dates: dates.len(),
            first_date: dates.first().copied(),
            last_date: dates.last().copied(),
            missing_cells: matrix.missing_count(),
            total_cells: matrix.n_rows() * matrix.n_cols(),
            assets,
        }
    }

    /// Assets without a single estimate
    pub fn empty_assets(&self) -> Vec<&str> {
        self.assets
            .iter()
            .filter(|a| a.estimated_rows == 0)
            .map(|a| a.asset.as_str())
            .collect()
    }

    /// Generate an ASCII table representation.
    pub fn to_ascii_table(&self) -> String {
        let mut output = String::new();

        output.push_str("\nSVCJ Factor Summary\n");
        match (self.first_date, self.last_date) {
            (Some(first), Some(last)) => {
                output.push_str(&format!(
                    "Period: {} to {} ({} dates)\n",
                    first, last, self.n_dates
                ));
            }
            _ => output.push_str("Period: (no estimates)\n"),
        }
        output.push_str(&"=".repeat(80));
        output.push('\n');

        output.push_str(&format!(
            "{:<20} {:>12} {:>12} {:>14}\n",
            "Asset", "Rows", "Coverage", "Latest"
        ));
        output.push_str(&"-".repeat(80));
        output.push('\n');
        for asset in &self.assets {
            output.push_str(&format!(
                "{:<20} {:>12} {:>11.1}% {:>14}\n",
                asset.asset,
                asset.estimated_rows,
                asset.coverage * 100.0,
                asset
                    .latest_date
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "-".to_string())
            ));
        }

        for asset in self.assets.iter().filter(|a| a.estimated_rows > 0) {
            output.push_str(&format!("\n{}:\n", asset.asset));
            output.push_str(&"-".repeat(80));
            output.push('\n');
            output.push_str(&format!("{:<20} {:>16} {:>16}\n", "Parameter", "Mean", "Latest"));
            for p in &asset.parameters {
                output.push_str(&format!(
                    "{:<20} {:>16} {:>16}\n",
                    p.parameter.name(),
                    format_value(p.mean),
                    format_value(p.latest)
                ));
            }
        }

        output.push_str(&"=".repeat(80));
        output.push('\n');
        output.push_str(&format!(
            "Missing cells: {} of {}\n",
            self.missing_cells, self.total_cells
        ));

        output
    }

    /// Generate a Markdown representation.
    pub fn to_markdown(&self) -> String {
        let mut output = String::new();

        output.push_str("# SVCJ Factor Summary\n\n");
        if let (Some(first), Some(last)) = (self.first_date, self.last_date) {
            output.push_str(&format!("**Period:** {} to {}\n\n", first, last));
        }

        output.push_str("| Asset | Rows | Coverage |");
        for p in Parameter::ALL {
            output.push_str(&format!(" {} |", p.name()));
        }
        output.push('\n');
        output.push_str("|-------|-----:|---------:|");
        for _ in Parameter::ALL {
            output.push_str("---:|");
        }
        output.push('\n');

        for asset in &self.assets {
            output.push_str(&format!(
                "| {} | {} | {:.1}% |",
                asset.asset,
                asset.estimated_rows,
                asset.coverage * 100.0
            ));
            for p in &asset.parameters {
                output.push_str(&format!(" {} |", format_value(p.latest)));
            }
            output.push('\n');
        }

        output
    }
}

impl fmt::Display for FactorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_ascii_table())
    }
}

fn summarize_asset(matrix: &FactorMatrix, asset: &str) -> AssetSummary {
    let estimated_rows = matrix.asset_rows(asset).unwrap_or(0);
    let coverage = matrix.asset_coverage(asset).unwrap_or(0.0);

    let latest_row = matrix
        .column(asset, Parameter::ALL[0])
        .and_then(|col| col.iter().rposition(|v| v.is_some()));

    let parameters = matrix
        .parameters()
        .iter()
        .map(|&parameter| {
            let (mean, latest) = match matrix.column(asset, parameter) {
                Some(col) => {
                    let present: Vec<f64> = col.iter().filter_map(|v| *v).collect();
                    let mean = if present.is_empty() {
                        None
                    } else {
                        Some(present.iter().sum::<f64>() / present.len() as f64)
                    };
                    (mean, latest_row.and_then(|r| col[r]))
                }
                None => (None, None),
            };
            ParameterSummary {
                parameter,
                mean,
                latest,
            }
        })
        .collect();

    AssetSummary {
        asset: asset.to_string(),
        estimated_rows,
        coverage,
        latest_date: latest_row.map(|r| matrix.dates()[r]),
        parameters,
    }
}

fn format_value(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.6}", v))
        .unwrap_or_else(|| "-".to_string())
}
