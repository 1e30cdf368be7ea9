//! CSV, JSON and DataFrame export of factor matrices and estimation results.
//!
//! The CSV layout is one row per date with a `date` column followed by the
//! `{asset}_{parameter}` columns; missing cells are empty. JSON holds one
//! record per date in the same column order, with `null` for missing cells.

use crate::matrix::FactorMatrix;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use svcj_model::EstimationResult;
use thiserror::Error;

/// Errors that can occur during export operations.
#[derive(Debug, Error)]
pub enum ExportError {
    /// CSV serialization error.
    #[error("CSV serialization error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DataFrame construction error.
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
}

/// Export format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Comma-separated values format.
    Csv,

    /// Compact JSON format.
    Json,

    /// Pretty-printed JSON format.
    PrettyJson,
}

impl ExportFormat {
    /// Get the file extension for this format.
    pub const fn extension(&self) -> &str {
        match self {
            Self::Csv => "csv",
            Self::Json | Self::PrettyJson => "json",
        }
    }
}

/// Trait for exporting data in various formats.
pub trait Exporter {
    /// Export data to a string in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError>;

    /// Export data to a file in the specified format.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or file writing fails.
    fn export_to_file(&self, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
        let content = self.export_to_string(format)?;
        let mut file = File::create(path)?;
        file.write_all(content.as_bytes())?;
        Ok(())
    }
}

fn csv_to_string(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let bytes = wtr.into_inner().map_err(|e| e.into_error())?;
    String::from_utf8(bytes).map_err(|e| {
        ExportError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })
}

/// One matrix row as a JSON object with ordered keys.
struct MatrixRecord<'a> {
    matrix: &'a FactorMatrix,
    names: &'a [String],
    row: usize,
}

impl Serialize for MatrixRecord<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.names.len() + 1))?;
        map.serialize_entry("date", &self.matrix.dates()[self.row])?;
        for (col, name) in self.names.iter().enumerate() {
            map.serialize_entry(name, &self.matrix.values()[[self.row, col]])?;
        }
        map.end()
    }
}

struct MatrixRecords<'a>(&'a FactorMatrix);

impl Serialize for MatrixRecords<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.0.column_names();
        let mut seq = serializer.serialize_seq(Some(self.0.n_rows()))?;
        for row in 0..self.0.n_rows() {
            seq.serialize_element(&MatrixRecord {
                matrix: self.0,
                names: &names,
                row,
            })?;
        }
        seq.end()
    }
}

impl Exporter for FactorMatrix {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                let mut header = vec!["date".to_string()];
                header.extend(self.column_names());
                wtr.write_record(&header)?;

                for (row, date) in self.dates().iter().enumerate() {
                    let mut record = Vec::with_capacity(self.n_cols() + 1);
                    record.push(date.format("%Y-%m-%d").to_string());
                    record.extend(
                        self.values()
                            .row(row)
                            .iter()
                            .map(|v| v.map(|x| x.to_string()).unwrap_or_default()),
                    );
                    wtr.write_record(&record)?;
                }
                csv_to_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(&MatrixRecords(self))?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(&MatrixRecords(self))?),
        }
    }
}

impl FactorMatrix {
    /// Convert to a polars DataFrame with a `date` column of type Date and
    /// one nullable Float64 column per `{asset}_{parameter}`.
    ///
    /// # Errors
    /// Returns an error if the DataFrame cannot be built.
    pub fn to_dataframe(&self) -> Result<DataFrame, ExportError> {
        let dates: Vec<String> = self
            .dates()
            .iter()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .collect();

        let mut columns: Vec<Column> = Vec::with_capacity(self.n_cols() + 1);
        columns.push(Series::new("date".into(), dates).into());
        for (col, name) in self.column_names().iter().enumerate() {
            let values: Vec<Option<f64>> = self.values().column(col).to_vec();
            columns.push(Series::new(name.as_str().into(), values).into());
        }

        let df = DataFrame::new(columns)?
            .lazy()
            .with_column(col("date").cast(DataType::Date))
            .collect()?;

        Ok(df)
    }
}

/// Flattened estimation result for CSV export.
#[derive(Debug, Serialize)]
struct ResultRecord<'a> {
    asset: &'a str,
    as_of: NaiveDate,
    mu: f64,
    kappa: f64,
    theta: f64,
    sigma_v: f64,
    rho: f64,
    lambda: f64,
    mu_j: f64,
    sigma_j: f64,
    loss: f64,
    iterations: usize,
    attempts: usize,
    converged: bool,
    termination: &'static str,
}

impl<'a> From<&'a EstimationResult> for ResultRecord<'a> {
    fn from(result: &'a EstimationResult) -> Self {
        let p = &result.params;
        Self {
            asset: &result.asset,
            as_of: result.as_of,
            mu: p.mu(),
            kappa: p.kappa(),
            theta: p.theta(),
            sigma_v: p.sigma_v(),
            rho: p.rho(),
            lambda: p.lambda(),
            mu_j: p.mu_j(),
            sigma_j: p.sigma_j(),
            loss: result.loss,
            iterations: result.iterations,
            attempts: result.attempts,
            converged: result.converged,
            termination: result.termination.as_str(),
        }
    }
}

impl Exporter for Vec<EstimationResult> {
    fn export_to_string(&self, format: ExportFormat) -> Result<String, ExportError> {
        match format {
            ExportFormat::Csv => {
                let mut wtr = csv::Writer::from_writer(vec![]);
                for result in self {
                    wtr.serialize(ResultRecord::from(result))?;
                }
                csv_to_string(wtr)
            }
            ExportFormat::Json => Ok(serde_json::to_string(self)?),
            ExportFormat::PrettyJson => Ok(serde_json::to_string_pretty(self)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::FactorMatrixAssembler;
    use svcj_model::{Parameter, ParameterBounds, ParameterVector, Termination};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn result(asset: &str, as_of: NaiveDate) -> EstimationResult {
        EstimationResult {
            asset: asset.to_string(),
            as_of,
            params: ParameterVector::new(
                [0.05, 2.0, 0.04, 0.5, -0.6, 0.2, -0.03, 0.05],
                &ParameterBounds::default(),
            )
            .unwrap(),
            converged: true,
            iterations: 42,
            loss: 0.25,
            termination: Termination::Converged,
            attempts: 1,
        }
    }

    fn matrix() -> FactorMatrix {
        let mut assembler =
            FactorMatrixAssembler::new([date(2), date(3)], vec!["AAPL".into(), "MSFT".into()])
                .unwrap();
        assembler.insert(&result("AAPL", date(3))).unwrap();
        assembler.insert(&result("MSFT", date(2))).unwrap();
        assembler.finish()
    }

    #[test]
    fn test_matrix_csv() {
        let csv = matrix().export_to_string(ExportFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("date,AAPL_mu,AAPL_kappa"));
        assert!(lines[0].ends_with("MSFT_sigma_j"));
        // AAPL is missing on the first date
        assert!(lines[1].starts_with("2024-01-02,,,,,,,,,0.05,2,"));
        assert!(lines[2].starts_with("2024-01-03,0.05,2,0.04"));
        assert!(lines[2].ends_with(",,,,,,,"));
    }

    #[test]
    fn test_matrix_json() {
        let json = matrix().export_to_string(ExportFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let records = value.as_array().unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["date"], "2024-01-02");
        assert!(records[0]["AAPL_kappa"].is_null());
        assert_eq!(records[0]["MSFT_kappa"], 2.0);
        assert_eq!(records[1]["AAPL_rho"], -0.6);
        // Keys follow column order
        assert!(json.find("AAPL_mu").unwrap() < json.find("MSFT_mu").unwrap());
    }

    #[test]
    fn test_matrix_pretty_json() {
        let json = matrix().export_to_string(ExportFormat::PrettyJson).unwrap();
        assert!(json.contains("  "));
        assert!(json.contains("\"MSFT_sigma_j\""));
    }

    #[test]
    fn test_matrix_dataframe() {
        let m = matrix();
        let df = m.to_dataframe().unwrap();

        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 17);
        assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);

        let kappa = df.column("AAPL_kappa").unwrap().f64().unwrap();
        assert_eq!(kappa.get(0), None);
        assert_eq!(kappa.get(1), Some(2.0));
        assert_eq!(kappa.null_count(), 1);
        assert_eq!(
            m.get(date(3), "AAPL", Parameter::Kappa),
            kappa.get(1)
        );
    }

    #[test]
    fn test_results_csv() {
        let results = vec![result("AAPL", date(2)), result("MSFT", date(3))];
        let csv = results.export_to_string(ExportFormat::Csv).unwrap();
        assert!(csv.starts_with("asset,as_of,mu,kappa"));
        assert!(csv.contains("AAPL,2024-01-02"));
        assert!(csv.contains("converged"));
    }

    #[test]
    fn test_export_to_file() {
        let path = std::env::temp_dir().join(format!("svcj_export_{}.csv", std::process::id()));
        matrix().export_to_file(&path, ExportFormat::Csv).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("date,"));
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_extension() {
        assert_eq!(ExportFormat::Csv.extension(), "csv");
        assert_eq!(ExportFormat::PrettyJson.extension(), "json");
    }
}
