//! Time-indexed matrix of per-asset SVCJ parameters.
//!
//! Rows are as-of dates in ascending order. Columns are grouped by asset in
//! input order, and within each asset the parameters follow the canonical
//! order, so column `a * P + p` holds parameter `p` of asset `a`.

use chrono::NaiveDate;
use ndarray::{Array2, ArrayView1, Axis};
use std::collections::HashMap;
use svcj_model::{EstimationResult, ModelFamily, Parameter};
use thiserror::Error;

/// Errors raised while assembling a [`FactorMatrix`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    /// The same asset was listed twice
    #[error("Duplicate asset: {0}")]
    DuplicateAsset(String),

    /// A result refers to an asset that is not a column
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    /// A result refers to a date outside the grid
    #[error("Date {0} is not on the grid")]
    UnknownDate(NaiveDate),

    /// Two results target the same cell
    #[error("Duplicate result for {asset} at {date}")]
    DuplicateCell {
        /// Asset identifier
        asset: String,
        /// As-of date
        date: NaiveDate,
    },
}

/// Per-asset, per-parameter estimates on a shared date grid.
///
/// `None` marks a cell without an estimate.
#[derive(Debug, Clone, PartialEq)]
pub struct FactorMatrix {
    dates: Vec<NaiveDate>,
    assets: Vec<String>,
    family: ModelFamily,
    values: Array2<Option<f64>>,
}

impl FactorMatrix {
    /// Row dates (ascending)
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Assets in column order
    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    /// Parameters of each asset block in column order
    pub const fn parameters(&self) -> &'static [Parameter] {
        self.family.parameters()
    }

    /// Model family of the estimates
    pub const fn family(&self) -> ModelFamily {
        self.family
    }

    /// Raw cell values
    pub const fn values(&self) -> &Array2<Option<f64>> {
        &self.values
    }

    /// Number of rows (dates)
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of columns (assets times parameters)
    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// Whether the matrix has no rows
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Column names as `{asset}_{parameter}`
    pub fn column_names(&self) -> Vec<String> {
        self.assets
            .iter()
            .flat_map(|asset| {
                self.parameters()
                    .iter()
                    .map(move |p| format!("{}_{}", asset, p.name()))
            })
            .collect()
    }

    /// Column index of `(asset, parameter)`
    pub fn column_index(&self, asset: &str, parameter: Parameter) -> Option<usize> {
        let a = self.assets.iter().position(|x| x == asset)?;
        let p = self.parameters().iter().position(|x| *x == parameter)?;
        Some(a * self.parameters().len() + p)
    }

    /// Row index of `date`
    pub fn row_index(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    /// Value of one cell; `None` if missing or out of range
    pub fn get(&self, date: NaiveDate, asset: &str, parameter: Parameter) -> Option<f64> {
        let row = self.row_index(date)?;
        let col = self.column_index(asset, parameter)?;
        self.values[[row, col]]
    }

    /// Time series of one `(asset, parameter)` column
    pub fn column(&self, asset: &str, parameter: Parameter) -> Option<ArrayView1<'_, Option<f64>>> {
        let col = self.column_index(asset, parameter)?;
        Some(self.values.column(col))
    }

    /// All cells of one date
    pub fn row(&self, date: NaiveDate) -> Option<ArrayView1<'_, Option<f64>>> {
        let row = self.row_index(date)?;
        Some(self.values.row(row))
    }

    /// Number of missing cells
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Number of dates with an estimate for `asset`
    pub fn asset_rows(&self, asset: &str) -> Option<usize> {
        let first = self.column_index(asset, self.parameters()[0])?;
        Some(
            self.values
                .index_axis(Axis(1), first)
                .iter()
                .filter(|v| v.is_some())
                .count(),
        )
    }

    /// Share of grid rows with an estimate for `asset` (0 for an empty grid)
    pub fn asset_coverage(&self, asset: &str) -> Option<f64> {
        let rows = self.asset_rows(asset)?;
        if self.dates.is_empty() {
            Some(0.0)
        } else {
            Some(rows as f64 / self.dates.len() as f64)
        }
    }
}

/// Lays estimation results out on a fixed grid.
///
/// Results may be inserted in any order; the finished matrix only depends
/// on which cells were filled.
#[derive(Debug)]
pub struct FactorMatrixAssembler {
    dates: Vec<NaiveDate>,
    date_index: HashMap<NaiveDate, usize>,
    assets: Vec<String>,
    asset_index: HashMap<String, usize>,
    family: ModelFamily,
    values: Array2<Option<f64>>,
    filled: Array2<bool>,
}

impl FactorMatrixAssembler {
    /// Create an assembler for `assets` over the dates in `grid`.
    ///
    /// The grid is sorted and deduplicated.
    ///
    /// # Errors
    /// Returns [`MatrixError::DuplicateAsset`] if an asset is listed twice.
    pub fn new(grid: impl IntoIterator<Item = NaiveDate>, assets: Vec<String>) -> Result<Self, MatrixError> {
        let mut dates: Vec<NaiveDate> = grid.into_iter().collect();
        dates.sort_unstable();
        dates.dedup();

        let mut asset_index = HashMap::with_capacity(assets.len());
        for (i, asset) in assets.iter().enumerate() {
            if asset_index.insert(asset.clone(), i).is_some() {
                return Err(MatrixError::DuplicateAsset(asset.clone()));
            }
        }

        let family = ModelFamily::Svcj;
        let n_params = family.parameters().len();
        let (n_dates, n_assets) = (dates.len(), assets.len());
        let date_index = dates.iter().enumerate().map(|(i, d)| (*d, i)).collect();

        Ok(Self {
            dates,
            date_index,
            assets,
            asset_index,
            family,
            values: Array2::from_elem((n_dates, n_assets * n_params), None),
            filled: Array2::from_elem((n_dates, n_assets), false),
        })
    }

    /// Place one result.
    ///
    /// # Errors
    /// Returns an error for an unknown asset or date, or if the cell was
    /// already filled.
    pub fn insert(&mut self, result: &EstimationResult) -> Result<(), MatrixError> {
        let a = *self
            .asset_index
            .get(&result.asset)
            .ok_or_else(|| MatrixError::UnknownAsset(result.asset.clone()))?;
        let row = *self
            .date_index
            .get(&result.as_of)
            .ok_or(MatrixError::UnknownDate(result.as_of))?;

        if self.filled[[row, a]] {
            return Err(MatrixError::DuplicateCell {
                asset: result.asset.clone(),
                date: result.as_of,
            });
        }
        self.filled[[row, a]] = true;

        let n_params = self.family.parameters().len();
        for (p, parameter) in self.family.parameters().iter().enumerate() {
            self.values[[row, a * n_params + p]] = Some(result.params.get(*parameter));
        }
        Ok(())
    }

    /// Number of filled (asset, date) cells
    pub fn filled_count(&self) -> usize {
        self.filled.iter().filter(|f| **f).count()
    }

    /// Finish assembly
    pub fn finish(self) -> FactorMatrix {
        FactorMatrix {
            dates: self.dates,
            assets: self.assets,
            family: self.family,
            values: self.values,
        }
    }
}
