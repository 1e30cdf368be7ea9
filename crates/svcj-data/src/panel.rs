//! Return panels: one [`ReturnSeries`] per asset on a shared date index.
//!
//! The upstream feed delivers a table with dates as rows and assets as
//! columns. Assets may start or stop at different rows, so each column is
//! trimmed to its own history: leading and trailing missing values are
//! dropped, and interior gaps are filled with a zero return.
//!
//! Panels can be built from in-memory columns, a CSV file or a polars
//! [`DataFrame`]. When the input holds prices rather than log-returns the
//! loader converts them with `ln(p_t / p_{t-1})` and drops rows where no
//! asset has a return (the first row, typically).

use crate::error::{DataError, Result};
use crate::series::ReturnSeries;
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// What the value columns of an input table contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ValueKind {
    /// Log-returns, used as-is
    #[default]
    LogReturns,
    /// Prices, converted to log-returns on load
    Prices,
}

/// Options for loading a panel from a table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelLoadOptions {
    /// Name of the date column (default: "date")
    pub date_column: String,
    /// Kind of values in the asset columns (default: log-returns)
    pub values: ValueKind,
}

impl Default for PanelLoadOptions {
    fn default() -> Self {
        Self {
            date_column: "date".to_string(),
            values: ValueKind::LogReturns,
        }
    }
}

/// Log-return panel with ragged per-asset history.
#[derive(Debug, Clone)]
pub struct ReturnPanel {
    dates: Vec<NaiveDate>,
    series: Vec<ReturnSeries>,
}

impl ReturnPanel {
    /// Build a panel from a shared date index and one column per asset.
    ///
    /// `None` and NaN both mark a missing observation.
    ///
    /// # Errors
    /// Returns an error if dates are not strictly increasing, an asset name is
    /// repeated, a column length differs from the index, or a present value
    /// is infinite.
    pub fn new(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        check_increasing(&dates)?;
        check_column_count(&assets, columns.len())?;

        let mut seen = HashSet::new();
        let mut series = Vec::with_capacity(assets.len());

        for (asset, column) in assets.into_iter().zip(columns) {
            if !seen.insert(asset.clone()) {
                return Err(DataError::DuplicateAsset(asset));
            }
            if column.len() != dates.len() {
                return Err(DataError::ShapeMismatch {
                    asset,
                    expected: dates.len(),
                    actual: column.len(),
                });
            }
            series.push(trim_column(asset, &dates, &column)?);
        }

        Ok(Self { dates, series })
    }

    /// Build a panel from a table of prices, converting to log-returns.
    ///
    /// Rows where every asset lacks a return are dropped.
    ///
    /// # Errors
    /// Returns the same shape errors as [`ReturnPanel::new`], and an error
    /// for a non-positive price.
    pub fn from_prices(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        prices: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        check_increasing(&dates)?;
        check_column_count(&assets, prices.len())?;

        let mut returns = Vec::with_capacity(prices.len());
        for (asset, column) in assets.iter().zip(prices.iter()) {
            if column.len() != dates.len() {
                return Err(DataError::ShapeMismatch {
                    asset: asset.clone(),
                    expected: dates.len(),
                    actual: column.len(),
                });
            }
            returns.push(log_returns(asset, &dates, column)?);
        }

        let keep: Vec<bool> = (0..dates.len())
            .map(|row| returns.iter().any(|col| col[row].is_some()))
            .collect();

        let dates = filter_rows(&dates, &keep);
        let returns = returns.iter().map(|col| filter_rows(col, &keep)).collect();

        Self::new(dates, assets, returns)
    }

    /// Build a panel from already-constructed series.
    ///
    /// The shared index is the sorted union of all series dates.
    pub fn from_series(series: Vec<ReturnSeries>) -> Result<Self> {
        let mut seen = HashSet::new();
        for s in &series {
            if !seen.insert(s.asset().to_string()) {
                return Err(DataError::DuplicateAsset(s.asset().to_string()));
            }
        }

        let mut dates: Vec<NaiveDate> = series
            .iter()
            .flat_map(|s| s.dates().iter().copied())
            .collect();
        dates.sort_unstable();
        dates.dedup();

        Ok(Self { dates, series })
    }

    /// Load a panel from a CSV file.
    pub fn from_csv_path(path: impl AsRef<Path>, options: &PanelLoadOptions) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file, options)
    }

    /// Load a panel from CSV data.
    ///
    /// The header names the date column and the asset columns. Empty cells
    /// and `NaN` are missing values.
    pub fn from_csv_reader<R: Read>(reader: R, options: &PanelLoadOptions) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();

        let date_idx = headers
            .iter()
            .position(|h| h.trim() == options.date_column)
            .ok_or_else(|| {
                DataError::Parse(format!("Missing date column '{}'", options.date_column))
            })?;

        let assets: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(_, h)| h.trim().to_string())
            .collect();

        let mut dates = Vec::new();
        let mut columns: Vec<Vec<Option<f64>>> = vec![Vec::new(); assets.len()];

        for record in rdr.records() {
            let record = record?;
            let raw_date = record
                .get(date_idx)
                .ok_or_else(|| DataError::Parse("Missing date".to_string()))?;
            dates.push(parse_date(raw_date)?);

            let values = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != date_idx)
                .map(|(_, v)| v);
            for (column, raw) in columns.iter_mut().zip(values) {
                column.push(parse_value(raw)?);
            }
        }

        tracing::debug!(
            rows = dates.len(),
            assets = assets.len(),
            "Loaded panel from CSV"
        );

        Self::from_table(dates, assets, columns, options.values)
    }

    /// Load a panel from a polars DataFrame.
    ///
    /// Every column other than the date column is read as `Float64`; nulls are
    /// missing values.
    pub fn from_dataframe(df: &DataFrame, options: &PanelLoadOptions) -> Result<Self> {
        let date_col = df
            .column(&options.date_column)?
            .cast(&DataType::String)?;
        let dates = date_col
            .str()?
            .into_iter()
            .map(|d| {
                d.ok_or_else(|| DataError::Parse("Missing date".to_string()))
                    .and_then(parse_date)
            })
            .collect::<Result<Vec<_>>>()?;

        let assets: Vec<String> = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| *name != options.date_column)
            .collect();

        let mut columns = Vec::with_capacity(assets.len());
        for asset in &assets {
            let values = df.column(asset)?.cast(&DataType::Float64)?;
            columns.push(values.f64()?.into_iter().collect::<Vec<Option<f64>>>());
        }

        Self::from_table(dates, assets, columns, options.values)
    }

    fn from_table(
        dates: Vec<NaiveDate>,
        assets: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
        kind: ValueKind,
    ) -> Result<Self> {
        match kind {
            ValueKind::LogReturns => Self::new(dates, assets, columns),
            ValueKind::Prices => Self::from_prices(dates, assets, columns),
        }
    }

    /// Shared date index
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Asset identifiers in input order
    pub fn assets(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(ReturnSeries::asset)
    }

    /// Per-asset series in input order
    pub fn series(&self) -> &[ReturnSeries] {
        &self.series
    }

    /// Series of one asset
    pub fn series_for(&self, asset: &str) -> Result<&ReturnSeries> {
        self.series
            .iter()
            .find(|s| s.asset() == asset)
            .ok_or_else(|| DataError::UnknownAsset(asset.to_string()))
    }

    /// Number of assets
    pub const fn n_assets(&self) -> usize {
        self.series.len()
    }

    /// Number of rows in the shared index
    pub const fn n_dates(&self) -> usize {
        self.dates.len()
    }
}

fn check_increasing(dates: &[NaiveDate]) -> Result<()> {
    for pair in dates.windows(2) {
        if pair[1] <= pair[0] {
            return Err(DataError::NonIncreasingDates {
                previous: pair[0],
                current: pair[1],
            });
        }
    }
    Ok(())
}

fn check_column_count(assets: &[String], columns: usize) -> Result<()> {
    if assets.len() != columns {
        return Err(DataError::Parse(format!(
            "{} asset names for {} columns",
            assets.len(),
            columns
        )));
    }
    Ok(())
}

fn is_present(value: Option<f64>) -> bool {
    value.is_some_and(|v| !v.is_nan())
}

/// Trim one column to the asset's own history and fill interior gaps.
fn trim_column(asset: String, dates: &[NaiveDate], column: &[Option<f64>]) -> Result<ReturnSeries> {
    let first = column.iter().position(|v| is_present(*v));
    let last = column.iter().rposition(|v| is_present(*v));

    let (Some(first), Some(last)) = (first, last) else {
        return ReturnSeries::new(asset, Vec::new(), Vec::new());
    };

    let mut returns = Vec::with_capacity(last - first + 1);
    let mut gaps = 0usize;
    for (date, value) in dates[first..=last].iter().zip(&column[first..=last]) {
        match value {
            Some(v) if v.is_finite() => returns.push(*v),
            Some(v) if v.is_infinite() => {
                return Err(DataError::NonFiniteReturn {
                    asset,
                    date: *date,
                    value: *v,
                });
            }
            _ => {
                gaps += 1;
                returns.push(0.0);
            }
        }
    }

    if gaps > 0 {
        tracing::debug!(asset = %asset, gaps, "Filled interior gaps with zero returns");
    }

    ReturnSeries::new(asset, dates[first..=last].to_vec(), returns)
}

fn log_returns(asset: &str, dates: &[NaiveDate], prices: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    let mut out = Vec::with_capacity(prices.len());
    let mut previous: Option<f64> = None;

    for (date, price) in dates.iter().zip(prices) {
        let current = price.filter(|p| !p.is_nan());
        if let Some(p) = current {
            if !p.is_finite() || p <= 0.0 {
                return Err(DataError::InvalidPrice {
                    asset: asset.to_string(),
                    date: *date,
                    value: p,
                });
            }
        }
        out.push(match (previous, current) {
            (Some(prev), Some(cur)) => Some((cur / prev).ln()),
            _ => None,
        });
        if current.is_some() {
            previous = current;
        }
    }

    Ok(out)
}

fn filter_rows<T: Clone>(values: &[T], keep: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(keep)
        .filter(|(_, k)| **k)
        .map(|(v, _)| v.clone())
        .collect()
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    let date_part = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map_err(|e| DataError::Parse(format!("Invalid date '{}': {}", raw, e)))
}

fn parse_value(raw: &str) -> Result<Option<f64>> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") || raw.eq_ignore_ascii_case("null") {
        return Ok(None);
    }
    raw.parse::<f64>()
        .map(Some)
        .map_err(|e| DataError::Parse(format!("Invalid value '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_ragged_columns_are_trimmed() {
        let dates = vec![day(1), day(2), day(3), day(4), day(5)];
        let panel = ReturnPanel::new(
            dates,
            vec!["A".to_string(), "B".to_string()],
            vec![
                vec![Some(0.01), Some(0.02), Some(0.03), Some(0.04), Some(0.05)],
                vec![None, Some(f64::NAN), Some(0.01), None, Some(0.02)],
            ],
        )
        .unwrap();

        assert_eq!(panel.n_assets(), 2);
        assert_eq!(panel.series()[0].len(), 5);

        let b = panel.series_for("B").unwrap();
        assert_eq!(b.first_date(), Some(day(3)));
        assert_eq!(b.returns(), &[0.01, 0.0, 0.02]);
    }

    #[test]
    fn test_all_missing_column_is_empty() {
        let panel = ReturnPanel::new(
            vec![day(1), day(2)],
            vec!["A".to_string()],
            vec![vec![None, None]],
        )
        .unwrap();
        assert!(panel.series()[0].is_empty());
    }

    #[test]
    fn test_price_column_count_must_match_assets() {
        let dates = vec![day(1), day(2), day(3)];
        let prices = vec![
            vec![Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(1.0), Some(1.0), Some(1.0)],
        ];

        let from_prices = ReturnPanel::from_prices(dates.clone(), vec!["A".to_string()], prices);
        assert!(matches!(from_prices, Err(DataError::Parse(_))));

        let from_returns = ReturnPanel::new(
            dates,
            vec!["A".to_string()],
            vec![vec![Some(0.0); 3], vec![Some(0.0); 3]],
        );
        assert_eq!(
            from_prices.unwrap_err().to_string(),
            from_returns.unwrap_err().to_string()
        );
    }

    #[test]
    fn test_duplicate_asset_rejected() {
        let result = ReturnPanel::new(
            vec![day(1)],
            vec!["A".to_string(), "A".to_string()],
            vec![vec![Some(0.0)], vec![Some(0.0)]],
        );
        assert!(matches!(result, Err(DataError::DuplicateAsset(_))));
    }

    #[test]
    fn test_infinite_value_rejected() {
        let result = ReturnPanel::new(
            vec![day(1), day(2)],
            vec!["A".to_string()],
            vec![vec![Some(0.0), Some(f64::INFINITY)]],
        );
        assert!(matches!(result, Err(DataError::NonFiniteReturn { .. })));
    }

    #[test]
    fn test_prices_to_log_returns() {
        let panel = ReturnPanel::from_prices(
            vec![day(1), day(2), day(3)],
            vec!["A".to_string()],
            vec![vec![Some(100.0), Some(110.0), Some(99.0)]],
        )
        .unwrap();

        // The first row has no return and is dropped.
        assert_eq!(panel.n_dates(), 2);
        let a = &panel.series()[0];
        assert_relative_eq!(a.returns()[0], (110.0_f64 / 100.0).ln(), epsilon = 1e-12);
        assert_relative_eq!(a.returns()[1], (99.0_f64 / 110.0).ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_non_positive_price_rejected() {
        let result = ReturnPanel::from_prices(
            vec![day(1), day(2)],
            vec!["A".to_string()],
            vec![vec![Some(100.0), Some(0.0)]],
        );
        assert!(matches!(result, Err(DataError::InvalidPrice { .. })));
    }

    #[test]
    fn test_csv_loading() {
        let csv = "date,AAPL,MSFT\n2024-01-01,0.01,\n2024-01-02,-0.02,0.005\n2024-01-03,NaN,0.001\n";
        let panel =
            ReturnPanel::from_csv_reader(csv.as_bytes(), &PanelLoadOptions::default()).unwrap();

        assert_eq!(panel.assets().collect::<Vec<_>>(), vec!["AAPL", "MSFT"]);
        assert_eq!(panel.n_dates(), 3);
        assert_eq!(panel.series_for("AAPL").unwrap().len(), 2);
        assert_eq!(panel.series_for("MSFT").unwrap().len(), 2);
        assert!(matches!(
            panel.series_for("GOOG"),
            Err(DataError::UnknownAsset(_))
        ));
    }

    #[test]
    fn test_csv_missing_date_column() {
        let csv = "day,AAPL\n2024-01-01,0.01\n";
        let result = ReturnPanel::from_csv_reader(csv.as_bytes(), &PanelLoadOptions::default());
        assert!(matches!(result, Err(DataError::Parse(_))));
    }

    #[test]
    fn test_dataframe_loading() {
        let df = DataFrame::new(vec![
            Series::new(
                "date".into(),
                vec!["2024-01-01", "2024-01-02", "2024-01-03"],
            )
            .into(),
            Series::new("AAPL".into(), vec![Some(0.01), Some(0.02), None]).into(),
            Series::new("MSFT".into(), vec![None, Some(0.03), Some(0.04)]).into(),
        ])
        .unwrap();

        let panel = ReturnPanel::from_dataframe(&df, &PanelLoadOptions::default()).unwrap();
        assert_eq!(panel.n_assets(), 2);
        assert_eq!(panel.series_for("AAPL").unwrap().returns(), &[0.01, 0.02]);
        assert_eq!(panel.series_for("MSFT").unwrap().returns(), &[0.03, 0.04]);
    }

    #[test]
    fn test_from_series_union_index() {
        let a = ReturnSeries::new("A", vec![day(1), day(2)], vec![0.0, 0.0]).unwrap();
        let b = ReturnSeries::new("B", vec![day(2), day(3)], vec![0.0, 0.0]).unwrap();
        let panel = ReturnPanel::from_series(vec![a, b]).unwrap();
        assert_eq!(panel.dates(), &[day(1), day(2), day(3)]);
    }
}
