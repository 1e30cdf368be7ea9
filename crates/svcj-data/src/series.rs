//! Return series for a single asset.

use crate::error::{DataError, Result};
use chrono::NaiveDate;
use serde::Serialize;

/// Ordered log-returns of one asset.
///
/// Dates are strictly increasing and every value is finite. A series is
/// read-only once built; windows borrow slices of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReturnSeries {
    asset: String,
    dates: Vec<NaiveDate>,
    returns: Vec<f64>,
}

impl ReturnSeries {
    /// Build a series from parallel date and return vectors.
    ///
    /// # Errors
    /// Returns an error if the lengths differ, a value is non-finite, or
    /// the dates are not strictly increasing.
    pub fn new(asset: impl Into<String>, dates: Vec<NaiveDate>, returns: Vec<f64>) -> Result<Self> {
        let asset = asset.into();

        if dates.len() != returns.len() {
            return Err(DataError::ShapeMismatch {
                asset,
                expected: dates.len(),
                actual: returns.len(),
            });
        }

        for pair in dates.windows(2) {
            if pair[1] <= pair[0] {
                return Err(DataError::NonIncreasingDates {
                    previous: pair[0],
                    current: pair[1],
                });
            }
        }

        if let Some((date, value)) = dates
            .iter()
            .zip(returns.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(DataError::NonFiniteReturn {
                asset,
                date: *date,
                value: *value,
            });
        }

        Ok(Self {
            asset,
            dates,
            returns,
        })
    }

    /// Build a series from `(date, return)` pairs.
    pub fn from_pairs(
        asset: impl Into<String>,
        pairs: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self> {
        let (dates, returns) = pairs.into_iter().unzip();
        Self::new(asset, dates, returns)
    }

    /// Asset identifier
    pub fn asset(&self) -> &str {
        &self.asset
    }

    /// Observation dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Log-returns, aligned with [`Self::dates`]
    pub fn returns(&self) -> &[f64] {
        &self.returns
    }

    /// Number of observations
    pub const fn len(&self) -> usize {
        self.returns.len()
    }

    /// Whether the series has no observations
    pub const fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }

    /// First observation date, if any
    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    /// Last observation date, if any
    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}
