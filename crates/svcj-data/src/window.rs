//! Fixed-length rolling windows over a return series.
//!
//! Window `i` covers indices `[i * step, i * step + size)` and exists while
//! `i * step + size <= len`. Partial trailing windows are dropped, never
//! padded, so the number of windows is `floor((len - size) / step) + 1`.

use crate::error::{DataError, Result};
use crate::series::ReturnSeries;
use chrono::NaiveDate;

/// Number of windows a series of `len` observations yields.
pub const fn window_count(len: usize, window_size: usize, step_size: usize) -> usize {
    if window_size == 0 || step_size == 0 || len < window_size {
        0
    } else {
        (len - window_size) / step_size + 1
    }
}

/// A contiguous slice of a [`ReturnSeries`] tagged with its as-of date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window<'a> {
    asset: &'a str,
    as_of: NaiveDate,
    offset: usize,
    returns: &'a [f64],
}

impl<'a> Window<'a> {
    /// Source asset identifier
    pub const fn asset(&self) -> &'a str {
        self.asset
    }

    /// Date of the last observation in the window
    pub const fn as_of(&self) -> NaiveDate {
        self.as_of
    }

    /// Index of the first observation within the source series
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Window returns
    pub const fn returns(&self) -> &'a [f64] {
        self.returns
    }

    /// Number of observations in the window
    pub const fn len(&self) -> usize {
        self.returns.len()
    }

    /// Whether the window is empty (never true for slicer-produced windows)
    pub const fn is_empty(&self) -> bool {
        self.returns.is_empty()
    }
}

/// Produces the rolling windows of one series.
///
/// The slicer is cheap to copy and [`WindowSlicer::iter`] can be called any
/// number of times; every call restarts from the first window.
#[derive(Debug, Clone, Copy)]
pub struct WindowSlicer<'a> {
    series: &'a ReturnSeries,
    window_size: usize,
    step_size: usize,
}

impl<'a> WindowSlicer<'a> {
    /// Create a slicer over `series`.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidConfiguration`] if either size is zero and
    /// [`DataError::InsufficientData`] if the series is shorter than a window.
    pub fn new(series: &'a ReturnSeries, window_size: usize, step_size: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(DataError::InvalidConfiguration(
                "window_size must be positive".to_string(),
            ));
        }
        if step_size == 0 {
            return Err(DataError::InvalidConfiguration(
                "step_size must be positive".to_string(),
            ));
        }
        if series.len() < window_size {
            return Err(DataError::InsufficientData {
                asset: series.asset().to_string(),
                required: window_size,
                actual: series.len(),
            });
        }

        Ok(Self {
            series,
            window_size,
            step_size,
        })
    }

    /// Number of windows this slicer yields
    pub const fn len(&self) -> usize {
        window_count(self.series.len(), self.window_size, self.step_size)
    }

    /// Whether the slicer yields no windows
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `index`-th window, if it exists
    pub fn get(&self, index: usize) -> Option<Window<'a>> {
        if index >= self.len() {
            return None;
        }
        let start = index * self.step_size;
        let end = start + self.window_size;
        Some(Window {
            asset: self.series.asset(),
            as_of: self.series.dates()[end - 1],
            offset: start,
            returns: &self.series.returns()[start..end],
        })
    }

    /// Iterate the windows from the beginning of the series.
    pub const fn iter(&self) -> Windows<'a> {
        Windows {
            slicer: *self,
            next: 0,
        }
    }
}

impl<'a> IntoIterator for WindowSlicer<'a> {
    type Item = Window<'a>;
    type IntoIter = Windows<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Lazy iterator over the windows of a [`WindowSlicer`].
#[derive(Debug, Clone)]
pub struct Windows<'a> {
    slicer: WindowSlicer<'a>,
    next: usize,
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.slicer.get(self.next)?;
        self.next += 1;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.slicer.len().saturating_sub(self.next);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Windows<'_> {}
