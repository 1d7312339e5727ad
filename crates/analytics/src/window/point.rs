//! Point-based window extraction
//!
//! Fixed sample-count windows advancing by a fixed sample stride. The
//! trailing partial window is dropped, so every emitted window holds
//! exactly `window_size` samples.

use crate::error::{AnalyticsError, Result};
use crate::models::MetricSeries;

use super::TimeWindow;

/// Extracts fixed-size windows by sample count
///
/// For a series of `n` samples this yields
/// `floor((n - window_size) / stride) + 1` windows when `n >= window_size`.
/// Strides larger than the window size leave uncovered gaps; strides
/// smaller than it overlap. Both are legitimate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointWindowExtractor {
    window_size: usize,
    stride: usize,
}

impl PointWindowExtractor {
    /// Create an extractor, rejecting degenerate configurations
    ///
    /// # Errors
    /// `Config` if `window_size` or `stride` is zero.
    pub fn new(window_size: usize, stride: usize) -> Result<Self> {
        if window_size == 0 {
            return Err(AnalyticsError::Config(
                "window size must be positive".to_string(),
            ));
        }
        if stride == 0 {
            return Err(AnalyticsError::Config("stride must be positive".to_string()));
        }
        Ok(Self {
            window_size,
            stride,
        })
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Extract all complete windows in ascending start order
    ///
    /// # Errors
    /// `InsufficientData` when the series holds fewer samples than one
    /// window.
    pub fn extract(&self, series: &MetricSeries) -> Result<Vec<TimeWindow>> {
        let len = series.len();
        if len < self.window_size {
            return Err(AnalyticsError::InsufficientData {
                required: self.window_size,
                actual: len,
            });
        }

        let samples = series.samples();
        let mut windows = Vec::with_capacity((len - self.window_size) / self.stride + 1);
        let mut start = 0usize;
        while start + self.window_size <= len {
            let end = start + self.window_size;
            windows.push(TimeWindow {
                start_index: start,
                end_index: end,
                start_time: samples[start].timestamp,
                end_time: samples[end - 1].timestamp,
            });
            start += self.stride;
        }
        Ok(windows)
    }
}
