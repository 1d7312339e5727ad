//! Time-based window extraction
//!
//! Fixed-duration windows anchored at the series start and advanced by a
//! fixed time stride. Sample membership is half-open
//! `[anchor, anchor + duration)`, so a sample on a window boundary belongs
//! to the later window. Sparse regions produce empty windows; downstream
//! code records those as zero-input windows instead of failing.

use chrono::Duration;

use crate::error::{AnalyticsError, Result};
use crate::models::MetricSeries;

use super::TimeWindow;

/// Extracts fixed-duration windows by wall-clock anchor
///
/// Anchors step from the first sample's timestamp while they do not pass
/// the last sample's timestamp; the final window may extend past the end
/// of the series.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindowExtractor {
    window_duration: Duration,
    stride_duration: Duration,
}

impl TimeWindowExtractor {
    /// Create an extractor, rejecting degenerate configurations
    ///
    /// # Errors
    /// `Config` if either duration is zero or negative.
    pub fn new(window_duration: Duration, stride_duration: Duration) -> Result<Self> {
        if window_duration <= Duration::zero() {
            return Err(AnalyticsError::Config(
                "window duration must be positive".to_string(),
            ));
        }
        if stride_duration <= Duration::zero() {
            return Err(AnalyticsError::Config(
                "stride duration must be positive".to_string(),
            ));
        }
        Ok(Self {
            window_duration,
            stride_duration,
        })
    }

    /// Convenience constructor from whole seconds
    pub fn from_secs(window_secs: u64, stride_secs: u64) -> Result<Self> {
        Self::new(
            Duration::seconds(window_secs as i64),
            Duration::seconds(stride_secs as i64),
        )
    }

    pub fn window_duration(&self) -> Duration {
        self.window_duration
    }

    pub fn stride_duration(&self) -> Duration {
        self.stride_duration
    }

    /// Extract all windows in ascending anchor order
    ///
    /// Never fails on short or sparse series: a single-sample series yields
    /// one window, and gaps yield empty windows.
    pub fn extract(&self, series: &MetricSeries) -> Result<Vec<TimeWindow>> {
        let samples = series.samples();
        let mut windows = Vec::new();
        let mut anchor = series.start_time();
        let last = series.end_time();

        while anchor <= last {
            let window_end = anchor + self.window_duration;
            let start_index = samples.partition_point(|s| s.timestamp < anchor);
            let end_index = samples.partition_point(|s| s.timestamp < window_end);
            windows.push(TimeWindow {
                start_index,
                end_index,
                start_time: anchor,
                end_time: window_end,
            });
            anchor += self.stride_duration;
        }
        Ok(windows)
    }
}
