//! Window extraction over metric series
//!
//! This module slices a validated series into analysis windows for the
//! detection engine. Two policies are supported:
//! - point-based: fixed sample count per window, partial tail dropped
//! - time-based: fixed duration per window, sparse regions yield empty
//!   windows rather than errors
//!
//! Both are deterministic: the same series and configuration always
//! produce the same windows, in ascending start order.

mod point;
mod time;

pub use point::PointWindowExtractor;
pub use time::TimeWindowExtractor;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::MetricSeries;

/// Descriptor of one extracted window
///
/// Indexes into the source series (`start_index..end_index`, half-open)
/// without copying samples. For point windows the times are the covered
/// sample timestamps; for time windows they are the nominal
/// `[anchor, anchor + duration)` range, which can extend past the last
/// sample and can cover no samples at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_index: usize,
    pub end_index: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl TimeWindow {
    /// Number of samples the window covers
    pub fn len(&self) -> usize {
        self.end_index - self.start_index
    }

    /// True when the window covers no samples
    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index
    }
}

/// Window policy selection, deserializable from scan configuration
///
/// ```json
/// { "mode": "points", "window_size_points": 100, "stride_points": 50 }
/// { "mode": "time", "window_duration_secs": 3600, "stride_duration_secs": 900 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WindowConfig {
    Points {
        window_size_points: usize,
        stride_points: usize,
    },
    Time {
        window_duration_secs: u64,
        stride_duration_secs: u64,
    },
}

impl Default for WindowConfig {
    fn default() -> Self {
        // One-hour windows advancing by 15 minutes
        WindowConfig::Time {
            window_duration_secs: 3600,
            stride_duration_secs: 900,
        }
    }
}

/// Extract windows from a series under the configured policy
///
/// # Errors
/// `Config` for non-positive sizes/strides/durations, `InsufficientData`
/// when a point policy asks for more samples than the series holds.
pub fn extract_windows(series: &MetricSeries, config: &WindowConfig) -> Result<Vec<TimeWindow>> {
    match *config {
        WindowConfig::Points {
            window_size_points,
            stride_points,
        } => PointWindowExtractor::new(window_size_points, stride_points)?.extract(series),
        WindowConfig::Time {
            window_duration_secs,
            stride_duration_secs,
        } => TimeWindowExtractor::from_secs(window_duration_secs, stride_duration_secs)?
            .extract(series),
    }
}
