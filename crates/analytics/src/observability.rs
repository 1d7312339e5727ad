//! Observability infrastructure for the analytics core
//!
//! Provides:
//! - Prometheus metrics (detection latency, scan latency, scan counters)
//! - Structured logging for scan lifecycle events with tracing
//!
//! No subscriber is installed here; the embedding service owns that.

use prometheus::{register_histogram, register_int_gauge, Histogram, IntGauge};
use std::sync::OnceLock;
use tracing::{info, warn};

use crate::models::{NodeKey, SeriesKey};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<AnalyticsMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct AnalyticsMetricsInner {
    detection_latency_seconds: Histogram,
    scan_latency_seconds: Histogram,
    series_scanned: IntGauge,
    windows_extracted: IntGauge,
    windows_empty: IntGauge,
    anomalies_detected: IntGauge,
    partitions_failed: IntGauge,
    scans_completed: IntGauge,
}

impl AnalyticsMetricsInner {
    fn new() -> Self {
        Self {
            detection_latency_seconds: register_histogram!(
                "fleetscope_detection_latency_seconds",
                "Time spent running anomaly detection on one series window",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register detection_latency_seconds"),

            scan_latency_seconds: register_histogram!(
                "fleetscope_scan_latency_seconds",
                "Wall-clock time of a full fleet scan",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register scan_latency_seconds"),

            series_scanned: register_int_gauge!(
                "fleetscope_series_scanned_total",
                "Total number of metric series fetched and scanned"
            )
            .expect("Failed to register series_scanned"),

            windows_extracted: register_int_gauge!(
                "fleetscope_windows_extracted_total",
                "Total number of analysis windows extracted from series"
            )
            .expect("Failed to register windows_extracted"),

            windows_empty: register_int_gauge!(
                "fleetscope_windows_empty_total",
                "Total number of extracted windows that contained no samples"
            )
            .expect("Failed to register windows_empty"),

            anomalies_detected: register_int_gauge!(
                "fleetscope_anomalies_detected_total",
                "Total number of anomalous detection results produced"
            )
            .expect("Failed to register anomalies_detected"),

            partitions_failed: register_int_gauge!(
                "fleetscope_partitions_failed_total",
                "Total number of node partitions that failed during scans"
            )
            .expect("Failed to register partitions_failed"),

            scans_completed: register_int_gauge!(
                "fleetscope_scans_completed_total",
                "Total number of completed fleet scans"
            )
            .expect("Failed to register scans_completed"),
        }
    }
}

/// Analytics metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct AnalyticsMetrics {
    // This is just a marker - we use the global instance
    _private: (),
}

impl Default for AnalyticsMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalyticsMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(AnalyticsMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &AnalyticsMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a detection latency observation
    pub fn observe_detection_latency(&self, duration_secs: f64) {
        self.inner().detection_latency_seconds.observe(duration_secs);
    }

    /// Record a full-scan latency observation
    pub fn observe_scan_latency(&self, duration_secs: f64) {
        self.inner().scan_latency_seconds.observe(duration_secs);
    }

    /// Increment the scanned series counter
    pub fn inc_series_scanned(&self) {
        self.inner().series_scanned.inc();
    }

    /// Add to the extracted / empty window counters
    pub fn add_windows(&self, extracted: i64, empty: i64) {
        self.inner().windows_extracted.add(extracted);
        self.inner().windows_empty.add(empty);
    }

    /// Add to the anomalies detected counter
    pub fn add_anomalies_detected(&self, count: i64) {
        self.inner().anomalies_detected.add(count);
    }

    /// Increment the failed partitions counter
    pub fn inc_partitions_failed(&self) {
        self.inner().partitions_failed.inc();
    }

    /// Increment the completed scans counter
    pub fn inc_scans_completed(&self) {
        self.inner().scans_completed.inc();
    }
}

/// Structured logger for scan lifecycle events
///
/// Provides consistent field-based logging so downstream log pipelines
/// can index scans by engine.
#[derive(Clone)]
pub struct ScanLogger {
    engine: String,
}

impl ScanLogger {
    pub fn new(engine: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
        }
    }

    /// Log the start of a fleet scan
    pub fn log_scan_started(&self, num_targets: usize) {
        info!(
            event = "scan_started",
            engine = %self.engine,
            num_targets = num_targets,
            "Starting fleet scan"
        );
    }

    /// Log an anomalous detection result
    pub fn log_anomaly(&self, key: &SeriesKey, score: f64, label: &str) {
        info!(
            event = "anomaly_detected",
            engine = %self.engine,
            series = %key,
            score = score,
            label = %label,
            "Anomaly detected"
        );
    }

    /// Log a failed node partition
    pub fn log_partition_failed(&self, node: &NodeKey, error: &str) {
        warn!(
            event = "partition_failed",
            engine = %self.engine,
            node = %node,
            error = %error,
            "Node partition failed, continuing scan"
        );
    }

    /// Log scan completion
    pub fn log_scan_completed(
        &self,
        series_scanned: usize,
        anomalies_detected: usize,
        partitions_failed: usize,
        duration_secs: f64,
    ) {
        info!(
            event = "scan_completed",
            engine = %self.engine,
            series_scanned = series_scanned,
            anomalies_detected = anomalies_detected,
            partitions_failed = partitions_failed,
            duration_secs = duration_secs,
            "Fleet scan completed"
        );
    }
}
