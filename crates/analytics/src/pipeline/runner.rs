//! Concurrent fleet scan orchestration
//!
//! `ScanRunner` drives one scan end to end:
//! - fetch each target node's series through the `SeriesStore` port
//! - window them and run the `DetectionEngine` port per window
//! - roll the combined results up through the aggregation pipeline
//!
//! Node partitions run concurrently on a `JoinSet`. A failure inside one
//! partition (store, engine, or a result with mismatched keys) removes only
//! that partition; its error lands in the outcome's failure list and every
//! other partition still aggregates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::task::JoinSet;
use tracing::warn;

use crate::engine::{DetectionEngine, EngineRegistry};
use crate::error::{AnalyticsError, Result};
use crate::models::{AnomalyResult, NodeKey, SeriesKey};
use crate::observability::{AnalyticsMetrics, ScanLogger};
use crate::pipeline::{AggregationPipeline, PipelineScores};
use crate::store::SeriesStore;
use crate::window::{extract_windows, WindowConfig};

/// One node and the metrics to scan on it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub node: NodeKey,
    pub metrics: Vec<String>,
}

impl ScanTarget {
    pub fn new(node: NodeKey, metrics: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            node,
            metrics: metrics.into_iter().map(Into::into).collect(),
        }
    }
}

/// A node partition whose scan did not complete
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionFailure {
    pub node: NodeKey,
    pub error: String,
}

/// Counters for one completed scan
///
/// `partitions_scanned` counts partitions that completed; failed partitions
/// are only in `partitions_failed`, so the two sum to the target count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub partitions_scanned: usize,
    pub partitions_failed: usize,
    pub series_fetched: usize,
    pub series_skipped_short: usize,
    pub windows_extracted: usize,
    pub windows_empty: usize,
    pub results_collected: usize,
}

/// Scores, failures and counters from one scan
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub scores: PipelineScores,
    pub failures: Vec<PartitionFailure>,
    pub stats: ScanStats,
}

/// What one partition task produced before roll-up
#[derive(Debug, Default)]
struct PartitionScan {
    results: Vec<AnomalyResult>,
    series_fetched: usize,
    series_skipped_short: usize,
    windows_extracted: usize,
    windows_empty: usize,
}

/// Runs detection across a fleet and rolls the scores up
pub struct ScanRunner {
    store: Arc<dyn SeriesStore>,
    engine: Arc<dyn DetectionEngine>,
    window_config: WindowConfig,
    pipeline: AggregationPipeline,
    metrics: AnalyticsMetrics,
    logger: ScanLogger,
}

impl std::fmt::Debug for ScanRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanRunner")
            .field("engine", &self.engine)
            .field("window_config", &self.window_config)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

impl ScanRunner {
    pub fn new(
        store: Arc<dyn SeriesStore>,
        engine: Arc<dyn DetectionEngine>,
        window_config: WindowConfig,
        pipeline: AggregationPipeline,
    ) -> Self {
        let logger = ScanLogger::new(engine.name());
        Self {
            store,
            engine,
            window_config,
            pipeline,
            metrics: AnalyticsMetrics::new(),
            logger,
        }
    }

    /// Build the runner with an engine resolved by name
    ///
    /// # Errors
    /// `Config` when the registry does not know the engine or the engine
    /// rejects `params`.
    pub fn from_registry(
        store: Arc<dyn SeriesStore>,
        registry: &EngineRegistry,
        engine_name: &str,
        params: &serde_json::Value,
        window_config: WindowConfig,
        pipeline: AggregationPipeline,
    ) -> Result<Self> {
        let engine = registry.build(engine_name, params)?;
        Ok(Self::new(store, engine, window_config, pipeline))
    }

    /// Scan every target over `[start_time, end_time]` and roll up the scores
    ///
    /// Detection results are sorted by series key and window start before
    /// roll-up, so identical inputs produce identical outcomes no matter
    /// how the partition tasks interleave.
    ///
    /// # Errors
    /// `Validation` when the time range is reversed, or a roll-up error from
    /// the aggregation pipeline. Per-partition failures never surface here;
    /// they are collected in `ScanOutcome::failures`, sorted by node key.
    pub async fn run_scan(
        &self,
        targets: &[ScanTarget],
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<ScanOutcome> {
        if end_time < start_time {
            return Err(AnalyticsError::Validation(format!(
                "scan range end {end_time} precedes start {start_time}"
            )));
        }

        let started = Instant::now();
        self.logger.log_scan_started(targets.len());

        let mut tasks = JoinSet::new();
        let mut node_by_task = HashMap::new();
        for target in targets {
            let store = Arc::clone(&self.store);
            let engine = Arc::clone(&self.engine);
            let window_config = self.window_config.clone();
            let metrics = self.metrics.clone();
            let target = target.clone();
            let node = target.node.clone();
            let handle = tasks.spawn(async move {
                let scan =
                    scan_partition(store, engine, window_config, &target, start_time, end_time, metrics)
                        .await;
                (target.node, scan)
            });
            node_by_task.insert(handle.id(), node);
        }

        let mut stats = ScanStats::default();
        let mut failures = Vec::new();
        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next_with_id().await {
            match joined {
                Ok((_, (_, Ok(scan)))) => {
                    stats.partitions_scanned += 1;
                    stats.series_fetched += scan.series_fetched;
                    stats.series_skipped_short += scan.series_skipped_short;
                    stats.windows_extracted += scan.windows_extracted;
                    stats.windows_empty += scan.windows_empty;
                    self.metrics
                        .add_windows(scan.windows_extracted as i64, scan.windows_empty as i64);
                    results.extend(scan.results);
                }
                Ok((_, (node, Err(e)))) => {
                    let error = format!("{e:#}");
                    self.metrics.inc_partitions_failed();
                    self.logger.log_partition_failed(&node, &error);
                    stats.partitions_failed += 1;
                    failures.push(PartitionFailure { node, error });
                }
                Err(join_err) => match node_by_task.get(&join_err.id()) {
                    Some(node) => {
                        let error = format!("partition task aborted: {join_err}");
                        self.metrics.inc_partitions_failed();
                        self.logger.log_partition_failed(node, &error);
                        stats.partitions_failed += 1;
                        failures.push(PartitionFailure {
                            node: node.clone(),
                            error,
                        });
                    }
                    None => warn!(error = %join_err, "Lost track of an aborted partition task"),
                },
            }
        }

        results.sort_by(|a, b| {
            a.key()
                .cmp(b.key())
                .then_with(|| a.window_start().cmp(&b.window_start()))
        });
        failures.sort_by(|a, b| a.node.cmp(&b.node));
        stats.results_collected = results.len();

        let mut anomalies = 0;
        for result in &results {
            if result.label().is_anomalous() {
                anomalies += 1;
                self.logger
                    .log_anomaly(result.key(), result.score(), &result.label().to_string());
            }
        }
        self.metrics.add_anomalies_detected(anomalies as i64);

        let scores = self.pipeline.run(&results)?;

        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_scan_latency(elapsed);
        self.metrics.inc_scans_completed();
        self.logger
            .log_scan_completed(stats.series_fetched, anomalies, failures.len(), elapsed);

        Ok(ScanOutcome {
            scores,
            failures,
            stats,
        })
    }
}

/// Fetch, window and detect every metric of one node
///
/// Short series (fewer samples than a point window needs) are skipped and
/// counted, not failed. Any other error fails the whole partition.
async fn scan_partition(
    store: Arc<dyn SeriesStore>,
    engine: Arc<dyn DetectionEngine>,
    window_config: WindowConfig,
    target: &ScanTarget,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    metrics: AnalyticsMetrics,
) -> anyhow::Result<PartitionScan> {
    let mut scan = PartitionScan::default();

    for metric in &target.metrics {
        let key = SeriesKey::new(
            target.node.tenant_id.as_str(),
            target.node.cluster_id.as_str(),
            target.node.node_id.as_str(),
            metric.as_str(),
        );
        let series = store.get_metric_series(&key, start_time, end_time).await?;
        scan.series_fetched += 1;
        metrics.inc_series_scanned();

        let windows = match extract_windows(&series, &window_config) {
            Ok(windows) => windows,
            Err(AnalyticsError::InsufficientData { .. }) => {
                scan.series_skipped_short += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        scan.windows_extracted += windows.len();

        for window in &windows {
            if window.is_empty() {
                scan.windows_empty += 1;
                continue;
            }
            let sub_series = series.slice(window)?;

            let detect_started = Instant::now();
            let results = engine.detect(&sub_series).await?;
            metrics.observe_detection_latency(detect_started.elapsed().as_secs_f64());

            for result in &results {
                if result.key() != &key {
                    return Err(AnalyticsError::Validation(format!(
                        "engine '{}' returned a result for {} while scanning {}",
                        engine.name(),
                        result.key(),
                        key
                    ))
                    .into());
                }
            }
            scan.results.extend(results);
        }
    }

    Ok(scan)
}
