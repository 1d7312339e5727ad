//! Hierarchical roll-up of detection results
//!
//! Turns a flat batch of per-series anomaly results into fleet scores:
//! - group results by node and aggregate each group
//! - group node scores by cluster and aggregate again
//! - group cluster scores by tenant for the final roll-up
//!
//! Each level can use its own strategy. Groups iterate in key order, so a
//! given input batch always produces the same output order.
//!
//! `runner` drives the surrounding scan: fetching series, windowing,
//! calling the detection engine, and feeding the results through here.

mod rank;
mod runner;

pub use rank::top_n;
pub use runner::{PartitionFailure, ScanOutcome, ScanRunner, ScanStats, ScanTarget};

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::debug;

use crate::aggregate::{AggregationStrategy, Aggregator};
use crate::error::Result;
use crate::models::{AggregatedScore, AnomalyResult, ClusterKey, NodeKey};

/// Per-level strategy selection for the roll-up pipeline
///
/// Weight maps are keyed by the child identifier at each level and only
/// consulted when that level's strategy is `Weighted`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub node_strategy: AggregationStrategy,
    pub cluster_strategy: AggregationStrategy,
    pub tenant_strategy: AggregationStrategy,

    /// Weights per metric name, for metric → node roll-up
    pub metric_weights: HashMap<String, f64>,
    /// Weights per node id, for node → cluster roll-up
    pub node_weights: HashMap<String, f64>,
    /// Weights per cluster id, for cluster → tenant roll-up
    pub cluster_weights: HashMap<String, f64>,
}

/// Scores at every roll-up level, each vector in key order
#[derive(Debug, Clone, Default)]
pub struct PipelineScores {
    pub node_scores: Vec<AggregatedScore>,
    pub cluster_scores: Vec<AggregatedScore>,
    pub tenant_scores: Vec<AggregatedScore>,
}

/// Rolls detection results up through node, cluster and tenant levels
#[derive(Debug, Clone)]
pub struct AggregationPipeline {
    node_aggregator: Aggregator,
    cluster_aggregator: Aggregator,
    tenant_aggregator: Aggregator,
}

impl Default for AggregationPipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}

impl AggregationPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            node_aggregator: Aggregator::new(config.node_strategy)
                .with_weights(config.metric_weights.clone()),
            cluster_aggregator: Aggregator::new(config.cluster_strategy)
                .with_weights(config.node_weights.clone()),
            tenant_aggregator: Aggregator::new(config.tenant_strategy)
                .with_weights(config.cluster_weights.clone()),
        }
    }

    /// Roll a result batch up to node, cluster and tenant scores
    ///
    /// An empty batch produces empty score vectors. A failure at any level
    /// (a missing weight, say) fails the whole run; partial roll-ups are
    /// never returned.
    pub fn run(&self, results: &[AnomalyResult]) -> Result<PipelineScores> {
        if results.is_empty() {
            return Ok(PipelineScores::default());
        }

        let mut by_node: BTreeMap<NodeKey, Vec<AnomalyResult>> = BTreeMap::new();
        for result in results {
            by_node
                .entry(result.key().node_key())
                .or_default()
                .push(result.clone());
        }

        let mut node_scores = Vec::with_capacity(by_node.len());
        let mut by_cluster: BTreeMap<ClusterKey, Vec<AggregatedScore>> = BTreeMap::new();
        for (node, group) in &by_node {
            let score = self.node_aggregator.aggregate_metrics(group)?;
            by_cluster
                .entry(node.cluster_key())
                .or_default()
                .push(score.clone());
            node_scores.push(score);
        }

        let mut cluster_scores = Vec::with_capacity(by_cluster.len());
        let mut by_tenant: BTreeMap<String, Vec<AggregatedScore>> = BTreeMap::new();
        for (cluster, group) in &by_cluster {
            let score = self.cluster_aggregator.aggregate_nodes(group)?;
            by_tenant
                .entry(cluster.tenant_id.clone())
                .or_default()
                .push(score.clone());
            cluster_scores.push(score);
        }

        let mut tenant_scores = Vec::with_capacity(by_tenant.len());
        for group in by_tenant.values() {
            tenant_scores.push(self.tenant_aggregator.aggregate_clusters(group)?);
        }

        debug!(
            results = results.len(),
            nodes = node_scores.len(),
            clusters = cluster_scores.len(),
            tenants = tenant_scores.len(),
            "Rolled up fleet scores"
        );

        Ok(PipelineScores {
            node_scores,
            cluster_scores,
            tenant_scores,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalyticsError;
    use crate::models::{AnomalyLabel, SeriesKey};
    use chrono::{TimeZone, Utc};

    fn create_test_result(
        cluster: &str,
        node: &str,
        metric: &str,
        score: f64,
        label: AnomalyLabel,
    ) -> AnomalyResult {
        AnomalyResult::new(
            SeriesKey::new("acme", cluster, node, metric),
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
            score,
            label,
        )
        .unwrap()
    }

    #[test]
    fn test_empty_batch_yields_empty_scores() {
        let scores = AggregationPipeline::default().run(&[]).unwrap();
        assert!(scores.node_scores.is_empty());
        assert!(scores.cluster_scores.is_empty());
        assert!(scores.tenant_scores.is_empty());
    }

    #[test]
    fn test_three_level_rollup_with_max() {
        let results = vec![
            create_test_result("prod-eu", "node-1", "cpu_usage", 0.9, AnomalyLabel::Spike),
            create_test_result("prod-eu", "node-1", "memory_used", 0.2, AnomalyLabel::Normal),
            create_test_result("prod-eu", "node-2", "cpu_usage", 0.4, AnomalyLabel::Normal),
            create_test_result("prod-us", "node-3", "cpu_usage", 0.6, AnomalyLabel::Trend),
        ];

        let scores = AggregationPipeline::default().run(&results).unwrap();

        assert_eq!(scores.node_scores.len(), 3);
        assert_eq!(scores.cluster_scores.len(), 2);
        assert_eq!(scores.tenant_scores.len(), 1);

        // BTreeMap grouping keeps node order stable.
        assert_eq!(scores.node_scores[0].node_id(), Some("node-1"));
        assert_eq!(scores.node_scores[0].aggregate_score(), 0.9);
        assert_eq!(scores.node_scores[0].num_inputs(), 2);
        assert_eq!(scores.node_scores[1].node_id(), Some("node-2"));
        assert_eq!(scores.node_scores[2].node_id(), Some("node-3"));

        let eu = &scores.cluster_scores[0];
        assert_eq!(eu.cluster_id(), Some("prod-eu"));
        assert_eq!(eu.aggregate_score(), 0.9);
        assert_eq!(eu.num_inputs(), 2);
        assert_eq!(eu.num_anomalous(), 1);

        let tenant = &scores.tenant_scores[0];
        assert_eq!(tenant.tenant_id(), "acme");
        assert_eq!(tenant.aggregate_score(), 0.9);
        assert_eq!(tenant.num_inputs(), 2);
        assert_eq!(tenant.num_anomalous(), 2);
    }

    #[test]
    fn test_per_level_strategies() {
        // Node level keeps the max, cluster level averages the two nodes.
        let results = vec![
            create_test_result("prod-eu", "node-1", "cpu_usage", 0.8, AnomalyLabel::Spike),
            create_test_result("prod-eu", "node-1", "memory_used", 0.4, AnomalyLabel::Normal),
            create_test_result("prod-eu", "node-2", "cpu_usage", 0.2, AnomalyLabel::Normal),
        ];
        let config = PipelineConfig {
            node_strategy: AggregationStrategy::Max,
            cluster_strategy: AggregationStrategy::Mean,
            tenant_strategy: AggregationStrategy::Max,
            ..PipelineConfig::default()
        };

        let scores = AggregationPipeline::new(&config).run(&results).unwrap();
        assert!((scores.cluster_scores[0].aggregate_score() - 0.5).abs() < 1e-12);
        assert_eq!(scores.tenant_scores[0].aggregate_score(), 0.5);
    }

    #[test]
    fn test_isolated_tenants_roll_up_separately() {
        let mut results = vec![create_test_result(
            "prod-eu",
            "node-1",
            "cpu_usage",
            0.9,
            AnomalyLabel::Spike,
        )];
        results.push(
            AnomalyResult::new(
                SeriesKey::new("globex", "prod-eu", "node-1", "cpu_usage"),
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
                Utc.timestamp_opt(1_700_003_600, 0).unwrap(),
                0.3,
                AnomalyLabel::Normal,
            )
            .unwrap(),
        );

        let scores = AggregationPipeline::default().run(&results).unwrap();
        assert_eq!(scores.tenant_scores.len(), 2);
        assert_eq!(scores.tenant_scores[0].tenant_id(), "acme");
        assert_eq!(scores.tenant_scores[0].aggregate_score(), 0.9);
        assert_eq!(scores.tenant_scores[1].tenant_id(), "globex");
        assert_eq!(scores.tenant_scores[1].aggregate_score(), 0.3);
    }

    #[test]
    fn test_missing_weight_fails_whole_run() {
        let results = vec![
            create_test_result("prod-eu", "node-1", "cpu_usage", 0.8, AnomalyLabel::Spike),
            create_test_result("prod-eu", "node-1", "memory_used", 0.4, AnomalyLabel::Normal),
        ];
        let config = PipelineConfig {
            node_strategy: AggregationStrategy::Weighted,
            metric_weights: HashMap::from([("cpu_usage".to_string(), 1.0)]),
            ..PipelineConfig::default()
        };

        let err = AggregationPipeline::new(&config).run(&results).unwrap_err();
        assert!(matches!(err, AnalyticsError::Aggregation(_)));
        assert!(err.to_string().contains("memory_used"));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: PipelineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.node_strategy, AggregationStrategy::Max);
        assert_eq!(config.tenant_strategy, AggregationStrategy::Max);
        assert!(config.metric_weights.is_empty());

        let config: PipelineConfig = serde_json::from_str(
            r#"{"node_strategy": "weighted", "cluster_strategy": "p95",
                "metric_weights": {"cpu_usage": 2.0}}"#,
        )
        .unwrap();
        assert_eq!(config.node_strategy, AggregationStrategy::Weighted);
        assert_eq!(config.cluster_strategy, AggregationStrategy::P95);
        assert_eq!(config.metric_weights["cpu_usage"], 2.0);
    }

    #[test]
    fn test_same_batch_same_order() {
        let results = vec![
            create_test_result("prod-us", "node-9", "cpu_usage", 0.5, AnomalyLabel::Trend),
            create_test_result("prod-eu", "node-2", "cpu_usage", 0.4, AnomalyLabel::Normal),
            create_test_result("prod-eu", "node-1", "cpu_usage", 0.9, AnomalyLabel::Spike),
        ];
        let pipeline = AggregationPipeline::default();
        let a = pipeline.run(&results).unwrap();
        let b = pipeline.run(&results).unwrap();

        let ids = |scores: &[AggregatedScore]| -> Vec<String> {
            scores.iter().map(|s| s.entity_id().to_string()).collect()
        };
        assert_eq!(ids(&a.node_scores), ids(&b.node_scores));
        assert_eq!(ids(&a.node_scores), vec!["node-1", "node-2", "node-9"]);
        assert_eq!(ids(&a.cluster_scores), vec!["prod-eu", "prod-us"]);
    }
}
