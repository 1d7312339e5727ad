//! Score aggregation across the fleet hierarchy
//!
//! One `Aggregator` combines same-parent scores at a single level:
//! - metric results for one node → node score
//! - node scores for one cluster → cluster score
//! - cluster scores for one tenant → tenant score
//!
//! Inputs must share the parent; mixing parents is a validation error, and
//! an empty input is an aggregation error rather than a default score.

mod strategy;

pub use strategy::AggregationStrategy;

use std::collections::HashMap;

use crate::error::{AnalyticsError, Result};
use crate::models::{AggregatedScore, AnomalyResult, RollupLevel};

/// Combines anomaly scores at one hierarchy level
///
/// For `Weighted`, the weight key is the child identifier at that level:
/// metric name when rolling metrics into a node, node id when rolling nodes
/// into a cluster, cluster id when rolling clusters into a tenant. Every
/// child must have a weight; there is no implicit default.
#[derive(Debug, Clone)]
pub struct Aggregator {
    strategy: AggregationStrategy,
    weights: HashMap<String, f64>,
}

impl Aggregator {
    pub fn new(strategy: AggregationStrategy) -> Self {
        Self {
            strategy,
            weights: HashMap::new(),
        }
    }

    /// Set the child weights used by the `Weighted` strategy
    pub fn with_weights(mut self, weights: HashMap<String, f64>) -> Self {
        self.weights = weights;
        self
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    /// Roll per-metric results up to a node score
    ///
    /// # Errors
    /// `Aggregation` on empty input or weighting failure, `Validation` when
    /// the results span more than one node.
    pub fn aggregate_metrics(&self, results: &[AnomalyResult]) -> Result<AggregatedScore> {
        let first = results
            .first()
            .ok_or_else(|| AnalyticsError::Aggregation("empty input".to_string()))?;

        let node = first.key().node_key();
        for result in results {
            if result.key().node_key() != node {
                return Err(AnalyticsError::Validation(format!(
                    "results span multiple nodes: {} and {}",
                    node,
                    result.key().node_key()
                )));
            }
        }

        let inputs: Vec<(f64, &str)> = results
            .iter()
            .map(|r| (r.score(), r.key().metric_name.as_str()))
            .collect();
        let score = self.combine(&inputs)?;
        let num_anomalous = results.iter().filter(|r| r.label().is_anomalous()).count();

        AggregatedScore::new(
            node.tenant_id,
            Some(node.cluster_id),
            Some(node.node_id),
            self.strategy,
            score,
            results.len(),
            num_anomalous,
        )
    }

    /// Roll node scores up to a cluster score
    ///
    /// `num_inputs` counts the nodes; `num_anomalous` sums the nodes'
    /// anomaly counts through from the metric level.
    ///
    /// # Errors
    /// `Aggregation` on empty input or weighting failure, `Validation` when
    /// an input is not node-level or the nodes span clusters.
    pub fn aggregate_nodes(&self, node_scores: &[AggregatedScore]) -> Result<AggregatedScore> {
        let first = node_scores
            .first()
            .ok_or_else(|| AnalyticsError::Aggregation("empty input".to_string()))?;

        for score in node_scores {
            if score.level() != RollupLevel::Node {
                return Err(AnalyticsError::Validation(format!(
                    "cluster roll-up requires node-level scores, got {} level",
                    score.level()
                )));
            }
            if score.tenant_id() != first.tenant_id() || score.cluster_id() != first.cluster_id()
            {
                return Err(AnalyticsError::Validation(
                    "node scores span multiple clusters".to_string(),
                ));
            }
        }

        let inputs: Vec<(f64, &str)> = node_scores
            .iter()
            .map(|s| (s.aggregate_score(), s.node_id().unwrap_or_default()))
            .collect();
        let score = self.combine(&inputs)?;
        let num_anomalous = node_scores.iter().map(|s| s.num_anomalous()).sum();

        AggregatedScore::new(
            first.tenant_id(),
            first.cluster_id().map(str::to_owned),
            None,
            self.strategy,
            score,
            node_scores.len(),
            num_anomalous,
        )
    }

    /// Roll cluster scores up to a tenant score
    ///
    /// # Errors
    /// `Aggregation` on empty input or weighting failure, `Validation` when
    /// an input is not cluster-level or the clusters span tenants.
    pub fn aggregate_clusters(
        &self,
        cluster_scores: &[AggregatedScore],
    ) -> Result<AggregatedScore> {
        let first = cluster_scores
            .first()
            .ok_or_else(|| AnalyticsError::Aggregation("empty input".to_string()))?;

        for score in cluster_scores {
            if score.level() != RollupLevel::Cluster {
                return Err(AnalyticsError::Validation(format!(
                    "tenant roll-up requires cluster-level scores, got {} level",
                    score.level()
                )));
            }
            if score.tenant_id() != first.tenant_id() {
                return Err(AnalyticsError::Validation(
                    "cluster scores span multiple tenants".to_string(),
                ));
            }
        }

        let inputs: Vec<(f64, &str)> = cluster_scores
            .iter()
            .map(|s| (s.aggregate_score(), s.cluster_id().unwrap_or_default()))
            .collect();
        let score = self.combine(&inputs)?;
        let num_anomalous = cluster_scores.iter().map(|s| s.num_anomalous()).sum();

        AggregatedScore::new(
            first.tenant_id(),
            None,
            None,
            self.strategy,
            score,
            cluster_scores.len(),
            num_anomalous,
        )
    }

    /// Apply the configured strategy to `(score, weight key)` pairs
    fn combine(&self, inputs: &[(f64, &str)]) -> Result<f64> {
        let scores: Vec<f64> = inputs.iter().map(|(score, _)| *score).collect();
        match self.strategy {
            AggregationStrategy::Max => Ok(strategy::max_of(&scores)),
            AggregationStrategy::Mean => Ok(strategy::mean_of(&scores)),
            AggregationStrategy::P95 => Ok(strategy::percentile(&scores, 95.0)),
            AggregationStrategy::Weighted => {
                let pairs: Vec<(f64, f64)> = inputs
                    .iter()
                    .map(|&(score, key)| {
                        self.weights.get(key).map(|w| (score, *w)).ok_or_else(|| {
                            AnalyticsError::Aggregation(format!(
                                "no weight configured for '{key}'"
                            ))
                        })
                    })
                    .collect::<Result<_>>()?;
                strategy::weighted_mean(&pairs)
            }
        }
    }
}

/// Aggregate same-node metric results under an explicit strategy
///
/// Convenience entry point for callers that do not hold an `Aggregator`.
pub fn aggregate(
    results: &[AnomalyResult],
    strategy: AggregationStrategy,
    weights: &HashMap<String, f64>,
) -> Result<AggregatedScore> {
    Aggregator::new(strategy)
        .with_weights(weights.clone())
        .aggregate_metrics(results)
}
