//! Aggregation strategies and their score math

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};

/// How scores combine across one hierarchy level
///
/// - `Max`: highest score wins; one severe anomaly marks the whole entity
/// - `Mean`: plain average; overall-health perspective
/// - `Weighted`: weighted average; children differ in importance and every
///   child must have a configured weight
/// - `P95`: 95th percentile; ignores isolated noise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationStrategy {
    Max,
    Mean,
    Weighted,
    P95,
}

impl Default for AggregationStrategy {
    fn default() -> Self {
        AggregationStrategy::Max
    }
}

impl std::fmt::Display for AggregationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AggregationStrategy::Max => "max",
            AggregationStrategy::Mean => "mean",
            AggregationStrategy::Weighted => "weighted",
            AggregationStrategy::P95 => "p95",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AggregationStrategy {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "max" => Ok(AggregationStrategy::Max),
            "mean" => Ok(AggregationStrategy::Mean),
            "weighted" => Ok(AggregationStrategy::Weighted),
            "p95" => Ok(AggregationStrategy::P95),
            other => Err(AnalyticsError::Aggregation(format!(
                "unknown aggregation strategy '{other}' (expected max, mean, weighted or p95)"
            ))),
        }
    }
}

/// Largest of a non-empty score slice
pub(crate) fn max_of(scores: &[f64]) -> f64 {
    scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

/// Arithmetic mean of a non-empty score slice
pub(crate) fn mean_of(scores: &[f64]) -> f64 {
    scores.iter().sum::<f64>() / scores.len() as f64
}

/// Weighted mean over `(score, weight)` pairs
///
/// # Errors
/// `Aggregation` if a weight is negative or non-finite, or the weights sum
/// to zero. A zero total would otherwise produce a silent meaningless score.
pub(crate) fn weighted_mean(pairs: &[(f64, f64)]) -> Result<f64> {
    let mut weighted_sum = 0.0;
    let mut total_weight = 0.0;
    for &(score, weight) in pairs {
        if !weight.is_finite() || weight < 0.0 {
            return Err(AnalyticsError::Aggregation(format!(
                "weights must be finite and non-negative, got {weight}"
            )));
        }
        weighted_sum += score * weight;
        total_weight += weight;
    }
    if total_weight == 0.0 {
        return Err(AnalyticsError::Aggregation(
            "weights sum to zero".to_string(),
        ));
    }
    Ok(weighted_sum / total_weight)
}

/// p-th percentile of a non-empty score slice, linearly interpolated
///
/// Uses the fractional-rank definition `idx = (p / 100) * (n - 1)` and
/// interpolates between the two surrounding order statistics, so the result
/// leans toward the higher one as the fraction grows.
pub(crate) fn percentile(scores: &[f64], p: f64) -> f64 {
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let idx = (p / 100.0) * (sorted.len() - 1) as f64;
    let lower_idx = idx.floor() as usize;
    let upper_idx = lower_idx + 1;
    if upper_idx >= sorted.len() {
        return sorted[lower_idx];
    }
    let fraction = idx - lower_idx as f64;
    sorted[lower_idx] + (sorted[upper_idx] - sorted[lower_idx]) * fraction
}
