//! Ranking of aggregated scores
//!
//! Sorts same-level scores for "top N anomalous entities" views. The sort
//! is total: score descending, then entity identifier ascending, so runs
//! over identical input always produce identical output.

use crate::error::{AnalyticsError, Result};
use crate::models::AggregatedScore;

/// Return the `n` highest-scoring entities
///
/// Ties on score are broken by ascending lexical order of the entity
/// identifier (node id, cluster id or tenant id, by level). Fewer than `n`
/// available scores is not an error.
///
/// # Errors
/// `Config` when `n` is zero.
pub fn top_n(scores: &[AggregatedScore], n: usize) -> Result<Vec<AggregatedScore>> {
    if n == 0 {
        return Err(AnalyticsError::Config(
            "ranking depth must be positive".to_string(),
        ));
    }

    let mut ranked = scores.to_vec();
    ranked.sort_by(|a, b| {
        b.aggregate_score()
            .total_cmp(&a.aggregate_score())
            .then_with(|| a.entity_id().cmp(b.entity_id()))
    });
    ranked.truncate(n);
    Ok(ranked)
}
