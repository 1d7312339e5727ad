//! Series storage port and in-memory backend
//!
//! The scan pipeline consumes series through the `SeriesStore` trait and
//! never talks to a concrete backend. `MemoryStore` is the bundled
//! implementation for tests and embedders that already hold their data;
//! durable backends live outside this crate.

use std::collections::HashMap;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::models::{MetricSeries, SeriesKey};

/// Trait for series retrieval implementations
#[async_trait]
pub trait SeriesStore: Send + Sync {
    /// Fetch one series restricted to an inclusive time range
    ///
    /// Implementations must return samples sorted ascending and should fail
    /// when the key is unknown or the range holds no samples.
    async fn get_metric_series(
        &self,
        key: &SeriesKey,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<MetricSeries>;
}

/// Counters describing what a `MemoryStore` currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    pub series_count: usize,
    pub sample_count: usize,
}

/// In-memory series store
///
/// Keeps one validated series per key; re-inserting a key replaces the
/// previous series.
#[derive(Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<SeriesKey, MetricSeries>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the series stored under its key
    pub async fn insert(&self, series: MetricSeries) {
        let mut guard = self.series.write().await;
        guard.insert(series.key().clone(), series);
    }

    /// Current store contents, for test assertions and debugging
    pub async fn stats(&self) -> StoreStats {
        let guard = self.series.read().await;
        StoreStats {
            series_count: guard.len(),
            sample_count: guard.values().map(MetricSeries::len).sum(),
        }
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    async fn get_metric_series(
        &self,
        key: &SeriesKey,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<MetricSeries> {
        let guard = self.series.read().await;
        let Some(series) = guard.get(key) else {
            bail!("no data stored for series {key}");
        };

        let samples: Vec<_> = series
            .samples()
            .iter()
            .filter(|s| s.timestamp >= start_time && s.timestamp <= end_time)
            .copied()
            .collect();
        if samples.is_empty() {
            bail!("no samples between {start_time} and {end_time} for series {key}");
        }
        Ok(MetricSeries::new(key.clone(), samples)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MetricSample;
    use chrono::TimeZone;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap()
    }

    fn create_test_series(key: &SeriesKey, offsets: &[i64]) -> MetricSeries {
        let samples = offsets
            .iter()
            .map(|off| MetricSample::new(ts(*off), *off as f64))
            .collect();
        MetricSeries::new(key.clone(), samples).unwrap()
    }

    fn create_test_key() -> SeriesKey {
        SeriesKey::new("acme", "prod-eu", "node-1", "cpu_usage")
    }

    #[test]
    fn test_insert_and_fetch_full_range() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            let key = create_test_key();
            store
                .insert(create_test_series(&key, &[0, 60, 120]))
                .await;

            let series = store
                .get_metric_series(&key, ts(0), ts(120))
                .await
                .unwrap();
            assert_eq!(series.len(), 3);
            assert_eq!(series.key(), &key);
        });
    }

    #[tokio::test]
    async fn test_range_bounds_are_inclusive() {
        let store = MemoryStore::new();
        let key = create_test_key();
        store
            .insert(create_test_series(&key, &[0, 60, 120, 180]))
            .await;

        let series = store
            .get_metric_series(&key, ts(60), ts(120))
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.start_time(), ts(60));
        assert_eq!(series.end_time(), ts(120));
    }

    #[tokio::test]
    async fn test_unknown_key_fails() {
        let store = MemoryStore::new();
        let err = store
            .get_metric_series(&create_test_key(), ts(0), ts(60))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("node-1"));
    }

    #[tokio::test]
    async fn test_empty_range_fails() {
        let store = MemoryStore::new();
        let key = create_test_key();
        store.insert(create_test_series(&key, &[0, 60])).await;

        let err = store
            .get_metric_series(&key, ts(600), ts(1200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no samples"));
    }

    #[tokio::test]
    async fn test_reinsert_replaces_series() {
        let store = MemoryStore::new();
        let key = create_test_key();
        store.insert(create_test_series(&key, &[0, 60])).await;
        store
            .insert(create_test_series(&key, &[0, 60, 120, 180]))
            .await;

        let stats = store.stats().await;
        assert_eq!(stats.series_count, 1);
        assert_eq!(stats.sample_count, 4);
    }
}
