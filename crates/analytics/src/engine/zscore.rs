//! Built-in z-score detection engine
//!
//! Scores a series by how far its most deviant value sits from the series
//! mean, in standard deviations. The z-score maps onto `[0, 1)` through
//! `z / (z + threshold)`, which puts the 0.5 decision boundary exactly at
//! `z == threshold`. Flagged windows are shape-classified into spike,
//! trend or seasonal.

use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::models::{AnomalyLabel, AnomalyResult, MetricSeries};

use super::{async_trait, classify_series, DetectionEngine};

/// Default z-score decision threshold (3 sigma)
const DEFAULT_THRESHOLD: f64 = 3.0;

/// Default minimum samples required before scoring
const DEFAULT_MIN_SAMPLES: usize = 10;

/// Tuning parameters for the z-score engine
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZScoreConfig {
    /// Z-score at which the anomaly score crosses 0.5
    pub threshold: f64,
    /// Series shorter than this produce no results
    pub min_samples: usize,
}

impl Default for ZScoreConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            min_samples: DEFAULT_MIN_SAMPLES,
        }
    }
}

/// Peak-deviation z-score engine
#[derive(Debug)]
pub struct ZScoreEngine {
    config: ZScoreConfig,
}

impl ZScoreEngine {
    /// Create an engine with validated parameters
    ///
    /// # Errors
    /// `Config` if the threshold is not a positive finite number.
    pub fn new(config: ZScoreConfig) -> Result<Self> {
        if !config.threshold.is_finite() || config.threshold <= 0.0 {
            return Err(AnalyticsError::Config(format!(
                "z-score threshold must be positive and finite, got {}",
                config.threshold
            )));
        }
        Ok(Self { config })
    }

    /// Engine with the default 3-sigma configuration
    pub fn with_defaults() -> Self {
        Self {
            config: ZScoreConfig::default(),
        }
    }

    pub fn config(&self) -> &ZScoreConfig {
        &self.config
    }

    fn score_series(&self, series: &MetricSeries) -> Result<Vec<AnomalyResult>> {
        let values: Vec<f64> = series.values().collect();
        if values.len() < self.config.min_samples || values.len() < 2 {
            return Ok(Vec::new());
        }

        let key = series.key().clone();
        let window_start = series.start_time();
        let window_end = series.end_time();

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
            / (values.len() - 1) as f64;
        let std_dev = variance.sqrt();

        if std_dev < f64::EPSILON {
            // Perfectly flat window: nothing deviates.
            let classification = classify_series(&values, 0.0);
            let result = AnomalyResult::new(
                key,
                window_start,
                window_end,
                0.0,
                AnomalyLabel::Normal,
            )?
            .with_explanation(classification.explanation);
            return Ok(vec![result]);
        }

        let peak_deviation = values
            .iter()
            .map(|v| (v - mean).abs())
            .fold(0.0, f64::max);
        let z_score = peak_deviation / std_dev;
        let score = z_score / (z_score + self.config.threshold);

        let classification = classify_series(&values, score);
        let result = AnomalyResult::new(key, window_start, window_end, score, classification.label)?
            .with_magnitude(z_score)
            .with_explanation(classification.explanation);
        Ok(vec![result])
    }
}

#[async_trait]
impl DetectionEngine for ZScoreEngine {
    async fn detect(&self, series: &MetricSeries) -> anyhow::Result<Vec<AnomalyResult>> {
        Ok(self.score_series(series)?)
    }

    fn name(&self) -> &str {
        "zscore"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricSample, SeriesKey};
    use chrono::{TimeZone, Utc};

    fn create_test_series(values: &[f64]) -> MetricSeries {
        let samples = values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                MetricSample::new(
                    Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap(),
                    *v,
                )
            })
            .collect();
        MetricSeries::new(
            SeriesKey::new("acme", "prod-eu", "node-1", "cpu_usage"),
            samples,
        )
        .unwrap()
    }

    #[test]
    fn test_rejects_non_positive_threshold() {
        let err = ZScoreEngine::new(ZScoreConfig {
            threshold: 0.0,
            min_samples: 10,
        })
        .unwrap_err();
        assert!(matches!(err, AnalyticsError::Config(_)));
        assert!(ZScoreEngine::new(ZScoreConfig {
            threshold: f64::NAN,
            min_samples: 10,
        })
        .is_err());
    }

    #[tokio::test]
    async fn test_short_series_yields_no_results() {
        let engine = ZScoreEngine::with_defaults();
        let series = create_test_series(&[10.0; 9]);
        let results = engine.detect(&series).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_flat_series_scores_zero() {
        let engine = ZScoreEngine::with_defaults();
        let series = create_test_series(&[42.0; 30]);
        let results = engine.detect(&series).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score(), 0.0);
        assert_eq!(results[0].label(), AnomalyLabel::Normal);
    }

    #[tokio::test]
    async fn test_spike_scores_above_half() {
        // Nineteen flat samples and one at five times the baseline: the
        // peak z-score clears the 3-sigma default.
        let mut values = vec![10.0; 19];
        values.push(50.0);
        let engine = ZScoreEngine::with_defaults();
        let results = engine.detect(&create_test_series(&values)).await.unwrap();

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.score() > 0.5, "score {}", result.score());
        assert_eq!(result.label(), AnomalyLabel::Spike);
        assert!(result.magnitude().unwrap() > DEFAULT_THRESHOLD);
        assert!(result.explanation().unwrap().contains("Spike"));
    }

    #[tokio::test]
    async fn test_mild_noise_stays_normal() {
        let values: Vec<f64> = (0..20)
            .map(|i| if i % 2 == 0 { 10.0 } else { 11.0 })
            .collect();
        let engine = ZScoreEngine::with_defaults();
        let results = engine.detect(&create_test_series(&values)).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].score() < 0.5);
        assert_eq!(results[0].label(), AnomalyLabel::Normal);
    }

    #[tokio::test]
    async fn test_result_spans_analyzed_series() {
        let values = vec![10.0; 30];
        let series = create_test_series(&values);
        let engine = ZScoreEngine::with_defaults();
        let results = engine.detect(&series).await.unwrap();
        assert_eq!(results[0].window_start(), series.start_time());
        assert_eq!(results[0].window_end(), series.end_time());
        assert_eq!(results[0].key(), series.key());
    }

    #[tokio::test]
    async fn test_custom_min_samples() {
        let engine = ZScoreEngine::new(ZScoreConfig {
            threshold: 3.0,
            min_samples: 25,
        })
        .unwrap();
        let series = create_test_series(&[10.0; 20]);
        assert!(engine.detect(&series).await.unwrap().is_empty());
    }

    #[test]
    fn test_score_maps_threshold_to_half() {
        // score = z / (z + t): at z == t the score is exactly 0.5 and it
        // approaches 1.0 as z grows.
        let t = DEFAULT_THRESHOLD;
        assert_eq!(t / (t + t), 0.5);
        assert!(10.0 * t / (10.0 * t + t) > 0.9);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: ZScoreConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.threshold, DEFAULT_THRESHOLD);
        assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);

        let config: ZScoreConfig =
            serde_json::from_str(r#"{ "threshold": 2.0 }"#).unwrap();
        assert_eq!(config.threshold, 2.0);
        assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);
    }
}
