//! Synthetic metric generation
//!
//! Seeded, reproducible series for tests, demos and benchmark fixtures:
//! - `MetricSimulator` builds baseline series with optional random spike,
//!   trend and seasonal injection
//! - the `inject_*` functions place a labeled anomaly at a chosen index,
//!   for scenarios that need ground truth
//!
//! The same seed and configuration always produce the same samples.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, Result};
use crate::models::{MetricSample, MetricSeries, SeriesKey};

/// Seed used when the caller does not supply one
const DEFAULT_SEED: u64 = 42;

/// Cycle length of the injected seasonal component, in samples
const SEASONAL_PERIOD: usize = 100;

/// Configuration for synthetic series generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub baseline_mean: f64,
    pub baseline_std: f64,
    pub sampling_interval_secs: u64,
    pub noise_level: f64,

    pub inject_spikes: bool,
    pub inject_trends: bool,
    pub inject_seasonal: bool,

    pub spike_probability: f64,
    pub spike_magnitude: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            baseline_mean: 50.0,
            baseline_std: 5.0,
            sampling_interval_secs: 60,
            noise_level: 0.1,
            inject_spikes: false,
            inject_trends: false,
            inject_seasonal: false,
            spike_probability: 0.01,
            spike_magnitude: 3.0,
        }
    }
}

/// Generates synthetic metric series from a seeded RNG
pub struct MetricSimulator {
    config: SimulatorConfig,
    rng: StdRng,
}

impl MetricSimulator {
    /// Simulator with the default seed
    pub fn new(config: SimulatorConfig) -> Self {
        Self::with_seed(config, DEFAULT_SEED)
    }

    /// Simulator with an explicit seed
    pub fn with_seed(config: SimulatorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    /// Generate one series for a key
    ///
    /// Values are Gaussian around the configured baseline with the
    /// configured anomalies layered on top, then clamped: metrics whose
    /// name contains `usage` or `percent` stay within `[0, 100]`, all
    /// others stay non-negative.
    ///
    /// # Errors
    /// `Validation` when `num_points` is zero (a series cannot be empty).
    pub fn generate(
        &mut self,
        key: SeriesKey,
        num_points: usize,
        start_time: DateTime<Utc>,
    ) -> Result<MetricSeries> {
        let interval_secs = self.config.sampling_interval_secs as i64;

        let mut values: Vec<f64> = (0..num_points)
            .map(|_| self.sample_normal(self.config.baseline_mean, self.config.baseline_std))
            .collect();

        if self.config.inject_spikes {
            self.spike_pass(&mut values);
        }
        if self.config.inject_trends {
            self.trend_pass(&mut values);
        }
        if self.config.inject_seasonal {
            seasonal_pass(&mut values, self.config.baseline_std * 2.0);
        }
        for value in &mut values {
            *value += self.sample_normal(0.0, self.config.noise_level);
        }

        clamp_for_metric(&key.metric_name, &mut values);

        let samples = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                MetricSample::new(start_time + Duration::seconds(interval_secs * i as i64), value)
            })
            .collect();
        MetricSeries::new(key, samples)
    }

    /// Multiply short random runs of samples by the spike magnitude
    fn spike_pass(&mut self, values: &mut [f64]) {
        for i in 0..values.len() {
            if self.rng.gen::<f64>() < self.config.spike_probability {
                let duration = self.rng.gen_range(1..=3usize);
                let end = (i + duration).min(values.len());
                for value in &mut values[i..end] {
                    *value *= self.config.spike_magnitude;
                }
            }
        }
    }

    /// Add a linear drift from the midpoint onward, direction chosen by the RNG
    fn trend_pass(&mut self, values: &mut [f64]) {
        let start_idx = values.len() / 2;
        let slope = if self.rng.gen_bool(0.5) { 0.05 } else { -0.05 };
        for (offset, value) in values[start_idx..].iter_mut().enumerate() {
            *value += slope * offset as f64;
        }
    }

    /// Box-Muller transform over two uniform draws
    fn sample_normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.rng.gen::<f64>().max(f64::MIN_POSITIVE);
        let u2 = self.rng.gen::<f64>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * std::f64::consts::PI * u2;
        mean + std_dev * radius * theta.cos()
    }
}

fn seasonal_pass(values: &mut [f64], amplitude: f64) {
    for (i, value) in values.iter_mut().enumerate() {
        *value +=
            amplitude * (2.0 * std::f64::consts::PI * i as f64 / SEASONAL_PERIOD as f64).sin();
    }
}

fn clamp_for_metric(metric_name: &str, values: &mut [f64]) {
    let is_percentage = metric_name.contains("usage") || metric_name.contains("percent");
    for value in values {
        *value = if is_percentage {
            value.clamp(0.0, 100.0)
        } else {
            value.max(0.0)
        };
    }
}

fn check_index(series: &MetricSeries, index: usize, what: &str) -> Result<()> {
    if index >= series.len() {
        return Err(AnalyticsError::Validation(format!(
            "{what} index {index} out of range for series of {} samples",
            series.len()
        )));
    }
    Ok(())
}

fn rebuild_with_values(series: &MetricSeries, values: Vec<f64>) -> Result<MetricSeries> {
    let samples = series
        .samples()
        .iter()
        .zip(values)
        .map(|(sample, value)| MetricSample::new(sample.timestamp, value))
        .collect();
    MetricSeries::new(series.key().clone(), samples)
}

/// Multiply `duration` samples starting at `spike_index` by `magnitude`
///
/// # Errors
/// `Validation` when the index is out of range.
pub fn inject_spike(
    series: &MetricSeries,
    spike_index: usize,
    magnitude: f64,
    duration: usize,
) -> Result<MetricSeries> {
    check_index(series, spike_index, "spike")?;
    let mut values: Vec<f64> = series.values().collect();
    let end = (spike_index + duration).min(values.len());
    for value in &mut values[spike_index..end] {
        *value *= magnitude;
    }
    rebuild_with_values(series, values)
}

/// Add a linear drift of `slope` per sample from `start_index` onward
///
/// # Errors
/// `Validation` when the index is out of range.
pub fn inject_trend(series: &MetricSeries, start_index: usize, slope: f64) -> Result<MetricSeries> {
    check_index(series, start_index, "trend start")?;
    let mut values: Vec<f64> = series.values().collect();
    for (offset, value) in values[start_index..].iter_mut().enumerate() {
        *value += slope * offset as f64;
    }
    rebuild_with_values(series, values)
}

/// Add a constant step of `shift_amount` from `shift_index` onward
///
/// # Errors
/// `Validation` when the index is out of range.
pub fn inject_level_shift(
    series: &MetricSeries,
    shift_index: usize,
    shift_amount: f64,
) -> Result<MetricSeries> {
    check_index(series, shift_index, "level shift")?;
    let mut values: Vec<f64> = series.values().collect();
    for value in &mut values[shift_index..] {
        *value += shift_amount;
    }
    rebuild_with_values(series, values)
}

/// Generate one `cpu_usage` series per node, the first few anomalous
///
/// `floor(num_nodes * anomaly_node_ratio)` nodes get spike-injected series;
/// the rest stay quiet. Node ids are `node-000`, `node-001`, … so output
/// order is stable, and the whole scenario is reproducible from the seed.
pub fn generate_fleet_scenario(
    tenant_id: &str,
    cluster_id: &str,
    num_nodes: usize,
    num_points: usize,
    anomaly_node_ratio: f64,
    seed: u64,
    start_time: DateTime<Utc>,
) -> Result<Vec<MetricSeries>> {
    if !(0.0..=1.0).contains(&anomaly_node_ratio) {
        return Err(AnalyticsError::Config(format!(
            "anomaly node ratio must be within [0.0, 1.0], got {anomaly_node_ratio}"
        )));
    }

    let num_anomalous = (num_nodes as f64 * anomaly_node_ratio) as usize;
    let mut series_list = Vec::with_capacity(num_nodes);

    for i in 0..num_nodes {
        let config = if i < num_anomalous {
            SimulatorConfig {
                inject_spikes: true,
                spike_probability: 0.05,
                ..SimulatorConfig::default()
            }
        } else {
            SimulatorConfig::default()
        };
        // Per-node seed derivation keeps each node's series independent of
        // how many nodes the scenario has.
        let mut simulator = MetricSimulator::with_seed(config, seed.wrapping_add(i as u64));
        let key = SeriesKey::new(tenant_id, cluster_id, format!("node-{i:03}"), "cpu_usage");
        series_list.push(simulator.generate(key, num_points, start_time)?);
    }
    Ok(series_list)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn create_test_key(metric: &str) -> SeriesKey {
        SeriesKey::new("acme", "prod-eu", "node-1", metric)
    }

    fn start() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_same_seed_same_series() {
        let config = SimulatorConfig::default();
        let mut a = MetricSimulator::with_seed(config.clone(), 7);
        let mut b = MetricSimulator::with_seed(config, 7);

        let series_a = a.generate(create_test_key("cpu_usage"), 200, start()).unwrap();
        let series_b = b.generate(create_test_key("cpu_usage"), 200, start()).unwrap();
        assert_eq!(series_a.samples(), series_b.samples());
    }

    #[test]
    fn test_different_seeds_differ() {
        let config = SimulatorConfig::default();
        let mut a = MetricSimulator::with_seed(config.clone(), 7);
        let mut b = MetricSimulator::with_seed(config, 8);

        let series_a = a.generate(create_test_key("cpu_usage"), 200, start()).unwrap();
        let series_b = b.generate(create_test_key("cpu_usage"), 200, start()).unwrap();
        assert_ne!(series_a.samples(), series_b.samples());
    }

    #[test]
    fn test_generated_shape() {
        let mut simulator = MetricSimulator::new(SimulatorConfig::default());
        let series = simulator
            .generate(create_test_key("cpu_usage"), 120, start())
            .unwrap();
        assert_eq!(series.len(), 120);
        assert_eq!(series.start_time(), start());
        assert_eq!(series.end_time(), start() + Duration::seconds(119 * 60));
    }

    #[test]
    fn test_usage_metric_stays_in_percent_range() {
        let config = SimulatorConfig {
            baseline_mean: 95.0,
            baseline_std: 20.0,
            ..SimulatorConfig::default()
        };
        let mut simulator = MetricSimulator::with_seed(config, 3);
        let series = simulator
            .generate(create_test_key("cpu_usage"), 500, start())
            .unwrap();
        assert!(series.values().all(|v| (0.0..=100.0).contains(&v)));
    }

    #[test]
    fn test_other_metrics_stay_non_negative() {
        let config = SimulatorConfig {
            baseline_mean: 1.0,
            baseline_std: 10.0,
            ..SimulatorConfig::default()
        };
        let mut simulator = MetricSimulator::with_seed(config, 3);
        let series = simulator
            .generate(create_test_key("queue_depth"), 500, start())
            .unwrap();
        assert!(series.values().all(|v| v >= 0.0));
    }

    #[test]
    fn test_zero_points_is_rejected() {
        let mut simulator = MetricSimulator::new(SimulatorConfig::default());
        assert!(simulator
            .generate(create_test_key("cpu_usage"), 0, start())
            .is_err());
    }

    #[test]
    fn test_inject_spike_multiplies_run() {
        let mut simulator = MetricSimulator::with_seed(SimulatorConfig::default(), 5);
        let series = simulator
            .generate(create_test_key("queue_depth"), 50, start())
            .unwrap();

        let spiked = inject_spike(&series, 20, 3.0, 2).unwrap();
        let before: Vec<f64> = series.values().collect();
        let after: Vec<f64> = spiked.values().collect();
        assert!((after[20] - before[20] * 3.0).abs() < 1e-9);
        assert!((after[21] - before[21] * 3.0).abs() < 1e-9);
        assert_eq!(after[19], before[19]);
        assert_eq!(after[22], before[22]);
    }

    #[test]
    fn test_inject_out_of_range_fails() {
        let mut simulator = MetricSimulator::new(SimulatorConfig::default());
        let series = simulator
            .generate(create_test_key("queue_depth"), 10, start())
            .unwrap();
        assert!(inject_spike(&series, 10, 2.0, 1).is_err());
        assert!(inject_trend(&series, 99, 0.1).is_err());
        assert!(inject_level_shift(&series, 99, 5.0).is_err());
    }

    #[test]
    fn test_inject_level_shift_steps_tail() {
        let mut simulator = MetricSimulator::with_seed(SimulatorConfig::default(), 5);
        let series = simulator
            .generate(create_test_key("queue_depth"), 30, start())
            .unwrap();
        let shifted = inject_level_shift(&series, 15, 25.0).unwrap();
        let before: Vec<f64> = series.values().collect();
        let after: Vec<f64> = shifted.values().collect();
        assert_eq!(after[14], before[14]);
        assert!((after[15] - (before[15] + 25.0)).abs() < 1e-9);
        assert!((after[29] - (before[29] + 25.0)).abs() < 1e-9);
    }

    #[test]
    fn test_fleet_scenario_is_reproducible() {
        let a = generate_fleet_scenario("acme", "prod-eu", 6, 100, 0.5, 11, start()).unwrap();
        let b = generate_fleet_scenario("acme", "prod-eu", 6, 100, 0.5, 11, start()).unwrap();
        assert_eq!(a.len(), 6);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.key(), y.key());
            assert_eq!(x.samples(), y.samples());
        }
        assert_eq!(a[0].key().node_id, "node-000");
        assert_eq!(a[5].key().node_id, "node-005");
    }

    #[test]
    fn test_fleet_scenario_rejects_bad_ratio() {
        let err =
            generate_fleet_scenario("acme", "prod-eu", 4, 100, 1.5, 11, start()).unwrap_err();
        assert!(matches!(err, AnalyticsError::Config(_)));
    }
}
