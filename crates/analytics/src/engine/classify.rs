//! Statistical classification of flagged windows
//!
//! Once an engine scores a window as anomalous, these heuristics decide
//! what kind of anomaly it looks like:
//! - spike: peak deviation from the window baseline beyond two sigma
//! - trend: sustained shift between the window's first and second half
//! - seasonal: frequent mean-crossings suggesting cyclic behavior
//!
//! Priority is spike, then trend, then seasonal; a window the engine
//! flagged but no heuristic recognizes still classifies as a spike rather
//! than quietly dropping back to normal.

use crate::models::AnomalyLabel;

/// Z-score beyond which the peak deviation counts as a spike
const SPIKE_Z_THRESHOLD: f64 = 2.0;

/// Half-window mean shift (as a fraction of the baseline) that counts as a trend
const TREND_SHIFT_RATIO: f64 = 0.05;

/// Mean crossings required before a window counts as cyclic
const MIN_MEAN_CROSSINGS: usize = 3;

/// Scores at or above this are treated as engine-flagged anomalies
const ANOMALY_SCORE_GATE: f64 = 0.5;

/// Direction of a detected trend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
}

/// Outcome of classifying one window
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub label: AnomalyLabel,
    /// Mean of the window
    pub baseline: f64,
    /// Value with the largest absolute deviation from the baseline
    pub observed: f64,
    /// Signed deviation of `observed` from `baseline`, in percent
    pub deviation_percent: f64,
    /// Dashboard-ready description of what was seen
    pub explanation: String,
}

/// Classify a window's values given the engine's anomaly score
///
/// Scores below the anomaly gate classify as `Normal` regardless of shape.
/// An empty value slice also classifies as `Normal`.
pub fn classify_series(values: &[f64], score: f64) -> Classification {
    if values.is_empty() {
        return Classification {
            label: AnomalyLabel::Normal,
            baseline: 0.0,
            observed: 0.0,
            deviation_percent: 0.0,
            explanation: "No anomaly: window contains no samples".to_string(),
        };
    }

    let baseline = mean(values);
    let observed = peak_deviation_value(values, baseline);
    let deviation_percent = if baseline != 0.0 {
        (observed - baseline) / baseline * 100.0
    } else {
        0.0
    };

    let (label, trend) = if score >= ANOMALY_SCORE_GATE {
        if is_spike(values, baseline) {
            (AnomalyLabel::Spike, None)
        } else if let Some(direction) = detect_trend(values) {
            (AnomalyLabel::Trend, Some(direction))
        } else if detect_seasonality(values) {
            (AnomalyLabel::Seasonal, None)
        } else {
            // The engine saw something the shape heuristics missed; treat
            // it as a spike instead of contradicting the engine.
            (AnomalyLabel::Spike, None)
        }
    } else {
        (AnomalyLabel::Normal, None)
    };

    let explanation = match label {
        AnomalyLabel::Spike => format!(
            "Spike detected: value reached {observed:.2} \
             ({deviation_percent:+.1}% from baseline {baseline:.2}), \
             a sudden short-lived deviation"
        ),
        AnomalyLabel::Trend => {
            let direction = match trend {
                Some(TrendDirection::Up) => "upward",
                Some(TrendDirection::Down) => "downward",
                None => "directional",
            };
            format!(
                "Trend detected: sustained {direction} drift, peak {observed:.2} \
                 sits {deviation_percent:+.1}% off baseline {baseline:.2}"
            )
        }
        AnomalyLabel::Seasonal => format!(
            "Seasonal anomaly: cyclic pattern deviates, value {observed:.2} \
             breaks the expected cycle ({deviation_percent:+.1}% from baseline {baseline:.2})"
        ),
        AnomalyLabel::Normal => format!(
            "No anomaly: value {observed:.2} is within the normal range \
             of baseline {baseline:.2}"
        ),
    };

    Classification {
        label,
        baseline,
        observed,
        deviation_percent,
        explanation,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (Bessel-corrected); zero for fewer than two values
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
        / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Value with the largest absolute deviation from the baseline
fn peak_deviation_value(values: &[f64], baseline: f64) -> f64 {
    values
        .iter()
        .copied()
        .max_by(|a, b| {
            (a - baseline)
                .abs()
                .total_cmp(&(b - baseline).abs())
        })
        .unwrap_or(baseline)
}

/// Peak z-score test against the window baseline
fn is_spike(values: &[f64], baseline: f64) -> bool {
    if values.len() < 3 {
        return false;
    }
    let std_dev = sample_std_dev(values, mean(values));
    if std_dev == 0.0 {
        return false;
    }
    let peak = peak_deviation_value(values, baseline);
    let z_score = (peak - baseline).abs() / std_dev;
    z_score > SPIKE_Z_THRESHOLD
}

/// Compare first-half and second-half means for a sustained shift
fn detect_trend(values: &[f64]) -> Option<TrendDirection> {
    if values.len() < 4 {
        return None;
    }
    let mid = values.len() / 2;
    let first_half = mean(&values[..mid]);
    let second_half = mean(&values[mid..]);
    let diff = second_half - first_half;

    let threshold = if first_half != 0.0 {
        TREND_SHIFT_RATIO * first_half.abs()
    } else {
        TREND_SHIFT_RATIO
    };

    if diff.abs() > threshold {
        Some(if diff > 0.0 {
            TrendDirection::Up
        } else {
            TrendDirection::Down
        })
    } else {
        None
    }
}

/// Count mean-crossings to identify cyclic behavior
fn detect_seasonality(values: &[f64]) -> bool {
    if values.len() < 6 {
        return false;
    }
    let mean_val = mean(values);
    let crossings = values
        .windows(2)
        .filter(|pair| (pair[0] - mean_val) * (pair[1] - mean_val) < 0.0)
        .count();
    crossings >= MIN_MEAN_CROSSINGS
}
