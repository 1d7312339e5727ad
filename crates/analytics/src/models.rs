//! Core data model for fleet anomaly analytics
//!
//! - Validated time series (`MetricSeries`) keyed by tenant/cluster/node/metric
//! - Detection output (`AnomalyResult`) with bounded scores and closed labels
//! - Roll-up output (`AggregatedScore`) for node, cluster and tenant levels
//!
//! Constructors enforce the invariants; once built, values are immutable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregationStrategy;
use crate::error::{AnalyticsError, Result};
use crate::window::TimeWindow;

/// Single observation of a metric at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl MetricSample {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Fully-qualified identity of one metric stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub tenant_id: String,
    pub cluster_id: String,
    pub node_id: String,
    pub metric_name: String,
}

impl SeriesKey {
    pub fn new(
        tenant_id: impl Into<String>,
        cluster_id: impl Into<String>,
        node_id: impl Into<String>,
        metric_name: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            cluster_id: cluster_id.into(),
            node_id: node_id.into(),
            metric_name: metric_name.into(),
        }
    }

    /// Reject keys with blank components
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("tenant_id", &self.tenant_id),
            ("cluster_id", &self.cluster_id),
            ("node_id", &self.node_id),
            ("metric_name", &self.metric_name),
        ] {
            if value.trim().is_empty() {
                return Err(AnalyticsError::Validation(format!(
                    "series key field '{field}' must not be empty"
                )));
            }
        }
        Ok(())
    }

    /// Node this series belongs to
    pub fn node_key(&self) -> NodeKey {
        NodeKey {
            tenant_id: self.tenant_id.clone(),
            cluster_id: self.cluster_id.clone(),
            node_id: self.node_id.clone(),
        }
    }
}

impl std::fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tenant_id, self.cluster_id, self.node_id, self.metric_name
        )
    }
}

/// Identity of a node within a tenant's cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey {
    pub tenant_id: String,
    pub cluster_id: String,
    pub node_id: String,
}

impl NodeKey {
    pub fn new(
        tenant_id: impl Into<String>,
        cluster_id: impl Into<String>,
        node_id: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            cluster_id: cluster_id.into(),
            node_id: node_id.into(),
        }
    }

    /// Cluster this node belongs to
    pub fn cluster_key(&self) -> ClusterKey {
        ClusterKey {
            tenant_id: self.tenant_id.clone(),
            cluster_id: self.cluster_id.clone(),
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.tenant_id, self.cluster_id, self.node_id)
    }
}

/// Identity of a cluster within a tenant
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClusterKey {
    pub tenant_id: String,
    pub cluster_id: String,
}

impl std::fmt::Display for ClusterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.cluster_id)
    }
}

/// Ordered sequence of samples for one series key
///
/// Construction validates the series once; everything downstream (window
/// extraction, detection, aggregation) relies on these invariants instead
/// of re-checking:
/// - at least one sample
/// - timestamps strictly ascending (no duplicates)
/// - every value finite
#[derive(Debug, Clone)]
pub struct MetricSeries {
    key: SeriesKey,
    samples: Vec<MetricSample>,
}

impl MetricSeries {
    /// Build a validated series
    ///
    /// # Errors
    /// `Validation` if the key has blank components, the sample list is
    /// empty, timestamps are not strictly ascending, or any value is
    /// NaN/infinite.
    pub fn new(key: SeriesKey, samples: Vec<MetricSample>) -> Result<Self> {
        key.validate()?;
        if samples.is_empty() {
            return Err(AnalyticsError::Validation(
                "series must contain at least one sample".to_string(),
            ));
        }
        for pair in samples.windows(2) {
            if pair[1].timestamp <= pair[0].timestamp {
                return Err(AnalyticsError::Validation(format!(
                    "series timestamps must be strictly ascending: {} followed by {}",
                    pair[0].timestamp, pair[1].timestamp
                )));
            }
        }
        if let Some(sample) = samples.iter().find(|s| !s.value.is_finite()) {
            return Err(AnalyticsError::Validation(format!(
                "series value at {} is not finite",
                sample.timestamp
            )));
        }
        Ok(Self { key, samples })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        // A constructed series is never empty; kept for the len/is_empty pair.
        self.samples.is_empty()
    }

    /// Timestamp of the first sample
    pub fn start_time(&self) -> DateTime<Utc> {
        self.samples[0].timestamp
    }

    /// Timestamp of the last sample
    pub fn end_time(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].timestamp
    }

    /// Raw values in timestamp order
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
    }

    /// Samples covered by a window, as a borrow
    pub fn window_samples(&self, window: &TimeWindow) -> &[MetricSample] {
        &self.samples[window.start_index..window.end_index]
    }

    /// Materialize the sub-series covered by a window
    ///
    /// # Errors
    /// `Validation` if the window covers no samples (empty time windows
    /// are legitimate extractor output but cannot form a series).
    pub fn slice(&self, window: &TimeWindow) -> Result<MetricSeries> {
        if window.is_empty() {
            return Err(AnalyticsError::Validation(format!(
                "window starting {} covers no samples",
                window.start_time
            )));
        }
        Ok(Self {
            key: self.key.clone(),
            samples: self.samples[window.start_index..window.end_index].to_vec(),
        })
    }
}

/// Closed set of anomaly classifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyLabel {
    Spike,
    Trend,
    Seasonal,
    Normal,
}

impl AnomalyLabel {
    /// Everything except `Normal` counts toward `num_anomalous`
    pub fn is_anomalous(&self) -> bool {
        !matches!(self, AnomalyLabel::Normal)
    }
}

impl std::fmt::Display for AnomalyLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AnomalyLabel::Spike => "spike",
            AnomalyLabel::Trend => "trend",
            AnomalyLabel::Seasonal => "seasonal",
            AnomalyLabel::Normal => "normal",
        };
        write!(f, "{s}")
    }
}

/// One scored detection for a single metric stream over one analyzed window
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyResult {
    #[serde(flatten)]
    key: SeriesKey,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    score: f64,
    label: AnomalyLabel,
    magnitude: Option<f64>,
    explanation: Option<String>,
}

impl AnomalyResult {
    /// Build a validated result
    ///
    /// # Errors
    /// `Validation` if the key has blank components, the window bounds are
    /// reversed, or the score is outside `[0.0, 1.0]` (NaN included).
    pub fn new(
        key: SeriesKey,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        score: f64,
        label: AnomalyLabel,
    ) -> Result<Self> {
        key.validate()?;
        if window_end < window_start {
            return Err(AnalyticsError::Validation(format!(
                "window end {window_end} precedes window start {window_start}"
            )));
        }
        if !score.is_finite() || !(0.0..=1.0).contains(&score) {
            return Err(AnalyticsError::Validation(format!(
                "anomaly score must be within [0.0, 1.0], got {score}"
            )));
        }
        Ok(Self {
            key,
            window_start,
            window_end,
            score,
            label,
            magnitude: None,
            explanation: None,
        })
    }

    /// Attach the observed deviation magnitude
    pub fn with_magnitude(mut self, magnitude: f64) -> Self {
        self.magnitude = Some(magnitude);
        self
    }

    /// Attach a human-readable explanation
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    /// Start of the analyzed time range
    pub fn window_start(&self) -> DateTime<Utc> {
        self.window_start
    }

    /// End of the analyzed time range
    pub fn window_end(&self) -> DateTime<Utc> {
        self.window_end
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn label(&self) -> AnomalyLabel {
        self.label
    }

    pub fn magnitude(&self) -> Option<f64> {
        self.magnitude
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

/// Roll-up granularity of an aggregated score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RollupLevel {
    Node,
    Cluster,
    Tenant,
}

impl std::fmt::Display for RollupLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RollupLevel::Node => "node",
            RollupLevel::Cluster => "cluster",
            RollupLevel::Tenant => "tenant",
        };
        write!(f, "{s}")
    }
}

/// Score rolled up to node, cluster or tenant level
///
/// `cluster_id`/`node_id` narrow the level: both set for a node score,
/// only `cluster_id` for a cluster score, neither for a tenant score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedScore {
    tenant_id: String,
    cluster_id: Option<String>,
    node_id: Option<String>,
    strategy: AggregationStrategy,
    aggregate_score: f64,
    num_inputs: usize,
    num_anomalous: usize,
}

impl AggregatedScore {
    /// Build a validated aggregated score
    ///
    /// # Errors
    /// `Validation` if the tenant id is blank, a `node_id` is given without
    /// its `cluster_id`, or the score falls outside `[0.0, 1.0]`.
    pub fn new(
        tenant_id: impl Into<String>,
        cluster_id: Option<String>,
        node_id: Option<String>,
        strategy: AggregationStrategy,
        aggregate_score: f64,
        num_inputs: usize,
        num_anomalous: usize,
    ) -> Result<Self> {
        let tenant_id = tenant_id.into();
        if tenant_id.trim().is_empty() {
            return Err(AnalyticsError::Validation(
                "aggregated score requires a tenant id".to_string(),
            ));
        }
        if node_id.is_some() && cluster_id.is_none() {
            return Err(AnalyticsError::Validation(
                "node-level score requires a cluster id".to_string(),
            ));
        }
        if !aggregate_score.is_finite() || !(0.0..=1.0).contains(&aggregate_score) {
            return Err(AnalyticsError::Validation(format!(
                "aggregate score must be within [0.0, 1.0], got {aggregate_score}"
            )));
        }
        // num_anomalous can exceed num_inputs above node level: cluster and
        // tenant scores sum anomaly counts through from the leaves while
        // num_inputs counts direct children.
        Ok(Self {
            tenant_id,
            cluster_id,
            node_id,
            strategy,
            aggregate_score,
            num_inputs,
            num_anomalous,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn cluster_id(&self) -> Option<&str> {
        self.cluster_id.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }

    pub fn strategy(&self) -> AggregationStrategy {
        self.strategy
    }

    pub fn aggregate_score(&self) -> f64 {
        self.aggregate_score
    }

    pub fn num_inputs(&self) -> usize {
        self.num_inputs
    }

    pub fn num_anomalous(&self) -> usize {
        self.num_anomalous
    }

    /// Granularity implied by which ids are present
    pub fn level(&self) -> RollupLevel {
        match (&self.node_id, &self.cluster_id) {
            (Some(_), _) => RollupLevel::Node,
            (None, Some(_)) => RollupLevel::Cluster,
            (None, None) => RollupLevel::Tenant,
        }
    }

    /// Identifier of the scored entity, used for ranking tie-breaks
    pub fn entity_id(&self) -> &str {
        self.node_id
            .as_deref()
            .or(self.cluster_id.as_deref())
            .unwrap_or(&self.tenant_id)
    }
}
