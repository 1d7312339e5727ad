//! Pluggable anomaly detection
//!
//! The scan pipeline treats detection as a capability: anything that can
//! turn a metric series into scored results. Concrete engines register a
//! constructor in an `EngineRegistry` the caller builds and passes in —
//! there is no process-global registry, so tests and embedders can wire
//! substitutes without setup/teardown.

mod classify;
mod zscore;

pub use classify::{classify_series, Classification, TrendDirection};
pub use zscore::{ZScoreConfig, ZScoreEngine};

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;

use crate::error::AnalyticsError;
use crate::models::{AnomalyResult, MetricSeries};

pub use async_trait::async_trait;

/// Trait for anomaly detection implementations
///
/// Engines may be slow or fail; the scan runner isolates both per
/// partition. The core checks only that returned results carry the same
/// hierarchy keys as the analyzed series, never that the detection itself
/// is any good.
#[async_trait]
pub trait DetectionEngine: Send + Sync {
    /// Analyze one series and produce zero or more scored results
    async fn detect(&self, series: &MetricSeries) -> Result<Vec<AnomalyResult>>;

    /// Stable engine name for registry lookups and logs
    fn name(&self) -> &str;
}

impl std::fmt::Debug for dyn DetectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectionEngine")
            .field("name", &self.name())
            .finish()
    }
}

/// Constructor registered for each engine name
///
/// Receives the engine's parameter block from scan configuration
/// (`serde_json::Value::Null` when none was given).
pub type EngineBuilder = fn(&serde_json::Value) -> Result<Arc<dyn DetectionEngine>>;

/// Explicit name → constructor mapping for engine selection
#[derive(Debug, Clone, Default)]
pub struct EngineRegistry {
    builders: HashMap<String, EngineBuilder>,
}

impl EngineRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-loaded with the built-in engines
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("zscore", |params| {
            let config = if params.is_null() {
                ZScoreConfig::default()
            } else {
                serde_json::from_value(params.clone())?
            };
            Ok(Arc::new(ZScoreEngine::new(config)?))
        });
        registry
    }

    /// Register a constructor under a name, replacing any previous entry
    pub fn register(&mut self, name: impl Into<String>, builder: EngineBuilder) {
        self.builders.insert(name.into(), builder);
    }

    /// Instantiate an engine by name
    ///
    /// # Errors
    /// `Config` when the name is unknown (the message lists what is
    /// registered) or the constructor rejects the parameters.
    pub fn build(
        &self,
        name: &str,
        params: &serde_json::Value,
    ) -> crate::error::Result<Arc<dyn DetectionEngine>> {
        let builder = self.builders.get(name).ok_or_else(|| {
            AnalyticsError::Config(format!(
                "unknown detection engine '{}' (available: {})",
                name,
                self.engines().join(", ")
            ))
        })?;
        builder(params).map_err(|e| {
            AnalyticsError::Config(format!("engine '{name}' rejected parameters: {e:#}"))
        })
    }

    /// Registered engine names, sorted
    pub fn engines(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.builders.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
