//! Analytics core for fleet anomaly ranking
//!
//! This crate provides the core functionality for:
//! - Validated metric series and anomaly result models
//! - Point and time based window extraction
//! - Pluggable anomaly detection engines behind an async port
//! - Score aggregation across the metric → node → cluster → tenant hierarchy
//! - Concurrent fleet scans with per-partition failure isolation
//! - Synthetic series generation for tests and demos

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod simulate;
pub mod store;
pub mod window;

pub use aggregate::{aggregate, AggregationStrategy, Aggregator};
pub use engine::{DetectionEngine, EngineRegistry, ZScoreConfig, ZScoreEngine};
pub use error::{AnalyticsError, Result};
pub use models::*;
pub use observability::{AnalyticsMetrics, ScanLogger};
pub use pipeline::{
    top_n, AggregationPipeline, PipelineConfig, PipelineScores, ScanOutcome, ScanRunner,
    ScanStats, ScanTarget,
};
pub use store::{MemoryStore, SeriesStore};
pub use window::{extract_windows, TimeWindow, WindowConfig};
