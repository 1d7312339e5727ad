//! Typed errors for the analytics engine
//!
//! Every failure mode is a distinct variant so callers can branch on the
//! cause instead of string-matching. Collaborator ports (series store,
//! detection engine) return opaque `anyhow::Error` values instead; those
//! are collected per partition by the scan runner, never raised through
//! this enum.

use thiserror::Error;

/// Errors produced by the analytics core
#[derive(Error, Debug)]
pub enum AnalyticsError {
    /// Invalid static configuration (window sizes, ranking depth, engine names)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Malformed input data (unordered series, out-of-range scores, mixed keys)
    #[error("invalid input: {0}")]
    Validation(String),

    /// Series too short for the requested window policy
    #[error("insufficient data: need at least {required} samples, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// Aggregation could not produce a score (empty input, missing weight)
    #[error("aggregation failed: {0}")]
    Aggregation(String),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, AnalyticsError>;
