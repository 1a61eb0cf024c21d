//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A named query was requested but never registered
    #[error("Query not found: {0}")]
    NotFound(String),

    /// Identifiers rejected by a query, or contradictory configuration
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The loader for a missed lookup failed
    #[error("Load failed: {0:#}")]
    LoadFailure(#[source] anyhow::Error),

    /// The removal listener panicked while handling a removed value
    #[error("Remove listener failed: {0}")]
    ListenerFailure(String),

    /// A sweeper pass failed before completing
    #[error("Sweep failed: {0}")]
    SweepFailure(String),

    /// Work submitted to the scheduler did not run to completion
    #[error("Task failed: {0}")]
    TaskFailed(String),

    /// No tokio runtime is available to schedule work on
    #[error("No tokio runtime available")]
    NoRuntime,
}

impl CacheError {
    /// Renders a panic payload caught by `catch_unwind` as a message.
    pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
        if let Some(msg) = payload.downcast_ref::<&str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        }
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
