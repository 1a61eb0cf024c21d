//! Array Cache - A bounded in-process object cache
//!
//! Keeps values in recency order inside a growable buffer, answers
//! find-or-load lookups through named queries, runs every operation
//! synchronously or on a tokio runtime, and sweeps expired entries in the
//! background.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{Cache, CacheQuery, CacheStats, Pending};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::SweeperState;
