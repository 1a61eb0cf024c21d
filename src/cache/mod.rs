//! Cache Module
//!
//! Provides a bounded object cache with recency eviction, named queries and
//! time-based expiry.

mod buffer;
mod entry;
mod pending;
mod query;
mod stats;
mod store;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use buffer::BufferStore;
pub use entry::CacheEntry;
pub use pending::Pending;
pub use query::CacheQuery;
pub use stats::CacheStats;
pub use store::{Cache, RemoveListener};

pub(crate) use buffer::validate_sizes;
pub(crate) use store::Shared;

// == Public Constants ==
/// Default maximum number of entries
pub const DEFAULT_MAX_SIZE: usize = 1000;

/// Default step by which the buffer grows and shrinks
pub const DEFAULT_BUFFER_INCREMENT: usize = 128;

/// Default time between sweeper passes in milliseconds
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 1000;
