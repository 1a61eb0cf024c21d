//! Cache Query Module
//!
//! Named lookup capability used by find-or-load retrieval.

use serde_json::Value;

// == Cache Query ==
/// A named way to find, and on a miss load, a cached value.
///
/// Identifiers are passed as JSON values so one cache can host queries keyed
/// by ids, names, or composite tuples without a shared key type.
///
/// # Locking
/// [`check`](Self::check) runs while the cache's buffer lock is held, once
/// per scanned entry. It must be cheap and must not call back into the cache:
/// any cache operation from inside `check` deadlocks. [`load`](Self::load)
/// runs with the lock released and may use the cache freely.
///
/// # Example
/// ```
/// use array_cache::CacheQuery;
/// use serde_json::Value;
///
/// struct ById;
///
/// impl CacheQuery<(u64, String)> for ById {
///     fn validate(&self, identifiers: &[Value]) -> anyhow::Result<()> {
///         match identifiers {
///             [id] if id.is_u64() => Ok(()),
///             _ => anyhow::bail!("expected a single numeric id"),
///         }
///     }
///
///     fn check(&self, value: &(u64, String), identifiers: &[Value]) -> bool {
///         identifiers[0].as_u64() == Some(value.0)
///     }
///
///     fn load(&self, identifiers: &[Value]) -> anyhow::Result<(u64, String)> {
///         let id = identifiers[0].as_u64().unwrap_or_default();
///         Ok((id, format!("user-{id}")))
///     }
/// }
/// ```
pub trait CacheQuery<V>: Send + Sync {
    /// Rejects malformed identifiers before any scan or load happens.
    fn validate(&self, _identifiers: &[Value]) -> anyhow::Result<()> {
        Ok(())
    }

    /// Returns true if `value` is the entry the identifiers describe.
    ///
    /// Called under the buffer lock; never touch the cache from here.
    fn check(&self, value: &V, identifiers: &[Value]) -> bool;

    /// Produces the value when no cached entry matches.
    fn load(&self, identifiers: &[Value]) -> anyhow::Result<V>;
}
