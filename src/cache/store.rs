//! Cache Store Module
//!
//! Main cache engine combining the recency-ordered buffer, the query
//! registry, asynchronous dispatch and the background sweeper.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::cache::{BufferStore, CacheQuery, CacheStats, Pending};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::{self, SweeperSlot, SweeperState};

/// Callback notified with values the sweeper removes.
pub type RemoveListener<V> = Arc<dyn Fn(V) + Send + Sync>;

// == Timing ==
/// Sweeper durations; zero disables a condition.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Timing {
    pub refresh: Duration,
    pub expire: Duration,
}

// == Shared State ==
/// State shared by every `Cache` clone, async work and the sweeper.
///
/// All entry storage sits behind the single `buffer` lock. Query `check`
/// calls and ad-hoc predicates run while it is held. Loaders and the remove
/// listener are always invoked with that lock released.
pub(crate) struct Shared<V> {
    pub(crate) buffer: Mutex<BufferStore<V>>,
    pub(crate) timing: RwLock<Timing>,
    pub(crate) listener: RwLock<Option<RemoveListener<V>>>,
    queries: RwLock<HashMap<String, Arc<dyn CacheQuery<V>>>>,
    sweeper: Mutex<SweeperSlot>,
    sweep_interval: Duration,
    runtime: Handle,
}

// == Cache ==
/// Bounded object cache with find-or-load lookups.
///
/// Cloning is cheap and every clone operates on the same entries. Values are
/// handed out by clone, so large values are best cached as `Arc<T>`.
///
/// Concurrent misses for the same lookup are not coalesced: each caller
/// runs its loader and every loaded value is inserted.
pub struct Cache<V> {
    pub(crate) shared: Arc<Shared<V>>,
}

impl<V> Clone for Cache<V> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + Send + 'static,
{
    // == Constructors ==
    /// Creates a cache scheduling its work on `runtime`.
    ///
    /// A non-zero refresh or expire duration in `config` starts the sweeper.
    pub fn new(runtime: Handle, config: &Config) -> Result<Self> {
        config.validate()?;

        let cache = Self {
            shared: Arc::new(Shared {
                buffer: Mutex::new(BufferStore::new(config.max_size, config.buffer_increment)?),
                timing: RwLock::new(Timing::default()),
                listener: RwLock::new(None),
                queries: RwLock::new(HashMap::new()),
                sweeper: Mutex::new(SweeperSlot::Idle),
                sweep_interval: config.sweep_interval(),
                runtime,
            }),
        };

        if !config.refresh().is_zero() {
            cache.set_refresh(config.refresh());
        }
        if !config.expire().is_zero() {
            cache.set_expire(config.expire());
        }
        Ok(cache)
    }

    /// Creates a cache on the runtime of the calling context.
    pub fn from_config(config: &Config) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        Self::new(runtime, config)
    }

    /// Creates a cache with default sizes on the current runtime.
    pub fn with_defaults() -> Result<Self> {
        Self::from_config(&Config::default())
    }

    // == Get ==
    /// Finds the entry matching a registered query, loading it on a miss.
    ///
    /// # Errors
    /// - `NotFound` if no query is registered under `query_name`
    /// - `InvalidArgument` if the query rejects `identifiers`
    /// - `LoadFailure` if the query's loader fails
    pub fn get(&self, query_name: &str, identifiers: &[Value]) -> Result<V> {
        let query = self.validated_query(query_name, identifiers)?;

        if let Some(value) = self.lookup(|value| query.check(value, identifiers)) {
            return Ok(value);
        }

        let value = query.load(identifiers).map_err(CacheError::LoadFailure)?;
        self.insert_loaded(value.clone());
        Ok(value)
    }

    /// Finds the first entry matching `predicate` without loading on a miss.
    ///
    /// `predicate` runs under the buffer lock and must not call back into the
    /// cache, or it deadlocks.
    pub fn get_matching<P>(&self, predicate: P) -> Option<V>
    where
        P: Fn(&V) -> bool,
    {
        self.lookup(predicate)
    }

    /// Finds the first entry matching `predicate`, running `loader` on a miss.
    ///
    /// `predicate` runs under the buffer lock, like in
    /// [`get_matching`](Self::get_matching). `loader` runs with it released.
    pub fn get_or_load<P, L>(&self, predicate: P, loader: L) -> Result<V>
    where
        P: Fn(&V) -> bool,
        L: FnOnce() -> anyhow::Result<V>,
    {
        if let Some(value) = self.lookup(predicate) {
            return Ok(value);
        }

        let value = loader().map_err(CacheError::LoadFailure)?;
        self.insert_loaded(value.clone());
        Ok(value)
    }

    // == Insert ==
    /// Inserts a value without checking for duplicates.
    ///
    /// A full cache evicts its least recently touched entry. The remove
    /// listener is not notified of capacity evictions.
    pub fn insert(&self, value: V) {
        let evicted = self.shared.buffer.lock().insert(value);
        if evicted.is_some() {
            debug!("Evicted least recently used entry to make room");
        }
    }

    // == Remove ==
    /// Removes the entry matching a registered query.
    pub fn remove(&self, query_name: &str, identifiers: &[Value]) -> Result<Option<V>> {
        let query = self.validated_query(query_name, identifiers)?;
        Ok(self.remove_first(|value| query.check(value, identifiers)))
    }

    /// Removes the first entry matching `predicate`.
    ///
    /// `predicate` runs under the buffer lock and must not call back into the
    /// cache, or it deadlocks.
    pub fn remove_matching<P>(&self, predicate: P) -> Option<V>
    where
        P: Fn(&V) -> bool,
    {
        self.remove_first(predicate)
    }

    // == Async Operations ==
    /// Runs [`get`](Self::get) on the scheduler.
    pub fn get_async(&self, query_name: impl Into<String>, identifiers: Vec<Value>) -> Pending<V> {
        let query_name = query_name.into();
        self.dispatch(move |cache| cache.get(&query_name, &identifiers))
    }

    /// Runs [`get_matching`](Self::get_matching) on the scheduler.
    pub fn get_matching_async<P>(&self, predicate: P) -> Pending<Option<V>>
    where
        P: Fn(&V) -> bool + Send + 'static,
    {
        self.dispatch(move |cache| Ok(cache.get_matching(predicate)))
    }

    /// Runs [`get_or_load`](Self::get_or_load) on the scheduler.
    pub fn get_or_load_async<P, L>(&self, predicate: P, loader: L) -> Pending<V>
    where
        P: Fn(&V) -> bool + Send + 'static,
        L: FnOnce() -> anyhow::Result<V> + Send + 'static,
    {
        self.dispatch(move |cache| cache.get_or_load(predicate, loader))
    }

    /// Runs [`insert`](Self::insert) on the scheduler.
    pub fn insert_async(&self, value: V) -> Pending<()> {
        self.dispatch(move |cache| {
            cache.insert(value);
            Ok(())
        })
    }

    /// Runs [`remove`](Self::remove) on the scheduler.
    pub fn remove_async(
        &self,
        query_name: impl Into<String>,
        identifiers: Vec<Value>,
    ) -> Pending<Option<V>> {
        let query_name = query_name.into();
        self.dispatch(move |cache| cache.remove(&query_name, &identifiers))
    }

    /// Runs [`remove_matching`](Self::remove_matching) on the scheduler.
    pub fn remove_matching_async<P>(&self, predicate: P) -> Pending<Option<V>>
    where
        P: Fn(&V) -> bool + Send + 'static,
    {
        self.dispatch(move |cache| Ok(cache.remove_matching(predicate)))
    }

    // == Configuration ==
    /// Changes the maximum number of entries.
    ///
    /// Shrinking below the current size evicts the least recently touched
    /// entries without notifying the remove listener.
    pub fn set_max_size(&self, max_size: usize) -> Result<&Self> {
        let evicted = self.shared.buffer.lock().set_max_size(max_size)?;
        if !evicted.is_empty() {
            warn!(
                evicted = evicted.len(),
                max_size, "Maximum size lowered below current size"
            );
        }
        debug!(max_size, "Maximum size updated");
        Ok(self)
    }

    /// Changes the step by which the buffer grows and shrinks.
    pub fn set_buffer_increment(&self, increment: usize) -> Result<&Self> {
        self.shared.buffer.lock().set_increment(increment)?;
        debug!(increment, "Buffer increment updated");
        Ok(self)
    }

    /// Sets the maximum age of an entry, counted from insertion.
    ///
    /// The first call to this or [`set_expire`](Self::set_expire) starts the sweeper.
    pub fn set_refresh(&self, refresh: Duration) -> &Self {
        self.shared.timing.write().refresh = refresh;
        debug!(refresh_ms = refresh.as_millis() as u64, "Refresh duration updated");
        self.ensure_sweeper();
        self
    }

    /// Sets the maximum idle time of an entry, counted from its last use.
    pub fn set_expire(&self, expire: Duration) -> &Self {
        self.shared.timing.write().expire = expire;
        debug!(expire_ms = expire.as_millis() as u64, "Expire duration updated");
        self.ensure_sweeper();
        self
    }

    /// Sets the callback notified with every value the sweeper removes.
    ///
    /// The callback runs on a scheduler thread. A panic inside it is logged
    /// and does not stop the sweeper.
    pub fn set_remove_listener<F>(&self, listener: F) -> &Self
    where
        F: Fn(V) + Send + Sync + 'static,
    {
        *self.shared.listener.write() = Some(Arc::new(listener));
        self
    }

    /// Registers `query` under a case-insensitive name, replacing any previous one.
    pub fn register_query<Q>(&self, name: &str, query: Q) -> &Self
    where
        Q: CacheQuery<V> + 'static,
    {
        let name = name.to_lowercase();
        debug!(query = %name, "Registering cache query");
        self.shared.queries.write().insert(name, Arc::new(query));
        self
    }

    pub fn unregister_query(&self, name: &str) -> &Self {
        self.shared.queries.write().remove(&name.to_lowercase());
        self
    }

    pub fn has_query(&self, name: &str) -> bool {
        self.shared.queries.read().contains_key(&name.to_lowercase())
    }

    // == Introspection ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.shared.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.buffer.lock().is_empty()
    }

    /// Returns the number of reserved buffer slots.
    pub fn capacity(&self) -> usize {
        self.shared.buffer.lock().capacity()
    }

    /// Returns a snapshot of cached values, least recently touched first.
    pub fn cached_values(&self) -> Vec<V> {
        self.shared
            .buffer
            .lock()
            .iter()
            .map(|entry| entry.value.clone())
            .collect()
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.buffer.lock().stats()
    }

    pub fn sweeper_state(&self) -> SweeperState {
        self.shared.sweeper.lock().state()
    }

    /// Drops every entry. Returns the number of entries dropped.
    pub fn clear(&self) -> usize {
        self.shared.buffer.lock().clear()
    }

    /// Runs one sweeper pass immediately. Returns the number of entries removed.
    pub fn sweep_now(&self) -> usize {
        tasks::sweep(&*self.shared)
    }

    // == Shutdown ==
    /// Stops the sweeper and drops every entry.
    ///
    /// The sweeper exits at its next wake and is never restarted. Repeated
    /// calls are no-ops.
    pub fn shutdown(&self) {
        {
            let mut slot = self.shared.sweeper.lock();
            if slot.state() == SweeperState::Stopped {
                return;
            }
            slot.stop();
        }

        let dropped = self.clear();
        info!(dropped, "Cache shut down");
    }

    // == Internals ==
    fn validated_query(
        &self,
        query_name: &str,
        identifiers: &[Value],
    ) -> Result<Arc<dyn CacheQuery<V>>> {
        let query = self
            .shared
            .queries
            .read()
            .get(&query_name.to_lowercase())
            .cloned()
            .ok_or_else(|| CacheError::NotFound(query_name.to_string()))?;

        query
            .validate(identifiers)
            .map_err(|err| CacheError::InvalidArgument(format!("{err:#}")))?;
        Ok(query)
    }

    /// Scans for a match and moves it to the tail on a hit.
    fn lookup<P>(&self, predicate: P) -> Option<V>
    where
        P: Fn(&V) -> bool,
    {
        let mut buffer = self.shared.buffer.lock();
        match buffer.find(predicate) {
            Some(index) => {
                buffer.stats_mut().record_hit();
                Some(buffer.touch(index).value.clone())
            }
            None => {
                buffer.stats_mut().record_miss();
                None
            }
        }
    }

    fn insert_loaded(&self, value: V) {
        let mut buffer = self.shared.buffer.lock();
        buffer.stats_mut().record_load();
        if buffer.insert(value).is_some() {
            debug!("Evicted least recently used entry to make room for loaded value");
        }
    }

    fn remove_first<P>(&self, predicate: P) -> Option<V>
    where
        P: Fn(&V) -> bool,
    {
        let mut buffer = self.shared.buffer.lock();
        let index = buffer.find(predicate)?;
        buffer.stats_mut().record_removal();
        Some(buffer.remove_at(index).into_value())
    }

    fn dispatch<T, F>(&self, work: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&Cache<V>) -> Result<T> + Send + 'static,
    {
        let cache = self.clone();
        Pending::new(self.shared.runtime.spawn_blocking(move || work(&cache)))
    }

    fn ensure_sweeper(&self) {
        let mut slot = self.shared.sweeper.lock();
        if slot.state() == SweeperState::Idle {
            *slot = tasks::spawn_sweeper(
                Arc::downgrade(&self.shared),
                &self.shared.runtime,
                self.shared.sweep_interval,
            );
        }
    }
}

impl<V> Cache<V>
where
    V: Clone + PartialEq + Send + 'static,
{
    /// Removes the first entry equal to `value`.
    pub fn remove_value(&self, value: &V) -> bool {
        self.remove_first(|cached| cached == value).is_some()
    }

    /// Runs [`remove_value`](Self::remove_value) on the scheduler.
    pub fn remove_value_async(&self, value: V) -> Pending<bool> {
        self.dispatch(move |cache| Ok(cache.remove_value(&value)))
    }
}
