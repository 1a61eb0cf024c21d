//! Array Cache demo
//!
//! Runs a cache of user profiles in front of a slow in-process directory,
//! logging cache statistics until interrupted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use serde_json::{json, Value};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use array_cache::{Cache, CacheQuery, Config};

/// A cached user profile.
#[derive(Debug, Clone, PartialEq)]
struct Profile {
    id: u64,
    name: String,
}

/// Simulated backing store with noticeable lookup latency.
struct Directory {
    profiles: HashMap<u64, String>,
}

impl Directory {
    fn seeded(count: u64) -> Self {
        let profiles = (1..=count).map(|id| (id, format!("user-{:04}", id))).collect();
        Self { profiles }
    }

    fn fetch_by_id(&self, id: u64) -> anyhow::Result<Profile> {
        std::thread::sleep(Duration::from_millis(20));
        let name = self
            .profiles
            .get(&id)
            .with_context(|| format!("no profile with id {}", id))?;
        Ok(Profile {
            id,
            name: name.clone(),
        })
    }

    fn fetch_by_name(&self, name: &str) -> anyhow::Result<Profile> {
        std::thread::sleep(Duration::from_millis(20));
        self.profiles
            .iter()
            .find(|(_, candidate)| candidate.eq_ignore_ascii_case(name))
            .map(|(id, name)| Profile {
                id: *id,
                name: name.clone(),
            })
            .with_context(|| format!("no profile named {}", name))
    }
}

struct ById(Arc<Directory>);

impl CacheQuery<Arc<Profile>> for ById {
    fn validate(&self, identifiers: &[Value]) -> anyhow::Result<()> {
        match identifiers {
            [id] if id.is_u64() => Ok(()),
            _ => bail!("by_id expects one numeric id"),
        }
    }

    fn check(&self, value: &Arc<Profile>, identifiers: &[Value]) -> bool {
        identifiers[0].as_u64() == Some(value.id)
    }

    fn load(&self, identifiers: &[Value]) -> anyhow::Result<Arc<Profile>> {
        let id = identifiers[0].as_u64().context("id is not numeric")?;
        self.0.fetch_by_id(id).map(Arc::new)
    }
}

struct ByName(Arc<Directory>);

impl CacheQuery<Arc<Profile>> for ByName {
    fn validate(&self, identifiers: &[Value]) -> anyhow::Result<()> {
        match identifiers {
            [name] if name.is_string() => Ok(()),
            _ => bail!("by_name expects one string"),
        }
    }

    fn check(&self, value: &Arc<Profile>, identifiers: &[Value]) -> bool {
        identifiers[0]
            .as_str()
            .is_some_and(|name| value.name.eq_ignore_ascii_case(name))
    }

    fn load(&self, identifiers: &[Value]) -> anyhow::Result<Arc<Profile>> {
        let name = identifiers[0].as_str().context("name is not a string")?;
        self.0.fetch_by_name(name).map(Arc::new)
    }
}

/// Main entry point for the cache demo.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache and register its queries
/// 4. Run a lookup workload and log statistics periodically
/// 5. Shut the cache down on SIGINT/SIGTERM
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "array_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Array Cache demo");

    let config = Config::from_env();
    info!(
        "Configuration loaded: max_size={}, buffer_increment={}, sweep_interval={}ms, refresh={}s, expire={}s",
        config.max_size,
        config.buffer_increment,
        config.sweep_interval_ms,
        config.refresh_secs,
        config.expire_secs
    );

    let directory = Arc::new(Directory::seeded(500));
    let cache: Cache<Arc<Profile>> = Cache::from_config(&config)?;
    cache
        .register_query("by_id", ById(Arc::clone(&directory)))
        .register_query("by_name", ByName(Arc::clone(&directory)))
        .set_remove_listener(|profile: Arc<Profile>| {
            tracing::debug!(id = profile.id, "Profile left the cache");
        });
    if config.expire().is_zero() && config.refresh().is_zero() {
        cache.set_expire(Duration::from_secs(30));
    }

    let workload = tokio::spawn(run_workload(cache.clone()));

    shutdown_signal().await;

    workload.abort();
    cache.shutdown();
    info!("Demo shutdown complete");
    Ok(())
}

/// Issues a skewed mix of lookups so popular profiles stay cached.
async fn run_workload(cache: Cache<Arc<Profile>>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(50));
    let mut round: u64 = 0;

    loop {
        ticker.tick().await;
        round += 1;

        let id = if round % 4 == 0 { round % 500 + 1 } else { round % 20 + 1 };
        let lookup = if round % 10 == 0 {
            cache.get_async("by_name", vec![json!(format!("USER-{:04}", id))])
        } else {
            cache.get_async("by_id", vec![json!(id)])
        };

        if let Err(err) = lookup.await {
            warn!(error = %err, "Lookup failed");
        }

        if round % 100 == 0 {
            let stats = cache.stats();
            info!(
                "Stats: entries={}, hits={}, misses={}, hit_rate={:.2}, evictions={}, expirations={}",
                stats.total_entries,
                stats.hits,
                stats.misses,
                stats.hit_rate(),
                stats.evictions,
                stats.expirations
            );
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }
}
