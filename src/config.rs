//! Configuration Module
//!
//! Handles loading and validating cache configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{
    validate_sizes, DEFAULT_BUFFER_INCREMENT, DEFAULT_MAX_SIZE, DEFAULT_SWEEP_INTERVAL_MS,
};
use crate::error::{CacheError, Result};

/// Cache configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_size: usize,
    /// Step by which the entry buffer grows and shrinks
    pub buffer_increment: usize,
    /// Sweeper interval in milliseconds
    pub sweep_interval_ms: u64,
    /// Maximum entry age in seconds, 0 = disabled
    pub refresh_secs: u64,
    /// Maximum entry idle time in seconds, 0 = disabled
    pub expire_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Maximum cache entries (default: 1000)
    /// - `CACHE_BUFFER_INCREMENT` - Buffer growth step (default: 128, capped at the maximum size)
    /// - `CACHE_SWEEP_INTERVAL_MS` - Sweeper frequency in milliseconds (default: 1000)
    /// - `CACHE_REFRESH_SECS` - Maximum entry age in seconds (default: 0, disabled)
    /// - `CACHE_EXPIRE_SECS` - Maximum entry idle time in seconds (default: 0, disabled)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a Config from any name-to-value source, applying the same defaults.
    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let max_size = parse_or(&lookup, "CACHE_MAX_SIZE", defaults.max_size);

        Self {
            max_size,
            // An unset increment follows a small maximum down
            buffer_increment: parse_or(
                &lookup,
                "CACHE_BUFFER_INCREMENT",
                DEFAULT_BUFFER_INCREMENT.min(max_size),
            ),
            sweep_interval_ms: parse_or(
                &lookup,
                "CACHE_SWEEP_INTERVAL_MS",
                defaults.sweep_interval_ms,
            ),
            refresh_secs: parse_or(&lookup, "CACHE_REFRESH_SECS", defaults.refresh_secs),
            expire_secs: parse_or(&lookup, "CACHE_EXPIRE_SECS", defaults.expire_secs),
        }
    }

    /// Rejects size and interval combinations the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        validate_sizes(self.max_size, self.buffer_increment)?;
        if self.sweep_interval_ms == 0 {
            return Err(CacheError::InvalidArgument(
                "Sweep interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn refresh(&self) -> Duration {
        Duration::from_secs(self.refresh_secs)
    }

    pub fn expire(&self) -> Duration {
        Duration::from_secs(self.expire_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            buffer_increment: DEFAULT_BUFFER_INCREMENT,
            sweep_interval_ms: DEFAULT_SWEEP_INTERVAL_MS,
            refresh_secs: 0,
            expire_secs: 0,
        }
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(name)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.max_size, 1000);
        assert_eq!(config.buffer_increment, 128);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
        assert!(config.refresh().is_zero());
        assert!(config.expire().is_zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("CACHE_MAX_SIZE");
        env::remove_var("CACHE_BUFFER_INCREMENT");
        env::remove_var("CACHE_SWEEP_INTERVAL_MS");
        env::remove_var("CACHE_REFRESH_SECS");
        env::remove_var("CACHE_EXPIRE_SECS");

        assert_eq!(Config::from_env(), Config::default());
    }

    #[test]
    fn test_config_small_max_size_caps_default_increment() {
        let vars: HashMap<&str, &str> = [("CACHE_MAX_SIZE", "50")].into_iter().collect();

        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.max_size, 50);
        assert_eq!(config.buffer_increment, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_explicit_increment_is_kept() {
        let vars: HashMap<&str, &str> = [
            ("CACHE_MAX_SIZE", "50"),
            ("CACHE_BUFFER_INCREMENT", "80"),
            ("CACHE_EXPIRE_SECS", "30"),
        ]
        .into_iter()
        .collect();

        let config = Config::from_lookup(|name| vars.get(name).map(|v| v.to_string()));

        // An explicit contradiction is still reported, not silently fixed
        assert_eq!(config.buffer_increment, 80);
        assert_eq!(config.expire(), Duration::from_secs(30));
        assert!(matches!(
            config.validate(),
            Err(CacheError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_config_validate_rejects_contradictions() {
        let oversized_increment = Config {
            max_size: 10,
            buffer_increment: 11,
            ..Config::default()
        };
        assert!(matches!(
            oversized_increment.validate(),
            Err(CacheError::InvalidArgument(_))
        ));

        let no_interval = Config {
            sweep_interval_ms: 0,
            ..Config::default()
        };
        assert!(matches!(
            no_interval.validate(),
            Err(CacheError::InvalidArgument(_))
        ));

        let empty = Config {
            max_size: 0,
            buffer_increment: 0,
            ..Config::default()
        };
        assert!(empty.validate().is_err());
    }
}
