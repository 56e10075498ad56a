//! Configuration Module
//!
//! Handles loading server configuration from environment variables and
//! splitting it into the read-only construction surfaces of the cache and the
//! executor. Misconfiguration is rejected here, before anything is built.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the cache can hold
    pub max_entries: usize,
    /// Cache TTL in seconds
    pub cache_ttl: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Background sweep interval in seconds
    pub cleanup_interval: u64,
    /// Base URL of the upstream price API
    pub upstream_base_url: String,
    /// Per-attempt timeout in seconds
    pub request_timeout: u64,
    /// Pause after every successful fetch, in milliseconds
    pub request_delay_ms: u64,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Backoff base in milliseconds
    pub base_delay_ms: u64,
    /// Consecutive failures before the breaker opens
    pub failure_threshold: u32,
    /// How long the breaker stays open, in seconds
    pub break_duration: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_TTL` - Cache TTL in seconds (default: 300)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 60)
    /// - `UPSTREAM_BASE_URL` - Price API base (default: Steam community market)
    /// - `REQUEST_TIMEOUT` - Per-attempt timeout in seconds (default: 30)
    /// - `REQUEST_DELAY_MS` - Rate limit delay after success (default: 1000)
    /// - `MAX_RETRIES` - Retries after the first attempt (default: 3)
    /// - `BASE_DELAY_MS` - Backoff base (default: 1000)
    /// - `FAILURE_THRESHOLD` - Breaker threshold (default: 5)
    /// - `BREAK_DURATION` - Breaker open time in seconds (default: 30)
    ///
    /// Unparseable values fall back to the default for that variable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_entries: env_or("MAX_ENTRIES", defaults.max_entries),
            cache_ttl: env_or("CACHE_TTL", defaults.cache_ttl),
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cleanup_interval: env_or("CLEANUP_INTERVAL", defaults.cleanup_interval),
            upstream_base_url: env::var("UPSTREAM_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.upstream_base_url),
            request_timeout: env_or("REQUEST_TIMEOUT", defaults.request_timeout),
            request_delay_ms: env_or("REQUEST_DELAY_MS", defaults.request_delay_ms),
            max_retries: env_or("MAX_RETRIES", defaults.max_retries),
            base_delay_ms: env_or("BASE_DELAY_MS", defaults.base_delay_ms),
            failure_threshold: env_or("FAILURE_THRESHOLD", defaults.failure_threshold),
            break_duration: env_or("BREAK_DURATION", defaults.break_duration),
        }
    }

    /// Rejects values that would make a component misbehave at first use.
    pub fn validate(&self) -> Result<()> {
        self.cache_config().validate()?;
        self.executor_config().validate()?;
        if self.cleanup_interval == 0 {
            return Err(Error::InvalidConfig(
                "cleanup interval must be positive".to_string(),
            ));
        }
        if self.upstream_base_url.trim().is_empty() {
            return Err(Error::InvalidConfig(
                "upstream base URL cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Construction parameters for the TTL cache.
    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            max_entries: self.max_entries,
            ttl: Duration::from_secs(self.cache_ttl),
        }
    }

    /// Construction parameters for the resilient executor.
    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            failure_threshold: self.failure_threshold,
            break_duration: Duration::from_secs(self.break_duration),
            request_delay: Duration::from_millis(self.request_delay_ms),
            request_timeout: Duration::from_secs(self.request_timeout),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            cache_ttl: 300,
            server_port: 3000,
            cleanup_interval: 60,
            upstream_base_url: "https://steamcommunity.com/market".to_string(),
            request_timeout: 30,
            request_delay_ms: 1000,
            max_retries: 3,
            base_delay_ms: 1000,
            failure_threshold: 5,
            break_duration: 30,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// == Cache Config ==
/// Read-only construction parameters of a [`crate::cache::TtlCache`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_entries == 0 {
            return Err(Error::InvalidConfig(
                "cache max entries must be positive".to_string(),
            ));
        }
        if self.ttl.is_zero() {
            return Err(Error::InvalidConfig("cache TTL must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            ttl: Duration::from_secs(300),
        }
    }
}

// == Executor Config ==
/// Read-only construction parameters of a [`crate::resilience::ResilientExecutor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before retry `n` is `base_delay * 2^(n-1)`
    pub base_delay: Duration,
    /// Consecutive failures that open the breaker
    pub failure_threshold: u32,
    /// Time the breaker stays open before a probe is allowed
    pub break_duration: Duration,
    /// Pause applied once after every successful call
    pub request_delay: Duration,
    /// Upper bound on a single attempt
    pub request_timeout: Duration,
}

impl ExecutorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 {
            return Err(Error::InvalidConfig(
                "failure threshold must be positive".to_string(),
            ));
        }
        if self.break_duration.is_zero() {
            return Err(Error::InvalidConfig(
                "break duration must be positive".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::InvalidConfig(
                "request timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            failure_threshold: 5,
            break_duration: Duration::from_secs(30),
            request_delay: Duration::from_millis(1000),
            request_timeout: Duration::from_secs(30),
        }
    }
}
