//! Response DTOs for the price API
//!
//! Defines the structure of outgoing HTTP response bodies. Price lookups
//! answer with [`crate::service::PriceQuote`] directly.

use serde::Serialize;

use crate::cache::CacheStats;
use crate::resilience::BreakerSnapshot;

/// Response body for DELETE /cache/:key
#[derive(Debug, Clone, Serialize)]
pub struct RemoveResponse {
    /// Success message
    pub message: String,
    /// The key that was removed
    pub key: String,
}

impl RemoveResponse {
    /// Creates a new RemoveResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' removed", key),
            key,
        }
    }
}

/// Response body for DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
}

impl ClearResponse {
    pub fn new() -> Self {
        Self {
            message: "Cache cleared".to_string(),
        }
    }
}

impl Default for ClearResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Number of cache hits
    pub hits: u64,
    /// Number of cache misses
    pub misses: u64,
    /// Number of evictions
    pub evictions: u64,
    /// Number of entries purged after expiry
    pub expirations: u64,
    /// Current number of entries in cache
    pub total_entries: usize,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    /// Upstream circuit breaker
    pub breaker: BreakerSnapshot,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics and the breaker state
    pub fn new(stats: CacheStats, breaker: BreakerSnapshot) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            evictions: stats.evictions,
            expirations: stats.expirations,
            total_entries: stats.total_entries,
            hit_rate: stats.hit_rate(),
            breaker,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::CircuitState;

    fn closed() -> BreakerSnapshot {
        BreakerSnapshot {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            generation: 0,
        }
    }

    #[test]
    fn test_remove_response_serialize() {
        let resp = RemoveResponse::new("skin_730_x");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("skin_730_x"));
        assert!(json.contains("removed"));
    }

    #[test]
    fn test_stats_response_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            evictions: 5,
            expirations: 1,
            total_entries: 100,
        };
        let resp = StatsResponse::new(stats, closed());
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_stats_response_breaker_state() {
        let resp = StatsResponse::new(CacheStats::default(), closed());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["hit_rate"], 0.0);
        assert_eq!(json["breaker"]["state"], "closed");
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy();
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }
}
