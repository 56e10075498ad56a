//! Cache Module
//!
//! Provides in-memory caching with TTL expiration and nearest-expiry eviction.

mod entry;
mod stats;
mod store;
mod ttl;


// Re-export public types
pub use entry::CacheEntry;
pub use stats::{CacheStats, StatsCounters};
pub use store::{validate_key, CacheStore, Lookup};
pub use ttl::TtlCache;
