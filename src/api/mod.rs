//! API Module
//!
//! HTTP handlers and routing for the price API.
//!
//! # Endpoints
//! - `GET /price/:app_id/:market_hash_name` - Cached price lookup
//! - `DELETE /cache/:key` - Remove one cache entry
//! - `DELETE /cache` - Clear the cache
//! - `GET /stats` - Cache statistics and breaker state
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
