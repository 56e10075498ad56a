//! Price Shield - A caching, failure-tolerant front for a market price API
//!
//! Combines a bounded TTL cache with a resilient executor (retry with
//! exponential backoff behind a circuit breaker).

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod resilience;
pub mod service;
pub mod tasks;
pub mod telemetry;

pub use api::AppState;
pub use config::Config;
pub use error::{Error, Result};
pub use service::PriceService;
pub use tasks::spawn_cleanup_task;
