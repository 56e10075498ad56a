//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Request to upstream:
//!     → circuit_breaker.rs (fail fast while open, probe when half-open)
//!     → executor.rs (retry loop, backoff.rs delays, per-attempt timeout)
//!     → transport.rs (single raw attempt)
//! ```
//!
//! # Design Decisions
//! - The breaker gate sits outermost so a tripped breaker costs nothing
//! - Breaker outcomes are recorded per raw attempt, not per logical call
//! - Retry and breaker classify failures independently

pub mod backoff;
pub mod circuit_breaker;
pub mod executor;
pub mod transport;

pub use circuit_breaker::{BreakerSnapshot, CircuitBreaker, CircuitState, Permit};
pub use executor::{ExecutorBuilder, ResilientExecutor, ResponsePredicate};
pub use transport::{HttpTransport, Response, Transport};
