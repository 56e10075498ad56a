//! Telemetry Module
//!
//! Structured events emitted by the cache and the executor. Sinks observe the
//! events; nothing they do feeds back into control flow.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, error, info, warn};

// == Telemetry Event ==
/// A single observational event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// A retry is about to run after `delay`
    RetryAttempt { attempt: u32, delay: Duration },
    /// Breaker tripped and will stay open for `duration`
    CircuitOpened { duration: Duration },
    /// Break duration elapsed; a single probe is let through
    CircuitHalfOpen,
    /// Probe succeeded; breaker closed again
    CircuitReset,
    /// Post-success pause applied for upstream rate limits
    RateLimitDelay { delay: Duration },
    CacheHit { key: String },
    CacheMiss { key: String },
    CacheEvicted { key: String },
    CacheExpired { key: String },
}

// == Telemetry Trait ==
/// Receiver of [`TelemetryEvent`]s.
pub trait Telemetry: Send + Sync {
    fn record(&self, event: &TelemetryEvent);
}

// == Tracing Sink ==
/// Default sink: writes every event as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        match event {
            TelemetryEvent::RetryAttempt { attempt, delay } => warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                "HTTP request failed, retrying"
            ),
            TelemetryEvent::CircuitOpened { duration } => error!(
                duration_ms = duration.as_millis() as u64,
                "Circuit breaker opened"
            ),
            TelemetryEvent::CircuitHalfOpen => info!("Circuit breaker half-open, probing"),
            TelemetryEvent::CircuitReset => info!("Circuit breaker reset"),
            TelemetryEvent::RateLimitDelay { delay } => debug!(
                delay_ms = delay.as_millis() as u64,
                "Applying rate limit delay"
            ),
            TelemetryEvent::CacheHit { key } => debug!(key = %key, "Cache hit"),
            TelemetryEvent::CacheMiss { key } => debug!(key = %key, "Cache miss"),
            TelemetryEvent::CacheEvicted { key } => debug!(key = %key, "Cache entry evicted"),
            TelemetryEvent::CacheExpired { key } => debug!(key = %key, "Cache entry expired"),
        }
    }
}

// == Recording Sink ==
/// In-memory sink, mostly for asserting on event sequences in tests.
#[derive(Debug, Default)]
pub struct RecordingTelemetry {
    events: Mutex<Vec<TelemetryEvent>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of recorded events matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&TelemetryEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| predicate(e))
            .count()
    }
}

impl Telemetry for RecordingTelemetry {
    fn record(&self, event: &TelemetryEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
    }
}
