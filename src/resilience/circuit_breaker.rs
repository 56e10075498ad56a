//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: a single probe tests whether the upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold
//! Open → Half-Open: after break duration
//! Half-Open → Closed: probe request succeeds
//! Half-Open → Open: probe request fails
//! ```
//!
//! Every transition happens inside one critical section. Each admitted call
//! holds a [`Permit`] stamped with the breaker generation it was admitted
//! under; outcomes reported against an older generation are ignored, so calls
//! that were in flight across a transition cannot trip or reset it twice.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// Admission ticket for one raw attempt. Hand it back through exactly one of
/// `on_success`, `on_failure` or `release`.
#[derive(Debug)]
#[must_use]
pub struct Permit {
    generation: u64,
    probe: bool,
}

impl Permit {
    /// True if this attempt is the half-open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }
}

/// Point-in-time view of the breaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub generation: u64,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    generation: u64,
}

impl BreakerInner {
    fn trip(&mut self, now: Instant) {
        self.state = CircuitState::Open;
        self.opened_at = Some(now);
        self.probe_in_flight = false;
        self.generation += 1;
    }
}

/// Consecutive-failure circuit breaker, one per protected resource.
pub struct CircuitBreaker {
    failure_threshold: u32,
    break_duration: Duration,
    clock: Arc<dyn Clock>,
    telemetry: Arc<dyn Telemetry>,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(
        failure_threshold: u32,
        break_duration: Duration,
        clock: Arc<dyn Clock>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Result<Self> {
        if failure_threshold == 0 {
            return Err(Error::InvalidConfig(
                "failure threshold must be positive".to_string(),
            ));
        }
        if break_duration.is_zero() {
            return Err(Error::InvalidConfig(
                "break duration must be positive".to_string(),
            ));
        }

        Ok(Self {
            failure_threshold,
            break_duration,
            clock,
            telemetry,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                probe_in_flight: false,
                generation: 0,
            }),
        })
    }

    /// Admits one attempt, or fails fast with [`Error::CircuitOpen`].
    ///
    /// An open breaker whose break duration has elapsed moves to half-open
    /// here and admits the caller as the probe.
    pub fn try_acquire(&self) -> Result<Permit> {
        let now = self.clock.now();
        let mut inner = self.lock();

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(Permit {
                generation: inner.generation,
                probe: false,
            }),
            CircuitState::Open => {
                let elapsed = self.elapsed_open(&inner, now);
                if elapsed < self.break_duration {
                    return Err(Error::CircuitOpen {
                        retry_after: self.break_duration - elapsed,
                    });
                }

                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                inner.generation += 1;
                let permit = Permit {
                    generation: inner.generation,
                    probe: true,
                };
                drop(inner);

                self.telemetry.record(&TelemetryEvent::CircuitHalfOpen);
                Ok(permit)
            }
            CircuitState::HalfOpen if inner.probe_in_flight => Err(Error::CircuitOpen {
                retry_after: Duration::ZERO,
            }),
            CircuitState::HalfOpen => {
                inner.probe_in_flight = true;
                Ok(Permit {
                    generation: inner.generation,
                    probe: true,
                })
            }
        }
    }

    /// Fails fast if a call made now would be short-circuited. Does not
    /// transition or reserve the probe.
    pub fn check(&self) -> Result<()> {
        let now = self.clock.now();
        let inner = self.lock();

        let state = inner.state;
        match state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = self.elapsed_open(&inner, now);
                if elapsed < self.break_duration {
                    Err(Error::CircuitOpen {
                        retry_after: self.break_duration - elapsed,
                    })
                } else {
                    Ok(())
                }
            }
            CircuitState::HalfOpen if inner.probe_in_flight => Err(Error::CircuitOpen {
                retry_after: Duration::ZERO,
            }),
            CircuitState::HalfOpen => Ok(()),
        }
    }

    /// Records a successful attempt.
    pub fn on_success(&self, permit: Permit) {
        let mut inner = self.lock();
        if permit.generation != inner.generation {
            return;
        }

        let state = inner.state;
        match state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                inner.generation += 1;
                drop(inner);

                self.telemetry.record(&TelemetryEvent::CircuitReset);
            }
            CircuitState::Open => {}
        }
    }

    /// Records a failed attempt.
    pub fn on_failure(&self, permit: Permit) {
        let now = self.clock.now();
        let mut inner = self.lock();
        if permit.generation != inner.generation {
            return;
        }

        let state = inner.state;
        let tripped = match state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    inner.trip(now);
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                inner.trip(now);
                true
            }
            CircuitState::Open => false,
        };
        drop(inner);

        if tripped {
            self.telemetry.record(&TelemetryEvent::CircuitOpened {
                duration: self.break_duration,
            });
        }
    }

    /// Returns a permit whose attempt was abandoned, recording nothing.
    ///
    /// A released probe frees the half-open slot for the next caller.
    pub fn release(&self, permit: Permit) {
        let mut inner = self.lock();
        if permit.generation == inner.generation
            && permit.probe
            && inner.state == CircuitState::HalfOpen
        {
            inner.probe_in_flight = false;
        }
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            generation: inner.generation,
        }
    }

    fn elapsed_open(&self, inner: &BreakerInner, now: Instant) -> Duration {
        inner
            .opened_at
            .map(|opened_at| now.saturating_duration_since(opened_at))
            .unwrap_or(self.break_duration)
    }

    fn lock(&self) -> MutexGuard<'_, BreakerInner> {
        // State is always left consistent, so a poisoned guard is still usable
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("failure_threshold", &self.failure_threshold)
            .field("break_duration", &self.break_duration)
            .field("inner", &*self.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::telemetry::RecordingTelemetry;

    fn breaker(threshold: u32) -> (CircuitBreaker, Arc<ManualClock>, Arc<RecordingTelemetry>) {
        let clock = Arc::new(ManualClock::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        let breaker = CircuitBreaker::new(
            threshold,
            Duration::from_secs(30),
            clock.clone(),
            telemetry.clone(),
        )
        .unwrap();
        (breaker, clock, telemetry)
    }

    fn fail(breaker: &CircuitBreaker) {
        let permit = breaker.try_acquire().unwrap();
        breaker.on_failure(permit);
    }

    #[test]
    fn test_rejects_bad_config() {
        let clock = Arc::new(ManualClock::new());
        let telemetry = Arc::new(RecordingTelemetry::new());
        assert!(matches!(
            CircuitBreaker::new(0, Duration::from_secs(1), clock.clone(), telemetry.clone()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            CircuitBreaker::new(3, Duration::ZERO, clock, telemetry),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_opens_at_threshold() {
        let (breaker, _, telemetry) = breaker(3);

        fail(&breaker);
        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 2);

        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(
            telemetry.events(),
            vec![TelemetryEvent::CircuitOpened {
                duration: Duration::from_secs(30)
            }]
        );
    }

    #[test]
    fn test_success_resets_counter() {
        let (breaker, _, _) = breaker(3);

        fail(&breaker);
        fail(&breaker);
        let permit = breaker.try_acquire().unwrap();
        breaker.on_success(permit);

        assert_eq!(breaker.consecutive_failures(), 0);
        fail(&breaker);
        fail(&breaker);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_open_short_circuits_until_break_elapses() {
        let (breaker, clock, _) = breaker(1);
        fail(&breaker);

        clock.advance(Duration::from_secs(10));
        match breaker.try_acquire() {
            Err(Error::CircuitOpen { retry_after }) => {
                assert_eq!(retry_after, Duration::from_secs(20))
            }
            other => panic!("expected CircuitOpen, got {:?}", other),
        }
        assert!(breaker.check().is_err());

        clock.advance(Duration::from_secs(20));
        assert!(breaker.check().is_ok());
        let permit = breaker.try_acquire().unwrap();
        assert!(permit.is_probe());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.release(permit);
    }

    #[test]
    fn test_probe_success_closes() {
        let (breaker, clock, telemetry) = breaker(2);
        fail(&breaker);
        fail(&breaker);
        clock.advance(Duration::from_secs(30));

        let probe = breaker.try_acquire().unwrap();
        breaker.on_success(probe);

        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert_eq!(
            telemetry.events(),
            vec![
                TelemetryEvent::CircuitOpened {
                    duration: Duration::from_secs(30)
                },
                TelemetryEvent::CircuitHalfOpen,
                TelemetryEvent::CircuitReset,
            ]
        );
    }

    #[test]
    fn test_probe_failure_reopens_with_fresh_timestamp() {
        let (breaker, clock, _) = breaker(1);
        fail(&breaker);
        clock.advance(Duration::from_secs(31));

        let probe = breaker.try_acquire().unwrap();
        breaker.on_failure(probe);
        assert_eq!(breaker.state(), CircuitState::Open);

        // Break duration counts from the probe failure, not the first trip
        clock.advance(Duration::from_secs(29));
        assert!(matches!(
            breaker.try_acquire(),
            Err(Error::CircuitOpen { .. })
        ));
        clock.advance(Duration::from_secs(1));
        assert!(breaker.try_acquire().is_ok());
    }

    #[test]
    fn test_single_probe_in_half_open() {
        let (breaker, clock, _) = breaker(1);
        fail(&breaker);
        clock.advance(Duration::from_secs(30));

        let probe = breaker.try_acquire().unwrap();
        assert!(matches!(
            breaker.try_acquire(),
            Err(Error::CircuitOpen { .. })
        ));

        // Abandoned probe frees the slot without changing state
        breaker.release(probe);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        let probe = breaker.try_acquire().unwrap();
        breaker.on_success(probe);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_stale_outcomes_are_ignored() {
        let (breaker, clock, telemetry) = breaker(2);

        let a = breaker.try_acquire().unwrap();
        let b = breaker.try_acquire().unwrap();
        let c = breaker.try_acquire().unwrap();
        breaker.on_failure(a);
        breaker.on_failure(b);
        assert_eq!(breaker.state(), CircuitState::Open);

        // Late failure from before the trip does not re-open or re-stamp
        breaker.on_failure(c);
        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::CircuitOpened { .. })),
            1
        );

        clock.advance(Duration::from_secs(30));
        let probe = breaker.try_acquire().unwrap();
        let stale = Permit {
            generation: 0,
            probe: false,
        };
        breaker.on_success(stale);
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.on_success(probe);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[test]
    fn test_concurrent_failures_trip_once() {
        let (breaker, _, telemetry) = breaker(5);
        let breaker = Arc::new(breaker);

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let breaker = Arc::clone(&breaker);
                std::thread::spawn(move || {
                    if let Ok(permit) = breaker.try_acquire() {
                        breaker.on_failure(permit);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(breaker.state(), CircuitState::Open);
        assert_eq!(
            telemetry.count(|e| matches!(e, TelemetryEvent::CircuitOpened { .. })),
            1
        );
    }

    #[test]
    fn test_snapshot() {
        let (breaker, _, _) = breaker(3);
        fail(&breaker);

        let snapshot = breaker.snapshot();
        assert_eq!(snapshot.state, CircuitState::Closed);
        assert_eq!(snapshot.consecutive_failures, 1);
        assert_eq!(snapshot.generation, 0);
    }
}
