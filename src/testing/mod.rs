//! Testing utilities for users of the Cadence library.
//!
//! This module provides helpers for testing scheduled tasks:
//!
//! - [`ManualClock`]: A clock that only moves when told to
//! - [`CountingTrigger`]: A trigger that records how often it fired
//! - [`FailingTrigger`]: A trigger that fails N times then succeeds
//! - [`PanickingTrigger`]: A trigger that panics on every firing
//! - [`CollectingErrorHandler`]: An error handler that captures failures

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::clock::Clock;
use crate::core::trigger::{ErrorHandler, TaskError, Trigger};

/// A clock that advances only under test control.
///
/// Combine with `#[tokio::test(start_paused = true)]` so the tokio
/// timer and the scheduler's notion of "now" both stay deterministic.
///
/// # Example
///
/// ```
/// use cadence::testing::ManualClock;
/// use cadence::Clock;
/// use chrono::{Duration, TimeZone, Timelike, Utc};
///
/// let clock = ManualClock::starting_at(Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap());
/// clock.advance(Duration::minutes(5));
///
/// assert_eq!(clock.now().minute(), 5);
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Create a clock frozen at the given instant.
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("lock poisoned");
        *now += by;
    }

    /// Jump the clock to an absolute instant.
    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().expect("lock poisoned") = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().expect("lock poisoned")
    }
}

/// A trigger that counts its firings and always succeeds.
///
/// # Example
///
/// ```
/// use cadence::testing::CountingTrigger;
///
/// let trigger = CountingTrigger::new();
/// assert_eq!(trigger.count(), 0);
/// ```
#[derive(Debug, Default)]
pub struct CountingTrigger {
    count: AtomicUsize,
}

impl CountingTrigger {
    /// Create a trigger with a zeroed counter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed firings.
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Trigger for CountingTrigger {
    async fn fire(&self) -> Result<(), TaskError> {
        self.count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A trigger that fails a configurable number of times before succeeding.
///
/// Useful for testing error routing. Failure counting is protected by a
/// mutex so behavior stays deterministic under concurrent firings.
///
/// # Example
///
/// ```
/// use cadence::testing::FailingTrigger;
///
/// // Fails 2 times, then succeeds on the 3rd firing
/// let trigger = FailingTrigger::new(2);
/// ```
pub struct FailingTrigger {
    state: Mutex<FailingState>,
    total_failures: u32,
    error_message: String,
}

struct FailingState {
    failures_remaining: u32,
    call_count: u32,
}

impl FailingTrigger {
    /// Create a trigger that fails `fail_count` times then succeeds.
    pub fn new(fail_count: u32) -> Self {
        Self::with_message(fail_count, "intentional test failure")
    }

    /// Create a trigger that fails with a custom error message.
    pub fn with_message(fail_count: u32, message: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(FailingState {
                failures_remaining: fail_count,
                call_count: 0,
            }),
            total_failures: fail_count,
            error_message: message.into(),
        }
    }

    /// Number of failures remaining before success.
    pub fn failures_remaining(&self) -> u32 {
        self.state.lock().expect("lock poisoned").failures_remaining
    }

    /// Number of times this trigger has fired.
    pub fn call_count(&self) -> u32 {
        self.state.lock().expect("lock poisoned").call_count
    }

    /// Reset the failure counter for reuse.
    pub fn reset(&self) {
        let mut state = self.state.lock().expect("lock poisoned");
        state.failures_remaining = self.total_failures;
        state.call_count = 0;
    }
}

#[async_trait]
impl Trigger for FailingTrigger {
    async fn fire(&self) -> Result<(), TaskError> {
        let mut state = self.state.lock().expect("lock poisoned");
        state.call_count += 1;

        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            Err(TaskError::Trigger(self.error_message.clone()))
        } else {
            Ok(())
        }
    }
}

/// A trigger that panics on every firing.
///
/// Scheduler tests use this to verify that a panic is contained and
/// surfaced as [`TaskError::Panicked`] instead of tearing the loop down.
#[derive(Debug, Default)]
pub struct PanickingTrigger;

impl PanickingTrigger {
    /// Create a panicking trigger.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Trigger for PanickingTrigger {
    async fn fire(&self) -> Result<(), TaskError> {
        panic!("intentional test panic");
    }
}

/// An error handler that records every failure it receives.
///
/// # Example
///
/// ```
/// use cadence::testing::CollectingErrorHandler;
///
/// let handler = CollectingErrorHandler::new();
/// assert!(handler.errors().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct CollectingErrorHandler {
    errors: Mutex<Vec<String>>,
}

impl CollectingErrorHandler {
    /// Create a handler with an empty error log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rendered messages of every error received, in arrival order.
    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().expect("lock poisoned").clone()
    }

    /// Number of errors received.
    pub fn count(&self) -> usize {
        self.errors.lock().expect("lock poisoned").len()
    }
}

#[async_trait]
impl ErrorHandler for CollectingErrorHandler {
    async fn on_error(&self, error: &TaskError) {
        self.errors
            .lock()
            .expect("lock poisoned")
            .push(error.to_string());
    }
}
