//! Per-task state, arming, and cancellation.
//!
//! A `TaskHandle` owns the mutable state of one scheduled task: its
//! lifecycle state, the instant it will next fire, and the remaining
//! minute-window for hour-constrained patterns. The engine loop and the
//! public stop path both mutate it through the same lock, so a stop
//! observed before `begin_fire` wins and the firing never happens.

use crate::core::recurrence::RecurrenceSpec;
use crate::core::types::TaskId;
use crate::scheduler::types::{TaskKind, TaskState};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::sync::{Mutex, watch};

/// The occurrence source of a task.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Cadence {
    /// Calendar pattern evaluated after every firing.
    Pattern(RecurrenceSpec),
    /// Fixed delay added after every firing.
    Every(Duration),
}

#[derive(Debug)]
struct TaskInner {
    state: TaskState,
    next_at: DateTime<Utc>,
    window: Duration,
}

/// Handle to one scheduled task.
///
/// Cloneable via `Arc` in the registry; the engine's run loop holds one
/// clone, callers observing the task hold others.
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    cadence: Cadence,
    inner: Mutex<TaskInner>,
    stop_tx: watch::Sender<bool>,
}

impl TaskHandle {
    pub(crate) fn new(
        id: TaskId,
        cadence: Cadence,
        next_at: DateTime<Utc>,
        window: Duration,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            id,
            cadence,
            inner: Mutex::new(TaskInner {
                state: TaskState::Scheduled,
                next_at,
                window,
            }),
            stop_tx,
        }
    }

    /// The task's identifier.
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Whether this task follows a calendar pattern or a fixed interval.
    pub fn kind(&self) -> TaskKind {
        match self.cadence {
            Cadence::Pattern(_) => TaskKind::Appointment,
            Cadence::Every(_) => TaskKind::Interval,
        }
    }

    pub(crate) fn cadence(&self) -> Cadence {
        self.cadence
    }

    /// A receiver that resolves once the task is stopped.
    pub(crate) fn stop_signal(&self) -> watch::Receiver<bool> {
        self.stop_tx.subscribe()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> TaskState {
        self.inner.lock().await.state
    }

    /// The instant the task will next fire.
    pub async fn next_at(&self) -> DateTime<Utc> {
        self.inner.lock().await.next_at
    }

    pub(crate) async fn window_remaining(&self) -> Duration {
        self.inner.lock().await.window
    }

    /// Transition `Scheduled -> Firing`.
    ///
    /// Returns false when the task was stopped (or is already firing),
    /// in which case the caller must not dispatch the trigger.
    pub(crate) async fn begin_fire(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state != TaskState::Scheduled {
            return false;
        }
        inner.state = TaskState::Firing;
        true
    }

    /// Transition `Firing -> Scheduled` with the next occurrence.
    ///
    /// Returns false when the task was stopped while firing; the
    /// occurrence is discarded and the run loop must exit.
    pub(crate) async fn rearm(&self, next_at: DateTime<Utc>, window: Duration) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.state == TaskState::Stopped {
            return false;
        }
        inner.state = TaskState::Scheduled;
        inner.next_at = next_at;
        inner.window = window;
        true
    }

    /// Transition to `Stopped` and wake the run loop.
    ///
    /// Idempotent. An in-flight firing is not interrupted, but the task
    /// will never be re-armed afterwards.
    pub(crate) async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = TaskState::Stopped;
        drop(inner);
        let _ = self.stop_tx.send(true);
    }
}
