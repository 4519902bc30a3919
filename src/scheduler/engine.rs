//! Scheduler engine implementation.
//!
//! The scheduler is responsible for:
//! - Arming tasks at their next occurrence
//! - Firing triggers without blocking the timer loop
//! - Routing trigger failures to error handlers
//! - Per-task cancellation and full shutdown
//!
//! Each scheduled task runs its own loop: sleep until the armed
//! instant, dispatch the trigger fire-and-forget, then re-arm from the
//! task's cadence. Cancellation is a watch channel that wakes the loop
//! out of its sleep.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, LocalResult, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

use crate::core::clock::{Clock, SystemClock};
use crate::core::occurrence::{OccurrenceError, next_occurrence};
use crate::core::recurrence::RecurrenceSpec;
use crate::core::trigger::{ErrorHandler, TaskError, Trigger};
use crate::core::types::TaskId;
use crate::scheduler::registry::TaskRegistry;
use crate::scheduler::task::{Cadence, TaskHandle};
use crate::scheduler::types::SchedulerError;

/// Recurring-task scheduler.
///
/// Tasks are armed against the configured timezone and fired on the
/// tokio timer. Every public operation addresses tasks by the `TaskId`
/// returned from `schedule` or `schedule_interval`.
///
/// # Example
///
/// ```ignore
/// use cadence::{RecurrenceSpec, Scheduler};
///
/// let scheduler = Scheduler::new();
/// let spec = RecurrenceSpec::new().with_minute(0);
/// let id = scheduler.schedule(spec, trigger, None).await?;
/// // ...
/// scheduler.stop(id).await?;
/// ```
pub struct Scheduler {
    registry: Arc<TaskRegistry>,
    clock: Arc<dyn Clock>,
    timezone: Tz,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// Create a scheduler with its own registry, the system clock, and UTC.
    pub fn new() -> Self {
        Self {
            registry: Arc::new(TaskRegistry::new()),
            clock: Arc::new(SystemClock),
            timezone: chrono_tz::UTC,
        }
    }

    /// Share an existing registry instead of creating one.
    pub fn with_registry(mut self, registry: Arc<TaskRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the time source. Tests inject a manual clock here.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Evaluate calendar patterns in this timezone instead of UTC.
    pub fn with_timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    /// The registry holding all live tasks.
    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Schedule a task on a calendar pattern.
    ///
    /// The pattern is validated whole before anything is registered.
    /// Firing failures go to `handler` and never unschedule the task.
    pub async fn schedule(
        &self,
        spec: RecurrenceSpec,
        trigger: Arc<dyn Trigger>,
        handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Result<TaskId, SchedulerError> {
        let anchor = self.local_anchor();
        spec.validate(anchor)?;

        let occurrence = next_occurrence(anchor, &spec)?;
        let next_at = resolve_local(occurrence.at, self.timezone)
            .ok_or(SchedulerError::Occurrence(OccurrenceError::OutOfRange))?;

        let id = TaskId::new();
        let handle = Arc::new(TaskHandle::new(
            id,
            Cadence::Pattern(spec),
            next_at,
            occurrence.window,
        ));
        self.registry.insert(Arc::clone(&handle)).await?;
        tracing::debug!(task_id = %id, next_at = %next_at, "task scheduled");

        self.spawn_run_loop(handle, trigger, handler);
        Ok(id)
    }

    /// Schedule a task that first fires after `delay`, then every `every`.
    ///
    /// When firings fall behind, missed occurrences collapse into a
    /// single re-arm one interval ahead of the current time.
    pub async fn schedule_interval(
        &self,
        delay: Duration,
        every: Duration,
        trigger: Arc<dyn Trigger>,
        handler: Option<Arc<dyn ErrorHandler>>,
    ) -> Result<TaskId, SchedulerError> {
        if every.is_zero() {
            return Err(SchedulerError::InvalidInterval(every.as_millis() as i64));
        }

        let id = TaskId::new();
        let next_at = self.clock.now() + delay;
        let handle = Arc::new(TaskHandle::new(
            id,
            Cadence::Every(every),
            next_at,
            Duration::ZERO,
        ));
        self.registry.insert(Arc::clone(&handle)).await?;
        tracing::debug!(task_id = %id, next_at = %next_at, "interval task scheduled");

        self.spawn_run_loop(handle, trigger, handler);
        Ok(id)
    }

    /// Cancel a task.
    ///
    /// The task is removed from the registry immediately. An in-flight
    /// firing is allowed to finish, but no further firing starts.
    pub async fn stop(&self, id: TaskId) -> Result<(), SchedulerError> {
        self.registry.stop(id).await?;
        tracing::debug!(task_id = %id, "task stopped");
        Ok(())
    }

    /// The task's remaining every-minute window.
    ///
    /// Zero outside the bounded-window sub-mode, and always zero for
    /// interval tasks.
    pub async fn lifetime_of(&self, id: TaskId) -> Result<Duration, SchedulerError> {
        let handle = self
            .registry
            .get(id)
            .await
            .ok_or(SchedulerError::NotFound(id))?;
        Ok(handle.window_remaining().await)
    }

    /// Stop every task and empty the registry.
    pub async fn shutdown(&self) {
        for id in self.registry.task_ids().await {
            let _ = self.registry.stop(id).await;
        }
        tracing::debug!("scheduler shut down");
    }

    fn local_anchor(&self) -> NaiveDateTime {
        self.clock.now().with_timezone(&self.timezone).naive_local()
    }

    fn spawn_run_loop(
        &self,
        handle: Arc<TaskHandle>,
        trigger: Arc<dyn Trigger>,
        handler: Option<Arc<dyn ErrorHandler>>,
    ) {
        let registry = Arc::clone(&self.registry);
        let clock = Arc::clone(&self.clock);
        let timezone = self.timezone;
        let mut stop_rx = handle.stop_signal();

        tokio::spawn(async move {
            loop {
                // A stop sent before this loop first polled would be
                // invisible to changed(), so check the flag directly.
                if *stop_rx.borrow() {
                    break;
                }

                let next_at = handle.next_at().await;
                let delay = (next_at - clock.now()).to_std().unwrap_or(Duration::ZERO);

                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = tokio::time::sleep(delay) => {}
                }

                if !handle.begin_fire().await {
                    break;
                }

                dispatch(handle.id(), Arc::clone(&trigger), handler.clone());

                let rearmed = match handle.cadence() {
                    Cadence::Every(every) => {
                        let now = clock.now();
                        let mut next = next_at + every;
                        if next <= now {
                            next = now + every;
                        }
                        handle.rearm(next, Duration::ZERO).await
                    }
                    Cadence::Pattern(spec) => {
                        let window = handle.window_remaining().await;
                        if window > Duration::ZERO {
                            handle
                                .rearm(
                                    next_at + TimeDelta::minutes(1),
                                    window.saturating_sub(Duration::from_secs(60)),
                                )
                                .await
                        } else {
                            let anchor = clock.now().with_timezone(&timezone).naive_local();
                            match next_occurrence(anchor, &spec) {
                                Ok(occurrence) => {
                                    match resolve_local(occurrence.at, timezone) {
                                        Some(next) => {
                                            handle.rearm(next, occurrence.window).await
                                        }
                                        None => {
                                            fail_schedule(
                                                &registry,
                                                &handle,
                                                &handler,
                                                "local instant unrepresentable",
                                            )
                                            .await;
                                            break;
                                        }
                                    }
                                }
                                Err(e) => {
                                    fail_schedule(&registry, &handle, &handler, &e.to_string())
                                        .await;
                                    break;
                                }
                            }
                        }
                    }
                };

                if !rearmed {
                    break;
                }
            }
        });
    }
}

/// Fire the trigger without blocking the run loop.
///
/// The inner spawn isolates panics: a panicking trigger surfaces as
/// `TaskError::Panicked` on its error handler and the task keeps its
/// schedule.
fn dispatch(id: TaskId, trigger: Arc<dyn Trigger>, handler: Option<Arc<dyn ErrorHandler>>) {
    tokio::spawn(async move {
        let firing = tokio::spawn(async move { trigger.fire().await });
        let failure = match firing.await {
            Ok(Ok(())) => None,
            Ok(Err(error)) => Some(error),
            Err(join) => Some(TaskError::Panicked(join.to_string())),
        };

        if let Some(error) = failure {
            tracing::warn!(task_id = %id, error = %error, "trigger firing failed");
            if let Some(handler) = handler {
                handler.on_error(&error).await;
            }
        }
    });
}

/// Stop and deregister a task whose next occurrence cannot be computed.
async fn fail_schedule(
    registry: &TaskRegistry,
    handle: &TaskHandle,
    handler: &Option<Arc<dyn ErrorHandler>>,
    reason: &str,
) {
    tracing::warn!(task_id = %handle.id(), reason, "re-arming failed, stopping task");
    handle.stop().await;
    registry.remove(handle.id()).await;
    if let Some(handler) = handler {
        handler
            .on_error(&TaskError::Scheduling(reason.to_string()))
            .await;
    }
}

/// Resolve a timezone-local instant to UTC.
///
/// An ambiguous instant (clocks rolled back) takes the earlier mapping.
/// A nonexistent instant (clocks rolled forward) shifts one hour later.
fn resolve_local(local: NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.with_timezone(&Utc)),
        LocalResult::None => tz
            .from_local_datetime(&(local + TimeDelta::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc)),
    }
}
