//! Scheduler type definitions.
//!
//! This module contains the error type and the state/kind enums shared
//! by the task handles, the registry, and the engine.

use crate::core::occurrence::OccurrenceError;
use crate::core::recurrence::SpecError;
use crate::core::types::TaskId;
use thiserror::Error;

/// Errors that can occur in the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The recurrence pattern failed validation.
    #[error("invalid recurrence pattern: {0}")]
    InvalidSpec(#[from] SpecError),

    /// Interval tasks need a positive delay.
    #[error("interval must be positive, got {0}ms")]
    InvalidInterval(i64),

    /// A task with this id is already registered.
    #[error("task already scheduled: {0}")]
    DuplicateId(TaskId),

    /// No task with this id is registered.
    #[error("task not found: {0}")]
    NotFound(TaskId),

    /// Computing an occurrence failed.
    #[error("occurrence computation failed: {0}")]
    Occurrence(#[from] OccurrenceError),
}

/// Lifecycle state of a scheduled task.
///
/// Transitions are `Scheduled -> Firing -> Scheduled` for a normal
/// firing cycle, and any state `-> Stopped` on cancellation. `Stopped`
/// is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Armed and waiting for its next occurrence.
    Scheduled,
    /// The trigger for the current occurrence is being dispatched.
    Firing,
    /// Cancelled or failed to re-arm. Terminal.
    Stopped,
}

/// How a task's occurrences are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Calendar pattern over minute, hour, day, and month fields.
    Appointment,
    /// Fixed delay between consecutive firings.
    Interval,
}
