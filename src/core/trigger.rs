//! Trigger and error-handler callback traits.
//!
//! A `Trigger` is the unit of work fired at each occurrence of a
//! scheduled task. An `ErrorHandler` receives failures from a firing;
//! it never affects whether the task is re-armed.

use async_trait::async_trait;
use thiserror::Error;

/// Errors surfaced by a single firing of a task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The trigger callback returned an error.
    #[error("trigger failed: {0}")]
    Trigger(String),

    /// The trigger callback panicked.
    #[error("trigger panicked: {0}")]
    Panicked(String),

    /// Computing the next occurrence failed; the task has been stopped.
    #[error("scheduling failed: {0}")]
    Scheduling(String),
}

impl TaskError {
    /// Check whether this error terminated the task's schedule.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::Scheduling(_))
    }
}

/// The callback fired at each occurrence of a task.
///
/// # Example
///
/// ```ignore
/// use cadence::{Trigger, TaskError};
/// use async_trait::async_trait;
///
/// struct Heartbeat;
///
/// #[async_trait]
/// impl Trigger for Heartbeat {
///     async fn fire(&self) -> Result<(), TaskError> {
///         println!("beat");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Trigger: Send + Sync {
    /// Invoked once per firing.
    ///
    /// # Returns
    /// * `Ok(())` - Firing completed successfully
    /// * `Err(TaskError)` - Routed to the task's error handler; the task
    ///   is still re-armed for its next occurrence
    async fn fire(&self) -> Result<(), TaskError>;
}

/// Receives the error payload of a failed firing, at most once per firing.
#[async_trait]
pub trait ErrorHandler: Send + Sync {
    /// Invoked with the failure surfaced by a firing.
    async fn on_error(&self, error: &TaskError);
}
