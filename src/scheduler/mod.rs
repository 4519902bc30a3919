//! Task scheduling, registration, and cancellation.
//!
//! This module provides the engine that arms tasks on the tokio timer,
//! the registry mapping task ids to live handles, and the per-task
//! state machine.

mod engine;
mod registry;
mod task;
mod types;

pub use engine::Scheduler;
pub use registry::TaskRegistry;
pub use task::TaskHandle;
pub use types::{SchedulerError, TaskKind, TaskState};
