//! Registry of live task handles.
//!
//! The registry is the single map from `TaskId` to handle. A task is
//! present exactly while it is schedulable; `stop` removes it, so a
//! lookup after cancellation reports not-found.

use crate::core::types::TaskId;
use crate::scheduler::task::TaskHandle;
use crate::scheduler::types::{SchedulerError, TaskKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared map of all currently scheduled tasks.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<HashMap<TaskId, Arc<TaskHandle>>>,
}

impl TaskRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, handle: Arc<TaskHandle>) -> Result<(), SchedulerError> {
        let mut tasks = self.tasks.write().await;
        let id = handle.id();
        if tasks.contains_key(&id) {
            return Err(SchedulerError::DuplicateId(id));
        }
        tasks.insert(id, handle);
        Ok(())
    }

    /// Look up a task by id.
    pub async fn get(&self, id: TaskId) -> Option<Arc<TaskHandle>> {
        self.tasks.read().await.get(&id).cloned()
    }

    pub(crate) async fn remove(&self, id: TaskId) -> Option<Arc<TaskHandle>> {
        self.tasks.write().await.remove(&id)
    }

    /// Remove the task and drive it to its stopped state.
    ///
    /// Removal makes the id unresolvable immediately; the handle's state
    /// lock then rejects any re-arm racing with the stop transition.
    pub async fn stop(&self, id: TaskId) -> Result<(), SchedulerError> {
        let handle = self
            .remove(id)
            .await
            .ok_or(SchedulerError::NotFound(id))?;
        handle.stop().await;
        Ok(())
    }

    /// Ids of every registered task.
    pub async fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.read().await.keys().copied().collect()
    }

    /// Ids of the registered tasks of one kind, for reporting.
    pub async fn ids_of_kind(&self, kind: TaskKind) -> Vec<TaskId> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|handle| handle.kind() == kind)
            .map(|handle| handle.id())
            .collect()
    }

    /// Number of registered tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Whether the registry holds no tasks.
    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }
}
