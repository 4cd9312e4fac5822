//! Enqueue-with-dedup bridge between the scheduler and the queue.

use std::sync::Arc;

use super::{Queue, WorkItem};
use crate::core::task::Task;
use crate::core::types::TaskId;
use crate::scheduler;
use crate::state::{TaskState, TaskStatus};
use crate::storage::{StateStore, StorageError, TaskRepository};

/// Bridges scheduler decisions to the queue, using the task state as the
/// dedup guard: at most one outstanding [`WorkItem`] per task.
///
/// The check-then-act sequence (read state, enqueue, write state) is not
/// atomic against concurrent dispatchers; the design assumes a single active
/// driver. Multi-driver deployments need an external lock around the whole
/// read-decide-write cycle.
pub struct Dispatcher {
    tasks: Arc<dyn TaskRepository>,
    state_store: Arc<dyn StateStore>,
    queue: Arc<dyn Queue>,
}

impl Dispatcher {
    /// Create a new dispatcher over the given collaborators.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        state_store: Arc<dyn StateStore>,
        queue: Arc<dyn Queue>,
    ) -> Self {
        Self {
            tasks,
            state_store,
            queue,
        }
    }

    /// Queue `task` for execution.
    ///
    /// An already-queued task is not queued again; that is a silent no-op
    /// returning `false`, not an error. The Idle→Queued transition happens
    /// only after the queue accepts the item.
    pub async fn try_enqueue(&self, task: &Task) -> Result<bool, StorageError> {
        let state = TaskState::import(&*self.state_store, task.id()).await?;
        self.enqueue_with_state(task, state).await
    }

    /// Check every known task against the scheduler and enqueue the due ones.
    ///
    /// Returns the identifiers of the tasks that were enqueued. This is the
    /// entry point the periodic driver calls once per tick.
    pub async fn dispatch_due(&self, now: i64) -> Result<Vec<TaskId>, StorageError> {
        let mut enqueued = Vec::new();
        for task in self.tasks.load_all().await? {
            let state = TaskState::import(&*self.state_store, task.id()).await?;
            if !scheduler::is_due(&task, &state, now) {
                continue;
            }
            if self.enqueue_with_state(&task, state).await? {
                tracing::debug!(task_id = %task.id(), "task enqueued");
                enqueued.push(task.id().clone());
            }
        }
        Ok(enqueued)
    }

    async fn enqueue_with_state(
        &self,
        task: &Task,
        mut state: TaskState,
    ) -> Result<bool, StorageError> {
        if state.is_queued() {
            return Ok(false);
        }
        let item = WorkItem::new(task.id().clone(), task.params().clone());
        if !self.queue.enqueue(item).await {
            tracing::warn!(task_id = %task.id(), "queue rejected work item");
            return Ok(false);
        }
        state.set_status(&*self.state_store, TaskStatus::Queued).await?;
        Ok(true)
    }
}
