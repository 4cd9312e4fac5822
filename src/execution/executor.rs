//! The execution pipeline.
//!
//! [`Executor::execute`] turns a dequeued [`WorkItem`] into a recorded
//! outcome: it resolves the task and its worker, walks the state machine
//! through Queued→Running→Idle, translates however the worker ended into an
//! [`Outcome`], and publishes exactly one completion event. Worker failures
//! are fully absorbed here — nothing a worker does propagates to the queue
//! driver as an error, so the queue never retries a work item; retry comes
//! solely from the scheduler's next due-check.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

use super::worker::{RegistryError, WorkerError, WorkerRegistry};
use crate::core::result::{Outcome, TaskResult};
use crate::core::types::TaskId;
use crate::events::{CompletionEvent, EventBus};
use crate::queue::WorkItem;
use crate::state::{TaskState, TaskStatus};
use crate::storage::{StateStore, StorageError, TaskRepository};

/// Errors that prevent an execution attempt from starting.
///
/// These are resolution failures surfaced to the queue driver, distinct from
/// worker failures (which are absorbed into the returned [`TaskResult`]).
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The task was deleted between enqueue and dequeue. The item is dropped.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// No worker is registered for the task's worker identifier.
    #[error(transparent)]
    WorkerNotFound(#[from] RegistryError),

    /// The state store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Drives worker execution for dequeued work items.
pub struct Executor {
    tasks: Arc<dyn TaskRepository>,
    workers: Arc<WorkerRegistry>,
    state_store: Arc<dyn StateStore>,
    events: Arc<EventBus>,
}

impl Executor {
    /// Create a new executor over the given collaborators.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        workers: Arc<WorkerRegistry>,
        state_store: Arc<dyn StateStore>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            tasks,
            workers,
            state_store,
            events,
        }
    }

    /// Execute a dequeued work item.
    ///
    /// On success returns the result surfaced to subscribers, whether or not
    /// the worker reported errors. An `Err` means the attempt could not
    /// start at all (task or worker unresolvable, state store down); the
    /// driver should log it and drop the item.
    pub async fn execute(&self, item: &WorkItem) -> Result<TaskResult, ExecuteError> {
        let task = self
            .tasks
            .load(&item.task_id)
            .await?
            .ok_or_else(|| ExecuteError::TaskNotFound(item.task_id.clone()))
            .map_err(|err| {
                tracing::error!(
                    task_id = %item.task_id,
                    "dropping work item for deleted task"
                );
                err
            })?;

        let worker = match self.workers.resolve(task.worker_id()) {
            Ok(worker) => worker,
            Err(err) => {
                tracing::error!(
                    task_id = %task.id(),
                    worker_id = %task.worker_id(),
                    error = %err,
                    "cannot execute task, worker unresolvable"
                );
                // Release the queued slot so the task is not wedged forever.
                let mut state = TaskState::import(&*self.state_store, task.id()).await?;
                if state.is_queued() {
                    state
                        .set_status(&*self.state_store, TaskStatus::Idle)
                        .await?;
                }
                return Err(err.into());
            }
        };

        let started_at = Utc::now().timestamp();
        let mut state = TaskState::import(&*self.state_store, task.id()).await?;

        tracing::info!(task_id = %task.id(), "task started execution");
        state.mark_started(&*self.state_store).await?;

        let outcome = match worker.run(item).await {
            Ok(result) => Outcome::Success(result.unwrap_or_default()),
            Err(WorkerError::Declared { message, result }) => Outcome::DeclaredFailure(
                result.unwrap_or_else(|| TaskResult::from_error(message)),
            ),
            Err(WorkerError::Unexpected(source)) => Outcome::UnexpectedFailure {
                message: source.to_string(),
                detail: format!("{source:?}"),
            },
        };

        state
            .mark_stopped(&*self.state_store, outcome.succeeded(), started_at)
            .await?;

        if let Outcome::UnexpectedFailure { detail, .. } = &outcome {
            // Full diagnostic detail goes to the log only, never into the
            // result surfaced to subscribers.
            tracing::error!(
                task_id = %task.id(),
                detail = %detail,
                "task finished with an unexpected error"
            );
        }

        let result = outcome.into_result();
        if result.successful() {
            tracing::info!(task_id = %task.id(), "task finished successfully");
        } else {
            tracing::warn!(task_id = %task.id(), "task finished with errors");
            for error in result.errors() {
                tracing::error!(task_id = %task.id(), "{error}");
            }
        }

        self.events
            .publish(CompletionEvent::new(task, result.clone()))
            .await;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    use crate::core::task::Task;
    use crate::events::CompletionHandler;
    use crate::execution::worker::Worker;
    use crate::storage::{InMemoryStateStore, InMemoryTaskRepository};

    struct RecordingHandler {
        events: Mutex<Vec<CompletionEvent>>,
    }

    #[async_trait]
    impl CompletionHandler for RecordingHandler {
        async fn handle(&self, event: &CompletionEvent) {
            self.events.lock().await.push(event.clone());
        }
    }

    /// Worker that returns whatever the test scripted.
    struct ScriptedWorker {
        outcome: fn() -> Result<Option<TaskResult>, WorkerError>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Worker for ScriptedWorker {
        async fn run(&self, _item: &WorkItem) -> Result<Option<TaskResult>, WorkerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    struct Fixture {
        tasks: Arc<InMemoryTaskRepository>,
        state_store: Arc<InMemoryStateStore>,
        handler: Arc<RecordingHandler>,
        executor: Executor,
        worker: Arc<ScriptedWorker>,
    }

    async fn fixture(outcome: fn() -> Result<Option<TaskResult>, WorkerError>) -> Fixture {
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let state_store = Arc::new(InMemoryStateStore::new());
        let worker = Arc::new(ScriptedWorker {
            outcome,
            calls: AtomicU32::new(0),
        });
        let mut registry = WorkerRegistry::new();
        registry.register("w", worker.clone());
        let events = Arc::new(EventBus::new());
        let handler = Arc::new(RecordingHandler {
            events: Mutex::new(Vec::new()),
        });
        events.register(handler.clone()).await;

        let executor = Executor::new(
            tasks.clone(),
            Arc::new(registry),
            state_store.clone(),
            events,
        );
        Fixture {
            tasks,
            state_store,
            handler,
            executor,
            worker,
        }
    }

    /// Save a task and put its state into Queued, as the dispatcher would.
    async fn queued_task(f: &Fixture, id: &str) -> (Task, WorkItem) {
        let task = Task::new(id, id, "w", 0).with_interval(100);
        f.tasks.save(task.clone()).await.unwrap();
        let mut state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        state.enable(&*f.state_store).await.unwrap();
        state
            .set_status(&*f.state_store, TaskStatus::Queued)
            .await
            .unwrap();
        let item = WorkItem::new(task.id().clone(), task.params().clone());
        (task, item)
    }

    #[tokio::test]
    async fn test_successful_run_updates_both_timestamps() {
        let f = fixture(|| Ok(None)).await;
        let (task, item) = queued_task(&f, "t1").await;

        let result = f.executor.execute(&item).await.unwrap();

        assert!(result.successful());
        assert_eq!(f.worker.calls.load(Ordering::SeqCst), 1);

        let state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        assert_eq!(state.status(), TaskStatus::Idle);
        assert!(state.has_run());
        assert!(state.last_execution_succeeded());
    }

    #[tokio::test]
    async fn test_returned_result_with_errors_still_counts_as_completed_run() {
        let f = fixture(|| Ok(Some(TaskResult::from_error("row 7 skipped")))).await;
        let (task, item) = queued_task(&f, "t1").await;

        let result = f.executor.execute(&item).await.unwrap();

        assert!(!result.successful());
        assert_eq!(result.errors(), ["row 7 skipped"]);

        // The worker returned on its own terms, so the run is recorded as
        // successful for scheduling purposes.
        let state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        assert!(state.last_execution_succeeded());
    }

    #[tokio::test]
    async fn test_declared_failure_with_partial_result() {
        let f = fixture(|| {
            let mut partial = TaskResult::new();
            partial.add_error("step 1 failed");
            partial.add_error("step 2 skipped");
            Err(WorkerError::declared_with_result("aborted", partial))
        })
        .await;
        let (task, item) = queued_task(&f, "t1").await;

        let result = f.executor.execute(&item).await.unwrap();

        assert_eq!(result.errors(), ["step 1 failed", "step 2 skipped"]);

        let state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        assert_eq!(state.status(), TaskStatus::Idle);
        assert!(state.has_run());
        assert!(!state.last_execution_succeeded());
    }

    #[tokio::test]
    async fn test_declared_failure_without_result_synthesizes_one() {
        let f = fixture(|| Err(WorkerError::declared("no connection"))).await;
        let (_task, item) = queued_task(&f, "t1").await;

        let result = f.executor.execute(&item).await.unwrap();

        assert_eq!(result.errors(), ["no connection"]);
    }

    #[tokio::test]
    async fn test_unexpected_failure_surfaces_message_only() {
        let f = fixture(|| {
            Err(WorkerError::Unexpected(
                std::io::Error::new(std::io::ErrorKind::Other, "disk on fire").into(),
            ))
        })
        .await;
        let (task, item) = queued_task(&f, "t1").await;

        let result = f.executor.execute(&item).await.unwrap();

        assert_eq!(result.errors(), ["disk on fire"]);

        let state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        assert_eq!(state.status(), TaskStatus::Idle);
        assert!(!state.last_execution_succeeded());
    }

    #[tokio::test]
    async fn test_exactly_one_event_per_execution_for_all_outcomes() {
        for outcome in [
            (|| Ok(None)) as fn() -> Result<Option<TaskResult>, WorkerError>,
            || Err(WorkerError::declared("declared")),
            || Err(WorkerError::Unexpected("boom".into())),
        ] {
            let f = fixture(outcome).await;
            let (_task, item) = queued_task(&f, "t1").await;

            f.executor.execute(&item).await.unwrap();

            assert_eq!(f.handler.events.lock().await.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_event_pairs_task_and_result() {
        let f = fixture(|| Err(WorkerError::declared("nope"))).await;
        let (task, item) = queued_task(&f, "t1").await;

        f.executor.execute(&item).await.unwrap();

        let events = f.handler.events.lock().await;
        assert_eq!(events[0].task().id(), task.id());
        assert_eq!(events[0].result().errors(), ["nope"]);
    }

    #[tokio::test]
    async fn test_task_not_found_is_surfaced_and_publishes_nothing() {
        let f = fixture(|| Ok(None)).await;
        let item = WorkItem::new(TaskId::new("ghost"), Default::default());

        let err = f.executor.execute(&item).await.unwrap_err();

        assert!(matches!(err, ExecuteError::TaskNotFound(_)));
        assert_eq!(f.worker.calls.load(Ordering::SeqCst), 0);
        assert!(f.handler.events.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_unresolvable_worker_releases_queued_state() {
        let f = fixture(|| Ok(None)).await;
        // Task referencing a worker nobody registered.
        let task = Task::new("t1", "T", "missing_worker", 0);
        f.tasks.save(task.clone()).await.unwrap();
        let mut state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        state.enable(&*f.state_store).await.unwrap();
        state
            .set_status(&*f.state_store, TaskStatus::Queued)
            .await
            .unwrap();
        let item = WorkItem::new(task.id().clone(), Default::default());

        let err = f.executor.execute(&item).await.unwrap_err();

        assert!(matches!(err, ExecuteError::WorkerNotFound(_)));
        // The task is back to idle, not stuck queued, and nothing ran.
        let state = TaskState::import(&*f.state_store, task.id()).await.unwrap();
        assert_eq!(state.status(), TaskStatus::Idle);
        assert!(!state.has_run());
        assert!(f.handler.events.lock().await.is_empty());
    }
}
