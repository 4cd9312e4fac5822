//! Testing utilities for users of the library.
//!
//! This module provides helpers for testing task scheduling and execution:
//!
//! - [`MockWorker`]: A worker with scripted outcomes that records its calls
//! - [`RecordingHandler`]: Captures published completion events
//! - [`TestHarness`]: Wires the whole pipeline over in-memory backends

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::core::result::TaskResult;
use crate::core::task::Task;
use crate::events::{CompletionEvent, CompletionHandler, EventBus};
use crate::execution::{ExecuteError, Executor, Worker, WorkerError, WorkerRegistry};
use crate::queue::{Dispatcher, InMemoryQueue, Queue, WorkItem};
use crate::state::TaskState;
use crate::storage::{InMemoryStateStore, InMemoryTaskRepository, StorageError, TaskRepository};

/// A worker with scripted outcomes.
///
/// Each call to [`Worker::run`] pops the next scripted outcome; once the
/// script is exhausted, every further call succeeds with an empty result.
/// All received work items are recorded for later inspection.
///
/// # Example
///
/// ```
/// use tasque::testing::MockWorker;
///
/// let worker = MockWorker::new()
///     .then_fail("first run fails")
///     .then_succeed();
/// ```
pub struct MockWorker {
    script: Mutex<VecDeque<Result<Option<TaskResult>, WorkerError>>>,
    items: Mutex<Vec<WorkItem>>,
}

impl MockWorker {
    /// Create a new mock worker with an empty script.
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            items: Mutex::new(Vec::new()),
        }
    }

    /// Script a successful run with an empty result.
    pub fn then_succeed(self) -> Self {
        self.push(Ok(None))
    }

    /// Script a successful run returning `result`.
    pub fn then_return(self, result: TaskResult) -> Self {
        self.push(Ok(Some(result)))
    }

    /// Script a declared failure.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        self.push(Err(WorkerError::declared(message)))
    }

    /// Script an unexpected failure.
    pub fn then_fail_unexpectedly(self, message: impl Into<String>) -> Self {
        let message = message.into();
        self.push(Err(WorkerError::Unexpected(message.into())))
    }

    fn push(mut self, outcome: Result<Option<TaskResult>, WorkerError>) -> Self {
        // Owned self: no lock needed, the outcome is always recorded.
        self.script.get_mut().push_back(outcome);
        self
    }

    /// The work items this worker has received, in order.
    pub async fn items(&self) -> Vec<WorkItem> {
        self.items.lock().await.clone()
    }

    /// How many times this worker has run.
    pub async fn run_count(&self) -> usize {
        self.items.lock().await.len()
    }
}

impl Default for MockWorker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Worker for MockWorker {
    async fn run(&self, item: &WorkItem) -> Result<Option<TaskResult>, WorkerError> {
        self.items.lock().await.push(item.clone());
        self.script
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(None))
    }
}

/// A completion handler that records every event it receives.
pub struct RecordingHandler {
    events: Mutex<Vec<CompletionEvent>>,
}

impl RecordingHandler {
    /// Create a new recording handler.
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
        }
    }

    /// The recorded events, in publication order.
    pub async fn events(&self) -> Vec<CompletionEvent> {
        self.events.lock().await.clone()
    }

    /// Number of recorded events.
    pub async fn event_count(&self) -> usize {
        self.events.lock().await.len()
    }
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionHandler for RecordingHandler {
    async fn handle(&self, event: &CompletionEvent) {
        self.events.lock().await.push(event.clone());
    }
}

/// A fully wired pipeline over in-memory backends.
///
/// Bundles repository, state store, queue, worker registry, event bus,
/// dispatcher and executor, with a [`RecordingHandler`] already subscribed.
pub struct TestHarness {
    /// Task repository.
    pub tasks: Arc<InMemoryTaskRepository>,
    /// State store.
    pub state_store: Arc<InMemoryStateStore>,
    /// Work item queue.
    pub queue: Arc<InMemoryQueue>,
    /// Event bus.
    pub events: Arc<EventBus>,
    /// Pre-registered recording handler.
    pub handler: Arc<RecordingHandler>,
    /// Dispatcher over the above.
    pub dispatcher: Dispatcher,
    /// Executor over the above.
    pub executor: Executor,
}

impl TestHarness {
    /// Build a harness with the given worker registry.
    pub async fn new(registry: WorkerRegistry) -> Self {
        let tasks = Arc::new(InMemoryTaskRepository::new());
        let state_store = Arc::new(InMemoryStateStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let events = Arc::new(EventBus::new());
        let handler = Arc::new(RecordingHandler::new());
        events.register(handler.clone()).await;

        let dispatcher = Dispatcher::new(tasks.clone(), state_store.clone(), queue.clone());
        let executor = Executor::new(
            tasks.clone(),
            Arc::new(registry),
            state_store.clone(),
            events.clone(),
        );

        Self {
            tasks,
            state_store,
            queue,
            events,
            handler,
            dispatcher,
            executor,
        }
    }

    /// Save a task and enable it.
    pub async fn add_enabled_task(&self, task: Task) -> Result<(), StorageError> {
        self.tasks.save(task.clone()).await?;
        let mut state = TaskState::import(&*self.state_store, task.id()).await?;
        state.enable(&*self.state_store).await?;
        Ok(())
    }

    /// One full pass: dispatch due tasks at `now`, then execute everything
    /// that is queued. Returns the executed items' results.
    pub async fn run_pass(&self, now: i64) -> Result<Vec<TaskResult>, ExecuteError> {
        self.dispatcher.dispatch_due(now).await?;
        let mut results = Vec::new();
        while let Some(item) = self.queue.dequeue().await {
            results.push(self.executor.execute(&item).await?);
        }
        Ok(results)
    }
}
