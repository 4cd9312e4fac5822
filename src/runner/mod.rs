//! The periodic driver loop.
//!
//! [`Runner`] owns the tick loop that stands in for an external cron: each
//! tick it asks the dispatcher to enqueue whatever is due, then drains the
//! queue through the executor. A cloneable [`RunnerHandle`] exposes manual
//! control (trigger, enable, disable, remove, shutdown) over a command
//! channel, so all mutations are serialized through the single driver.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;

use crate::core::types::TaskId;
use crate::execution::Executor;
use crate::queue::{Dispatcher, Queue};
use crate::scheduler::CRON_TICK;
use crate::state::TaskState;
use crate::storage::{StateStore, StorageError, TaskRepository};

/// Buffer size for the command channel between RunnerHandle and Runner.
const COMMAND_CHANNEL_BUFFER: usize = 32;

/// Errors that can occur in the runner.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Task not found.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Channel error.
    #[error("channel error: {0}")]
    ChannelError(String),
}

/// State of the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerState {
    /// Runner is stopped.
    Stopped,
    /// Runner is running.
    Running,
}

/// Commands that can be sent to the runner.
enum RunnerCommand {
    /// Enqueue a task right now, bypassing the due-check.
    Trigger {
        task_id: TaskId,
        response: oneshot::Sender<Result<bool, RunnerError>>,
    },
    /// Enable a task.
    Enable {
        task_id: TaskId,
        response: oneshot::Sender<Result<(), RunnerError>>,
    },
    /// Disable a task.
    Disable {
        task_id: TaskId,
        response: oneshot::Sender<Result<(), RunnerError>>,
    },
    /// Delete a task and its state entry.
    Remove {
        task_id: TaskId,
        response: oneshot::Sender<Result<(), RunnerError>>,
    },
    /// Shutdown the runner.
    Shutdown { response: oneshot::Sender<()> },
}

/// Handle for controlling the runner.
#[derive(Clone)]
pub struct RunnerHandle {
    command_tx: mpsc::Sender<RunnerCommand>,
    state: Arc<RwLock<RunnerState>>,
}

impl RunnerHandle {
    /// Helper to send a command that returns a result and wait for response.
    async fn send_result_command<T>(
        &self,
        build_command: impl FnOnce(oneshot::Sender<Result<T, RunnerError>>) -> RunnerCommand,
        operation: &str,
    ) -> Result<T, RunnerError>
    where
        T: Send + 'static,
    {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(build_command(response_tx))
            .await
            .map_err(|_| {
                RunnerError::ChannelError(format!("failed to send {} command", operation))
            })?;

        response_rx.await.map_err(|_| {
            RunnerError::ChannelError(format!("failed to receive {} response", operation))
        })?
    }

    /// Enqueue a task for immediate execution, bypassing the due-check.
    ///
    /// Deduplication still applies: returns `Ok(false)` if the task is
    /// already waiting in the queue.
    pub async fn trigger(&self, task_id: impl Into<TaskId>) -> Result<bool, RunnerError> {
        let task_id = task_id.into();
        self.send_result_command(
            |response| RunnerCommand::Trigger { task_id, response },
            "trigger",
        )
        .await
    }

    /// Enable a task.
    pub async fn enable(&self, task_id: impl Into<TaskId>) -> Result<(), RunnerError> {
        let task_id = task_id.into();
        self.send_result_command(
            |response| RunnerCommand::Enable { task_id, response },
            "enable",
        )
        .await
    }

    /// Disable a task.
    pub async fn disable(&self, task_id: impl Into<TaskId>) -> Result<(), RunnerError> {
        let task_id = task_id.into();
        self.send_result_command(
            |response| RunnerCommand::Disable { task_id, response },
            "disable",
        )
        .await
    }

    /// Delete a task along with its state entry.
    pub async fn remove(&self, task_id: impl Into<TaskId>) -> Result<(), RunnerError> {
        let task_id = task_id.into();
        self.send_result_command(
            |response| RunnerCommand::Remove { task_id, response },
            "remove",
        )
        .await
    }

    /// Shutdown the runner.
    pub async fn shutdown(&self) -> Result<(), RunnerError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.command_tx
            .send(RunnerCommand::Shutdown {
                response: response_tx,
            })
            .await
            .map_err(|_| RunnerError::ChannelError("failed to send shutdown command".into()))?;
        response_rx
            .await
            .map_err(|_| RunnerError::ChannelError("failed to receive shutdown response".into()))
    }

    /// Get the current runner state.
    pub async fn state(&self) -> RunnerState {
        *self.state.read().await
    }

    /// Check if the runner is running.
    pub async fn is_running(&self) -> bool {
        *self.state.read().await == RunnerState::Running
    }
}

/// Periodic driver that dispatches due tasks and drains the queue.
pub struct Runner {
    tasks: Arc<dyn TaskRepository>,
    state_store: Arc<dyn StateStore>,
    queue: Arc<dyn Queue>,
    dispatcher: Dispatcher,
    executor: Arc<Executor>,
    tick_interval: Duration,
}

impl Runner {
    /// Create a new runner over the given collaborators.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        state_store: Arc<dyn StateStore>,
        queue: Arc<dyn Queue>,
        executor: Arc<Executor>,
    ) -> Self {
        let dispatcher = Dispatcher::new(tasks.clone(), state_store.clone(), queue.clone());
        Self {
            tasks,
            state_store,
            queue,
            dispatcher,
            executor,
            tick_interval: Duration::from_secs(CRON_TICK as u64),
        }
    }

    /// Set the tick interval. Defaults to the scheduling granularity.
    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Start the runner and return a handle for controlling it.
    pub fn start(self) -> (RunnerHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_BUFFER);
        let state = Arc::new(RwLock::new(RunnerState::Running));

        let handle = RunnerHandle {
            command_tx,
            state: Arc::clone(&state),
        };

        let runner_task = tokio::spawn(async move {
            self.run(command_rx, state).await;
        });

        (handle, runner_task)
    }

    /// Main runner loop.
    async fn run(
        self,
        mut command_rx: mpsc::Receiver<RunnerCommand>,
        state: Arc<RwLock<RunnerState>>,
    ) {
        let mut interval = tokio::time::interval(self.tick_interval);
        // The first tick completes immediately; consume it so the cadence
        // starts one interval out, like an external cron would.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }

                Some(command) = command_rx.recv() => {
                    match command {
                        RunnerCommand::Trigger { task_id, response } => {
                            let result = self.trigger_task(&task_id).await;
                            // Run the triggered task promptly rather than
                            // waiting out the tick.
                            if matches!(result, Ok(true)) {
                                self.drain_queue().await;
                            }
                            let _ = response.send(result);
                        }
                        RunnerCommand::Enable { task_id, response } => {
                            let _ = response.send(self.enable_task(&task_id).await);
                        }
                        RunnerCommand::Disable { task_id, response } => {
                            let _ = response.send(self.disable_task(&task_id).await);
                        }
                        RunnerCommand::Remove { task_id, response } => {
                            let _ = response.send(self.remove_task(&task_id).await);
                        }
                        RunnerCommand::Shutdown { response } => {
                            let mut s = state.write().await;
                            *s = RunnerState::Stopped;
                            drop(s);

                            let _ = response.send(());
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("runner stopped");
    }

    /// One scheduling pass: enqueue due tasks, then drain the queue.
    async fn tick(&self) {
        let now = chrono::Utc::now().timestamp();
        match self.dispatcher.dispatch_due(now).await {
            Ok(enqueued) if !enqueued.is_empty() => {
                tracing::debug!(count = enqueued.len(), "dispatched due tasks");
            }
            Ok(_) => {}
            Err(err) => {
                tracing::error!(error = %err, "dispatch pass failed");
            }
        }
        self.drain_queue().await;
    }

    /// Execute queued work items until the queue is empty.
    ///
    /// Execution-resolution errors are logged and the item is dropped; they
    /// never stop the drain.
    async fn drain_queue(&self) {
        while let Some(item) = self.queue.dequeue().await {
            if let Err(err) = self.executor.execute(&item).await {
                tracing::error!(
                    task_id = %item.task_id,
                    error = %err,
                    "work item failed to execute"
                );
            }
        }
    }

    async fn trigger_task(&self, task_id: &TaskId) -> Result<bool, RunnerError> {
        let task = self
            .tasks
            .load(task_id)
            .await?
            .ok_or_else(|| RunnerError::TaskNotFound(task_id.clone()))?;
        Ok(self.dispatcher.try_enqueue(&task).await?)
    }

    async fn enable_task(&self, task_id: &TaskId) -> Result<(), RunnerError> {
        if self.tasks.load(task_id).await?.is_none() {
            return Err(RunnerError::TaskNotFound(task_id.clone()));
        }
        let mut state = TaskState::import(&*self.state_store, task_id).await?;
        state.enable(&*self.state_store).await?;
        tracing::info!(task_id = %task_id, "task enabled");
        Ok(())
    }

    async fn disable_task(&self, task_id: &TaskId) -> Result<(), RunnerError> {
        if self.tasks.load(task_id).await?.is_none() {
            return Err(RunnerError::TaskNotFound(task_id.clone()));
        }
        let mut state = TaskState::import(&*self.state_store, task_id).await?;
        state.disable(&*self.state_store).await?;
        tracing::info!(task_id = %task_id, "task disabled");
        Ok(())
    }

    async fn remove_task(&self, task_id: &TaskId) -> Result<(), RunnerError> {
        self.tasks.delete(task_id).await.map_err(|err| match err {
            StorageError::NotFound(_) => RunnerError::TaskNotFound(task_id.clone()),
            other => RunnerError::Storage(other),
        })?;
        TaskState::delete(&*self.state_store, task_id).await?;
        tracing::info!(task_id = %task_id, "task removed");
        Ok(())
    }
}
