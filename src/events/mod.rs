//! Completion events and fan-out.
//!
//! Every execution attempt, successful or not, publishes exactly one
//! [`CompletionEvent`] pairing the task with its result. Any number of
//! handlers can subscribe; the fan-out is synchronous and a handler has no
//! way to fail the pipeline — its only channel back is its own side effects.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::result::TaskResult;
use crate::core::task::Task;

/// Immutable pairing of a task and the result of one execution attempt.
#[derive(Debug, Clone)]
pub struct CompletionEvent {
    task: Task,
    result: TaskResult,
}

impl CompletionEvent {
    /// Create a new completion event.
    pub fn new(task: Task, result: TaskResult) -> Self {
        Self { task, result }
    }

    /// The task that was executed.
    pub fn task(&self) -> &Task {
        &self.task
    }

    /// The result of the execution.
    pub fn result(&self) -> &TaskResult {
        &self.result
    }
}

/// Handler for receiving completion events.
#[async_trait]
pub trait CompletionHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &CompletionEvent);
}

/// Event bus distributing completion events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn CompletionHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a completion handler.
    pub async fn register(&self, handler: Arc<dyn CompletionHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Publish an event to all registered handlers.
    pub async fn publish(&self, event: CompletionEvent) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
