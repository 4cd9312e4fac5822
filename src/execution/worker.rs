//! Worker trait and registry.
//!
//! A worker is the pluggable piece of domain logic behind a task. The core
//! only consumes its [`Worker::run`] capability and a contract describing
//! how success and failure are reported; what a worker actually does is out
//! of scope.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::core::result::TaskResult;
use crate::core::types::WorkerId;
use crate::queue::WorkItem;

/// Errors a worker can signal from [`Worker::run`].
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A failure declared by the worker's own logic, possibly carrying the
    /// partial result accumulated up to the failure point.
    #[error("task failed: {message}")]
    Declared {
        /// Human-readable failure description.
        message: String,
        /// Partial result, if the worker got far enough to build one.
        result: Option<TaskResult>,
    },

    /// Any other, unexpected failure.
    #[error(transparent)]
    Unexpected(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl WorkerError {
    /// Convenience constructor for a declared failure without a partial result.
    pub fn declared(message: impl Into<String>) -> Self {
        WorkerError::Declared {
            message: message.into(),
            result: None,
        }
    }

    /// Convenience constructor for a declared failure carrying a partial result.
    pub fn declared_with_result(message: impl Into<String>, result: TaskResult) -> Self {
        WorkerError::Declared {
            message: message.into(),
            result: Some(result),
        }
    }
}

/// The capability of executing domain work for a work item.
///
/// Returning `Ok(None)` is shorthand for an empty, successful result.
/// A returned result may itself carry errors; that still counts as the
/// worker finishing on its own terms, distinct from a [`WorkerError`].
#[async_trait]
pub trait Worker: Send + Sync {
    /// Execute the work described by `item`.
    async fn run(&self, item: &WorkItem) -> Result<Option<TaskResult>, WorkerError>;
}

impl std::fmt::Debug for dyn Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn Worker")
    }
}

/// Error resolving a worker identifier.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No worker is registered under the given identifier.
    #[error("worker plugin not found: {0}")]
    NotFound(WorkerId),
}

/// Lookup table of worker plugins keyed by identifier.
///
/// Resolution failures are typed, never a silent absent worker: callers must
/// handle the not-found case explicitly.
#[derive(Default)]
pub struct WorkerRegistry {
    workers: HashMap<WorkerId, Arc<dyn Worker>>,
}

impl WorkerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a worker under `id`, replacing any previous registration.
    pub fn register(&mut self, id: impl Into<WorkerId>, worker: Arc<dyn Worker>) {
        self.workers.insert(id.into(), worker);
    }

    /// Resolve a worker identifier.
    pub fn resolve(&self, id: &WorkerId) -> Result<Arc<dyn Worker>, RegistryError> {
        self.workers
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.clone()))
    }

    /// Whether a worker is registered under `id`.
    pub fn contains(&self, id: &WorkerId) -> bool {
        self.workers.contains_key(id)
    }

    /// Number of registered workers.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
