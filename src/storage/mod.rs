//! Storage collaborator traits.
//!
//! The core persists two things through pluggable backends: task definitions
//! (via [`TaskRepository`]) and per-task state records (via [`StateStore`],
//! a plain key/value contract with last-write-wins semantics and no
//! transactions). Both are injected into the components that need them —
//! never reached through ambient global lookup.

mod memory;

pub use memory::{InMemoryStateStore, InMemoryTaskRepository};

use async_trait::async_trait;
use thiserror::Error;

use crate::core::task::Task;
use crate::core::types::TaskId;
pub use crate::state::StateRecord;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested item was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storage lock was poisoned.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// Generic storage error.
    #[error("storage error: {0}")]
    Other(String),
}

/// Key/value store for persisted task state records.
///
/// No versioning, no compare-and-swap: concurrent writers follow
/// last-write-wins. The read-decide-write sequences built on top of this
/// contract assume a single active driver.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Get the record stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, StorageError>;

    /// Store `record` under `key`, replacing any previous value.
    async fn set(&self, key: &str, record: StateRecord) -> Result<(), StorageError>;

    /// Remove the record stored under `key`. Removing a missing key is a no-op.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;
}

/// Repository of task definitions.
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Load a task by identifier.
    async fn load(&self, id: &TaskId) -> Result<Option<Task>, StorageError>;

    /// Load all known tasks.
    async fn load_all(&self) -> Result<Vec<Task>, StorageError>;

    /// Save (insert or replace) a task definition.
    async fn save(&self, task: Task) -> Result<(), StorageError>;

    /// Delete a task definition. Callers are responsible for also deleting
    /// the task's state entry.
    async fn delete(&self, id: &TaskId) -> Result<(), StorageError>;
}
