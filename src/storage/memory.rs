//! In-memory storage backends.
//!
//! Thread-safe backends for testing and embedding. Data is not persisted
//! across restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{StateStore, StorageError, TaskRepository};
use crate::core::task::Task;
use crate::core::types::TaskId;
use crate::state::StateRecord;

/// In-memory key/value state store.
#[derive(Default)]
pub struct InMemoryStateStore {
    records: RwLock<HashMap<String, StateRecord>>,
}

impl InMemoryStateStore {
    /// Create a new empty state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<StateRecord>, StorageError> {
        let records = self.records.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(records.get(key).cloned())
    }

    async fn set(&self, key: &str, record: StateRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.insert(key.to_string(), record);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().map_err(|_| StorageError::LockPoisoned)?;
        records.remove(key);
        Ok(())
    }
}

/// In-memory task definition repository.
#[derive(Default)]
pub struct InMemoryTaskRepository {
    tasks: RwLock<HashMap<TaskId, Task>>,
}

impl InMemoryTaskRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a repository pre-populated with the given tasks.
    pub fn with_tasks(tasks: impl IntoIterator<Item = Task>) -> Self {
        let map = tasks.into_iter().map(|t| (t.id().clone(), t)).collect();
        Self {
            tasks: RwLock::new(map),
        }
    }
}

#[async_trait]
impl TaskRepository for InMemoryTaskRepository {
    async fn load(&self, id: &TaskId) -> Result<Option<Task>, StorageError> {
        let tasks = self.tasks.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(tasks.get(id).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Task>, StorageError> {
        let tasks = self.tasks.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut result: Vec<_> = tasks.values().cloned().collect();
        result.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));
        Ok(result)
    }

    async fn save(&self, task: Task) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().map_err(|_| StorageError::LockPoisoned)?;
        tasks.insert(task.id().clone(), task);
        Ok(())
    }

    async fn delete(&self, id: &TaskId) -> Result<(), StorageError> {
        let mut tasks = self.tasks.write().map_err(|_| StorageError::LockPoisoned)?;
        tasks
            .remove(id)
            .ok_or_else(|| StorageError::NotFound(format!("task: {}", id)))?;
        Ok(())
    }
}
