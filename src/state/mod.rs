//! Persisted per-task state.
//!
//! [`TaskState`] is the single source of truth for scheduling decisions: the
//! task's status (disabled/idle/queued/running) and its execution timestamps.
//! It has no independent lifetime from its backing [`StateStore`] — every
//! mutation is persisted immediately, and an instance is re-derived by
//! importing from the store keyed by task identifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::types::TaskId;
use crate::storage::{StateStore, StorageError};

/// Sentinel timestamp: the task has never been executed.
pub const HAS_NEVER_EXECUTED: i64 = 0;

/// Namespace prefix for state store keys.
const STATE_KEY_PREFIX: &str = "tasque.task.";

/// Status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    /// The task is disabled and cannot be executed.
    Disabled,
    /// The task is enabled, but currently not active.
    Idle,
    /// The task is enabled and currently waiting to be executed.
    Queued,
    /// The task is enabled and currently executing.
    Running,
}

impl TaskStatus {
    /// The persisted string form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Disabled => "disabled",
            TaskStatus::Idle => "idle",
            TaskStatus::Queued => "queued",
            TaskStatus::Running => "running",
        }
    }

    /// Parse a persisted status string.
    ///
    /// Returns `None` for unrecognized values. The in-memory enum makes
    /// invalid states unrepresentable, so this parse boundary is the only
    /// place the reject-and-ignore guard applies.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "disabled" => Some(TaskStatus::Disabled),
            "idle" => Some(TaskStatus::Idle),
            "queued" => Some(TaskStatus::Queued),
            "running" => Some(TaskStatus::Running),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Persisted layout of a task state entry.
///
/// Three fields keyed by a namespaced task identifier string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Status string, one of the four [`TaskStatus`] forms.
    pub status: String,
    /// Unix timestamp of the most recent execution, or the sentinel.
    pub last_exec: i64,
    /// Unix timestamp of the most recent successful execution, or the sentinel.
    pub last_success: i64,
}

/// State of a single task, backed by a key/value store.
///
/// Invariant: `last_successful_execution <= last_execution` whenever both are
/// non-sentinel, and the two are equal iff the most recent run succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskState {
    task_id: TaskId,
    key: String,
    status: TaskStatus,
    last_execution: i64,
    last_successful_execution: i64,
}

impl TaskState {
    /// The namespaced store key for a task's state entry.
    pub fn state_key(task_id: &TaskId) -> String {
        format!("{}{}", STATE_KEY_PREFIX, task_id)
    }

    /// Import the state for `task_id` from the store.
    ///
    /// A never-seen task yields (and persists) a fresh `Disabled` state with
    /// sentinel timestamps. A stored record with an unrecognized status
    /// string is treated as `Disabled`; its timestamps are kept.
    pub async fn import(store: &dyn StateStore, task_id: &TaskId) -> Result<Self, StorageError> {
        let key = Self::state_key(task_id);
        match store.get(&key).await? {
            Some(record) => {
                let status = TaskStatus::parse(&record.status).unwrap_or_else(|| {
                    tracing::warn!(
                        task_id = %task_id,
                        status = %record.status,
                        "unrecognized task status in store, treating as disabled"
                    );
                    TaskStatus::Disabled
                });
                Ok(Self {
                    task_id: task_id.clone(),
                    key,
                    status,
                    last_execution: record.last_exec,
                    last_successful_execution: record.last_success,
                })
            }
            None => {
                let state = Self {
                    task_id: task_id.clone(),
                    key,
                    status: TaskStatus::Disabled,
                    last_execution: HAS_NEVER_EXECUTED,
                    last_successful_execution: HAS_NEVER_EXECUTED,
                };
                state.save(store).await?;
                Ok(state)
            }
        }
    }

    /// Export the state in its persisted layout.
    pub fn export(&self) -> StateRecord {
        StateRecord {
            status: self.status.as_str().to_string(),
            last_exec: self.last_execution,
            last_success: self.last_successful_execution,
        }
    }

    /// Persist the current state.
    pub async fn save(&self, store: &dyn StateStore) -> Result<(), StorageError> {
        store.set(&self.key, self.export()).await
    }

    /// Remove the state entry for `task_id` from the store.
    pub async fn delete(store: &dyn StateStore, task_id: &TaskId) -> Result<(), StorageError> {
        store.delete(&Self::state_key(task_id)).await
    }

    /// The associated task identifier.
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// The namespaced store key of this state entry.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The current status.
    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Unix timestamp of the most recent execution, or [`HAS_NEVER_EXECUTED`].
    pub fn last_execution(&self) -> i64 {
        self.last_execution
    }

    /// Unix timestamp of the most recent successful execution, or
    /// [`HAS_NEVER_EXECUTED`].
    pub fn last_successful_execution(&self) -> i64 {
        self.last_successful_execution
    }

    /// Set the status and persist.
    pub async fn set_status(
        &mut self,
        store: &dyn StateStore,
        status: TaskStatus,
    ) -> Result<(), StorageError> {
        self.status = status;
        self.save(store).await
    }

    /// Set the last-execution timestamp and persist.
    pub async fn set_last_execution(
        &mut self,
        store: &dyn StateStore,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        self.last_execution = timestamp;
        self.save(store).await
    }

    /// Set the last-successful-execution timestamp and persist.
    pub async fn set_last_successful_execution(
        &mut self,
        store: &dyn StateStore,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        self.last_successful_execution = timestamp;
        self.save(store).await
    }

    /// Enable the task. Only a `Disabled` task transitions (to `Idle`);
    /// anything else is left untouched.
    pub async fn enable(&mut self, store: &dyn StateStore) -> Result<(), StorageError> {
        if self.status == TaskStatus::Disabled {
            self.set_status(store, TaskStatus::Idle).await?;
        }
        Ok(())
    }

    /// Disable the task, from any status.
    pub async fn disable(&mut self, store: &dyn StateStore) -> Result<(), StorageError> {
        self.set_status(store, TaskStatus::Disabled).await
    }

    /// Mark the task as currently executing.
    pub async fn mark_started(&mut self, store: &dyn StateStore) -> Result<(), StorageError> {
        self.set_status(store, TaskStatus::Running).await
    }

    /// Mark the task as stopped at `timestamp`.
    ///
    /// Records `last_execution` always and `last_successful_execution` only
    /// on success, then returns the task to `Idle`.
    pub async fn mark_stopped(
        &mut self,
        store: &dyn StateStore,
        success: bool,
        timestamp: i64,
    ) -> Result<(), StorageError> {
        if success {
            self.set_last_successful_execution(store, timestamp).await?;
        }
        self.set_last_execution(store, timestamp).await?;
        self.set_status(store, TaskStatus::Idle).await
    }

    /// Whether the task is enabled (any status other than `Disabled`).
    pub fn is_enabled(&self) -> bool {
        self.status != TaskStatus::Disabled
    }

    /// Whether the task is currently waiting to be executed.
    pub fn is_queued(&self) -> bool {
        self.status == TaskStatus::Queued
    }

    /// Whether the task is currently executing.
    pub fn is_running(&self) -> bool {
        self.status == TaskStatus::Running
    }

    /// Whether the task has executed at least once, successful or not.
    pub fn has_run(&self) -> bool {
        self.last_execution != HAS_NEVER_EXECUTED
    }

    /// Whether the task's most recent execution took place at or after
    /// `timestamp`.
    pub fn has_run_since(&self, timestamp: i64) -> bool {
        self.last_execution >= timestamp
    }

    /// Whether the most recent execution finished successfully.
    pub fn last_execution_succeeded(&self) -> bool {
        self.has_run() && self.last_successful_execution == self.last_execution
    }
}
