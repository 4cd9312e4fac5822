//! Task configuration.
//!
//! A [`Task`] describes *what* runs and *when*: which worker plugin executes
//! it, the opaque parameters handed to that worker, and its schedule (a first
//! execution time plus an optional repeat interval). Whether the task is
//! currently allowed to run lives in its [`TaskState`](crate::state::TaskState),
//! not here.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::{TaskId, WorkerId};

/// Opaque worker parameters, interpreted only by the worker itself.
pub type TaskParams = HashMap<String, serde_json::Value>;

/// Configuration of a schedulable unit of work.
///
/// Treated as immutable for the duration of one scheduling or execution
/// decision. The `enabled` flag is only a creation-time hint; the live
/// enabled/disabled status is tracked in the task's persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier.
    id: TaskId,
    /// Human-readable, short description of the task.
    name: String,
    /// Worker plugin that executes this task.
    worker_id: WorkerId,
    /// Parameters passed to the worker, as defined by the worker itself.
    #[serde(default)]
    params: TaskParams,
    /// Interval at which this task executes, in seconds.
    /// Zero or negative means the task runs exactly once.
    interval: i64,
    /// Unix timestamp of the first scheduled execution.
    first_execution: i64,
    /// Whether the task should start out enabled.
    enabled: bool,
}

impl Task {
    /// Create a new one-shot task that first executes at `first_execution`.
    pub fn new(
        id: impl Into<TaskId>,
        name: impl Into<String>,
        worker_id: impl Into<WorkerId>,
        first_execution: i64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            worker_id: worker_id.into(),
            params: TaskParams::new(),
            interval: 0,
            first_execution,
            enabled: true,
        }
    }

    /// Set the repeat interval in seconds. Values `<= 0` mean non-recurring.
    pub fn with_interval(mut self, interval: i64) -> Self {
        self.interval = interval;
        self
    }

    /// Set the worker parameters.
    pub fn with_params(mut self, params: TaskParams) -> Self {
        self.params = params;
        self
    }

    /// Set whether the task starts out enabled.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// The task identifier.
    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// The human-readable task name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The worker plugin that executes this task.
    pub fn worker_id(&self) -> &WorkerId {
        &self.worker_id
    }

    /// Parameters that affect the task's execution.
    pub fn params(&self) -> &TaskParams {
        &self.params
    }

    /// Interval at which the task runs, in seconds.
    ///
    /// A positive value is the repeat interval; zero or negative means the
    /// task does not run periodically.
    pub fn interval(&self) -> i64 {
        self.interval
    }

    /// Unix timestamp of the first (and possibly only) scheduled execution.
    pub fn first_execution(&self) -> i64 {
        self.first_execution
    }

    /// Whether the task should start out enabled.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Whether this is a recurring task, as opposed to a one-shot.
    pub fn is_recurring(&self) -> bool {
        self.interval > 0
    }
}
