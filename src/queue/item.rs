//! The unit of dispatch.

use serde::{Deserialize, Serialize};

use crate::core::task::TaskParams;
use crate::core::types::TaskId;

/// A queued unit of work: a task identifier plus a snapshot of the task's
/// worker parameters taken at enqueue time.
///
/// A value object with no identity beyond the pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    /// The task to execute.
    pub task_id: TaskId,
    /// Worker parameters as they were when the item was enqueued.
    pub params: TaskParams,
}

impl WorkItem {
    /// Create a new work item.
    pub fn new(task_id: TaskId, params: TaskParams) -> Self {
        Self { task_id, params }
    }
}
