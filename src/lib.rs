pub mod config;
pub mod core;
pub mod events;
pub mod execution;
pub mod queue;
pub mod runner;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod testing;

pub use crate::core::result::{Outcome, TaskResult};
pub use crate::core::task::{Task, TaskParams};
pub use crate::core::types::{TaskId, WorkerId};
pub use events::{CompletionEvent, CompletionHandler, EventBus};
pub use execution::{ExecuteError, Executor, RegistryError, Worker, WorkerError, WorkerRegistry};
pub use queue::{Dispatcher, InMemoryQueue, Queue, WorkItem};
pub use runner::{Runner, RunnerError, RunnerHandle};
pub use state::{TaskState, TaskStatus, HAS_NEVER_EXECUTED};
pub use storage::{
    InMemoryStateStore, InMemoryTaskRepository, StateRecord, StateStore, StorageError,
    TaskRepository,
};
