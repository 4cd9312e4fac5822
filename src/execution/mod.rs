//! Worker plugins and the execution pipeline.

mod executor;
mod worker;

pub use executor::{ExecuteError, Executor};
pub use worker::{RegistryError, Worker, WorkerError, WorkerRegistry};
