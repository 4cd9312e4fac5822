//! Core value types: identifiers, task configuration, and execution results.

pub mod result;
pub mod task;
pub mod types;
