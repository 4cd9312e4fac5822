//! YAML task definitions.
//!
//! Parses declarative task definitions from YAML files and converts them
//! into [`Task`] values ready for the repository.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::core::task::{Task, TaskParams};

/// Errors that can occur when loading task definitions.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a definition file.
    #[error("failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML.
    #[error("YAML parse error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid definition value.
    #[error("invalid task definition: {0}")]
    InvalidDefinition(String),

    /// Missing required field.
    #[error("missing required field: {0}")]
    MissingField(String),
}

/// A task definition file: a flat list of task definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFile {
    /// Task definitions.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

/// One task definition from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Task identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Identifier of the worker plugin that executes this task.
    pub worker: String,
    /// Earliest execution time.
    pub first_execution: FirstExecutionConfig,
    /// Recurrence interval in seconds. Zero or absent means one-shot.
    #[serde(default)]
    pub interval: i64,
    /// Parameters handed to the worker on each run.
    #[serde(default)]
    pub params: TaskParams,
    /// Whether the task starts out enabled.
    #[serde(default)]
    pub enabled: bool,
}

/// First execution time, either as epoch seconds or an RFC 3339 timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FirstExecutionConfig {
    /// Unix timestamp in seconds.
    Epoch(i64),
    /// RFC 3339 timestamp string, e.g. `2026-01-01T06:00:00Z`.
    Rfc3339(String),
}

impl FirstExecutionConfig {
    /// Resolve to epoch seconds.
    pub fn to_epoch(&self) -> Result<i64, ConfigError> {
        match self {
            FirstExecutionConfig::Epoch(ts) => Ok(*ts),
            FirstExecutionConfig::Rfc3339(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp())
                .map_err(|err| {
                    ConfigError::InvalidDefinition(format!(
                        "first_execution '{s}' is not a valid RFC 3339 timestamp: {err}"
                    ))
                }),
        }
    }
}

impl TaskConfig {
    /// Convert this definition into a [`Task`].
    pub fn into_task(self) -> Result<Task, ConfigError> {
        let first_execution = self.first_execution.to_epoch()?;
        Ok(Task::new(self.id, self.name, self.worker, first_execution)
            .with_interval(self.interval)
            .with_params(self.params)
            .with_enabled(self.enabled))
    }
}

/// Load task definitions from a YAML file.
pub fn load_tasks_from_file(path: impl AsRef<Path>) -> Result<Vec<Task>, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_tasks_from_str(&content)
}

/// Parse task definitions from a YAML string.
pub fn load_tasks_from_str(yaml: &str) -> Result<Vec<Task>, ConfigError> {
    let file: TaskFile = serde_yaml::from_str(yaml)?;
    validate(&file)?;
    file.tasks.into_iter().map(TaskConfig::into_task).collect()
}

fn validate(file: &TaskFile) -> Result<(), ConfigError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for task in &file.tasks {
        if task.id.is_empty() {
            return Err(ConfigError::MissingField("id".into()));
        }
        if task.name.is_empty() {
            return Err(ConfigError::MissingField(format!("name (task '{}')", task.id)));
        }
        if task.worker.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "worker (task '{}')",
                task.id
            )));
        }
        if task.interval < 0 {
            return Err(ConfigError::InvalidDefinition(format!(
                "task '{}' has a negative interval",
                task.id
            )));
        }
        if !seen.insert(&task.id) {
            return Err(ConfigError::InvalidDefinition(format!(
                "duplicate task id: {}",
                task.id
            )));
        }
    }
    Ok(())
}
