//! Execution results and outcomes.
//!
//! [`TaskResult`] is the structured success/failure record a worker produces:
//! an ordered list of error descriptions, where an empty list means success.
//! [`Outcome`] classifies how an execution attempt ended, so the executor's
//! state-transition logic is a plain match over variants instead of
//! exception handling.

use serde::{Deserialize, Serialize};

/// Outcome record of a single task execution.
///
/// Errors are kept in insertion order; that order is the display order for
/// subscribers. The result is mutable only while it is being built — once
/// handed to the completion event it is treated as final.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskResult {
    errors: Vec<String>,
}

impl TaskResult {
    /// Create a new, successful (empty) result.
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Create a result from a list of error descriptions.
    pub fn from_errors(errors: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            errors: errors.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a result carrying a single error description.
    pub fn from_error(error: impl Into<String>) -> Self {
        Self {
            errors: vec![error.into()],
        }
    }

    /// Whether the execution finished without errors.
    pub fn successful(&self) -> bool {
        self.errors.is_empty()
    }

    /// The recorded error descriptions, in insertion order.
    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Append an error description.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }
}

/// How a single execution attempt ended.
///
/// Translated from the worker's return value by the executor:
/// - a returned result (or nothing) is a [`Outcome::Success`], even when the
///   result itself carries errors — the worker finished on its own terms;
/// - a declared failure carries the partial result accumulated up to the
///   failure point;
/// - anything else is an unexpected failure whose full detail belongs in the
///   log, not in the result surfaced to subscribers.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The worker returned normally.
    Success(TaskResult),
    /// The worker signalled a declared task failure.
    DeclaredFailure(TaskResult),
    /// The worker failed in an unexpected way.
    UnexpectedFailure {
        /// Short message included in the surfaced result.
        message: String,
        /// Full diagnostic detail, logged only.
        detail: String,
    },
}

impl Outcome {
    /// Whether this outcome counts as a successful execution for the
    /// task's state record.
    pub fn succeeded(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    /// Convert the outcome into the result surfaced to subscribers.
    pub fn into_result(self) -> TaskResult {
        match self {
            Outcome::Success(result) | Outcome::DeclaredFailure(result) => result,
            Outcome::UnexpectedFailure { message, .. } => TaskResult::from_error(message),
        }
    }
}
