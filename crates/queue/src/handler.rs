//! Task handler trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Error returned by a task handler attempt.
///
/// The queue treats any error as a failed attempt; distinguishing
/// retryable from terminal conditions is the handler's job (handlers
/// swallow not-found conditions, for example, because retrying cannot
/// make a missing record appear).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
}

impl TaskError {
    /// Creates a task error from anything displayable.
    pub fn new(message: impl std::fmt::Display) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    /// Returns the error message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::new(format!("invalid payload: {err}"))
    }
}

/// Convenience type alias for handler results.
pub type TaskResult = Result<(), TaskError>;

/// A unit-of-work handler, looked up by task name.
///
/// Delivery is at-least-once: `execute` may run more than once for the
/// same logical task, including after earlier partial side effects.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult;
}

/// Maps task names to their handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a task name, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn TaskHandler>) {
        self.handlers.insert(name.into(), handler);
    }

    /// Looks up the handler for a task name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Returns the number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns true if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
