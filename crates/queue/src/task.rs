//! Task descriptions and deliveries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default retry budget for a task.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt execution timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Identifier of one delivery of a task.
///
/// A reclaimed task is redelivered under a fresh id, so a stalled worker
/// acking its stale delivery cannot be confused with the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Description of a unit of work: handler name, JSON payload, retry
/// budget, per-attempt timeout, and an optional delay before the first
/// delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: String,
    pub payload: serde_json::Value,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub delay: Duration,
}

impl TaskSpec {
    /// Creates a task with the default retry budget and timeout.
    pub fn new(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            payload,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
        }
    }

    /// Overrides the retry budget.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Overrides the per-attempt execution timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Delays the first delivery.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// One delivery of a task to a worker.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: TaskId,
    pub name: String,
    pub payload: serde_json::Value,
    /// 1-based attempt number of this delivery.
    pub attempt: u32,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub queue: String,
}
