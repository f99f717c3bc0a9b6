//! Queue error types.

use thiserror::Error;

/// Errors that can occur when enqueueing work.
#[derive(Debug, Error)]
pub enum QueueError {
    /// A chain must contain at least one task.
    #[error("cannot enqueue an empty chain")]
    EmptyChain,
}
