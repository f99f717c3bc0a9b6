//! In-process task queue with at-least-once delivery.
//!
//! Units of work are [`TaskSpec`]s pushed onto named queues and pulled by a
//! [`WorkerPool`] of tokio workers. Each task carries its own retry budget
//! and per-attempt execution timeout; popped tasks get a visibility
//! deadline, and deliveries whose deadline passes (a crashed or stalled
//! worker) are reclaimed and redelivered — so every handler must tolerate
//! re-execution.
//!
//! [`TaskQueue::enqueue_chain`] runs tasks as a dependent chain: each task
//! is enqueued only after the previous one acks, and when a task exhausts
//! its attempts the chain's compensation task is dispatched exactly once.

pub mod error;
pub mod handler;
pub mod queue;
pub mod task;
pub mod worker;

pub use error::QueueError;
pub use handler::{HandlerRegistry, TaskError, TaskHandler, TaskResult};
pub use queue::{FailureOutcome, TaskQueue};
pub use task::{Delivery, TaskId, TaskSpec};
pub use worker::{WorkerConfig, WorkerPool};
