//! Saga orchestration and refund processing for order fulfillment.
//!
//! The fulfillment saga runs `ReserveStock -> ProcessPayment ->
//! FinalizeOrder` as a dependent chain of queued tasks sharing one order
//! id, with `RollbackOrder` dispatched as compensation when the chain is
//! abandoned. Refunds run independently through [`RefundService`] (request
//! validation) and the `ProcessRefund` task (idempotent settlement).
//!
//! Every handler is written for at-least-once delivery: reservation is
//! keyed per (order, SKU), status transitions are guarded, and a completed
//! refund is never settled twice.

pub mod config;
pub mod error;
pub mod jobs;
pub mod orchestrator;
pub mod refund;
pub mod services;

pub use config::SagaConfig;
pub use error::SagaError;
pub use jobs::{QUEUE_NOTIFICATIONS, QUEUE_ORDERS, QUEUE_REFUNDS, SagaDeps};
pub use orchestrator::Orchestrator;
pub use refund::{OrderRefundSummary, RefundError, RefundRequest, RefundService};
pub use services::events::{EventSink, LogEventSink, RecordingEventSink};
pub use services::gateway::{GatewayError, PaymentGateway, RecordingGateway, StubGateway};
pub use services::notify::{LogNotifier, NotificationKind, Notifier, RecordingNotifier};
