//! Downstream event emission contract.
//!
//! Completed orders and refunds are announced to consumers (KPI
//! aggregation, leaderboard caching) as fire-and-forget, at-least-once
//! events; consumers must tolerate duplicates. The sink is never a
//! synchronous dependency of the saga: emission failures are invisible to
//! the emitting step.

use std::sync::RwLock;

use async_trait::async_trait;
use common::{OrderId, RefundId};
use domain::{Order, Refund};

/// Consumer of completed-order and completed-refund events.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn order_completed(&self, order: &Order);
    async fn refund_completed(&self, refund: &Refund);
}

/// Sink that writes a structured log line per event.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    /// Creates a new log sink.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for LogEventSink {
    async fn order_completed(&self, order: &Order) {
        tracing::info!(
            order_ref = %order.order_ref,
            customer_id = %order.customer_id,
            total_amount = %order.total_amount,
            "downstream event: order completed"
        );
    }

    async fn refund_completed(&self, refund: &Refund) {
        tracing::info!(
            refund_ref = %refund.refund_ref,
            order_ref = %refund.order_ref,
            amount = %refund.amount,
            "downstream event: refund completed"
        );
    }
}

/// Sink that records every event, for tests.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    orders: RwLock<Vec<OrderId>>,
    refunds: RwLock<Vec<RefundId>>,
}

impl RecordingEventSink {
    /// Creates a new recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Order-completed events recorded so far.
    pub fn completed_orders(&self) -> Vec<OrderId> {
        self.orders.read().unwrap().clone()
    }

    /// Refund-completed events recorded so far.
    pub fn completed_refunds(&self) -> Vec<RefundId> {
        self.refunds.read().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingEventSink {
    async fn order_completed(&self, order: &Order) {
        self.orders.write().unwrap().push(order.id);
    }

    async fn refund_completed(&self, refund: &Refund) {
        self.refunds.write().unwrap().push(refund.id);
    }
}
