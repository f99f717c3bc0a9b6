//! Queued units of work and their registration.
//!
//! Task names, payload shapes, and spec builders live here so the
//! orchestrator, the refund service, and the handlers all agree on them.
//! Per-task retry budgets and timeouts mirror the step semantics: payment
//! and refund settlement get the longest attempt window.

use std::sync::Arc;
use std::time::Duration;

use common::{OrderId, RefundId};
use queue::{HandlerRegistry, TaskQueue, TaskSpec};
use serde::{Deserialize, Serialize};
use serde_json::json;
use store::Datastore;

use crate::config::SagaConfig;
use crate::services::events::EventSink;
use crate::services::gateway::PaymentGateway;
use crate::services::notify::{NotificationKind, Notifier};

pub mod finalize_order;
pub mod process_payment;
pub mod process_refund;
pub mod reserve_stock;
pub mod rollback_order;
pub mod send_notification;

pub use finalize_order::FinalizeOrder;
pub use process_payment::ProcessPayment;
pub use process_refund::ProcessRefund;
pub use reserve_stock::ReserveStock;
pub use rollback_order::RollbackOrder;
pub use send_notification::SendNotification;

/// Queue carrying the fulfillment chain and its compensation.
pub const QUEUE_ORDERS: &str = "orders";
/// Queue carrying refund settlement tasks.
pub const QUEUE_REFUNDS: &str = "refunds";
/// Queue carrying notification requests.
pub const QUEUE_NOTIFICATIONS: &str = "notifications";

pub const TASK_RESERVE_STOCK: &str = "orders.reserve_stock";
pub const TASK_PROCESS_PAYMENT: &str = "orders.process_payment";
pub const TASK_FINALIZE_ORDER: &str = "orders.finalize";
pub const TASK_ROLLBACK_ORDER: &str = "orders.rollback";
pub const TASK_PROCESS_REFUND: &str = "refunds.process";
pub const TASK_SEND_NOTIFICATION: &str = "notifications.send";

/// Payload of the order-scoped tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTask {
    pub order_id: OrderId,
}

/// Payload of the refund settlement task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundTask {
    pub refund_id: RefundId,
}

/// Payload of the notification task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTask {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub channel: String,
    pub recipient: Option<String>,
}

/// Builds the reserve-stock step task.
pub fn reserve_stock_task(order_id: OrderId) -> TaskSpec {
    TaskSpec::new(TASK_RESERVE_STOCK, json!({ "order_id": order_id }))
        .with_timeout(Duration::from_secs(60))
}

/// Builds the process-payment step task.
pub fn process_payment_task(order_id: OrderId) -> TaskSpec {
    TaskSpec::new(TASK_PROCESS_PAYMENT, json!({ "order_id": order_id }))
        .with_timeout(Duration::from_secs(120))
}

/// Builds the finalize step task.
pub fn finalize_order_task(order_id: OrderId) -> TaskSpec {
    TaskSpec::new(TASK_FINALIZE_ORDER, json!({ "order_id": order_id }))
        .with_timeout(Duration::from_secs(60))
}

/// Builds the rollback compensation task.
pub fn rollback_order_task(order_id: OrderId) -> TaskSpec {
    TaskSpec::new(TASK_ROLLBACK_ORDER, json!({ "order_id": order_id }))
        .with_timeout(Duration::from_secs(60))
}

/// Builds the refund settlement task.
pub fn process_refund_task(refund_id: RefundId) -> TaskSpec {
    TaskSpec::new(TASK_PROCESS_REFUND, json!({ "refund_id": refund_id }))
        .with_timeout(Duration::from_secs(120))
}

/// Builds a delayed notification task.
pub fn notification_task(order_id: OrderId, kind: NotificationKind, delay: Duration) -> TaskSpec {
    TaskSpec::new(
        TASK_SEND_NOTIFICATION,
        json!({
            "order_id": order_id,
            "kind": kind,
            "channel": "log",
            "recipient": null,
        }),
    )
    .with_timeout(Duration::from_secs(60))
    .with_delay(delay)
}

/// Everything the saga handlers need, bundled for registration.
pub struct SagaDeps<D> {
    pub store: Arc<D>,
    pub queue: Arc<TaskQueue>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub events: Arc<dyn EventSink>,
    pub config: SagaConfig,
}

impl<D: Datastore + 'static> SagaDeps<D> {
    /// Registers every saga handler under its task name.
    pub fn register_handlers(&self, registry: &mut HandlerRegistry) {
        registry.register(
            TASK_RESERVE_STOCK,
            Arc::new(ReserveStock::new(self.store.clone(), self.config.clone())),
        );
        registry.register(
            TASK_PROCESS_PAYMENT,
            Arc::new(ProcessPayment::new(
                self.store.clone(),
                self.gateway.clone(),
            )),
        );
        registry.register(
            TASK_FINALIZE_ORDER,
            Arc::new(FinalizeOrder::new(
                self.store.clone(),
                self.queue.clone(),
                self.events.clone(),
                self.config.clone(),
            )),
        );
        registry.register(
            TASK_ROLLBACK_ORDER,
            Arc::new(RollbackOrder::new(
                self.store.clone(),
                self.queue.clone(),
                self.config.clone(),
            )),
        );
        registry.register(
            TASK_PROCESS_REFUND,
            Arc::new(ProcessRefund::new(
                self.store.clone(),
                self.gateway.clone(),
                self.events.clone(),
            )),
        );
        registry.register(
            TASK_SEND_NOTIFICATION,
            Arc::new(SendNotification::new(
                self.store.clone(),
                self.notifier.clone(),
            )),
        );
    }
}
