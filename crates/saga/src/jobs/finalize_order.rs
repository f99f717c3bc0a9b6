//! Final saga step: commit reservations and complete the order.

use std::sync::Arc;

use async_trait::async_trait;
use common::OrderId;
use domain::{OrderStatus, PaymentStatus};
use queue::{TaskError, TaskHandler, TaskQueue, TaskResult};
use store::Datastore;

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::jobs::{OrderTask, QUEUE_NOTIFICATIONS, notification_task};
use crate::services::events::EventSink;
use crate::services::notify::NotificationKind;

/// Commits the order's reservations, moves it to `Completed`, announces
/// the completion downstream, and enqueues a delayed success
/// notification.
///
/// Requires the order's latest payment to be `Completed` — a defensive
/// check in case chain ordering assumptions are ever violated.
pub struct FinalizeOrder<D> {
    store: Arc<D>,
    queue: Arc<TaskQueue>,
    events: Arc<dyn EventSink>,
    config: SagaConfig,
}

impl<D: Datastore> FinalizeOrder<D> {
    pub fn new(
        store: Arc<D>,
        queue: Arc<TaskQueue>,
        events: Arc<dyn EventSink>,
        config: SagaConfig,
    ) -> Self {
        Self {
            store,
            queue,
            events,
            config,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self, order_id: OrderId) -> Result<(), SagaError> {
        let Some(order) = self.store.order(order_id).await? else {
            tracing::error!(%order_id, "order not found, dropping task");
            return Ok(());
        };
        tracing::info!(order_ref = %order.order_ref, "finalizing order");

        let payment = self.store.latest_payment(order_id).await?;
        if !matches!(&payment, Some(p) if p.status == PaymentStatus::Completed) {
            metrics::counter!("saga_step_failures", "step" => "finalize").increment(1);
            return Err(SagaError::PaymentIncomplete(order.order_ref));
        }

        let committed = self.store.commit_reservations(order_id).await?;
        let order = self
            .store
            .transition_order(order_id, OrderStatus::Completed)
            .await?;

        self.events.order_completed(&order).await;
        self.queue.enqueue(
            QUEUE_NOTIFICATIONS,
            notification_task(
                order_id,
                NotificationKind::Success,
                self.config.notification_delay,
            ),
        );

        metrics::counter!("orders_completed").increment(1);
        tracing::info!(order_ref = %order.order_ref, committed, "order finalized");
        Ok(())
    }
}

#[async_trait]
impl<D: Datastore + 'static> TaskHandler for FinalizeOrder<D> {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult {
        let task: OrderTask = serde_json::from_value(payload)?;
        self.run(task.order_id).await.map_err(TaskError::from)
    }
}
