//! Queued notification requests.

use std::sync::Arc;

use async_trait::async_trait;
use queue::{TaskHandler, TaskResult};
use store::Datastore;

use crate::jobs::NotificationTask;
use crate::services::notify::Notifier;

/// Hands a notification request to the configured [`Notifier`].
///
/// Delivery itself is a collaborator concern; this handler only loads the
/// order snapshot and forwards it, fire-and-forget.
pub struct SendNotification<D> {
    store: Arc<D>,
    notifier: Arc<dyn Notifier>,
}

impl<D: Datastore> SendNotification<D> {
    pub fn new(store: Arc<D>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }
}

#[async_trait]
impl<D: Datastore + 'static> TaskHandler for SendNotification<D> {
    async fn execute(&self, payload: serde_json::Value) -> TaskResult {
        let task: NotificationTask = serde_json::from_value(payload)?;

        let Some(order) = self
            .store
            .order(task.order_id)
            .await
            .map_err(queue::TaskError::new)?
        else {
            tracing::error!(order_id = %task.order_id, "order not found, dropping notification");
            return Ok(());
        };

        self.notifier
            .notify(&order, task.kind, &task.channel, task.recipient.as_deref())
            .await;
        metrics::counter!("notifications_dispatched").increment(1);
        Ok(())
    }
}
