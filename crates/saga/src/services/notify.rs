//! Notification dispatch contract.
//!
//! The core only enqueues notification requests; delivery (email, log
//! sink) belongs to a collaborator behind the [`Notifier`] trait.

use std::sync::RwLock;

use async_trait::async_trait;
use common::OrderId;
use domain::Order;
use serde::{Deserialize, Serialize};

/// Whether an order finished successfully or was rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Success,
    Failed,
}

impl NotificationKind {
    /// Returns the kind as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Failed => "failed",
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Fire-and-forget notification dispatch.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        order: &Order,
        kind: NotificationKind,
        channel: &str,
        recipient: Option<&str>,
    );
}

/// Notifier that writes a structured log line per notification.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl LogNotifier {
    /// Creates a new log notifier.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(
        &self,
        order: &Order,
        kind: NotificationKind,
        channel: &str,
        recipient: Option<&str>,
    ) {
        tracing::info!(
            order_ref = %order.order_ref,
            customer_id = %order.customer_id,
            status = %order.status,
            total_amount = %order.total_amount,
            kind = %kind,
            channel,
            recipient,
            "order notification"
        );
    }
}

/// Notifier that records every call, for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: RwLock<Vec<(OrderId, NotificationKind)>>,
}

impl RecordingNotifier {
    /// Creates a new recording notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded notifications in dispatch order.
    pub fn sent(&self) -> Vec<(OrderId, NotificationKind)> {
        self.sent.read().unwrap().clone()
    }

    /// How many notifications of `kind` were recorded for the order.
    pub fn count_for(&self, order_id: OrderId, kind: NotificationKind) -> usize {
        self.sent
            .read()
            .unwrap()
            .iter()
            .filter(|(id, k)| *id == order_id && *k == kind)
            .count()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(
        &self,
        order: &Order,
        kind: NotificationKind,
        _channel: &str,
        _recipient: Option<&str>,
    ) {
        self.sent.write().unwrap().push((order.id, kind));
    }
}
