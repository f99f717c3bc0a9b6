//! Refund record and status state machine.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, RefundId};
use serde::{Deserialize, Serialize};

/// Whether the refund covers part of or the whole remaining balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundType {
    Partial,
    Full,
}

impl RefundType {
    /// Returns the type name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundType::Partial => "partial",
            RefundType::Full => "full",
        }
    }
}

impl std::fmt::Display for RefundType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a refund.
///
/// Legal transitions:
/// ```text
/// Pending ──► Processing ──► Completed
///    │            │
///    ├──► Cancelled (user, only while Pending)
///    │            │
///    └────────────┴──► Failed ──► Pending (explicit operator retry)
///                         │
///                         └──► Processing (queue redelivery)
/// ```
/// `Completed` and `Cancelled` are terminal. The `Failed → Pending` edge is
/// taken only through the retry entry point, never automatically; the
/// `Failed → Processing` edge exists so the task queue's own redelivery of
/// a declined attempt can re-enter processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    /// Validated and persisted, awaiting asynchronous settlement.
    #[default]
    Pending,

    /// Settlement in flight at the gateway.
    Processing,

    /// Money returned; counts against the order's refundable balance
    /// (terminal).
    Completed,

    /// Gateway declined or validation failed during processing.
    Failed,

    /// Withdrawn by the requester before processing began (terminal).
    Cancelled,
}

impl RefundStatus {
    /// Returns true if `next` is a legal transition from this status.
    pub fn can_transition_to(self, next: RefundStatus) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Pending, Cancelled)
                | (Pending, Failed)
                | (Processing, Completed)
                | (Processing, Failed)
                | (Failed, Processing)
                | (Failed, Pending)
        )
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, RefundStatus::Completed | RefundStatus::Cancelled)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processing => "processing",
            RefundStatus::Completed => "completed",
            RefundStatus::Failed => "failed",
            RefundStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Input for creating a refund in `Pending` status.
#[derive(Debug, Clone)]
pub struct RefundDraft {
    pub refund_ref: String,
    pub order_id: OrderId,
    pub order_ref: String,
    pub customer_id: String,
    pub refund_type: RefundType,
    pub amount: Money,
    pub original_amount: Money,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub metadata: serde_json::Value,
}

/// A refund against a completed order.
///
/// Invariant (enforced by the store at completion time): the sum of
/// `amount` over all `Completed` refunds of an order never exceeds the
/// order's `total_amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    /// Unique generated reference (e.g. `REF-ORD-0001-A7KX2P`).
    pub refund_ref: String,
    pub order_id: OrderId,
    pub order_ref: String,
    pub customer_id: String,
    pub refund_type: RefundType,
    pub amount: Money,
    /// Snapshot of the order total at request time.
    pub original_amount: Money,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub status: RefundStatus,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub requested_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
}

impl Refund {
    /// Creates a new refund in `Pending` status.
    pub fn pending(draft: RefundDraft) -> Self {
        Self {
            id: RefundId::new(),
            refund_ref: draft.refund_ref,
            order_id: draft.order_id,
            order_ref: draft.order_ref,
            customer_id: draft.customer_id,
            refund_type: draft.refund_type,
            amount: draft.amount,
            original_amount: draft.original_amount,
            reason: draft.reason,
            description: draft.description,
            status: RefundStatus::Pending,
            transaction_id: None,
            error_message: None,
            requested_at: Utc::now(),
            processed_at: None,
            metadata: draft.metadata,
        }
    }

    /// Fraction of the original order amount this refund covers, in percent.
    pub fn percentage_of_original(&self) -> f64 {
        if self.original_amount.cents() <= 0 {
            return 0.0;
        }
        self.amount.cents() as f64 / self.original_amount.cents() as f64 * 100.0
    }
}
