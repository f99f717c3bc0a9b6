//! Payment attempt record.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, PaymentId};
use serde::{Deserialize, Serialize};

/// Status of a single charge attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Created, gateway call in flight.
    Processing,

    /// Gateway accepted the charge.
    Completed,

    /// Gateway declined the charge.
    Failed,
}

impl PaymentStatus {
    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One charge attempt against an order.
///
/// Every retried `ProcessPayment` task creates a fresh row; the order's
/// effective payment is the most recently created one, earlier rows are
/// kept for audit only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub amount: Money,
    pub currency: String,
    pub status: PaymentStatus,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a new attempt in `Processing` status.
    pub fn processing(order_id: OrderId, amount: Money, currency: impl Into<String>) -> Self {
        Self {
            id: PaymentId::new(),
            order_id,
            amount,
            currency: currency.into(),
            status: PaymentStatus::Processing,
            transaction_id: None,
            error_message: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_constructor() {
        let order_id = OrderId::new();
        let payment = Payment::processing(order_id, Money::from_cents(2000), "USD");

        assert_eq!(payment.order_id, order_id);
        assert_eq!(payment.status, PaymentStatus::Processing);
        assert!(payment.transaction_id.is_none());
        assert!(payment.error_message.is_none());
    }

    #[test]
    fn test_wire_format() {
        let json = serde_json::to_string(&PaymentStatus::Processing).unwrap();
        assert_eq!(json, "\"processing\"");
    }
}
