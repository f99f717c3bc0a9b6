//! Stock reservation record.

use chrono::{DateTime, Utc};
use common::{OrderId, ReservationId, Sku};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a stock reservation.
///
/// `Committed` is terminal: once an order finalizes, its reservations can
/// never return to `Reserved` or be `Released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    /// Stock has been debited and is being held for the order.
    Reserved,

    /// The order finalized; the held stock is consumed (terminal).
    Committed,

    /// The hold was undone and stock credited back (terminal).
    Released,
}

impl ReservationStatus {
    /// Returns true if the reservation can still be committed.
    pub fn can_commit(self) -> bool {
        matches!(self, ReservationStatus::Reserved)
    }

    /// Returns true if the reservation can still be released.
    pub fn can_release(self) -> bool {
        matches!(self, ReservationStatus::Reserved)
    }

    /// Returns the status name as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Reserved => "reserved",
            ReservationStatus::Committed => "committed",
            ReservationStatus::Released => "released",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hold on product stock, owned by exactly one order.
///
/// One reservation exists per (order, SKU) pair; the reserve operation is
/// keyed on that pair so redelivered reserve tasks never duplicate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockReservation {
    pub id: ReservationId,
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
    pub status: ReservationStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StockReservation {
    /// Creates a freshly reserved hold.
    pub fn reserved(
        order_id: OrderId,
        sku: Sku,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            order_id,
            sku,
            quantity,
            status: ReservationStatus::Reserved,
            expires_at,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_reserved_can_commit_or_release() {
        assert!(ReservationStatus::Reserved.can_commit());
        assert!(ReservationStatus::Reserved.can_release());

        assert!(!ReservationStatus::Committed.can_commit());
        assert!(!ReservationStatus::Committed.can_release());
        assert!(!ReservationStatus::Released.can_commit());
        assert!(!ReservationStatus::Released.can_release());
    }

    #[test]
    fn test_reserved_constructor() {
        let order_id = OrderId::new();
        let expires = Utc::now() + chrono::Duration::minutes(15);
        let reservation = StockReservation::reserved(order_id, Sku::new("SKU-001"), 2, expires);

        assert_eq!(reservation.order_id, order_id);
        assert_eq!(reservation.status, ReservationStatus::Reserved);
        assert_eq!(reservation.quantity, 2);
    }
}
