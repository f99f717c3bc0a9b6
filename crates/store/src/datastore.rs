//! The datastore trait all saga and refund flows go through.

use async_trait::async_trait;
use chrono::Duration;
use common::{Money, OrderId, PaymentId, RefundId, Sku};
use domain::{Order, OrderStatus, Payment, Product, Refund, StockReservation};

use crate::Result;

/// Repository and inventory-ledger interface over the system's single
/// logical datastore.
///
/// Every mutating method is atomic with respect to the others; in
/// particular all stock debits and credits for one SKU are serialized, so
/// concurrent reservations can never drive `stock_quantity` negative.
/// Status-changing methods verify the current status first (optimistic
/// guard) so redelivered tasks cannot regress an entity.
#[async_trait]
pub trait Datastore: Send + Sync {
    // --- orders ---

    /// Persists a new order. Fails on a duplicate business reference.
    async fn insert_order(&self, order: Order) -> Result<Order>;

    /// Loads an order by id.
    async fn order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Loads an order by its business reference.
    async fn order_by_ref(&self, order_ref: &str) -> Result<Option<Order>>;

    /// Moves an order to `to`, enforcing the order state machine.
    ///
    /// A transition to the current status is a no-op success, tolerating
    /// duplicate task delivery.
    async fn transition_order(&self, id: OrderId, to: OrderStatus) -> Result<Order>;

    // --- inventory ledger ---

    /// Creates or replaces a product record.
    async fn upsert_product(&self, product: Product) -> Result<()>;

    /// Loads a product by SKU.
    async fn product(&self, sku: &Sku) -> Result<Option<Product>>;

    /// Reserves stock for the order, idempotently per (order, SKU).
    ///
    /// An existing reservation for the pair is returned untouched; no
    /// second debit happens. Otherwise the stock check, the debit, and the
    /// reservation-row insert all happen in one atomic block: either all
    /// of them or none. An unknown SKU gets a product row seeded with
    /// `seed_stock` units first.
    async fn reserve_stock(
        &self,
        order: &Order,
        ttl: Duration,
        seed_stock: u32,
    ) -> Result<StockReservation>;

    /// Marks all still-reserved reservations of the order committed.
    /// Stock is untouched (it was debited at reserve time). Returns how
    /// many reservations were committed.
    async fn commit_reservations(&self, order_id: OrderId) -> Result<usize>;

    /// Releases every still-reserved reservation of the order, crediting
    /// its quantity back to the product. Committed reservations are never
    /// touched, and calling this repeatedly is safe. Returns the released
    /// reservations.
    async fn release_reservations(&self, order_id: OrderId) -> Result<Vec<StockReservation>>;

    /// Lists all reservations belonging to the order.
    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<StockReservation>>;

    // --- payments ---

    /// Persists a new payment attempt.
    async fn insert_payment(&self, payment: Payment) -> Result<Payment>;

    /// Marks a processing payment completed with its gateway transaction id.
    async fn complete_payment(&self, id: PaymentId, transaction_id: String) -> Result<Payment>;

    /// Marks a processing payment failed with the gateway's reason.
    async fn fail_payment(&self, id: PaymentId, error: String) -> Result<Payment>;

    /// Returns the order's most recently created payment attempt, if any.
    async fn latest_payment(&self, order_id: OrderId) -> Result<Option<Payment>>;

    // --- refunds ---

    /// Persists a new refund. Fails on a duplicate refund reference.
    async fn insert_refund(&self, refund: Refund) -> Result<Refund>;

    /// Loads a refund by id.
    async fn refund(&self, id: RefundId) -> Result<Option<Refund>>;

    /// Loads a refund by its generated reference.
    async fn refund_by_ref(&self, refund_ref: &str) -> Result<Option<Refund>>;

    /// Lists all refunds belonging to the order, oldest first.
    async fn refunds_for_order(&self, order_id: OrderId) -> Result<Vec<Refund>>;

    /// Sums the amounts of the order's completed refunds, optionally
    /// excluding one refund (so a refund being processed is never counted
    /// against itself).
    async fn completed_refund_total(
        &self,
        order_id: OrderId,
        excluding: Option<RefundId>,
    ) -> Result<Money>;

    /// Moves a refund into `Processing`. Re-entry from `Processing` (a
    /// redelivered task) and `Failed` (a queue retry after a decline) are
    /// allowed; completed or cancelled refunds are not.
    async fn begin_refund_processing(&self, id: RefundId) -> Result<Refund>;

    /// Completes a processing refund, stamping the transaction id and
    /// `processed_at`.
    ///
    /// The refundable-balance invariant is re-checked inside the same
    /// atomic block: if completing this refund would push the order's
    /// completed total past `total_amount`, the call fails and nothing
    /// changes. Only `Processing -> Completed` is accepted, which makes
    /// the completion (and the downstream event emitted on it) happen at
    /// most once per refund.
    async fn complete_refund(&self, id: RefundId, transaction_id: String) -> Result<Refund>;

    /// Marks a refund failed with an error message.
    async fn fail_refund(&self, id: RefundId, error: String) -> Result<Refund>;

    /// Cancels a refund that is still pending.
    async fn cancel_refund(&self, id: RefundId) -> Result<Refund>;

    /// Resets a failed refund to `Pending` for an operator-requested
    /// retry, clearing the previous error.
    async fn reset_refund_for_retry(&self, id: RefundId) -> Result<Refund>;
}
