//! In-memory datastore implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use common::{Money, OrderId, PaymentId, RefundId, Sku};
use domain::{
    Order, OrderStatus, Payment, PaymentStatus, Product, Refund, RefundStatus, StockReservation,
};
use tokio::sync::RwLock;

use crate::datastore::Datastore;
use crate::error::{Result, StoreError};

#[derive(Default)]
struct Inner {
    orders: HashMap<OrderId, Order>,
    order_refs: HashMap<String, OrderId>,
    products: HashMap<Sku, Product>,
    reservations: Vec<StockReservation>,
    payments: Vec<Payment>,
    refunds: Vec<Refund>,
}

impl Inner {
    fn refund_mut(&mut self, id: RefundId) -> Result<&mut Refund> {
        self.refunds
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::RefundNotFound(id))
    }

    fn completed_refund_total(&self, order_id: OrderId, excluding: Option<RefundId>) -> Money {
        self.refunds
            .iter()
            .filter(|r| {
                r.order_id == order_id
                    && r.status == RefundStatus::Completed
                    && Some(r.id) != excluding
            })
            .map(|r| r.amount)
            .sum()
    }
}

/// In-memory [`Datastore`] backing the single logical datastore.
///
/// A single `RwLock` over the whole state serializes all writers; every
/// mutating method does its read-check-mutate sequence under one write
/// guard, which is what makes the per-SKU stock arithmetic and the
/// refundable-balance check atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl MemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of reservation rows across all orders.
    pub async fn reservation_count(&self) -> usize {
        self.inner.read().await.reservations.len()
    }

    /// Returns the number of payment rows across all orders.
    pub async fn payment_count(&self) -> usize {
        self.inner.read().await.payments.len()
    }
}

#[async_trait]
impl Datastore for MemoryStore {
    async fn insert_order(&self, order: Order) -> Result<Order> {
        let mut inner = self.inner.write().await;
        if inner.order_refs.contains_key(&order.order_ref) {
            return Err(StoreError::DuplicateOrderRef(order.order_ref));
        }
        inner.order_refs.insert(order.order_ref.clone(), order.id);
        inner.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.inner.read().await.orders.get(&id).cloned())
    }

    async fn order_by_ref(&self, order_ref: &str) -> Result<Option<Order>> {
        let inner = self.inner.read().await;
        Ok(inner
            .order_refs
            .get(order_ref)
            .and_then(|id| inner.orders.get(id))
            .cloned())
    }

    async fn transition_order(&self, id: OrderId, to: OrderStatus) -> Result<Order> {
        let mut inner = self.inner.write().await;
        let order = inner
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        if order.status == to {
            return Ok(order.clone());
        }
        if !order.status.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                entity: "order",
                reference: order.order_ref.clone(),
                from: order.status.to_string(),
                to: to.to_string(),
            });
        }
        order.status = to;
        Ok(order.clone())
    }

    async fn upsert_product(&self, product: Product) -> Result<()> {
        let mut inner = self.inner.write().await;
        inner.products.insert(product.sku.clone(), product);
        Ok(())
    }

    async fn product(&self, sku: &Sku) -> Result<Option<Product>> {
        Ok(self.inner.read().await.products.get(sku).cloned())
    }

    async fn reserve_stock(
        &self,
        order: &Order,
        ttl: Duration,
        seed_stock: u32,
    ) -> Result<StockReservation> {
        let mut inner = self.inner.write().await;

        // Idempotency: one reservation per (order, sku), whatever its state.
        if let Some(existing) = inner
            .reservations
            .iter()
            .find(|r| r.order_id == order.id && r.sku == order.sku)
        {
            return Ok(existing.clone());
        }

        let product = inner
            .products
            .entry(order.sku.clone())
            .or_insert_with(|| {
                Product::new(
                    order.sku.clone(),
                    order.product_name.clone(),
                    order.unit_price,
                    seed_stock,
                )
            });

        if product.stock_quantity < order.quantity {
            return Err(StoreError::InsufficientStock {
                sku: order.sku.clone(),
                available: product.stock_quantity,
                requested: order.quantity,
            });
        }

        product.stock_quantity -= order.quantity;
        let remaining = product.stock_quantity;
        let reservation = StockReservation::reserved(
            order.id,
            order.sku.clone(),
            order.quantity,
            Utc::now() + ttl,
        );
        inner.reservations.push(reservation.clone());
        tracing::debug!(
            sku = %reservation.sku,
            quantity = reservation.quantity,
            remaining,
            "stock debited"
        );
        Ok(reservation)
    }

    async fn commit_reservations(&self, order_id: OrderId) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut committed = 0;
        for reservation in inner
            .reservations
            .iter_mut()
            .filter(|r| r.order_id == order_id && r.status.can_commit())
        {
            reservation.status = domain::ReservationStatus::Committed;
            committed += 1;
        }
        Ok(committed)
    }

    async fn release_reservations(&self, order_id: OrderId) -> Result<Vec<StockReservation>> {
        let mut inner = self.inner.write().await;
        let mut credits: Vec<(Sku, u32)> = Vec::new();
        let mut released = Vec::new();

        for reservation in inner
            .reservations
            .iter_mut()
            .filter(|r| r.order_id == order_id && r.status.can_release())
        {
            reservation.status = domain::ReservationStatus::Released;
            credits.push((reservation.sku.clone(), reservation.quantity));
            released.push(reservation.clone());
        }

        for (sku, quantity) in credits {
            if let Some(product) = inner.products.get_mut(&sku) {
                product.stock_quantity += quantity;
                tracing::debug!(%sku, quantity, remaining = product.stock_quantity, "stock credited");
            }
        }

        Ok(released)
    }

    async fn reservations_for_order(&self, order_id: OrderId) -> Result<Vec<StockReservation>> {
        Ok(self
            .inner
            .read()
            .await
            .reservations
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn insert_payment(&self, payment: Payment) -> Result<Payment> {
        let mut inner = self.inner.write().await;
        inner.payments.push(payment.clone());
        Ok(payment)
    }

    async fn complete_payment(&self, id: PaymentId, transaction_id: String) -> Result<Payment> {
        let mut inner = self.inner.write().await;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::PaymentNotFound(id))?;

        match payment.status {
            PaymentStatus::Completed => Ok(payment.clone()),
            PaymentStatus::Processing => {
                payment.status = PaymentStatus::Completed;
                payment.transaction_id = Some(transaction_id);
                Ok(payment.clone())
            }
            PaymentStatus::Failed => Err(StoreError::InvalidTransition {
                entity: "payment",
                reference: id.to_string(),
                from: payment.status.to_string(),
                to: PaymentStatus::Completed.to_string(),
            }),
        }
    }

    async fn fail_payment(&self, id: PaymentId, error: String) -> Result<Payment> {
        let mut inner = self.inner.write().await;
        let payment = inner
            .payments
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::PaymentNotFound(id))?;

        match payment.status {
            PaymentStatus::Failed => Ok(payment.clone()),
            PaymentStatus::Processing => {
                payment.status = PaymentStatus::Failed;
                payment.error_message = Some(error);
                Ok(payment.clone())
            }
            PaymentStatus::Completed => Err(StoreError::InvalidTransition {
                entity: "payment",
                reference: id.to_string(),
                from: payment.status.to_string(),
                to: PaymentStatus::Failed.to_string(),
            }),
        }
    }

    async fn latest_payment(&self, order_id: OrderId) -> Result<Option<Payment>> {
        Ok(self
            .inner
            .read()
            .await
            .payments
            .iter()
            .rev()
            .find(|p| p.order_id == order_id)
            .cloned())
    }

    async fn insert_refund(&self, refund: Refund) -> Result<Refund> {
        let mut inner = self.inner.write().await;
        if inner.refunds.iter().any(|r| r.refund_ref == refund.refund_ref) {
            return Err(StoreError::DuplicateRefundRef(refund.refund_ref));
        }
        inner.refunds.push(refund.clone());
        Ok(refund)
    }

    async fn refund(&self, id: RefundId) -> Result<Option<Refund>> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn refund_by_ref(&self, refund_ref: &str) -> Result<Option<Refund>> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .find(|r| r.refund_ref == refund_ref)
            .cloned())
    }

    async fn refunds_for_order(&self, order_id: OrderId) -> Result<Vec<Refund>> {
        Ok(self
            .inner
            .read()
            .await
            .refunds
            .iter()
            .filter(|r| r.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn completed_refund_total(
        &self,
        order_id: OrderId,
        excluding: Option<RefundId>,
    ) -> Result<Money> {
        Ok(self
            .inner
            .read()
            .await
            .completed_refund_total(order_id, excluding))
    }

    async fn begin_refund_processing(&self, id: RefundId) -> Result<Refund> {
        let mut inner = self.inner.write().await;
        let refund = inner.refund_mut(id)?;

        match refund.status {
            RefundStatus::Processing => Ok(refund.clone()),
            RefundStatus::Pending | RefundStatus::Failed => {
                refund.status = RefundStatus::Processing;
                Ok(refund.clone())
            }
            RefundStatus::Completed | RefundStatus::Cancelled => {
                Err(StoreError::InvalidTransition {
                    entity: "refund",
                    reference: refund.refund_ref.clone(),
                    from: refund.status.to_string(),
                    to: RefundStatus::Processing.to_string(),
                })
            }
        }
    }

    async fn complete_refund(&self, id: RefundId, transaction_id: String) -> Result<Refund> {
        let mut inner = self.inner.write().await;

        let refund = inner
            .refunds
            .iter()
            .find(|r| r.id == id)
            .ok_or(StoreError::RefundNotFound(id))?;
        if refund.status != RefundStatus::Processing {
            return Err(StoreError::InvalidTransition {
                entity: "refund",
                reference: refund.refund_ref.clone(),
                from: refund.status.to_string(),
                to: RefundStatus::Completed.to_string(),
            });
        }

        // Final invariant check under the same guard that flips the status:
        // completed refunds for the order may never sum past its total.
        let order_id = refund.order_id;
        let amount = refund.amount;
        let already_completed = inner.completed_refund_total(order_id, Some(id));
        if let Some(order) = inner.orders.get(&order_id) {
            let refundable = order.total_amount.saturating_sub(already_completed);
            if amount > refundable {
                return Err(StoreError::RefundExceedsRefundable {
                    requested: amount,
                    refundable,
                });
            }
        }

        let refund = inner.refund_mut(id)?;
        refund.status = RefundStatus::Completed;
        refund.transaction_id = Some(transaction_id);
        refund.processed_at = Some(Utc::now());
        Ok(refund.clone())
    }

    async fn fail_refund(&self, id: RefundId, error: String) -> Result<Refund> {
        let mut inner = self.inner.write().await;
        let refund = inner.refund_mut(id)?;

        match refund.status {
            RefundStatus::Failed => Ok(refund.clone()),
            RefundStatus::Pending | RefundStatus::Processing => {
                refund.status = RefundStatus::Failed;
                refund.error_message = Some(error);
                Ok(refund.clone())
            }
            RefundStatus::Completed | RefundStatus::Cancelled => {
                Err(StoreError::InvalidTransition {
                    entity: "refund",
                    reference: refund.refund_ref.clone(),
                    from: refund.status.to_string(),
                    to: RefundStatus::Failed.to_string(),
                })
            }
        }
    }

    async fn cancel_refund(&self, id: RefundId) -> Result<Refund> {
        let mut inner = self.inner.write().await;
        let refund = inner.refund_mut(id)?;

        if refund.status != RefundStatus::Pending {
            return Err(StoreError::InvalidTransition {
                entity: "refund",
                reference: refund.refund_ref.clone(),
                from: refund.status.to_string(),
                to: RefundStatus::Cancelled.to_string(),
            });
        }
        refund.status = RefundStatus::Cancelled;
        Ok(refund.clone())
    }

    async fn reset_refund_for_retry(&self, id: RefundId) -> Result<Refund> {
        let mut inner = self.inner.write().await;
        let refund = inner.refund_mut(id)?;

        if refund.status != RefundStatus::Failed {
            return Err(StoreError::InvalidTransition {
                entity: "refund",
                reference: refund.refund_ref.clone(),
                from: refund.status.to_string(),
                to: RefundStatus::Pending.to_string(),
            });
        }
        refund.status = RefundStatus::Pending;
        refund.error_message = None;
        Ok(refund.clone())
    }
}
