//! Shared types for the fulfillment system.
//!
//! Identifier newtypes prevent mixing up the various UUID- and string-based
//! keys, and [`Money`] keeps all amounts in integer cents so refund
//! arithmetic never touches floating point.

pub mod ids;
pub mod money;

pub use ids::{OrderId, PaymentId, RefundId, ReservationId, Sku};
pub use money::Money;
