//! Domain layer for the fulfillment system.
//!
//! Plain-data records for the five entities the saga and refund flows
//! mutate, plus the status state machines that guard every transition:
//! - [`Order`] with [`OrderStatus`]
//! - [`Product`] (per-SKU stock counter)
//! - [`StockReservation`] with [`ReservationStatus`]
//! - [`Payment`] with [`PaymentStatus`]
//! - [`Refund`] with [`RefundStatus`]

pub mod order;
pub mod payment;
pub mod product;
pub mod refund;
pub mod reservation;

pub use order::{Order, OrderDraft, OrderError, OrderStatus};
pub use payment::{Payment, PaymentStatus};
pub use product::Product;
pub use refund::{Refund, RefundDraft, RefundStatus, RefundType};
pub use reservation::{ReservationStatus, StockReservation};
