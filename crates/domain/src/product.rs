//! Product record with its per-SKU stock counter.

use common::{Money, Sku};
use serde::{Deserialize, Serialize};

/// A product and its available stock.
///
/// `stock_quantity` must never go negative; every debit and credit happens
/// inside the store's atomic write block so concurrent reservations of the
/// same SKU are serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub sku: Sku,
    pub name: String,
    pub unit_price: Money,
    pub stock_quantity: u32,
}

impl Product {
    /// Creates a new product record.
    pub fn new(
        sku: impl Into<Sku>,
        name: impl Into<String>,
        unit_price: Money,
        stock_quantity: u32,
    ) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            unit_price,
            stock_quantity,
        }
    }
}
