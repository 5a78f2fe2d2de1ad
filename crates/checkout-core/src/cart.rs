//! # Cart Aggregate
//!
//! Per-user collection of (product, quantity) lines. Lines hold no price;
//! prices are captured from the inventory ledger when the order is created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::product::Price;

/// A single cart line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: Uuid,
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

/// A user's cart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    /// Add a line, merging with an existing line for the same product.
    /// Returns the resulting quantity for that product, or `None` (cart
    /// unchanged) when the merged quantity would overflow.
    pub fn add(&mut self, product_id: Uuid, quantity: u32, now: DateTime<Utc>) -> Option<u32> {
        match self.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => {
                line.quantity = line.quantity.checked_add(quantity)?;
                Some(line.quantity)
            }
            None => {
                self.lines.push(CartLine {
                    product_id,
                    quantity,
                    added_at: now,
                });
                Some(quantity)
            }
        }
    }

    /// Quantity already in the cart for a product
    pub fn quantity_of(&self, product_id: Uuid) -> u32 {
        self.lines
            .iter()
            .find(|l| l.product_id == product_id)
            .map(|l| l.quantity)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// Priced view of one cart line
#[derive(Debug, Clone, Serialize)]
pub struct CartLineView {
    pub product_id: Uuid,
    pub product_name: String,
    pub product_sku: String,
    pub price: Price,
    pub quantity: u32,
    pub subtotal: Price,
}

/// Priced view of a cart (preview only; the order re-prices at commit time)
#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub items: Vec<CartLineView>,
    pub subtotal: Price,
    pub tax: Price,
    pub total: Price,
    pub items_count: u32,
}
