//! # Checkout Store
//!
//! In-process transactional store holding the inventory ledger, carts,
//! orders, payments and exit passes.
//!
//! Every unit of work runs under one write guard, so a unit of work is
//! atomic and serialized with every other writer. Units validate before
//! they mutate: an error returned mid-way leaves the tables untouched.
//! Lock acquisition is bounded; a timeout surfaces as the retryable
//! `StorageUnavailable` error.

use crate::cart::{Cart, CartLine, CartLineView, CartView};
use crate::error::{CheckoutError, CheckoutResult};
use crate::exit_pass::ExitPass;
use crate::order::{tax_on, Order, OrderItem};
use crate::payment::Payment;
use crate::product::{Currency, Price, Product};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};
use uuid::Uuid;

/// Default bound on waiting for the store
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a conditional stock decrement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockDecrement {
    /// Stock reduced; remaining units
    Applied { remaining: u32 },
    /// Not enough stock; nothing changed
    Insufficient { available: u32 },
    /// Product no longer in the ledger
    Missing,
}

/// All tables guarded by the store lock
#[derive(Debug, Default)]
pub struct Tables {
    products: HashMap<Uuid, Product>,
    carts: HashMap<Uuid, Cart>,
    orders: HashMap<Uuid, Order>,
    order_items: HashMap<Uuid, Vec<OrderItem>>,
    order_numbers: HashSet<String>,
    payments: HashMap<Uuid, Payment>,
    payment_by_order: HashMap<Uuid, Uuid>,
    exit_passes: HashMap<String, ExitPass>,
    current_pass: HashMap<Uuid, String>,
}

impl Tables {
    // ----- inventory ledger -----

    pub fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.get(&id)
    }

    pub fn upsert_product(&mut self, product: Product) {
        self.products.insert(product.id, product);
    }

    pub fn products(&self) -> impl Iterator<Item = &Product> {
        self.products.values()
    }

    /// Decrement only if enough stock remains (compare-and-set on the stock column)
    pub fn decrement_stock(&mut self, id: Uuid, quantity: u32) -> StockDecrement {
        match self.products.get_mut(&id) {
            None => StockDecrement::Missing,
            Some(product) if product.stock < quantity => StockDecrement::Insufficient {
                available: product.stock,
            },
            Some(product) => {
                product.stock -= quantity;
                StockDecrement::Applied {
                    remaining: product.stock,
                }
            }
        }
    }

    /// Remove whatever stock is left, returning how many units were taken
    pub fn drain_stock(&mut self, id: Uuid) -> u32 {
        match self.products.get_mut(&id) {
            Some(product) => std::mem::take(&mut product.stock),
            None => 0,
        }
    }

    // ----- cart aggregate -----

    pub fn cart_lines(&self, user_id: Uuid) -> Vec<CartLine> {
        self.carts
            .get(&user_id)
            .map(|cart| cart.lines.clone())
            .unwrap_or_default()
    }

    pub fn cart(&self, user_id: Uuid) -> Option<&Cart> {
        self.carts.get(&user_id)
    }

    pub fn cart_mut(&mut self, user_id: Uuid) -> &mut Cart {
        self.carts.entry(user_id).or_default()
    }

    pub fn clear_cart(&mut self, user_id: Uuid) {
        if let Some(cart) = self.carts.get_mut(&user_id) {
            cart.clear();
        }
    }

    // ----- orders -----

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn order_mut(&mut self, id: Uuid) -> Option<&mut Order> {
        self.orders.get_mut(&id)
    }

    pub fn order_items(&self, order_id: Uuid) -> &[OrderItem] {
        self.order_items
            .get(&order_id)
            .map(|items| items.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_order_number(&self, number: &str) -> bool {
        self.order_numbers.contains(number)
    }

    pub fn insert_order(&mut self, order: Order, items: Vec<OrderItem>) {
        self.order_numbers.insert(order.order_number.clone());
        self.order_items.insert(order.id, items);
        self.orders.insert(order.id, order);
    }

    /// A user's orders, newest first
    pub fn orders_for_user(&self, user_id: Uuid) -> Vec<&Order> {
        let mut orders: Vec<&Order> = self
            .orders
            .values()
            .filter(|o| o.user_id == user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders
    }

    // ----- payments -----

    pub fn payment(&self, id: Uuid) -> Option<&Payment> {
        self.payments.get(&id)
    }

    pub fn payment_for_order(&self, order_id: Uuid) -> Option<&Payment> {
        self.payment_by_order
            .get(&order_id)
            .and_then(|id| self.payments.get(id))
    }

    pub fn payment_for_order_mut(&mut self, order_id: Uuid) -> Option<&mut Payment> {
        let id = *self.payment_by_order.get(&order_id)?;
        self.payments.get_mut(&id)
    }

    pub fn payment_by_transaction(&self, transaction_id: &str) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.transaction_id.as_deref() == Some(transaction_id))
    }

    /// Insert a payment; one payment per order, so an existing row for the
    /// same order is replaced.
    pub fn upsert_payment(&mut self, payment: Payment) {
        if let Some(previous) = self.payment_by_order.insert(payment.order_id, payment.id) {
            if previous != payment.id {
                self.payments.remove(&previous);
            }
        }
        self.payments.insert(payment.id, payment);
    }

    // ----- exit passes -----

    pub fn exit_pass(&self, token: &str) -> Option<&ExitPass> {
        self.exit_passes.get(token)
    }

    pub fn exit_pass_mut(&mut self, token: &str) -> Option<&mut ExitPass> {
        self.exit_passes.get_mut(token)
    }

    /// The pass currently bound to an order (at most one)
    pub fn current_exit_pass(&self, order_id: Uuid) -> Option<&ExitPass> {
        self.current_pass
            .get(&order_id)
            .and_then(|token| self.exit_passes.get(token))
    }

    /// Bind a new pass to its order. Earlier passes stay on record so a
    /// replayed token is still recognized.
    pub fn insert_exit_pass(&mut self, pass: ExitPass) {
        self.current_pass.insert(pass.order_id, pass.token.clone());
        self.exit_passes.insert(pass.token.clone(), pass);
    }
}

/// Shared, lock-guarded store
#[derive(Debug)]
pub struct Store {
    tables: RwLock<Tables>,
    lock_timeout: Duration,
    currency: Currency,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            currency: Currency::INR,
        }
    }

    /// Builder: bound on waiting for the lock
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Builder: currency used for empty totals
    pub fn with_currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn currency(&self) -> Currency {
        self.currency
    }

    /// Begin a read-only unit of work
    pub async fn read(&self) -> CheckoutResult<RwLockReadGuard<'_, Tables>> {
        tokio::time::timeout(self.lock_timeout, self.tables.read())
            .await
            .map_err(|_| {
                CheckoutError::StorageUnavailable("timed out waiting for read".to_string())
            })
    }

    /// Begin a read-write unit of work
    pub async fn write(&self) -> CheckoutResult<RwLockWriteGuard<'_, Tables>> {
        tokio::time::timeout(self.lock_timeout, self.tables.write())
            .await
            .map_err(|_| {
                CheckoutError::StorageUnavailable("timed out waiting for write".to_string())
            })
    }

    /// Load products into the ledger
    pub async fn seed_products(&self, products: Vec<Product>) -> CheckoutResult<usize> {
        let mut tables = self.write().await?;
        let count = products.len();
        for product in products {
            tables.upsert_product(product);
        }
        info!("Seeded {} products", count);
        Ok(count)
    }

    pub async fn product(&self, id: Uuid) -> CheckoutResult<Option<Product>> {
        Ok(self.read().await?.product(id).cloned())
    }

    /// Active products, sorted by SKU
    pub async fn active_products(&self) -> CheckoutResult<Vec<Product>> {
        let tables = self.read().await?;
        let mut products: Vec<Product> = tables.products().filter(|p| p.active).cloned().collect();
        products.sort_by(|a, b| a.sku.cmp(&b.sku));
        Ok(products)
    }

    /// Add a cart line; the merged quantity may not exceed current stock
    pub async fn add_to_cart(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: u32,
    ) -> CheckoutResult<CartView> {
        if quantity == 0 {
            return Err(CheckoutError::InvalidRequest(
                "Quantity must be at least 1".to_string(),
            ));
        }

        let mut tables = self.write().await?;
        let product = tables
            .product(product_id)
            .filter(|p| p.active)
            .cloned()
            .ok_or(CheckoutError::ProductNotFound { product_id })?;

        let wanted = tables
            .cart(user_id)
            .map(|cart| cart.quantity_of(product_id))
            .unwrap_or(0)
            .checked_add(quantity)
            .ok_or_else(|| CheckoutError::InvalidRequest("Quantity is too large".to_string()))?;
        if wanted > product.stock {
            return Err(CheckoutError::InsufficientStock {
                product_name: product.name,
                requested: wanted,
                available: product.stock,
            });
        }

        tables
            .cart_mut(user_id)
            .add(product_id, quantity, Utc::now())
            .ok_or_else(|| CheckoutError::InvalidRequest("Quantity is too large".to_string()))?;
        debug!(
            "Cart line updated: user={}, sku={}, qty={}",
            user_id, product.sku, wanted
        );
        Ok(self.build_cart_view(&tables, user_id))
    }

    /// Drop every line in a user's cart
    pub async fn clear_cart(&self, user_id: Uuid) -> CheckoutResult<()> {
        self.write().await?.clear_cart(user_id);
        debug!("Cart cleared: user={}", user_id);
        Ok(())
    }

    /// Priced preview of a user's cart
    pub async fn cart_view(&self, user_id: Uuid) -> CheckoutResult<CartView> {
        let tables = self.read().await?;
        Ok(self.build_cart_view(&tables, user_id))
    }

    fn build_cart_view(&self, tables: &Tables, user_id: Uuid) -> CartView {
        let items: Vec<CartLineView> = tables
            .cart_lines(user_id)
            .into_iter()
            .filter_map(|line| {
                let product = tables.product(line.product_id)?;
                Some(CartLineView {
                    product_id: product.id,
                    product_name: product.name.clone(),
                    product_sku: product.sku.clone(),
                    price: product.price,
                    quantity: line.quantity,
                    subtotal: product.price.times(line.quantity),
                })
            })
            .collect();

        let currency = items.first().map(|i| i.price.currency).unwrap_or(self.currency);
        let subtotal: i64 = items.iter().map(|i| i.subtotal.amount).sum();
        let tax = tax_on(subtotal);
        CartView {
            items_count: items.iter().map(|i| i.quantity).sum(),
            subtotal: Price::from_minor(subtotal, currency),
            tax: Price::from_minor(tax, currency),
            total: Price::from_minor(subtotal + tax, currency),
            items,
        }
    }
}
