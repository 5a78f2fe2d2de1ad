//! # Order Service
//!
//! Converts a user's cart into a priced order and serves order reads.
//!
//! Creation runs as one unit of work under the store's write lock: stock is
//! re-validated against the live ledger, items are captured at the current
//! price, the order number is made unique and the cart is cleared. Nothing
//! is written until every check has passed.

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::{generate_order_number, Order, OrderItem, OrderStatus, OrderTotals};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Number re-rolls before giving up on a unique order number
const ORDER_NUMBER_ATTEMPTS: usize = 16;

/// An order together with its captured line items
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Order lifecycle entry points
#[derive(Clone)]
pub struct OrderService {
    store: Arc<Store>,
}

impl OrderService {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Create a pending order from the user's cart
    #[instrument(skip(self))]
    pub async fn create_order(&self, user_id: Uuid) -> CheckoutResult<OrderDetail> {
        let now = Utc::now();
        let mut tables = self.store.write().await?;

        let lines = tables.cart_lines(user_id);
        if lines.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let order_id = Uuid::new_v4();
        let mut items = Vec::with_capacity(lines.len());
        for line in &lines {
            let product = tables
                .product(line.product_id)
                .filter(|p| p.active)
                .ok_or(CheckoutError::ProductNotFound {
                    product_id: line.product_id,
                })?;
            if line.quantity > product.stock {
                return Err(CheckoutError::InsufficientStock {
                    product_name: product.name.clone(),
                    requested: line.quantity,
                    available: product.stock,
                });
            }
            items.push(OrderItem::capture(order_id, product, line.quantity));
        }

        let currency = items
            .first()
            .map(|i| i.price.currency)
            .unwrap_or_else(|| self.store.currency());
        let totals = OrderTotals::from_items(&items, currency);

        let order_number = unique_order_number(now, |n| tables.has_order_number(n))?;
        let order = Order::pending(order_id, user_id, order_number, totals, now);

        tables.insert_order(order.clone(), items.clone());
        tables.clear_cart(user_id);

        info!(
            "Order created: {} ({}), total={}, items={}",
            order.order_number,
            order.id,
            order.total.display(),
            order.items_count
        );

        Ok(OrderDetail { order, items })
    }

    /// Fetch one of the caller's orders. A foreign order reads as not found.
    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> CheckoutResult<OrderDetail> {
        let now = Utc::now();
        let tables = self.store.read().await?;
        let order = tables
            .order(order_id)
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound)?;

        Ok(OrderDetail {
            order: observed(order, now),
            items: tables.order_items(order_id).to_vec(),
        })
    }

    /// The caller's orders, newest first
    pub async fn list_orders(&self, user_id: Uuid) -> CheckoutResult<Vec<Order>> {
        let now = Utc::now();
        let tables = self.store.read().await?;
        Ok(tables
            .orders_for_user(user_id)
            .into_iter()
            .map(|o| observed(o, now))
            .collect())
    }
}

/// Copy of an order with lazy expiry applied to its status
fn observed(order: &Order, now: DateTime<Utc>) -> Order {
    let mut order = order.clone();
    order.status = order.effective_status(now);
    order
}

/// Draw order numbers until one is unused
fn unique_order_number(
    now: DateTime<Utc>,
    taken: impl Fn(&str) -> bool,
) -> CheckoutResult<String> {
    for _ in 0..ORDER_NUMBER_ATTEMPTS {
        let candidate = generate_order_number(now);
        if !taken(&candidate) {
            return Ok(candidate);
        }
        warn!("Order number collision on {}, re-rolling", candidate);
    }
    Err(CheckoutError::Internal(
        "could not allocate a unique order number".to_string(),
    ))
}

impl OrderDetail {
    pub fn status(&self) -> OrderStatus {
        self.order.status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::is_valid_order_number;
    use crate::product::{Currency, Price, Product};
    use chrono::Duration;
    use std::collections::HashSet;

    async fn setup(stock: u32) -> (OrderService, Arc<Store>, Uuid) {
        let store = Arc::new(Store::new());
        let milk = Product::new("MILK001", "Amul Milk 1L", Price::new(60.0, Currency::INR), stock);
        let id = milk.id;
        store.seed_products(vec![milk]).await.unwrap();
        (OrderService::new(store.clone()), store, id)
    }

    #[tokio::test]
    async fn test_create_order_prices_and_clears_cart() {
        let (service, store, milk) = setup(10).await;
        let user = Uuid::new_v4();
        store.add_to_cart(user, milk, 2).await.unwrap();

        let detail = service.create_order(user).await.unwrap();
        assert_eq!(detail.order.subtotal.as_decimal(), 120.0);
        assert_eq!(detail.order.tax.as_decimal(), 6.0);
        assert_eq!(detail.order.total.as_decimal(), 126.0);
        assert_eq!(detail.order.items_count, 2);
        assert_eq!(detail.status(), OrderStatus::Pending);
        assert!(is_valid_order_number(&detail.order.order_number));
        assert_eq!(
            detail.order.expires_at,
            Some(detail.order.created_at + Duration::minutes(15))
        );
        assert_eq!(detail.items[0].product_sku, "MILK001");

        assert!(store.cart_view(user).await.unwrap().items.is_empty());
        // stock is only taken at settlement
        assert_eq!(store.product(milk).await.unwrap().unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let (service, _, _) = setup(10).await;
        let err = service.create_order(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));
    }

    #[tokio::test]
    async fn test_stock_revalidated_at_commit() {
        let (service, store, milk) = setup(5).await;
        let user = Uuid::new_v4();
        store.add_to_cart(user, milk, 4).await.unwrap();

        // stock drops after the line was added
        store.write().await.unwrap().decrement_stock(milk, 3);

        let err = service.create_order(user).await.unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::InsufficientStock { requested: 4, available: 2, .. }
        ));

        // no partial effects
        assert_eq!(store.cart_view(user).await.unwrap().items_count, 4);
        assert_eq!(store.product(milk).await.unwrap().unwrap().stock, 2);
        assert!(service.list_orders(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_order_reads_as_not_found() {
        let (service, store, milk) = setup(10).await;
        let owner = Uuid::new_v4();
        store.add_to_cart(owner, milk, 1).await.unwrap();
        let detail = service.create_order(owner).await.unwrap();

        let err = service
            .get_order(Uuid::new_v4(), detail.order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::OrderNotFound));
        assert!(service.get_order(owner, detail.order.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let (service, store, milk) = setup(10).await;
        let user = Uuid::new_v4();
        let mut ids = Vec::new();
        for _ in 0..3 {
            store.add_to_cart(user, milk, 1).await.unwrap();
            ids.push(service.create_order(user).await.unwrap().order.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed: Vec<Uuid> = service
            .list_orders(user)
            .await
            .unwrap()
            .iter()
            .map(|o| o.id)
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_read_reports_lazy_expiry() {
        let (service, store, milk) = setup(10).await;
        let user = Uuid::new_v4();
        store.add_to_cart(user, milk, 1).await.unwrap();
        let id = service.create_order(user).await.unwrap().order.id;

        {
            let mut tables = store.write().await.unwrap();
            let order = tables.order_mut(id).unwrap();
            order.expires_at = Some(Utc::now() - Duration::minutes(1));
        }

        assert_eq!(
            service.get_order(user, id).await.unwrap().status(),
            OrderStatus::Expired
        );
    }

    #[test]
    fn test_order_number_collision_rerolls() {
        let now = Utc::now();
        let mut seen = HashSet::new();
        let first = unique_order_number(now, |_| false).unwrap();
        seen.insert(first.clone());

        let second = unique_order_number(now, |n| seen.contains(n)).unwrap();
        assert_ne!(first, second);

        assert!(unique_order_number(now, |_| true).is_err());
    }
}
