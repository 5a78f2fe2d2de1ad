//! # checkout-core
//!
//! Order, payment and exit-pass lifecycle for the smart checkout platform.
//!
//! This crate provides:
//! - `Store` holding the inventory ledger, carts, orders, payments and exit passes
//! - `OrderService` for converting carts into priced orders
//! - `PaymentStrategy` trait and the simulated `DemoPaymentStrategy` backend
//! - `PaymentService` for initiation, confirmation and reconciliation
//! - `SettlementProcessor` for idempotent settlement of normalized events
//! - `ExitPassService` for issuing and consuming single-use exit passes
//! - `CheckoutError` for typed error handling
//!
//! ## Example
//!
//! ```rust,ignore
//! use checkout_core::{OrderService, PaymentService, Store};
//!
//! let store = Arc::new(Store::new());
//! store.seed_products(catalog.into_products()).await?;
//! store.add_to_cart(user_id, product_id, 2).await?;
//!
//! let order = orders.create_order(user_id).await?;
//! let payment = payments.initiate_payment(user_id, order.order.id, "upi", false).await?;
//!
//! // settlement arrives via webhook, then:
//! let pass = exit_passes.issue(user_id, order.order.id).await?;
//! ```

pub mod cart;
pub mod demo;
pub mod error;
pub mod exit_pass;
pub mod order;
pub mod order_service;
pub mod payment;
pub mod payment_service;
pub mod product;
pub mod qr;
pub mod settlement;
pub mod store;
pub mod strategy;

// Re-exports for convenience
pub use cart::{Cart, CartLine, CartLineView, CartView};
pub use demo::{parse_demo_notification, DemoConfig, DemoPaymentStrategy, DEMO_TXN_PREFIX};
pub use error::{CheckoutError, CheckoutResult};
pub use exit_pass::{
    ExitClaims, ExitPass, ExitPassConfig, ExitPassService, ExitStatus, ExitTokenCodec,
    ExitVerification, GateLine, GateOrderDetail, IssuedExitPass, EXIT_PASS_TYPE,
};
pub use order::{
    generate_order_number, is_valid_order_number, tax_on, Order, OrderItem, OrderStatus,
    OrderTotals, ORDER_PAYMENT_WINDOW_MINUTES, TAX_RATE_BPS,
};
pub use order_service::{OrderDetail, OrderService};
pub use payment::{
    Payment, PaymentIntent, PaymentProvider, PaymentRequest, PaymentStatus, SettlementEvent,
    SettlementKind,
};
pub use payment_service::{InitiatedPayment, PaymentService, PaymentView, SettledOrder};
pub use product::{CatalogEntry, Currency, Price, Product, ProductCatalog};
pub use qr::{QrRenderer, SvgQrRenderer};
pub use settlement::{
    LoggingNotifier, SettlementNotice, SettlementNotifier, SettlementOutcome, SettlementProcessor,
};
pub use store::{StockDecrement, Store, Tables, DEFAULT_LOCK_TIMEOUT};
pub use strategy::{BoxedPaymentStrategy, PaymentStrategy};
