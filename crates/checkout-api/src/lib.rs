//! # checkout-api
//!
//! HTTP API layer for the smart checkout platform.
//!
//! This crate provides:
//! - Axum-based HTTP server
//! - REST endpoints for cart, orders, payments and exit passes
//! - Settlement webhook for the demo and Razorpay backends
//! - Outbound settlement notices
//!
//! ## Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | `/health` | Health check |
//! | GET | `/api/v1/products` | List products |
//! | GET/DELETE | `/api/v1/cart` | Cart preview / clear |
//! | POST | `/api/v1/cart/items` | Add cart line |
//! | POST/GET | `/api/v1/orders` | Create / list orders |
//! | GET | `/api/v1/orders/{order_id}` | Get order |
//! | POST | `/api/v1/payments/initiate` | Start payment |
//! | POST | `/api/v1/payments/verify-razorpay` | Client-side confirmation |
//! | POST | `/api/v1/payments/demo/complete/{order_id}` | Demo settlement |
//! | GET | `/api/v1/payments/{payment_id}` | Payment status |
//! | POST | `/api/v1/payments/{payment_id}/reconcile` | Reconcile |
//! | POST | `/api/v1/exit-qr/generate` | Issue exit pass |
//! | POST | `/api/v1/exit-qr/verify` | Gate scan |
//! | POST | `/webhook/payments` | Settlement webhook |

pub mod auth;
pub mod handlers;
pub mod notify;
pub mod routes;
pub mod state;

pub use routes::create_router;
pub use state::{AppConfig, AppState};
