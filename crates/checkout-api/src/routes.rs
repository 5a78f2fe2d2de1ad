//! # Routes
//!
//! Axum router configuration for the checkout API.

use crate::handlers;
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Create the main application router
///
/// Routes:
/// - Shopping:
///   - GET    /api/v1/products - List active products
///   - GET    /api/v1/cart - Cart preview
///   - POST   /api/v1/cart/items - Add a cart line
///   - DELETE /api/v1/cart - Clear the cart
///   - POST   /api/v1/orders - Create order from cart
///   - GET    /api/v1/orders, /api/v1/orders/{order_id}
///
/// - Payments:
///   - POST /api/v1/payments/initiate
///   - POST /api/v1/payments/verify-razorpay
///   - POST /api/v1/payments/demo/complete/{order_id}
///   - GET  /api/v1/payments/{payment_id}
///   - POST /api/v1/payments/{payment_id}/reconcile
///
/// - Exit gate:
///   - POST /api/v1/exit-qr/generate
///   - POST /api/v1/exit-qr/verify
///
/// - Webhooks:
///   - POST /webhook/payments - Demo and Razorpay settlement
pub fn create_router(state: AppState) -> Router {
    // Browser clients and gate scanners come from different origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let shop_routes = Router::new()
        .route("/products", get(handlers::list_products))
        .route("/cart", get(handlers::get_cart).delete(handlers::clear_cart))
        .route("/cart/items", post(handlers::add_cart_item))
        .route("/orders", post(handlers::create_order).get(handlers::list_orders))
        .route("/orders/{order_id}", get(handlers::get_order));

    let payment_routes = Router::new()
        .route("/initiate", post(handlers::initiate_payment))
        .route("/verify-razorpay", post(handlers::verify_razorpay))
        .route("/demo/complete/{order_id}", post(handlers::demo_complete))
        .route("/{payment_id}", get(handlers::payment_status))
        .route("/{payment_id}/reconcile", post(handlers::reconcile_payment));

    let exit_routes = Router::new()
        .route("/generate", post(handlers::generate_exit_qr))
        .route("/verify", post(handlers::verify_exit_qr));

    let api_routes = shop_routes
        .nest("/payments", payment_routes)
        .nest("/exit-qr", exit_routes);

    // Webhook routes (raw body, signature checked in the handler)
    let webhook_routes = Router::new().route("/payments", post(handlers::payment_webhook));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/", get(handlers::health))
        .nest("/api/v1", api_routes)
        .nest("/webhook", webhook_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
