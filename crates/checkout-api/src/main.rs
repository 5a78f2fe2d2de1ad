//! # Smart Checkout
//!
//! Self-checkout order, payment and exit-pass service.
//!
//! ## Usage
//!
//! ```bash
//! # Demo payments, no external accounts needed
//! export PAYMENT_MODE=demo
//! export QR_SECRET=change-me-to-at-least-32-bytes-of-secret
//!
//! # Run the server
//! smart-checkout
//! ```

use checkout_api::{routes, state::AppState};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    print_banner();

    let state = AppState::from_env().await?;

    let addr = state.config.socket_addr()?;
    let is_prod = state.config.is_production();

    info!("Environment: {}", state.config.environment);
    info!("Payment mode: {}", state.payments.provider());

    let app = routes::create_router(state);

    info!("Smart checkout starting on http://{}", addr);

    if !is_prod {
        info!("Health: http://{}/health", addr);
        info!("Orders: POST http://{}/api/v1/orders", addr);
        info!("Webhook: POST http://{}/webhook/payments", addr);
    }

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn print_banner() {
    println!(
        r#"
  Smart Checkout
  ━━━━━━━━━━━━━━━━━━━━━━━
  Scan, pay, walk out
  Version: {}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
