//! # Application State
//!
//! Shared state for the Axum application.
//! Every service is built once at startup and handed to handlers by reference;
//! the payment backend is chosen here from `PAYMENT_MODE` and never re-read.

use crate::notify::HttpNotifier;
use checkout_core::{
    BoxedPaymentStrategy, CheckoutError, CheckoutResult, DemoConfig, DemoPaymentStrategy,
    ExitPassConfig, ExitPassService, LoggingNotifier, OrderService, PaymentProvider,
    PaymentService, ProductCatalog, SettlementNotifier, SettlementProcessor, Store,
    SvgQrRenderer,
};
use checkout_razorpay::{RazorpayConfig, RazorpayStrategy};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Public base URL
    pub base_url: String,
    /// Environment (development, staging, production)
    pub environment: String,
    /// Payment backend
    pub payment_mode: PaymentProvider,
    /// Downstream automation endpoint for settlement notices
    pub notify_webhook_url: Option<String>,
    pub notify_enabled: bool,
    /// Seed catalog location; searched in the usual places when unset
    pub catalog_path: Option<String>,
    /// Bound on waiting for the store
    pub store_lock_timeout: Duration,
}

impl AppConfig {
    /// Load from environment variables
    pub fn from_env() -> CheckoutResult<Self> {
        dotenvy::dotenv().ok();

        let mode = std::env::var("PAYMENT_MODE").unwrap_or_else(|_| "demo".to_string());
        let payment_mode = PaymentProvider::from_mode(&mode).ok_or_else(|| {
            CheckoutError::Configuration(format!(
                "PAYMENT_MODE must be demo or razorpay, got {}",
                mode
            ))
        })?;

        let store_lock_timeout = match std::env::var("STORE_LOCK_TIMEOUT_MS") {
            Ok(raw) => Duration::from_millis(raw.parse().map_err(|_| {
                CheckoutError::Configuration("STORE_LOCK_TIMEOUT_MS must be a number".to_string())
            })?),
            Err(_) => checkout_core::DEFAULT_LOCK_TIMEOUT,
        };

        Ok(Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            payment_mode,
            notify_webhook_url: std::env::var("NOTIFY_WEBHOOK_URL")
                .ok()
                .filter(|u| !u.trim().is_empty()),
            notify_enabled: std::env::var("NOTIFY_ENABLED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
            catalog_path: std::env::var("CATALOG_PATH").ok(),
            store_lock_timeout,
        })
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port).parse().map_err(|e| {
            anyhow::anyhow!("Invalid socket address {}:{}: {}", self.host, self.port, e)
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: Arc<Store>,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub settlement: SettlementProcessor,
    pub exit_passes: ExitPassService,
    /// Secret for Razorpay-shaped webhooks; unset rejects them
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    /// Build every service from the environment and seed the catalog
    pub async fn from_env() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let (strategy, webhook_secret): (BoxedPaymentStrategy, Option<String>) =
            match config.payment_mode {
                PaymentProvider::Demo => {
                    let demo = DemoConfig::from_env()?;
                    info!(
                        "Demo payments: delay={:?}, failure_rate={}%",
                        demo.delay, demo.failure_rate
                    );
                    (
                        Arc::new(DemoPaymentStrategy::new(demo)),
                        std::env::var("RAZORPAY_WEBHOOK_SECRET").ok(),
                    )
                }
                PaymentProvider::Razorpay => {
                    let razorpay = RazorpayConfig::from_env()?;
                    if !razorpay.is_test_mode() {
                        info!("Razorpay live keys in use");
                    }
                    let secret = razorpay.webhook_secret.clone();
                    (Arc::new(RazorpayStrategy::new(razorpay)?), Some(secret))
                }
            };

        let notifier: Arc<dyn SettlementNotifier> =
            match (config.notify_enabled, config.notify_webhook_url.as_deref()) {
                (true, Some(url)) => Arc::new(HttpNotifier::new(url)?),
                (true, None) => {
                    warn!("NOTIFY_ENABLED is set but NOTIFY_WEBHOOK_URL is empty");
                    Arc::new(LoggingNotifier)
                }
                _ => Arc::new(LoggingNotifier),
            };

        let exit_config = ExitPassConfig::from_env()?;
        let catalog_path = config.catalog_path.clone();
        let state = Self::build(config, strategy, &exit_config, notifier, webhook_secret);

        let catalog = load_product_catalog(catalog_path.as_deref())?;
        state.store.seed_products(catalog.into_products()).await?;

        Ok(state)
    }

    /// Wire services from explicit parts
    pub fn build(
        config: AppConfig,
        strategy: BoxedPaymentStrategy,
        exit_config: &ExitPassConfig,
        notifier: Arc<dyn SettlementNotifier>,
        webhook_secret: Option<String>,
    ) -> Self {
        let store = Arc::new(Store::new().with_lock_timeout(config.store_lock_timeout));
        let settlement = SettlementProcessor::new(store.clone(), notifier);

        Self {
            orders: OrderService::new(store.clone()),
            payments: PaymentService::new(store.clone(), strategy, settlement.clone()),
            exit_passes: ExitPassService::new(
                store.clone(),
                exit_config,
                Arc::new(SvgQrRenderer::default()),
            ),
            settlement,
            store,
            webhook_secret: webhook_secret.map(Arc::from),
            config,
        }
    }
}

/// Load the seed catalog from config
fn load_product_catalog(explicit: Option<&str>) -> anyhow::Result<ProductCatalog> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;
        return parse_catalog(path, &content);
    }

    let config_paths = [
        "config/products.toml",
        "../config/products.toml",
        "../../config/products.toml",
    ];

    for path in config_paths {
        if let Ok(content) = std::fs::read_to_string(path) {
            return parse_catalog(path, &content);
        }
    }

    // Return empty catalog if no config found
    warn!("No product catalog found, starting with an empty ledger");
    Ok(ProductCatalog::default())
}

fn parse_catalog(path: &str, content: &str) -> anyhow::Result<ProductCatalog> {
    let catalog = ProductCatalog::from_toml(content)
        .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path, e))?;
    info!("Loaded {} products from {}", catalog.products.len(), path);
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_defaults() {
        // Clear env vars for test
        std::env::remove_var("HOST");
        std::env::remove_var("PORT");
        std::env::remove_var("PAYMENT_MODE");

        let config = AppConfig::from_env().unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8000);
        assert_eq!(config.payment_mode, PaymentProvider::Demo);
    }

    #[test]
    fn test_socket_addr() {
        let config = AppConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            environment: "test".to_string(),
            payment_mode: PaymentProvider::Demo,
            notify_webhook_url: None,
            notify_enabled: false,
            catalog_path: None,
            store_lock_timeout: Duration::from_secs(2),
        };

        let addr = config.socket_addr().unwrap();
        assert_eq!(addr.to_string(), "0.0.0.0:3000");
    }

    #[test]
    fn test_seed_catalog_parses() {
        let catalog = load_product_catalog(Some("../../config/products.toml")).unwrap();
        assert!(catalog.products.iter().any(|p| p.sku == "MILK001"));
    }
}
