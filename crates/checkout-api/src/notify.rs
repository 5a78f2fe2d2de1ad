//! Outbound settlement notices to the downstream automation endpoint.

use async_trait::async_trait;
use checkout_core::{CheckoutError, CheckoutResult, SettlementNotice, SettlementNotifier};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Bound on one notice delivery
pub const NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts each notice as JSON to a fixed URL
pub struct HttpNotifier {
    client: Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> CheckoutResult<Self> {
        let client = Client::builder()
            .timeout(NOTIFY_TIMEOUT)
            .build()
            .map_err(|e| {
                CheckoutError::Configuration(format!("Failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SettlementNotifier for HttpNotifier {
    #[instrument(skip(self, notice), fields(order = %notice.order_number))]
    async fn notify(&self, notice: &SettlementNotice) -> CheckoutResult<()> {
        let response = self
            .client
            .post(&self.url)
            .json(notice)
            .send()
            .await
            .map_err(|e| CheckoutError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CheckoutError::NetworkError(format!(
                "notify endpoint answered {}",
                status
            )));
        }

        debug!("Settlement notice delivered");
        Ok(())
    }
}
