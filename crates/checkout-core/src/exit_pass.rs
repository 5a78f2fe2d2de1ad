//! # Exit Passes
//!
//! Signed, time-bounded, single-use credentials bound to a paid order.
//!
//! A pass is an HS256 token carrying the order id, order number, amount and
//! type `exit_qr`. Verification never fails outward: every problem becomes a
//! structured status for the gate scanner. Expiry is enforced twice, against
//! the token's own `exp` claim and against the stored expiry.
//!
//! ```text
//! issue ──► [unused] ──verify──► [used]      replay ──► already_used
//!              │
//!              └── now > expires_at ──► expired
//! ```

use crate::error::{CheckoutError, CheckoutResult};
use crate::order::OrderStatus;
use crate::product::Price;
use crate::qr::QrRenderer;
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Value of the `typ` claim
pub const EXIT_PASS_TYPE: &str = "exit_qr";

/// Minimum signing secret length, bytes
pub const MIN_SECRET_LEN: usize = 32;

/// Exit pass settings
#[derive(Clone)]
pub struct ExitPassConfig {
    secret: Vec<u8>,
    pub ttl: Duration,
}

impl std::fmt::Debug for ExitPassConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitPassConfig")
            .field("secret", &"[redacted]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl ExitPassConfig {
    /// Load configuration from environment variables.
    ///
    /// Required env vars:
    /// - `QR_SECRET` (at least 32 bytes)
    ///
    /// Optional env vars:
    /// - `QR_EXPIRY_MINUTES` (default 10)
    pub fn from_env() -> CheckoutResult<Self> {
        let secret = env::var("QR_SECRET")
            .map_err(|_| CheckoutError::Configuration("QR_SECRET not set".to_string()))?;

        let minutes = match env::var("QR_EXPIRY_MINUTES") {
            Ok(raw) => raw.parse::<i64>().map_err(|_| {
                CheckoutError::Configuration("QR_EXPIRY_MINUTES must be a number".to_string())
            })?,
            Err(_) => 10,
        };

        Self::new(secret, Duration::minutes(minutes))
    }

    pub fn new(secret: impl Into<Vec<u8>>, ttl: Duration) -> CheckoutResult<Self> {
        let secret = secret.into();
        if secret.len() < MIN_SECRET_LEN {
            return Err(CheckoutError::Configuration(format!(
                "QR_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if ttl <= Duration::zero() {
            return Err(CheckoutError::Configuration(
                "QR_EXPIRY_MINUTES must be positive".to_string(),
            ));
        }
        Ok(Self { secret, ttl })
    }
}

/// Claims carried by a pass token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExitClaims {
    /// Order id
    pub sub: String,
    pub order_number: String,
    /// Major units
    pub amount: f64,
    pub typ: String,
    pub iat: i64,
    pub exp: i64,
    /// Pass id
    pub jti: String,
}

/// Signs and checks pass tokens
#[derive(Clone)]
pub struct ExitTokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl ExitTokenCodec {
    pub fn new(config: &ExitPassConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(&config.secret),
            decoding: DecodingKey::from_secret(&config.secret),
        }
    }

    pub fn mint(&self, claims: &ExitClaims) -> CheckoutResult<String> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| CheckoutError::Internal(format!("token signing failed: {}", e)))
    }

    /// Check the signature and shape. Expiry is left to the caller so an
    /// expired pass can be reported as such rather than as invalid.
    pub fn decode(&self, token: &str) -> Option<ExitClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        match decode::<ExitClaims>(token, &self.decoding, &validation) {
            Ok(data) if data.claims.typ == EXIT_PASS_TYPE => Some(data.claims),
            Ok(data) => {
                debug!("Token has wrong type {:?}", data.claims.typ);
                None
            }
            Err(e) => {
                debug!("Token rejected: {}", e);
                None
            }
        }
    }
}

/// Stored exit pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitPass {
    pub id: Uuid,
    pub order_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ExitPass {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && now <= self.expires_at
    }
}

/// Result of issuing a pass
#[derive(Debug, Clone, Serialize)]
pub struct IssuedExitPass {
    pub order_id: Uuid,
    pub order_number: String,
    pub token: String,
    /// `data:image/svg+xml;base64,...`
    pub image: String,
    pub expires_at: DateTime<Utc>,
    /// An existing unused pass was returned
    pub reused: bool,
}

/// Gate scanner verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Authorized,
    Expired,
    AlreadyUsed,
    Invalid,
}

/// One line on the gate display
#[derive(Debug, Clone, Serialize)]
pub struct GateLine {
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    pub price: Price,
}

/// Order detail shown at the gate
#[derive(Debug, Clone, Serialize)]
pub struct GateOrderDetail {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub subtotal: Price,
    pub tax: Price,
    pub total: Price,
    pub items_count: u32,
    pub items: Vec<GateLine>,
}

/// Structured verification response
#[derive(Debug, Clone, Serialize)]
pub struct ExitVerification {
    pub status: ExitStatus,
    pub valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<GateOrderDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<DateTime<Utc>>,
}

impl ExitVerification {
    pub fn rejected(status: ExitStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            valid: false,
            message: message.into(),
            order: None,
            verified_at: None,
        }
    }
}

/// Issues and consumes exit passes
#[derive(Clone)]
pub struct ExitPassService {
    store: Arc<Store>,
    codec: ExitTokenCodec,
    ttl: Duration,
    renderer: Arc<dyn QrRenderer>,
}

impl ExitPassService {
    pub fn new(store: Arc<Store>, config: &ExitPassConfig, renderer: Arc<dyn QrRenderer>) -> Self {
        Self {
            store,
            codec: ExitTokenCodec::new(config),
            ttl: config.ttl,
            renderer,
        }
    }

    /// Issue a pass for a paid order, or return the live one already issued
    #[instrument(skip(self))]
    pub async fn issue(&self, user_id: Uuid, order_id: Uuid) -> CheckoutResult<IssuedExitPass> {
        let now = Utc::now();
        let mut tables = self.store.write().await?;

        let order = tables
            .order(order_id)
            .filter(|o| o.user_id == user_id)
            .ok_or(CheckoutError::OrderNotFound)?;
        let status = order.effective_status(now);
        if !status.is_settled() {
            return Err(CheckoutError::OrderNotPaid {
                status: status.to_string(),
            });
        }
        let order_number = order.order_number.clone();
        let amount = order.total.as_decimal();

        if let Some(pass) = tables.current_exit_pass(order_id).filter(|p| p.is_live(now)) {
            debug!("Returning live exit pass for {}", order_number);
            return Ok(IssuedExitPass {
                order_id,
                order_number,
                image: self.renderer.render(&pass.token)?,
                token: pass.token.clone(),
                expires_at: pass.expires_at,
                reused: true,
            });
        }

        let pass_id = Uuid::new_v4();
        let expires_at = now + self.ttl;
        let token = self.codec.mint(&ExitClaims {
            sub: order_id.to_string(),
            order_number: order_number.clone(),
            amount,
            typ: EXIT_PASS_TYPE.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            jti: pass_id.to_string(),
        })?;
        let image = self.renderer.render(&token)?;

        tables.insert_exit_pass(ExitPass {
            id: pass_id,
            order_id,
            token: token.clone(),
            expires_at,
            used: false,
            used_at: None,
            verified_by: None,
            created_at: now,
        });
        if let Some(order) = tables.order_mut(order_id) {
            order.transition(OrderStatus::Verified, now);
        }

        info!("Exit pass issued for {} (expires {})", order_number, expires_at);

        Ok(IssuedExitPass {
            order_id,
            order_number,
            token,
            image,
            expires_at,
            reused: false,
        })
    }

    /// Check and consume a pass. Never errors; the checks and the
    /// used-flag write happen under one write guard.
    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: &str, staff_id: &str) -> ExitVerification {
        let Some(claims) = self.codec.decode(token) else {
            return ExitVerification::rejected(ExitStatus::Invalid, "Invalid QR code");
        };

        let mut tables = match self.store.write().await {
            Ok(tables) => tables,
            Err(e) => {
                warn!("Exit verification could not reach store: {}", e);
                return ExitVerification::rejected(
                    ExitStatus::Invalid,
                    "Verification temporarily unavailable, please retry",
                );
            }
        };

        let now = Utc::now();
        let Some(pass) = tables.exit_pass(token) else {
            return ExitVerification::rejected(ExitStatus::Invalid, "QR code not found");
        };

        if pass.used {
            let when = pass
                .used_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "earlier".to_string());
            info!("Replay of used exit pass for order {}", claims.order_number);
            return ExitVerification::rejected(
                ExitStatus::AlreadyUsed,
                format!("QR code already used at {}", when),
            );
        }

        if now > pass.expires_at || now.timestamp() > claims.exp {
            return ExitVerification::rejected(ExitStatus::Expired, "QR code expired");
        }

        let order_id = pass.order_id;
        let Some(order) = tables.order(order_id).cloned() else {
            return ExitVerification::rejected(ExitStatus::Invalid, "Order not found");
        };
        let items = tables
            .order_items(order_id)
            .iter()
            .map(|i| GateLine {
                name: i.product_name.clone(),
                sku: i.product_sku.clone(),
                quantity: i.quantity,
                price: i.price,
            })
            .collect();

        if let Some(pass) = tables.exit_pass_mut(token) {
            pass.used = true;
            pass.used_at = Some(now);
            pass.verified_by = Some(staff_id.to_string());
        }

        info!("Exit authorized for {} by {}", order.order_number, staff_id);

        ExitVerification {
            status: ExitStatus::Authorized,
            valid: true,
            message: "Exit authorized".to_string(),
            order: Some(GateOrderDetail {
                order_id,
                order_number: order.order_number,
                user_id: order.user_id,
                subtotal: order.subtotal,
                tax: order.tax,
                total: order.total,
                items_count: order.items_count,
                items,
            }),
            verified_at: Some(now),
        }
    }
}
