//! # Product Types
//!
//! Money and product types for the inventory ledger.
//! The seed catalog is loaded from `config/products.toml`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Supported currencies (ISO 4217)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Currency {
    INR,
    USD,
}

impl Currency {
    /// Returns the ISO 4217 currency code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::INR => "INR",
            Currency::USD => "USD",
        }
    }

    /// Returns the number of decimal places for this currency
    pub fn decimal_places(&self) -> u8 {
        2
    }

    /// Convert a decimal amount to the smallest currency unit (paise, cents)
    pub fn to_smallest_unit(&self, amount: f64) -> i64 {
        let multiplier = 10_f64.powi(self.decimal_places() as i32);
        (amount * multiplier).round() as i64
    }

    /// Convert from smallest unit back to decimal
    pub fn from_smallest_unit(&self, amount: i64) -> f64 {
        let divisor = 10_f64.powi(self.decimal_places() as i32);
        amount as f64 / divisor
    }

    pub fn parse(code: &str) -> Option<Self> {
        match code.to_ascii_uppercase().as_str() {
            "INR" => Some(Currency::INR),
            "USD" => Some(Currency::USD),
            _ => None,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Currency::INR
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Price with amount in smallest currency unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in smallest currency unit (paise for INR)
    pub amount: i64,
    /// Currency
    #[serde(default)]
    pub currency: Currency,
}

impl Price {
    /// Create a new price from decimal amount
    pub fn new(amount: f64, currency: Currency) -> Self {
        Self {
            amount: currency.to_smallest_unit(amount),
            currency,
        }
    }

    /// Create a price from smallest unit
    pub fn from_minor(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::from_minor(0, currency)
    }

    /// Get the decimal amount
    pub fn as_decimal(&self) -> f64 {
        self.currency.from_smallest_unit(self.amount)
    }

    /// Multiply by a line quantity
    pub fn times(&self, quantity: u32) -> Self {
        Self::from_minor(self.amount * quantity as i64, self.currency)
    }

    /// Format for display (e.g., "₹126.00")
    pub fn display(&self) -> String {
        let symbol = match self.currency {
            Currency::INR => "₹",
            Currency::USD => "$",
        };
        format!("{}{:.2}", symbol, self.as_decimal())
    }
}

/// A product row in the inventory ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier
    pub id: Uuid,

    /// Stock keeping unit (unique)
    pub sku: String,

    /// Display name
    pub name: String,

    /// Unit price
    pub price: Price,

    /// Units on hand
    #[serde(default)]
    pub stock: u32,

    /// Whether this product can be added to a cart
    #[serde(default = "default_true")]
    pub active: bool,

    /// Optional category label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Product {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, price: Price, stock: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            sku: sku.into(),
            name: name.into(),
            price,
            stock,
            active: true,
            category: None,
        }
    }

    /// Builder: set category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Builder: mark inactive
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }
}

/// One entry of the seed catalog file
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub sku: String,
    pub name: String,
    /// Price in major units (rupees)
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(default)]
    pub category: Option<String>,
}

impl CatalogEntry {
    pub fn into_product(self, currency: Currency) -> Product {
        Product {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            sku: self.sku,
            name: self.name,
            price: Price::new(self.price, currency),
            stock: self.stock,
            active: self.active,
            category: self.category,
        }
    }
}

/// Seed catalog (loaded from config)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductCatalog {
    #[serde(default)]
    pub currency: Currency,
    #[serde(default)]
    pub products: Vec<CatalogEntry>,
}

impl ProductCatalog {
    /// Load catalog from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(toml_str)
    }

    /// Convert every entry into a ledger product
    pub fn into_products(self) -> Vec<Product> {
        let currency = self.currency;
        self.products
            .into_iter()
            .map(|entry| entry.into_product(currency))
            .collect()
    }
}
