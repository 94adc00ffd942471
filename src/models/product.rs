use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use validator::Validate;

use crate::models::Money;

pub const UNKNOWN_PRODUCT_NAME: &str = "Unknown";

/// A tracked product, ready to be checked. Identity is the url.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub url: String,
    pub threshold: Money,
}

/// One raw record of the catalog file. Every field is optional so that a
/// half-filled entry is skipped rather than failing the whole catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Written either as a JSON number or as a numeric string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold_inr: Option<serde_json::Value>,
    /// Fields we do not read, kept so a rewrite of the file loses nothing.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingUrl,
    MissingThreshold,
    InvalidThreshold(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingUrl => write!(f, "missing url"),
            SkipReason::MissingThreshold => write!(f, "missing threshold"),
            SkipReason::InvalidThreshold(raw) => write!(f, "invalid threshold {}", raw),
        }
    }
}

impl CatalogEntry {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(UNKNOWN_PRODUCT_NAME)
    }

    pub fn threshold(&self) -> Result<Money, SkipReason> {
        let raw = match &self.threshold_inr {
            None | Some(serde_json::Value::Null) => return Err(SkipReason::MissingThreshold),
            Some(raw) => raw,
        };
        let parsed = match raw {
            serde_json::Value::Number(n) => Money::parse_amount(&n.to_string()),
            serde_json::Value::String(s) => Money::parse_amount(s),
            _ => None,
        };
        parsed.ok_or_else(|| SkipReason::InvalidThreshold(raw.to_string()))
    }

    /// Turns the raw entry into a checkable product, or explains why it
    /// has to be skipped this cycle.
    pub fn to_product(&self) -> Result<Product, SkipReason> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(SkipReason::MissingUrl)?;
        let threshold = self.threshold()?;
        Ok(Product {
            name: self.display_name().to_string(),
            url: url.to_string(),
            threshold,
        })
    }
}

/// The catalog document: `{ "products": [...], "check_interval_seconds": n }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub products: Vec<CatalogEntry>,
    /// Kept raw: a value that is not a positive number falls back to the
    /// configured interval instead of rejecting the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_interval_seconds: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Catalog {
    /// The catalog's own poll interval, if it sets a usable one.
    /// Fractional seconds are honoured.
    pub fn check_interval(&self) -> Option<Duration> {
        let raw = self.check_interval_seconds.as_ref()?;
        let interval = raw
            .as_f64()
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        if interval.is_none() && !raw.is_null() {
            tracing::warn!("Ignoring check_interval_seconds {}", raw);
        }
        interval
    }

    pub fn has_trackable(&self) -> bool {
        self.products.iter().any(|p| p.to_product().is_ok())
    }

    /// Entries that can be checked. The rest are logged and left out.
    pub fn tracked(&self) -> Vec<Product> {
        self.products
            .iter()
            .filter_map(|entry| match entry.to_product() {
                Ok(product) => Some(product),
                Err(reason) => {
                    tracing::warn!("Skipping catalog entry {}: {}", entry.display_name(), reason);
                    None
                }
            })
            .collect()
    }
}

/// Input for adding a product to the catalog.
#[derive(Debug, Clone, Validate)]
pub struct NewProduct {
    #[validate(length(min = 1, message = "name must not be empty"))]
    pub name: String,
    #[validate(url(message = "url must be an absolute http(s) url"))]
    pub url: String,
    pub threshold: Money,
}

impl NewProduct {
    pub fn into_entry(self) -> CatalogEntry {
        let amount = self.threshold.amount();
        let threshold = if amount.fract().is_zero() {
            amount
                .trunc()
                .to_string()
                .parse::<u64>()
                .map(serde_json::Value::from)
                .unwrap_or_else(|_| serde_json::Value::String(amount.to_string()))
        } else {
            serde_json::Value::String(amount.to_string())
        };
        CatalogEntry {
            name: Some(self.name),
            url: Some(self.url),
            threshold_inr: Some(threshold),
            extra: Map::new(),
        }
    }
}
