use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Money, Observation, Product};

/// A rendered alert, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn price_alert(product: &Product, price: Money, observation: &Observation) -> Self {
        let subject = format!("Price Alert: {}", product.name);
        let body = format!(
            "PRICE ALERT: {}\nPrice: {}\nThreshold: {}\nStatus: {}\n{}",
            product.name,
            price,
            product.threshold,
            observation.stock_label(),
            product.url,
        );
        Notification { subject, body }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub error: Option<String>,
}

impl NotificationResult {
    pub fn sent(message_id: impl Into<String>) -> Self {
        NotificationResult {
            success: true,
            message_id: Some(message_id.into()),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        NotificationResult {
            success: false,
            message_id: None,
            error: Some(error.into()),
        }
    }
}

/// Delivery channel for alerts (email, Discord, ...).
///
/// A returned error and `success == false` are treated the same by the
/// caller: the alert is not recorded and will be retried next cycle.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> crate::Result<NotificationResult>;
}
