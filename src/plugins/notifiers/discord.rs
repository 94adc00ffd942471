use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

use crate::config::DiscordConfig as DiscordSettings;
use crate::plugins::traits::{Notification, NotificationResult, Notifier};
use crate::utils::error::{AppError, Result};

/// Discord rejects message content above this many characters.
const MAX_CONTENT_CHARS: usize = 2000;

#[derive(Debug, Clone)]
pub struct DiscordConfig {
    pub webhook_url: String,
    pub username: Option<String>,
}

impl DiscordConfig {
    pub fn from_settings(settings: &DiscordSettings) -> std::result::Result<Self, String> {
        let webhook_url = settings
            .webhook_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or("Missing webhook_url")?;
        Ok(DiscordConfig {
            webhook_url,
            username: Some(settings.username.clone()),
        })
    }
}

pub struct DiscordNotifier {
    client: Client,
    config: DiscordConfig,
}

impl DiscordNotifier {
    pub fn new(config: DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| AppError::Notification {
                notifier: "discord".to_string(),
                message: e.to_string(),
            })?;
        Ok(DiscordNotifier { client, config })
    }

    fn create_webhook_payload(&self, notification: &Notification) -> serde_json::Value {
        let content: String = format!("**{}**\n{}", notification.subject, notification.body)
            .chars()
            .take(MAX_CONTENT_CHARS)
            .collect();

        let mut payload = json!({ "content": content });
        if let Some(username) = &self.config.username {
            payload["username"] = json!(username);
        }
        payload
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationResult> {
        let payload = self.create_webhook_payload(notification);

        let response = match self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Ok(NotificationResult::failed(e.to_string())),
        };

        if response.status().is_success() {
            Ok(NotificationResult::sent(format!(
                "discord-{}",
                chrono::Utc::now().timestamp()
            )))
        } else {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            Ok(NotificationResult::failed(format!(
                "Discord API error {}: {}",
                status, error_text
            )))
        }
    }
}
