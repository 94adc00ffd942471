use async_trait::async_trait;

use crate::plugins::traits::{Notification, NotificationResult, Notifier};
use crate::utils::error::Result;

/// Writes alerts to the log instead of delivering them. Handy for dry runs.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationResult> {
        tracing::info!(subject = %notification.subject, "{}", notification.body);
        Ok(NotificationResult::sent(format!("log-{}", chrono::Utc::now().timestamp())))
    }
}
