// Notifier implementations
pub mod discord;
pub mod email;
pub mod log;

pub use discord::DiscordNotifier;
pub use email::EmailNotifier;
pub use log::LogNotifier;

use std::sync::Arc;

use crate::config::{NotificationMethod, NotificationsConfig};
use crate::plugins::traits::Notifier;
use crate::utils::error::{AppError, Result};

/// Builds the notifier selected by `notifications.method`.
pub fn from_config(config: &NotificationsConfig) -> Result<Arc<dyn Notifier>> {
    match config.method {
        NotificationMethod::Email => {
            let email = email::EmailConfig::from_smtp(&config.smtp)
                .map_err(|e| AppError::Validation(format!("Invalid email configuration: {}", e)))?;
            Ok(Arc::new(EmailNotifier::new(email)))
        }
        NotificationMethod::Discord => {
            let discord = discord::DiscordConfig::from_settings(&config.discord)
                .map_err(|e| AppError::Validation(format!("Invalid Discord configuration: {}", e)))?;
            Ok(Arc::new(DiscordNotifier::new(discord)?))
        }
        NotificationMethod::Log => Ok(Arc::new(LogNotifier)),
    }
}
