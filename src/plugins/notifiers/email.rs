use async_trait::async_trait;
use lettre::message::{header, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;

use crate::config::SmtpConfig;
use crate::plugins::traits::{Notification, NotificationResult, Notifier};
use crate::utils::error::{AppError, Result};

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_server: String,
    pub smtp_port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: String,
    pub from_name: String,
    pub to_email: String,
    pub use_tls: bool,
    pub timeout: Duration,
}

impl EmailConfig {
    pub fn from_smtp(config: &SmtpConfig) -> std::result::Result<Self, String> {
        if config.host.trim().is_empty() {
            return Err("Missing smtp host".to_string());
        }
        let to_email = config
            .to_address
            .clone()
            .ok_or("Missing to_address")?;
        // Relays like Gmail only accept mail from the authenticated account.
        let from_email = config.username.clone().unwrap_or_else(|| to_email.clone());

        Ok(EmailConfig {
            smtp_server: config.host.clone(),
            smtp_port: config.port(),
            username: config.username.clone(),
            password: config.password.clone(),
            from_email,
            from_name: config.from_name.clone(),
            to_email,
            use_tls: config.use_tls,
            timeout: Duration::from_secs(config.timeout),
        })
    }
}

pub struct EmailNotifier {
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: EmailConfig) -> Self {
        EmailNotifier { config }
    }

    fn error(message: impl std::fmt::Display) -> AppError {
        AppError::Notification {
            notifier: "email".to_string(),
            message: message.to_string(),
        }
    }

    fn build_message(&self, notification: &Notification) -> Result<Message> {
        let from: Mailbox = format!("{} <{}>", self.config.from_name, self.config.from_email)
            .parse()
            .map_err(Self::error)?;
        let to: Mailbox = self.config.to_email.parse().map_err(Self::error)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(notification.subject.clone())
            .header(header::ContentType::TEXT_PLAIN)
            .body(notification.body.clone())
            .map_err(Self::error)
    }

    fn build_transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>> {
        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.smtp_server)
                .map_err(Self::error)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&self.config.smtp_server)
        };

        let mut builder = builder
            .port(self.config.smtp_port)
            .timeout(Some(self.config.timeout));

        if let (Some(username), Some(password)) = (&self.config.username, &self.config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationResult> {
        let email = self.build_message(notification)?;
        let mailer = self.build_transport()?;

        match mailer.send(email).await {
            Ok(_response) => Ok(NotificationResult::sent(format!(
                "email-{}",
                chrono::Utc::now().timestamp()
            ))),
            Err(e) => Ok(NotificationResult::failed(e.to_string())),
        }
    }
}
