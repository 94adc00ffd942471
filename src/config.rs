use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 1800;
pub const DEFAULT_LAUNCH_RETRY_DELAY_SECS: u64 = 60;
pub const DEFAULT_SMTP_PORT: u16 = 587;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub catalog: CatalogConfig,
    pub scraper: ScraperConfig,
    pub scheduler: SchedulerConfig,
    pub notifications: NotificationsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    pub user_agent: String,
    pub chrome_path: Option<String>,
    /// Seconds before a navigation is abandoned.
    pub request_timeout: u64,
    /// Milliseconds to let client-side scripts settle after navigation.
    pub render_wait_ms: u64,
    /// Seconds between attempts to launch the browser.
    pub launch_retry_delay: u64,
}

impl ScraperConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    pub fn render_wait(&self) -> Duration {
        Duration::from_millis(self.render_wait_ms)
    }

    pub fn launch_retry_delay(&self) -> Duration {
        Duration::from_secs(self.launch_retry_delay)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Poll interval used when the catalog does not set one.
    pub default_interval: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationMethod {
    Email,
    Discord,
    Log,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub method: NotificationMethod,
    pub smtp: SmtpConfig,
    pub discord: DiscordConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    /// Left unset by the defaults so `SMTP_PORT` can fill it.
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub to_address: Option<String>,
    pub from_name: String,
    pub use_tls: bool,
    pub timeout: u64,
}

impl SmtpConfig {
    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_SMTP_PORT)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub webhook_url: Option<String>,
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .set_default("catalog.path", "products.json")?
            .set_default("scraper.user_agent", DEFAULT_USER_AGENT)?
            .set_default("scraper.request_timeout", 30_i64)?
            .set_default("scraper.render_wait_ms", 3000_i64)?
            .set_default("scraper.launch_retry_delay", DEFAULT_LAUNCH_RETRY_DELAY_SECS as i64)?
            .set_default("scheduler.default_interval", DEFAULT_CHECK_INTERVAL_SECS as i64)?
            .set_default("notifications.method", "email")?
            .set_default("notifications.smtp.host", "")?
            .set_default("notifications.smtp.from_name", "Deal Watcher")?
            .set_default("notifications.smtp.use_tls", true)?
            .set_default("notifications.smtp.timeout", 30_i64)?
            .set_default("notifications.discord.username", "Deal Watcher")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.listen", "127.0.0.1:9001")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("DEAL_WATCHER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_env_fallbacks(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Fills unset values from the plain variables older deployments use
    /// (`SMTP_SERVER`, `SMTP_USER`, `CHROME_PATH`, ...).
    pub fn apply_env_fallbacks<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let smtp = &mut self.notifications.smtp;
        if smtp.host.is_empty() {
            if let Some(host) = lookup("SMTP_SERVER") {
                smtp.host = host;
            }
        }
        if smtp.username.is_none() {
            smtp.username = lookup("SMTP_USER");
        }
        if smtp.password.is_none() {
            smtp.password = lookup("SMTP_PASSWORD");
        }
        if smtp.to_address.is_none() {
            smtp.to_address = lookup("TO_EMAIL").or_else(|| smtp.username.clone());
        }
        if self.scraper.chrome_path.is_none() {
            self.scraper.chrome_path = lookup("CHROME_PATH");
        }
        if self.notifications.discord.webhook_url.is_none() {
            self.notifications.discord.webhook_url = lookup("DISCORD_WEBHOOK_URL");
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.path.trim().is_empty() {
            return Err(ConfigError::Message("Catalog path must not be empty".into()));
        }

        if self.scheduler.default_interval == 0 {
            return Err(ConfigError::Message("Scheduler default_interval must be greater than 0".into()));
        }

        if self.scraper.request_timeout == 0 {
            return Err(ConfigError::Message("Scraper request_timeout must be greater than 0".into()));
        }

        if self.scraper.launch_retry_delay == 0 {
            return Err(ConfigError::Message("Scraper launch_retry_delay must be greater than 0".into()));
        }

        match self.notifications.method {
            NotificationMethod::Email => {
                let smtp = &self.notifications.smtp;
                if smtp.host.trim().is_empty() {
                    return Err(ConfigError::Message("SMTP host is required for email notifications".into()));
                }
                if smtp.port() == 0 {
                    return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
                }
                if smtp.to_address.is_none() {
                    return Err(ConfigError::Message("SMTP to_address is required for email notifications".into()));
                }
            }
            NotificationMethod::Discord => {
                let webhook = self.notifications.discord.webhook_url.as_deref().unwrap_or("");
                if !Self::is_valid_webhook(webhook) {
                    return Err(ConfigError::Message("Invalid Discord webhook URL".into()));
                }
            }
            NotificationMethod::Log => {}
        }

        if self.metrics.enabled && self.metrics.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::Message("Metrics listen must be a socket address".into()));
        }

        Ok(())
    }

    fn is_valid_webhook(webhook: &str) -> bool {
        match Url::parse(webhook) {
            Ok(url) => url.scheme() == "https" && url.path().starts_with("/api/webhooks/"),
            Err(_) => false,
        }
    }
}
