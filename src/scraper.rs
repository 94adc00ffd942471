use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::config::ScraperConfig;
use crate::utils::error::{AppError, Result};

/// How long an idle browser connection is kept open. Polls are typically
/// half an hour apart, well past headless_chrome's 30 s default. Longer
/// intervals are covered by the health probe before each cycle.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(60 * 60 * 24);

/// A live rendering session: URL in, HTML after script execution out.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;

    /// Whether the session can still be used. A dead session is released
    /// and relaunched lazily.
    async fn is_healthy(&self) -> bool;

    /// Ends the session and frees the renderer behind it. Later renders
    /// fail.
    async fn shutdown(&self) -> Result<()>;
}

/// Starts rendering sessions.
#[async_trait]
pub trait RendererLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn PageRenderer>>;
}

pub struct ChromeLauncher {
    config: ScraperConfig,
}

impl ChromeLauncher {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::BrowserLaunch(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        Ok(launch_options)
    }
}

#[async_trait]
impl RendererLauncher for ChromeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageRenderer>> {
        let options = self.launch_options()?;
        let browser = tokio::task::spawn_blocking(move || Browser::new(options))
            .await
            .map_err(|e| AppError::Internal(format!("Browser launch task failed: {}", e)))?
            .map_err(|e| AppError::BrowserLaunch(e.to_string()))?;

        tracing::info!("Headless browser started");
        Ok(Box::new(ChromeSession {
            browser: Mutex::new(Some(browser)),
            config: self.config.clone(),
        }))
    }
}

pub struct ChromeSession {
    browser: Mutex<Option<Browser>>,
    config: ScraperConfig,
}

impl ChromeSession {
    async fn browser(&self) -> Option<Browser> {
        self.browser.lock().await.clone()
    }

    fn render_blocking(browser: &Browser, config: &ScraperConfig, url: &str) -> anyhow::Result<String> {
        let tab = browser.new_tab()?;
        tab.set_default_timeout(config.request_timeout());
        tab.set_user_agent(&config.user_agent, None, None)?;

        let content = tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .and_then(|tab| {
                // Give client-side scripts time to fill in the price.
                std::thread::sleep(config.render_wait());
                tab.get_content()
            });

        // Close tab to free resources
        let _ = tab.close(true);
        content
    }
}

#[async_trait]
impl PageRenderer for ChromeSession {
    async fn render(&self, url: &str) -> Result<String> {
        let browser = self.browser().await.ok_or_else(|| AppError::Render {
            url: url.to_string(),
            message: "Browser session is closed".to_string(),
        })?;
        let config = self.config.clone();
        let target = url.to_string();

        tokio::task::spawn_blocking(move || Self::render_blocking(&browser, &config, &target))
            .await
            .map_err(|e| AppError::Internal(format!("Render task failed: {}", e)))?
            .map_err(|e| AppError::Render {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn is_healthy(&self) -> bool {
        let Some(browser) = self.browser().await else {
            return false;
        };
        tokio::task::spawn_blocking(move || browser.get_version().is_ok())
            .await
            .unwrap_or(false)
    }

    async fn shutdown(&self) -> Result<()> {
        let Some(browser) = self.browser.lock().await.take() else {
            return Ok(());
        };
        tracing::info!("Closing headless browser");
        // Dropping the last handle kills the Chrome process and waits for it.
        tokio::task::spawn_blocking(move || drop(browser))
            .await
            .map_err(|e| AppError::Internal(format!("Browser shutdown task failed: {}", e)))
    }
}
