// Integration tests for Deal Watcher
// In-memory stand-ins for the browser, the mail server and the catalog file.

pub mod scheduler_tests;

use async_trait::async_trait;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deal_watcher::catalog::CatalogStore;
use deal_watcher::config::SchedulerConfig;
use deal_watcher::models::Catalog;
use deal_watcher::plugins::{Notification, NotificationResult, Notifier};
use deal_watcher::scheduler::ShutdownHandle;
use deal_watcher::scraper::{PageRenderer, RendererLauncher};
use deal_watcher::{AppError, ProductManager, ProductScheduler, Result};

pub const WIDGET_URL: &str = "https://shop.example/dp/B0WIDGET";
pub const LAUNCH_RETRY_DELAY: Duration = Duration::from_secs(60);

pub fn product_page(price: &str, in_stock: bool) -> String {
    let stock = if in_stock {
        r#"<div id="availability">In stock</div><input id="add-to-cart-button" type="submit">"#
    } else {
        r#"<div id="availability">Currently unavailable.</div>"#
    };
    format!(
        r#"<html><body>
             <h1 id="productTitle">Widget</h1>
             <span class="a-price"><span class="a-offscreen">{}</span></span>
             {}
           </body></html>"#,
        price, stock
    )
}

pub fn widget_catalog(interval: Option<u64>) -> Catalog {
    let mut value = json!({
        "products": [{"name": "Widget", "url": WIDGET_URL, "threshold_inr": 500}]
    });
    if let Some(interval) = interval {
        value["check_interval_seconds"] = json!(interval);
    }
    serde_json::from_value(value).unwrap()
}

/// Hands out scripted catalogs, then keeps repeating the last good one.
/// `None` in the script is a failed read.
pub struct ScriptedCatalog {
    script: Mutex<VecDeque<Option<Catalog>>>,
    last: Mutex<Catalog>,
    loads: AtomicUsize,
    stop_on_load: Mutex<Option<(usize, ShutdownHandle)>>,
}

impl ScriptedCatalog {
    pub fn new(script: Vec<Option<Catalog>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(Catalog::default()),
            loads: AtomicUsize::new(0),
            stop_on_load: Mutex::new(None),
        }
    }

    pub fn fixed(catalog: Catalog) -> Self {
        Self::new(vec![Some(catalog)])
    }

    /// Requests shutdown while serving the given (1-based) load.
    pub fn stop_on_load(self, load: usize, handle: ShutdownHandle) -> Self {
        *self.stop_on_load.lock().unwrap() = Some((load, handle));
        self
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for ScriptedCatalog {
    async fn load(&self) -> Result<Catalog> {
        let load = self.loads.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, handle)) = &*self.stop_on_load.lock().unwrap() {
            if *at == load {
                handle.trigger();
            }
        }

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Some(catalog)) => {
                *self.last.lock().unwrap() = catalog.clone();
                Ok(catalog)
            }
            Some(None) => Err(AppError::Catalog {
                path: "products.json".to_string(),
                message: "expected value at line 1 column 1".to_string(),
            }),
            None => Ok(self.last.lock().unwrap().clone()),
        }
    }
}

/// State shared between a launcher and the sessions it starts.
#[derive(Default)]
pub struct Browser {
    pub pages: Mutex<HashMap<String, String>>,
    pub renders: AtomicUsize,
    pub launches: AtomicUsize,
    pub closed: AtomicUsize,
    pub unhealthy: AtomicBool,
    crashes: AtomicUsize,
}

impl Browser {
    pub fn serve(&self, url: &str, page: String) {
        self.pages.lock().unwrap().insert(url.to_string(), page);
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    /// Kills every session started so far. Later launches are unaffected.
    pub fn crash(&self) {
        self.crashes.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeSession {
    browser: Arc<Browser>,
    generation: usize,
}

impl FakeSession {
    fn crashed(&self) -> bool {
        self.generation != self.browser.crashes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for FakeSession {
    async fn render(&self, url: &str) -> Result<String> {
        self.browser.renders.fetch_add(1, Ordering::SeqCst);
        if self.crashed() {
            return Err(AppError::Render {
                url: url.to_string(),
                message: "Browser connection lost".to_string(),
            });
        }
        self.browser
            .pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Render {
                url: url.to_string(),
                message: "Navigation timed out".to_string(),
            })
    }

    async fn is_healthy(&self) -> bool {
        !self.crashed() && !self.browser.unhealthy.load(Ordering::SeqCst)
    }

    async fn shutdown(&self) -> Result<()> {
        self.browser.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fails the first `failures` launches, then starts sessions.
pub struct FakeLauncher {
    pub browser: Arc<Browser>,
    failures: AtomicUsize,
    stop_after_attempts: Mutex<Option<(usize, ShutdownHandle)>>,
    attempts: AtomicUsize,
}

impl FakeLauncher {
    pub fn new(browser: Arc<Browser>) -> Self {
        Self {
            browser,
            failures: AtomicUsize::new(0),
            stop_after_attempts: Mutex::new(None),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn failing(self, failures: usize) -> Self {
        self.failures.store(failures, Ordering::SeqCst);
        self
    }

    pub fn stop_after_attempts(self, attempts: usize, handle: ShutdownHandle) -> Self {
        *self.stop_after_attempts.lock().unwrap() = Some((attempts, handle));
        self
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RendererLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Box<dyn PageRenderer>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((at, handle)) = &*self.stop_after_attempts.lock().unwrap() {
            if *at == attempt {
                handle.trigger();
            }
        }

        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::BrowserLaunch("Could not auto detect a chrome executable".to_string()));
        }

        self.browser.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            browser: Arc::clone(&self.browser),
            generation: self.browser.crashes.load(Ordering::SeqCst),
        }))
    }
}

/// Records what it was asked to send. Can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
    pub attempts: AtomicUsize,
    pub failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, notification: &Notification) -> Result<NotificationResult> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Ok(NotificationResult::failed("535 Authentication failed"));
        }
        self.sent.lock().unwrap().push(notification.clone());
        Ok(NotificationResult::sent("test"))
    }
}

pub fn build_scheduler(
    catalog: Arc<dyn CatalogStore>,
    launcher: Arc<FakeLauncher>,
    notifier: Arc<RecordingNotifier>,
) -> ProductScheduler {
    ProductScheduler::new(
        catalog,
        launcher,
        ProductManager::new(notifier),
        SchedulerConfig { default_interval: 1800 },
        LAUNCH_RETRY_DELAY,
    )
}
