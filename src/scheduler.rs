use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;

use crate::catalog::CatalogStore;
use crate::config::SchedulerConfig;
use crate::models::Catalog;
use crate::product_manager::{CycleReport, ProductManager};
use crate::scraper::{PageRenderer, RendererLauncher};
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

/// Creates a linked trigger and listener pair.
pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown was requested. Never resolves if the handle
    /// is dropped without triggering.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Drives poll cycles until stopped. Owns the only renderer session, which
/// is started on first need and always released on the way out.
pub struct ProductScheduler {
    catalog_store: Arc<dyn CatalogStore>,
    launcher: Arc<dyn RendererLauncher>,
    product_manager: ProductManager,
    config: SchedulerConfig,
    launch_retry_delay: Duration,
    single_run: bool,
    state: SchedulerState,
    session: Option<Box<dyn PageRenderer>>,
    catalog: Catalog,
    cycles_completed: u64,
    last_report: Option<CycleReport>,
}

impl ProductScheduler {
    pub fn new(
        catalog_store: Arc<dyn CatalogStore>,
        launcher: Arc<dyn RendererLauncher>,
        product_manager: ProductManager,
        config: SchedulerConfig,
        launch_retry_delay: Duration,
    ) -> Self {
        Self {
            catalog_store,
            launcher,
            product_manager,
            config,
            launch_retry_delay,
            single_run: false,
            state: SchedulerState::Idle,
            session: None,
            catalog: Catalog::default(),
            cycles_completed: 0,
            last_report: None,
        }
    }

    /// Stop after one cycle instead of polling forever.
    pub fn single_run(mut self, single_run: bool) -> Self {
        self.single_run = single_run;
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles_completed
    }

    pub fn last_report(&self) -> Option<&CycleReport> {
        self.last_report.as_ref()
    }

    pub fn product_manager(&self) -> &ProductManager {
        &self.product_manager
    }

    /// Time to sleep between cycles: the catalog's own interval, else the
    /// configured default.
    pub fn poll_interval(&self) -> Duration {
        self.catalog
            .check_interval()
            .unwrap_or_else(|| Duration::from_secs(self.config.default_interval))
    }

    pub async fn run(&mut self, mut shutdown: Shutdown) -> Result<()> {
        self.state = SchedulerState::Running;
        tracing::info!("Product scheduler started");

        let result = self.run_loop(&mut shutdown).await;
        if let Err(e) = &result {
            tracing::error!("Scheduler stopped on error: {}", e);
        }

        self.release_session().await;
        self.state = SchedulerState::Stopped;
        tracing::info!("Product scheduler stopped after {} cycles", self.cycles_completed);
        result
    }

    async fn run_loop(&mut self, shutdown: &mut Shutdown) -> Result<()> {
        // A catalog that cannot be read at startup is a setup problem.
        self.catalog = self.catalog_store.load().await?;

        loop {
            if shutdown.is_triggered() {
                break;
            }

            if self.cycles_completed > 0 {
                self.reload_catalog().await;
            }

            if self.catalog.has_trackable() {
                if !self.ensure_session(shutdown).await? {
                    break;
                }
                self.run_cycle().await;
            } else {
                tracing::info!("No trackable products in catalog");
            }
            self.cycles_completed += 1;

            if self.single_run {
                tracing::info!("Single run complete");
                break;
            }

            let interval = self.poll_interval();
            tracing::info!("Next check in {}s", interval.as_secs());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown.wait() => {
                    tracing::info!("Shutdown requested");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn reload_catalog(&mut self) {
        match self.catalog_store.load().await {
            Ok(catalog) => self.catalog = catalog,
            Err(e) => tracing::warn!("Catalog reload failed, keeping previous products: {}", e),
        }
    }

    async fn run_cycle(&mut self) {
        let Some(session) = self.session.as_deref() else {
            return;
        };

        let report = self.product_manager.run_cycle(&self.catalog.products, session).await;
        let healthy = session.is_healthy().await;
        self.last_report = Some(report);

        if !healthy {
            tracing::warn!("Browser session is no longer responsive, restarting next cycle");
            self.release_session().await;
        }
    }

    /// Launches the renderer if there is none, retrying at a fixed delay
    /// until it starts. A kept session is probed first, since the browser
    /// may have died during the sleep. Returns `false` when shutdown won
    /// the race.
    async fn ensure_session(&mut self, shutdown: &mut Shutdown) -> Result<bool> {
        if let Some(session) = self.session.as_deref() {
            if session.is_healthy().await {
                return Ok(true);
            }
            tracing::warn!("Browser session was lost while idle, restarting");
            self.release_session().await;
        }

        let launcher = Arc::clone(&self.launcher);
        let delay = self.launch_retry_delay;
        let launch = Retry::spawn(FixedInterval::new(delay), move || {
            let launcher = Arc::clone(&launcher);
            async move {
                launcher.launch().await.inspect_err(|e| {
                    tracing::warn!("Browser launch failed, retrying in {}s: {}", delay.as_secs(), e)
                })
            }
        });

        tokio::select! {
            biased;
            session = launch => {
                self.session = Some(session?);
                Ok(true)
            }
            _ = shutdown.wait() => Ok(false),
        }
    }

    async fn release_session(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = session.shutdown().await {
                tracing::warn!("Error closing browser session: {}", e);
            }
        }
    }
}
