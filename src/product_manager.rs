use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::time::Instant;

use crate::alert_state::{AlertAction, AlertState};
use crate::extractor::Extractor;
use crate::models::{CatalogEntry, Money, Observation, Product};
use crate::plugins::traits::{Notification, Notifier};
use crate::scraper::PageRenderer;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Catalog entry without a url or a usable threshold.
    Skipped { reason: String },
    RenderFailed { error: String },
    PriceNotFound { in_stock: bool },
    Checked {
        observation: Observation,
        action: AlertAction,
        /// Set only when the action was a notification.
        delivered: Option<bool>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductCheckResult {
    pub name: String,
    pub url: Option<String>,
    pub outcome: CheckOutcome,
    pub elapsed_ms: u64,
}

impl ProductCheckResult {
    pub fn delivered(&self) -> bool {
        matches!(self.outcome, CheckOutcome::Checked { delivered: Some(true), .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub results: Vec<ProductCheckResult>,
    pub total_time_ms: u64,
}

impl CycleReport {
    pub fn checked(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !matches!(r.outcome, CheckOutcome::Skipped { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.results.len() - self.checked()
    }

    pub fn notifications_sent(&self) -> usize {
        self.results.iter().filter(|r| r.delivered()).count()
    }

    pub fn notifications_failed(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, CheckOutcome::Checked { delivered: Some(false), .. }))
            .count()
    }
}

/// Runs poll cycles: render, extract, decide, notify, one product at a time.
/// Owns the alert state, so suppression survives between cycles.
pub struct ProductManager {
    extractor: Extractor,
    notifier: Arc<dyn Notifier>,
    alerts: AlertState,
}

impl ProductManager {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            extractor: Extractor::new(),
            notifier,
            alerts: AlertState::new(),
        }
    }

    pub fn alerts(&self) -> &AlertState {
        &self.alerts
    }

    /// Checks every entry in catalog order. A failure on one product never
    /// stops the others.
    pub async fn run_cycle(
        &mut self,
        entries: &[CatalogEntry],
        renderer: &dyn PageRenderer,
    ) -> CycleReport {
        let started_at = Utc::now();
        let start_time = Instant::now();
        let mut results = Vec::with_capacity(entries.len());

        for entry in entries {
            results.push(self.check_product(entry, renderer).await);
        }

        metrics::counter!("deal_watcher_cycles_total").increment(1);
        let report = CycleReport {
            started_at,
            results,
            total_time_ms: start_time.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "Cycle finished: {} checked, {} skipped, {} alerts sent, {} failed in {}ms",
            report.checked(),
            report.skipped(),
            report.notifications_sent(),
            report.notifications_failed(),
            report.total_time_ms
        );
        report
    }

    pub async fn check_product(
        &mut self,
        entry: &CatalogEntry,
        renderer: &dyn PageRenderer,
    ) -> ProductCheckResult {
        let start_time = Instant::now();
        let name = entry.display_name().to_string();

        let product = match entry.to_product() {
            Ok(product) => product,
            Err(reason) => {
                tracing::warn!("Skipping {}: {}", name, reason);
                return ProductCheckResult {
                    name,
                    url: entry.url.clone(),
                    outcome: CheckOutcome::Skipped { reason: reason.to_string() },
                    elapsed_ms: start_time.elapsed().as_millis() as u64,
                };
            }
        };

        tracing::info!("Checking {}", product.name);
        metrics::counter!("deal_watcher_checks_total").increment(1);

        let outcome = match renderer.render(&product.url).await {
            Ok(page) => self.observe(&product, &page).await,
            Err(e) => {
                tracing::warn!("Price not found for {}: render failed: {}", product.name, e);
                metrics::counter!("deal_watcher_render_failures_total").increment(1);
                CheckOutcome::RenderFailed { error: e.to_string() }
            }
        };

        ProductCheckResult {
            name: product.name,
            url: Some(product.url),
            outcome,
            elapsed_ms: start_time.elapsed().as_millis() as u64,
        }
    }

    async fn observe(&mut self, product: &Product, page: &str) -> CheckOutcome {
        let observation = self.extractor.extract(page);

        let Some(price) = observation.price else {
            tracing::warn!("Price not found for {}", product.name);
            metrics::counter!("deal_watcher_price_misses_total").increment(1);
            return CheckOutcome::PriceNotFound { in_stock: observation.in_stock };
        };

        tracing::info!(
            "{}: {} ({}), threshold {}",
            product.name,
            price,
            observation.stock_label(),
            product.threshold
        );

        let action = self.alerts.evaluate(
            &product.url,
            observation.price,
            observation.in_stock,
            product.threshold,
        );

        let delivered = match action {
            AlertAction::Notify(price) => Some(self.dispatch(product, price, &observation).await),
            AlertAction::Reset => {
                self.alerts.reset(&product.url);
                metrics::counter!("deal_watcher_alert_resets_total").increment(1);
                tracing::info!("{} rose to {}, alert re-armed", product.name, price);
                None
            }
            AlertAction::NoAction => None,
        };

        CheckOutcome::Checked { observation, action, delivered }
    }

    /// The alert is recorded only after a confirmed delivery, so a failed
    /// one is attempted again next cycle.
    async fn dispatch(&mut self, product: &Product, price: Money, observation: &Observation) -> bool {
        let notification = Notification::price_alert(product, price, observation);

        let error = match self.notifier.notify(&notification).await {
            Ok(result) if result.success => {
                self.alerts.record_notified(&product.url, price);
                metrics::counter!("deal_watcher_notifications_sent_total").increment(1);
                tracing::info!("Alert sent for {} at {}", product.name, price);
                return true;
            }
            Ok(result) => result.error.unwrap_or_else(|| "unknown error".to_string()),
            Err(e) => e.to_string(),
        };

        metrics::counter!("deal_watcher_notifications_failed_total").increment(1);
        tracing::warn!("Failed to send alert for {}: {}", product.name, error);
        false
    }
}
