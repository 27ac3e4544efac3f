use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;

use crate::config::SchedulerConfig;
use crate::event_log::EventLog;
use crate::models::{format_money, Deal, PriceCheck, TrackedProduct};
use crate::plugins::notifiers::EmailConfig;
use crate::plugins::traits::{NotifierPlugin, TrackerPlugin};
use crate::product_manager::ProductManager;
use crate::utils::error::{AppError, Result};

pub const NO_PRODUCTS_MESSAGE: &str = "Please add at least one product to track.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    Stopped,
    Running,
    /// Stop requested; the worker is finishing its current step.
    Stopping,
}

/// Cooperative stop request shared between the scheduler and one worker.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`stop`](Self::stop) has been called.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so this only ends when the value flips.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    Deal,
    AboveTarget,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub checked: usize,
    pub deals: usize,
    pub failures: usize,
    /// False when the pass ended early because of a stop request.
    pub completed: bool,
}

/// One polling run: owns the email settings captured at start.
pub struct PollingWorker {
    tracker: Arc<dyn TrackerPlugin>,
    notifier: Arc<dyn NotifierPlugin>,
    products: Arc<RwLock<ProductManager>>,
    settings: SchedulerConfig,
    email: EmailConfig,
    log: EventLog,
}

impl PollingWorker {
    pub fn new(
        tracker: Arc<dyn TrackerPlugin>,
        notifier: Arc<dyn NotifierPlugin>,
        products: Arc<RwLock<ProductManager>>,
        settings: SchedulerConfig,
        email: EmailConfig,
        log: EventLog,
    ) -> Self {
        Self {
            tracker,
            notifier,
            products,
            settings,
            email,
            log,
        }
    }

    /// Passes until stopped, sleeping the cycle delay between them.
    pub async fn run(self, stop: StopSignal) {
        self.log.info("--- Scraper Started ---");
        while !stop.is_stopped() {
            let summary = self.run_pass(&stop).await;
            tracing::debug!(?summary, "Polling pass finished");

            if stop.is_stopped() {
                break;
            }
            let delay = self.settings.cycle_delay();
            self.log.info(format!("--- Cycle complete. Waiting {}. ---", describe_delay(delay)));
            self.pause(&stop, delay).await;
        }
        self.log.info("--- Scraper Stopped ---");
    }

    /// One pass over a snapshot of the tracked list.
    pub async fn run_pass(&self, stop: &StopSignal) -> PassSummary {
        let products = self.products.read().await.snapshot();
        let mut summary = PassSummary::default();

        for product in &products {
            if stop.is_stopped() {
                return summary;
            }

            match self.check_product(product).await {
                CheckOutcome::Deal => summary.deals += 1,
                CheckOutcome::Failed => summary.failures += 1,
                CheckOutcome::AboveTarget => {}
            }
            summary.checked += 1;

            if stop.is_stopped() {
                return summary;
            }
            self.pause(stop, self.settings.item_delay()).await;
        }

        summary.completed = true;
        summary
    }

    pub async fn check_product(&self, product: &TrackedProduct) -> CheckOutcome {
        self.log.info(format!("Checking: {}...", product.short_url()));

        match self.tracker.check(&product.url).await {
            PriceCheck::Found { title, price } => {
                self.log.info(format!(
                    "  - Price: {} | Target: {}",
                    format_money(price),
                    format_money(product.target_price)
                ));
                if !product.is_deal(price) {
                    return CheckOutcome::AboveTarget;
                }

                self.log.deal(format!("DEAL ALERT! Price for '{}' is {}!", title, format_money(price)));
                let deal = Deal {
                    title,
                    price,
                    url: product.url.clone(),
                };
                let result = self.notifier.notify(&deal, &self.email, &self.log).await;
                tracing::debug!(url = %deal.url, ?result, "Notifier finished");
                CheckOutcome::Deal
            }
            PriceCheck::Failed { reason, .. } => {
                self.log.error(format!("  - {}", reason));
                CheckOutcome::Failed
            }
        }
    }

    async fn pause(&self, stop: &StopSignal, delay: Duration) {
        if delay.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = stop.stopped() => {}
        }
    }
}

fn describe_delay(delay: Duration) -> String {
    let secs = delay.as_secs();
    match secs {
        60 => "1 minute".to_string(),
        s if s > 0 && s % 60 == 0 => format!("{} minutes", s / 60),
        1 => "1 second".to_string(),
        s => format!("{} seconds", s),
    }
}

/// Start/stop control for the background polling worker.
pub struct ProductScheduler {
    tracker: Arc<dyn TrackerPlugin>,
    notifier: Arc<dyn NotifierPlugin>,
    products: Arc<RwLock<ProductManager>>,
    settings: SchedulerConfig,
    log: EventLog,
    worker: Option<(StopSignal, JoinHandle<()>)>,
}

impl ProductScheduler {
    pub fn new(
        tracker: Arc<dyn TrackerPlugin>,
        notifier: Arc<dyn NotifierPlugin>,
        products: Arc<RwLock<ProductManager>>,
        settings: SchedulerConfig,
        log: EventLog,
    ) -> Self {
        Self {
            tracker,
            notifier,
            products,
            settings,
            log,
            worker: None,
        }
    }

    pub fn state(&self) -> LoopState {
        match &self.worker {
            None => LoopState::Stopped,
            Some((_, handle)) if handle.is_finished() => LoopState::Stopped,
            Some((stop, _)) if stop.is_stopped() => LoopState::Stopping,
            Some(_) => LoopState::Running,
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Spawns a worker with `email` captured for the whole run.
    ///
    /// A worker still finishing after an earlier stop is left to exit on its own.
    pub async fn start(&mut self, email: EmailConfig) -> Result<()> {
        if self.is_running() {
            return Err(AppError::Conflict("Scraper is already running.".to_string()));
        }
        if self.products.read().await.is_empty() {
            return Err(AppError::Validation(NO_PRODUCTS_MESSAGE.to_string()));
        }

        let worker = PollingWorker::new(
            Arc::clone(&self.tracker),
            Arc::clone(&self.notifier),
            Arc::clone(&self.products),
            self.settings.clone(),
            email,
            self.log.clone(),
        );
        let stop = StopSignal::new();
        let handle = tokio::spawn(worker.run(stop.clone()));
        self.worker = Some((stop, handle));

        tracing::info!("Polling worker started");
        Ok(())
    }

    /// Requests a stop. Returns false when nothing was running.
    pub fn stop(&mut self) -> bool {
        if !self.is_running() {
            return false;
        }
        if let Some((stop, _)) = &self.worker {
            stop.stop();
        }
        self.log.info("Scraper stopping... it will finish the current cycle.");
        tracing::info!("Polling worker stop requested");
        true
    }

    /// Waits for the current worker, if any, to exit.
    pub async fn wait(&mut self) {
        if let Some((_, handle)) = self.worker.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Polling worker panicked");
            }
        }
    }

    pub async fn shutdown(&mut self) {
        self.stop();
        self.wait().await;
    }
}
