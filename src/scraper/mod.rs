//! The periodic vehicle scan pipeline.

pub mod batch;
pub mod reconcile;
pub mod scheduler;
#[cfg(test)]
pub(crate) mod testing;

use crate::dealer::ListingSource;
use crate::services::Service;
use crate::state::{ServiceStatus, ServiceStatusRegistry};
use batch::{ScanOptions, ScanTracker};
use reconcile::Reconciler;
use scheduler::Scheduler;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Everything the scan scheduler needs, shared with the web layer.
#[derive(Clone)]
pub struct ScanContext {
    pub source: Arc<dyn ListingSource>,
    pub reconciler: Arc<Reconciler>,
    pub options: ScanOptions,
    pub tracker: ScanTracker,
    pub trigger: Arc<Notify>,
}

/// Owns the scheduler task and its shutdown channel.
pub struct ScraperService {
    db_pool: PgPool,
    scan: ScanContext,
    interval: Duration,
    run_on_startup: bool,
    scheduler_handle: Option<JoinHandle<()>>,
    shutdown_tx: Option<broadcast::Sender<()>>,
    service_statuses: ServiceStatusRegistry,
}

impl ScraperService {
    pub fn new(
        db_pool: PgPool,
        scan: ScanContext,
        interval: Duration,
        run_on_startup: bool,
        service_statuses: ServiceStatusRegistry,
    ) -> Self {
        Self {
            db_pool,
            scan,
            interval,
            run_on_startup,
            scheduler_handle: None,
            shutdown_tx: None,
            service_statuses,
        }
    }

    fn start(&mut self) {
        info!("ScraperService starting");

        let (shutdown_tx, _) = broadcast::channel(1);
        let scheduler = Scheduler::new(
            self.db_pool.clone(),
            self.scan.source.clone(),
            self.scan.reconciler.clone(),
            self.scan.options.clone(),
            self.interval,
            self.run_on_startup,
            self.scan.tracker.clone(),
            self.scan.trigger.clone(),
        );
        let shutdown_rx = shutdown_tx.subscribe();
        self.scheduler_handle = Some(tokio::spawn(async move {
            scheduler.run(shutdown_rx).await;
        }));
        self.shutdown_tx = Some(shutdown_tx);

        self.service_statuses.set("scraper", ServiceStatus::Active);
    }
}

#[async_trait::async_trait]
impl Service for ScraperService {
    fn name(&self) -> &'static str {
        "scraper"
    }

    async fn run(&mut self) -> Result<(), anyhow::Error> {
        self.start();
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        self.service_statuses.set("scraper", ServiceStatus::Disabled);

        let Some(shutdown_tx) = self.shutdown_tx.take() else {
            warn!("No shutdown channel found for ScraperService");
            return Ok(());
        };
        let _ = shutdown_tx.send(());

        if let Some(handle) = self.scheduler_handle.take() {
            match tokio::time::timeout(Duration::from_secs(5), handle).await {
                Ok(Ok(())) => info!("Scheduler task stopped"),
                Ok(Err(e)) => warn!(error = ?e, "Scheduler task panicked"),
                Err(_) => {
                    warn!("Scheduler did not stop within 5s, abandoning");
                    return Err(anyhow::anyhow!("scheduler shutdown timed out"));
                }
            }
        }

        info!("ScraperService shutdown complete");
        Ok(())
    }
}
