//! One scan: enumerate active listings, extract each, reconcile each.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{info, warn};
use ts_rs::TS;

use crate::dealer::listings::{EnumerateOptions, collect_active_urls};
use crate::dealer::{ListingSource, scrape_listing};
use crate::scraper::reconcile::{ReconcileOutcome, Reconciler};
use crate::utils::fmt_duration;

/// Tunables for a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOptions {
    pub enumerate: EnumerateOptions,
    /// Minimum spacing between detail-page requests.
    pub detail_delay: Duration,
    /// Detail pages fetched in parallel.
    pub concurrency: usize,
}

/// Outcome counts for one scan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, TS)]
#[ts(export)]
pub struct ScanSummary {
    pub created: u32,
    pub updated: u32,
    pub errors: u32,
    pub total_urls: u32,
}

impl ScanSummary {
    pub fn processed(&self) -> u32 {
        self.created + self.updated + self.errors
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(tag = "phase", rename_all = "camelCase")]
#[ts(export)]
pub enum ScanPhase {
    Idle,
    Enumerating,
    Processing { done: u32, total: u32 },
    Done,
}

impl ScanPhase {
    pub fn is_running(&self) -> bool {
        matches!(self, ScanPhase::Enumerating | ScanPhase::Processing { .. })
    }
}

/// Snapshot of scan progress, served by the status endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScanStatus {
    pub phase: ScanPhase,
    pub last_summary: Option<ScanSummary>,
    pub last_finished_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Default for ScanStatus {
    fn default() -> Self {
        Self {
            phase: ScanPhase::Idle,
            last_summary: None,
            last_finished_at: None,
            last_error: None,
        }
    }
}

/// Shared handle the scanner writes progress into and the API reads from.
#[derive(Debug, Clone, Default)]
pub struct ScanTracker {
    inner: Arc<RwLock<ScanStatus>>,
}

impl ScanTracker {
    pub async fn snapshot(&self) -> ScanStatus {
        self.inner.read().await.clone()
    }

    async fn set_phase(&self, phase: ScanPhase) {
        self.inner.write().await.phase = phase;
    }

    async fn finish(&self, summary: ScanSummary) {
        let mut status = self.inner.write().await;
        status.phase = ScanPhase::Done;
        status.last_summary = Some(summary);
        status.last_finished_at = Some(Utc::now());
        status.last_error = None;
    }

    async fn fail(&self, error: String) {
        let mut status = self.inner.write().await;
        status.phase = ScanPhase::Done;
        status.last_finished_at = Some(Utc::now());
        status.last_error = Some(error);
    }
}

fn detail_limiter(delay: Duration) -> Option<DefaultDirectRateLimiter> {
    Quota::with_period(delay).map(RateLimiter::direct)
}

/// Run one full scan.
///
/// Detail pages are fetched and parsed by up to `concurrency` tasks, but results
/// are consumed in enumeration order and reconciled one at a time, so the final
/// state matches a sequential scan. A failing URL (fetch or store) only bumps
/// `errors`. The only error returned is a failed enumeration, since then there
/// is nothing to process.
pub async fn run_batch<S>(
    source: &S,
    reconciler: &Reconciler,
    options: &ScanOptions,
    tracker: &ScanTracker,
) -> Result<ScanSummary>
where
    S: ListingSource + ?Sized,
{
    let start = Instant::now();
    tracker.set_phase(ScanPhase::Enumerating).await;

    let urls = match collect_active_urls(source, &options.enumerate).await {
        Ok(urls) => urls,
        Err(e) => {
            tracker.fail(e.to_string()).await;
            return Err(e).context("Failed to enumerate active listings");
        }
    };

    let total = urls.len() as u32;
    let mut summary = ScanSummary {
        total_urls: total,
        ..Default::default()
    };
    tracker
        .set_phase(ScanPhase::Processing { done: 0, total })
        .await;

    let limiter = detail_limiter(options.detail_delay);
    let limiter = limiter.as_ref();

    let mut results = futures::stream::iter(urls)
        .map(|url| async move {
            if let Some(limiter) = limiter {
                limiter.until_ready().await;
            }
            let result = scrape_listing(source, &url).await;
            (url, result)
        })
        .buffered(options.concurrency.max(1));

    while let Some((url, result)) = results.next().await {
        match result {
            Ok(candidate) => match reconciler.reconcile(&candidate).await {
                Ok(reconciled) => match reconciled.outcome {
                    ReconcileOutcome::Created => summary.created += 1,
                    ReconcileOutcome::Updated => summary.updated += 1,
                },
                Err(e) => {
                    summary.errors += 1;
                    warn!(url = %url, error = ?e, "Failed to reconcile listing");
                }
            },
            Err(e) => {
                summary.errors += 1;
                warn!(url = %url, error = %e, "Failed to fetch listing");
            }
        }

        tracker
            .set_phase(ScanPhase::Processing {
                done: summary.processed(),
                total,
            })
            .await;
    }

    tracker.finish(summary).await;
    info!(
        created = summary.created,
        updated = summary.updated,
        errors = summary.errors,
        total_urls = summary.total_urls,
        duration = fmt_duration(start.elapsed()),
        "Vehicle scan completed"
    );

    Ok(summary)
}
