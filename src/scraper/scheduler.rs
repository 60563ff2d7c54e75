use crate::data::kv;
use crate::dealer::ListingSource;
use crate::scraper::batch::{ScanOptions, ScanTracker, run_batch};
use crate::scraper::reconcile::Reconciler;
use crate::utils::fmt_duration;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast};
use tokio::time;
use tracing::{error, info, warn};

// app_kv key for persisting the last completed scan across restarts.
pub const KV_VEHICLE_SCAN: &str = "scheduler.vehicle_scan";

/// How long to wait before the first scan after startup.
///
/// A recent persisted scan keeps its remaining cooldown. Without one, the first
/// scan starts immediately when `run_on_startup` is set, or after a full
/// interval otherwise.
fn initial_delay(
    last_scan: Option<DateTime<Utc>>,
    interval: Duration,
    run_on_startup: bool,
    now: DateTime<Utc>,
) -> Duration {
    if !run_on_startup {
        return interval;
    }
    match last_scan {
        None => Duration::ZERO,
        Some(ts) => {
            let elapsed = (now - ts).to_std().unwrap_or(interval);
            interval.saturating_sub(elapsed)
        }
    }
}

/// Runs a vehicle scan on a fixed interval, or immediately when triggered.
///
/// Scans never overlap: the batch is awaited inside the loop, so an overrunning
/// scan pushes the next one back instead of stacking up.
pub struct Scheduler {
    pool: PgPool,
    source: Arc<dyn ListingSource>,
    reconciler: Arc<Reconciler>,
    options: ScanOptions,
    interval: Duration,
    run_on_startup: bool,
    tracker: ScanTracker,
    trigger: Arc<Notify>,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: PgPool,
        source: Arc<dyn ListingSource>,
        reconciler: Arc<Reconciler>,
        options: ScanOptions,
        interval: Duration,
        run_on_startup: bool,
        tracker: ScanTracker,
        trigger: Arc<Notify>,
    ) -> Self {
        Self {
            pool,
            source,
            reconciler,
            options,
            interval,
            run_on_startup,
            tracker,
            trigger,
        }
    }

    /// Runs the scheduler's main loop until a shutdown signal arrives.
    ///
    /// A scan in flight at shutdown is abandoned; every record commit is a
    /// single statement, so nothing is left half-written.
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) {
        let persisted = kv::get_timestamp(&self.pool, KV_VEHICLE_SCAN)
            .await
            .unwrap_or_else(|e| {
                warn!(error = ?e, "Failed to load persisted scan timestamp");
                None
            });

        let delay = initial_delay(persisted, self.interval, self.run_on_startup, Utc::now());
        info!(
            interval = fmt_duration(self.interval),
            first_scan_in = fmt_duration(delay),
            last_scan = ?persisted,
            "Scheduler service started"
        );
        let mut next_run = time::Instant::now() + delay;

        loop {
            tokio::select! {
                _ = time::sleep_until(next_run) => {}
                _ = self.trigger.notified() => {
                    info!("Vehicle scan triggered manually");
                }
                _ = shutdown_rx.recv() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }

            let outcome = tokio::select! {
                result = run_batch(
                    self.source.as_ref(),
                    &self.reconciler,
                    &self.options,
                    &self.tracker,
                ) => Some(result),
                _ = shutdown_rx.recv() => None,
            };

            match outcome {
                None => {
                    warn!("Shutdown during vehicle scan, abandoning in-flight batch");
                    break;
                }
                Some(Ok(_)) => {
                    if let Err(e) = kv::set_timestamp(&self.pool, KV_VEHICLE_SCAN, Utc::now()).await {
                        warn!(error = ?e, "Failed to persist scan timestamp");
                    }
                }
                Some(Err(e)) => {
                    error!(error = ?e, "Vehicle scan failed, retrying next interval");
                }
            }

            next_run = time::Instant::now() + self.interval;
        }

        info!("Scheduler exiting gracefully");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_no_history_runs_immediately() {
        assert_eq!(initial_delay(None, HOUR, true, Utc::now()), Duration::ZERO);
    }

    #[test]
    fn test_startup_run_disabled_waits_full_interval() {
        let now = Utc::now();
        assert_eq!(initial_delay(None, HOUR, false, now), HOUR);
        assert_eq!(
            initial_delay(Some(now - ChronoDuration::days(2)), HOUR, false, now),
            HOUR
        );
    }

    #[test]
    fn test_recent_scan_keeps_remaining_cooldown() {
        let now = Utc::now();
        let last = now - ChronoDuration::minutes(20);
        assert_eq!(
            initial_delay(Some(last), HOUR, true, now),
            Duration::from_secs(40 * 60)
        );
    }

    #[test]
    fn test_stale_or_future_timestamp_runs_immediately() {
        let now = Utc::now();
        assert_eq!(
            initial_delay(Some(now - ChronoDuration::hours(5)), HOUR, true, now),
            Duration::ZERO
        );
        assert_eq!(
            initial_delay(Some(now + ChronoDuration::hours(1)), HOUR, true, now),
            Duration::ZERO
        );
    }
}
