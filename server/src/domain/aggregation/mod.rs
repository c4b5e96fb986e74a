//! Hourly aggregation of raw events into metric buckets
//!
//! Each completed UTC hour `[h, h+1h)` is recomputed from scratch and written
//! with an upsert, so re-running a window is idempotent and picks up
//! backfilled events.

mod stats;

pub use stats::{group_window, percentile};

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::error::SchedulingError;
use crate::core::constants::AGGREGATION_INTERVAL_SECS;
use crate::data::EventRepository;
use crate::utils::time::{datetime_to_micros, previous_hour_start, truncate_to_hour};

/// Outcome of aggregating one window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSummary {
    pub bucket_start: DateTime<Utc>,
    pub groups_written: usize,
    pub groups_failed: usize,
}

/// Recompute and upsert the buckets of the hour starting at `bucket_start`
///
/// A failed upsert is logged and counted; the remaining groups are still
/// written. Only a failure to read the window is an error.
pub async fn aggregate_window(
    repo: &dyn EventRepository,
    bucket_start: DateTime<Utc>,
) -> Result<WindowSummary, SchedulingError> {
    let bucket_start = truncate_to_hour(bucket_start);
    let start = datetime_to_micros(bucket_start);
    let end = datetime_to_micros(bucket_start + Duration::hours(1));

    let samples = repo
        .load_window(start, end)
        .await
        .map_err(|source| SchedulingError::Window {
            bucket_start,
            source,
        })?;

    let mut summary = WindowSummary {
        bucket_start,
        groups_written: 0,
        groups_failed: 0,
    };

    for bucket in group_window(start, samples) {
        match repo.upsert_bucket(&bucket).await {
            Ok(()) => summary.groups_written += 1,
            Err(e) => {
                summary.groups_failed += 1;
                tracing::error!(
                    tenant = %bucket.tenant,
                    project = %bucket.project,
                    bucket_start = %bucket_start,
                    error = %e,
                    "Failed to upsert metric bucket"
                );
            }
        }
    }

    Ok(summary)
}

/// Background worker: startup catch-up, then one window per hour
pub struct AggregationWorker {
    repo: Arc<dyn EventRepository>,
    catchup_hours: u32,
}

impl AggregationWorker {
    pub fn new(repo: Arc<dyn EventRepository>, catchup_hours: u32) -> Self {
        Self {
            repo,
            catchup_hours,
        }
    }

    /// Aggregate the last `catchup_hours` completed hours, oldest first
    ///
    /// Stops early when shutdown is signalled between windows.
    pub async fn catch_up(
        &self,
        now: DateTime<Utc>,
        shutdown_rx: &watch::Receiver<bool>,
    ) -> Vec<WindowSummary> {
        let latest = previous_hour_start(now);
        let mut summaries = Vec::with_capacity(self.catchup_hours as usize);

        for offset in (0..self.catchup_hours).rev() {
            if *shutdown_rx.borrow() {
                tracing::debug!("Aggregation catch-up interrupted by shutdown");
                break;
            }
            let bucket_start = latest - Duration::hours(i64::from(offset));
            if let Some(summary) = self.run_window(bucket_start).await {
                summaries.push(summary);
            }
        }

        summaries
    }

    /// Aggregate one window, logging instead of propagating failure
    async fn run_window(&self, bucket_start: DateTime<Utc>) -> Option<WindowSummary> {
        match aggregate_window(self.repo.as_ref(), bucket_start).await {
            Ok(summary) => {
                if summary.groups_failed > 0 {
                    tracing::warn!(
                        bucket_start = %summary.bucket_start,
                        written = summary.groups_written,
                        failed = summary.groups_failed,
                        "Aggregation window partially failed"
                    );
                } else {
                    tracing::debug!(
                        bucket_start = %summary.bucket_start,
                        written = summary.groups_written,
                        "Aggregated window"
                    );
                }
                Some(summary)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Aggregation window failed");
                None
            }
        }
    }

    /// Spawn the worker; the first hourly run fires at the next hour boundary
    pub fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let summaries = self.catch_up(Utc::now(), &shutdown_rx).await;
            let written: usize = summaries.iter().map(|s| s.groups_written).sum();
            tracing::debug!(
                windows = summaries.len(),
                buckets = written,
                "Aggregation catch-up complete"
            );

            let mut interval = tokio::time::interval_at(
                Instant::now() + until_next_hour(Utc::now()),
                StdDuration::from_secs(AGGREGATION_INTERVAL_SECS),
            );
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Aggregation task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        self.run_window(previous_hour_start(Utc::now())).await;
                    }
                }
            }
        })
    }
}

/// Time from `now` until the start of the next UTC hour
fn until_next_hour(now: DateTime<Utc>) -> StdDuration {
    let next = truncate_to_hour(now) + Duration::hours(1);
    (next - now).to_std().unwrap_or_default()
}
