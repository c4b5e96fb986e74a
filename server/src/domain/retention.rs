//! Retention sweep
//!
//! Deletes events whose expiry has passed. Runs once at startup and then
//! every 24 hours; a failed pass is retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::error::SchedulingError;
use crate::core::constants::RETENTION_SWEEP_INTERVAL_SECS;
use crate::data::EventRepository;
use crate::utils::time::datetime_to_micros;

/// Delete every event expiring at or before `now`; returns rows deleted
pub async fn sweep(repo: &dyn EventRepository, now: DateTime<Utc>) -> Result<u64, SchedulingError> {
    repo.delete_expired(datetime_to_micros(now))
        .await
        .map_err(SchedulingError::Sweep)
}

pub struct RetentionSweeper {
    repo: Arc<dyn EventRepository>,
}

impl RetentionSweeper {
    pub fn new(repo: Arc<dyn EventRepository>) -> Self {
        Self { repo }
    }

    /// Spawn the sweep task; the first tick fires immediately
    pub fn start(self, mut shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(RETENTION_SWEEP_INTERVAL_SECS));
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::debug!("Retention task shutting down");
                            break;
                        }
                    }
                    _ = interval.tick() => {
                        match sweep(self.repo.as_ref(), Utc::now()).await {
                            Ok(0) => tracing::debug!("Retention sweep found nothing to delete"),
                            Ok(deleted) => tracing::info!(deleted, "Deleted expired events"),
                            Err(e) => tracing::warn!(error = %e, "Retention sweep failed"),
                        }
                    }
                }
            }
        })
    }
}
