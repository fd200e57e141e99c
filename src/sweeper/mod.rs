//! Expiry sweeper.
//!
//! # Data Flow
//! ```text
//! ticker (sweeper.interval_secs)
//!     → Ledger::sweep_expired (timed campaigns past close_at → failed)
//!     → delete challenges past expires_at (export, withdraw, update)
//!     → delete deliveries past expires_at
//! ```
//!
//! # Design Decisions
//! - Garbage collection only; the campaign status flip is the ledger's decision
//! - Each collection is cleared with one batch

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::schema::SweeperConfig;
use crate::error::Result;
use crate::observability::metrics;
use crate::services::Services;
use crate::store::collections::{
    DELIVERIES, EXPORT_CHALLENGES, UPDATE_CHALLENGES, WITHDRAW_CHALLENGES,
};
use crate::store::{Query, Write};

const EXPIRING: [&str; 4] = [
    EXPORT_CHALLENGES,
    WITHDRAW_CHALLENGES,
    UPDATE_CHALLENGES,
    DELIVERIES,
];

/// What one sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Campaigns moved to failed.
    pub failed_campaigns: Vec<String>,
    /// Expired documents deleted per collection.
    pub removed: Vec<(&'static str, usize)>,
}

impl SweepReport {
    pub fn removed_from(&self, collection: &str) -> usize {
        self.removed
            .iter()
            .find(|(c, _)| *c == collection)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

pub struct Sweeper {
    services: Arc<Services>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(services: Arc<Services>, config: &SweeperConfig) -> Self {
        Self {
            services,
            interval: Duration::from_secs(config.interval_secs),
        }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Sweeper starting");

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep().await {
                        tracing::warn!(error = %e, "Sweep failed");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// One full pass.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let failed = self.services.ledger.sweep_expired().await?;
        metrics::record_swept("campaigns", failed.len());

        let mut report = SweepReport {
            failed_campaigns: failed.into_iter().map(|c| c.id).collect(),
            removed: Vec::with_capacity(EXPIRING.len()),
        };

        let now = self.services.clock.now_ms();
        for collection in EXPIRING {
            let removed = self.purge(collection, now).await?;
            report.removed.push((collection, removed));
        }

        let total: usize = report.removed.iter().map(|(_, n)| n).sum();
        if total > 0 || !report.failed_campaigns.is_empty() {
            tracing::info!(
                failed_campaigns = report.failed_campaigns.len(),
                expired_documents = total,
                "Sweep finished"
            );
        }
        Ok(report)
    }

    async fn purge(&self, collection: &'static str, now: u64) -> Result<usize> {
        let store = &self.services.store;
        let expired = store
            .query(collection, &Query::new().less_than("expires_at", now))
            .await?;
        if expired.is_empty() {
            return Ok(0);
        }

        let count = expired.len();
        let writes = expired
            .into_iter()
            .map(|(id, _)| Write::delete(collection, id))
            .collect();
        store.batch(writes).await?;

        metrics::record_swept(collection, count);
        tracing::debug!(collection, count, "Expired documents removed");
        Ok(count)
    }
}

impl std::fmt::Debug for Sweeper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sweeper")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
