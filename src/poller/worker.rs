//! The polling loop.

use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::challenge::VerifyOutcome;
use crate::command::{self, Command};
use crate::config::schema::PollerConfig;
use crate::error::Error;
use crate::feed::{EventId, FeedError, Post, SocialFeed};
use crate::ledger::{Account, CampaignKind, LedgerError};
use crate::observability::metrics;
use crate::poller::event::{EventStatus, ProcessedEvent};
use crate::services::Services;
use crate::store::collections::PROCESSED_EVENTS;
use crate::store::StoreError;

/// Cursor carried from one tick to the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerState {
    /// Highest post id handled so far.
    pub last_seen: Option<EventId>,
}

impl PollerState {
    fn advance(&mut self, id: EventId) {
        self.last_seen = Some(self.last_seen.map_or(id, |seen| seen.max(id)));
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub fetched: usize,
    pub duplicates: usize,
    pub ignored: usize,
    pub completed: usize,
    pub failed: usize,
    pub abandoned: usize,
}

#[derive(Debug, Error)]
pub enum PollerError {
    #[error("previous tick still running")]
    Busy,

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("account lookup failed: {0}")]
    Lookup(#[from] LedgerError),
}

/// Clears the busy flag however the tick ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

enum Handled {
    Duplicate,
    Ignored,
    Abandoned,
    Completed,
    Failed,
}

pub struct Poller {
    services: Arc<Services>,
    feed: Arc<dyn SocialFeed>,
    handle: String,
    interval: Duration,
    busy: AtomicBool,
}

impl Poller {
    pub fn new(
        services: Arc<Services>,
        feed: Arc<dyn SocialFeed>,
        handle: impl Into<String>,
        config: &PollerConfig,
    ) -> Self {
        Self {
            services,
            feed,
            handle: handle.into().trim_start_matches('@').to_string(),
            interval: Duration::from_secs(config.interval_secs),
            busy: AtomicBool::new(false),
        }
    }

    pub async fn run(self, mut state: PollerState, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            handle = %self.handle,
            interval_secs = self.interval.as_secs(),
            "Poller starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick(&mut state).await {
                        Ok(summary) => {
                            if summary.fetched > 0 {
                                tracing::info!(?summary, last_seen = ?state.last_seen, "Poller tick finished");
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "Poller tick failed"),
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Poller received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Fetch new mentions and handle each one. Returns `Busy` when a tick is
    /// already in progress.
    pub async fn tick(&self, state: &mut PollerState) -> Result<TickSummary, PollerError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            metrics::record_poller_tick("busy");
            return Err(PollerError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let mut posts = match self.feed.mentions(&self.handle, state.last_seen).await {
            Ok(posts) => posts,
            Err(e) => {
                metrics::record_poller_tick("feed_error");
                return Err(e.into());
            }
        };
        posts.sort_by_key(|p| p.id);

        let mut summary = TickSummary {
            fetched: posts.len(),
            ..TickSummary::default()
        };

        for post in &posts {
            let handled = match self.handle_post(post).await {
                Ok(handled) => handled,
                Err(e) => {
                    metrics::record_poller_tick("aborted");
                    tracing::error!(event_id = %post.id, error = %e, "Post handling failed, ending tick");
                    return Err(e);
                }
            };
            match handled {
                Handled::Duplicate => summary.duplicates += 1,
                Handled::Ignored => summary.ignored += 1,
                Handled::Abandoned => summary.abandoned += 1,
                Handled::Completed => summary.completed += 1,
                Handled::Failed => summary.failed += 1,
            }
            state.advance(post.id);
        }

        metrics::record_poller_tick("ok");
        Ok(summary)
    }

    async fn handle_post(&self, post: &Post) -> Result<Handled, PollerError> {
        let store = &self.services.store;
        let key = post.id.to_string();

        if store.get(PROCESSED_EVENTS, &key).await?.is_some() {
            tracing::debug!(event_id = %post.id, "Post already processed");
            return Ok(Handled::Duplicate);
        }

        let Some(command) = command::parse(&post.text) else {
            return Ok(Handled::Ignored);
        };
        let kind = command.kind();

        let now = self.services.clock.now_ms();
        let row = ProcessedEvent::processing(post.id, kind, &post.author, now);
        let doc = serde_json::to_value(&row).map_err(StoreError::from)?;
        if !store.insert_if_absent(PROCESSED_EVENTS, &key, doc).await? {
            return Ok(Handled::Duplicate);
        }

        let Some(account) = self.services.accounts().find_by_handle(&post.author).await? else {
            metrics::record_event(kind.as_str(), "abandoned");
            tracing::info!(event_id = %post.id, command = %kind, author = %post.author, "No account for author, command abandoned");
            return Ok(Handled::Abandoned);
        };

        tracing::info!(event_id = %post.id, command = %kind, account_id = %account.id, "Executing command");

        let (status, detail) = match self.dispatch(command, &account, post).await {
            Ok(detail) => (EventStatus::Completed, detail),
            Err(e) => {
                tracing::warn!(event_id = %post.id, command = %kind, error = %e, "Command failed");
                (EventStatus::Failed, e.to_string())
            }
        };

        store
            .merge(
                PROCESSED_EVENTS,
                &key,
                json!({
                    "status": status,
                    "detail": detail,
                    "updated_at": self.services.clock.now_ms(),
                }),
            )
            .await?;
        metrics::record_event(kind.as_str(), status.as_str());

        Ok(match status {
            EventStatus::Failed => Handled::Failed,
            _ => Handled::Completed,
        })
    }

    async fn dispatch(&self, command: Command, account: &Account, post: &Post) -> Result<String, Error> {
        let services = &self.services;
        match command {
            Command::Create { target } => {
                let campaign = services
                    .ledger
                    .open(services.campaigns.default_kind, &target, account, &post.media)
                    .await?;
                Ok(format!("campaign {} opened", campaign.id))
            }
            Command::Fund { amount, target } => {
                if amount.0 == 0 {
                    return Err(LedgerError::InvalidAmount("amount is below one lamport".to_string()).into());
                }

                let default_kind = services.campaigns.default_kind;
                let other_kind = match default_kind {
                    CampaignKind::Timed => CampaignKind::Open,
                    CampaignKind::Open => CampaignKind::Timed,
                };
                let campaign = match services.ledger.find(default_kind, &target).await? {
                    Some(campaign) => campaign,
                    None => services
                        .ledger
                        .find(other_kind, &target)
                        .await?
                        .ok_or_else(|| LedgerError::NotFound(format!("active campaign for {}", target)))?,
                };

                let receipt = services.ledger.contribute(&campaign.id, account, amount).await?;
                Ok(format!(
                    "contributed {} to {} (total {}{})",
                    amount,
                    campaign.id,
                    receipt.total_raised,
                    if receipt.fully_funded { ", funded" } else { "" }
                ))
            }
            Command::Export { code } => {
                let outcome = services.export.verify(&code, &post.author).await?;
                Ok(describe(outcome))
            }
            Command::Withdraw { code } => {
                let outcome = services.withdraw.verify(&code, &post.author).await?;
                Ok(describe(outcome))
            }
            Command::Update { code } => {
                let outcome = services.update.verify(&code, &post.author).await?;
                Ok(describe(outcome))
            }
        }
    }
}

fn describe(outcome: VerifyOutcome) -> String {
    match outcome {
        VerifyOutcome::Delivered => "delivered".to_string(),
        VerifyOutcome::Verified => "verified".to_string(),
    }
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("handle", &self.handle)
            .field("interval", &self.interval)
            .field("busy", &self.busy.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_only_moves_forward() {
        let mut state = PollerState::default();
        state.advance(EventId(10));
        state.advance(EventId(7));
        assert_eq!(state.last_seen, Some(EventId(10)));
        state.advance(EventId(11));
        assert_eq!(state.last_seen, Some(EventId(11)));
    }

    #[test]
    fn test_busy_guard_clears_flag() {
        let busy = AtomicBool::new(true);
        {
            let _guard = BusyGuard(&busy);
        }
        assert!(!busy.load(Ordering::Acquire));
    }
}
