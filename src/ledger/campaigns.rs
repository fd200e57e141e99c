//! Campaign funding state machine.
//!
//! ```text
//!            contribute() and wallet value >= goal
//!   active ─────────────────────────────────────────▶ funded
//!     │
//!     │ sweep_expired() once a timed campaign passes close_at
//!     ▼
//!   failed
//! ```
//!
//! `total_raised` is always the last settled balance of the campaign wallet,
//! re-read after every contribution rather than accumulated.

use serde_json::json;
use std::sync::Arc;

use crate::chain::{Lamports, Receipt, Settlement};
use crate::clock::{secs_to_ms, Clock};
use crate::command::is_valid_address;
use crate::config::schema::CampaignsConfig;
use crate::crypto::Envelope;
use crate::ledger::accounts::Accounts;
use crate::ledger::types::{
    slot_key, Account, Campaign, CampaignFilter, CampaignKind, CampaignMetadata, CampaignStatus,
    Contribution, ContributionReceipt, LedgerError, LedgerResult,
};
use crate::notify::{Notice, Notifications};
use crate::observability::metrics;
use crate::oracle::PriceOracle;
use crate::store::collections::{ACTIVE_CAMPAIGNS, CAMPAIGNS, CONTRIBUTIONS};
use crate::store::{DocumentStore, DocumentStoreExt, Op, Query, Write};

const SWEEP_ATTEMPTS: u32 = 3;

/// Rules the ledger enforces.
#[derive(Debug, Clone)]
pub struct LedgerRules {
    pub campaigns: CampaignsConfig,
    /// Balance a contributor must hold beyond the contribution itself.
    pub fee_buffer: Lamports,
    /// Asset id priced by the oracle to convert USD goals.
    pub price_asset: String,
}

/// Campaign operations.
#[derive(Clone)]
pub struct Ledger {
    store: Arc<dyn DocumentStore>,
    settlement: Arc<dyn Settlement>,
    oracle: Arc<dyn PriceOracle>,
    envelope: Arc<Envelope>,
    clock: Arc<dyn Clock>,
    accounts: Accounts,
    notifications: Notifications,
    rules: LedgerRules,
}

impl Ledger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settlement: Arc<dyn Settlement>,
        oracle: Arc<dyn PriceOracle>,
        envelope: Arc<Envelope>,
        clock: Arc<dyn Clock>,
        accounts: Accounts,
        notifications: Notifications,
        rules: LedgerRules,
    ) -> Self {
        Self {
            store,
            settlement,
            oracle,
            envelope,
            clock,
            accounts,
            notifications,
            rules,
        }
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn rules(&self) -> &LedgerRules {
        &self.rules
    }

    /// Open a campaign for `target` with a fresh custodial wallet.
    ///
    /// Goal-bearing kinds convert their USD goal through a live price; if the
    /// lookup fails nothing is written.
    pub async fn open(
        &self,
        kind: CampaignKind,
        target: &str,
        creator: &Account,
        media: &[String],
    ) -> LedgerResult<Campaign> {
        if !is_valid_address(target) {
            return Err(LedgerError::InvalidAddress(target.to_string()));
        }

        let goal_reference_value = self.rules.campaigns.goal_usd(kind);
        let (goal_amount, price_at_open) = match goal_reference_value {
            Some(usd) => {
                let price = self.oracle.price_of(&self.rules.price_asset).await?;
                let amount = Lamports::from_sol(usd / price).ok_or_else(|| {
                    LedgerError::InvalidAmount(format!("goal ${} at price {}", usd, price))
                })?;
                (Some(amount), Some(price))
            }
            None => (None, None),
        };

        let id = uuid::Uuid::new_v4().to_string();
        let keypair = self.settlement.create_keypair();
        let sealed = self.envelope.seal(keypair.to_base58().as_bytes(), &id)?;

        let now = self.clock.now_ms();
        let close_at = match kind {
            CampaignKind::Timed => Some(now + secs_to_ms(self.rules.campaigns.timed_duration_secs)),
            CampaignKind::Open => None,
        };

        let campaign = Campaign {
            id: id.clone(),
            kind,
            creator_id: creator.id.clone(),
            creator_handle: creator.handle.clone(),
            target: target.to_string(),
            custodial_public_key: keypair.public_key(),
            encrypted_custodial_secret: sealed,
            opened_at: now,
            close_at,
            status: CampaignStatus::Active,
            goal_amount,
            goal_reference_value,
            price_at_open,
            total_raised: Lamports(0),
            metadata: CampaignMetadata::from_media(media),
            closed_at: None,
        };

        let slot = slot_key(kind, target);
        let claimed = self
            .store
            .insert_if_absent(
                ACTIVE_CAMPAIGNS,
                &slot,
                json!({ "campaign_id": id, "claimed_at": now }),
            )
            .await?;
        if !claimed {
            return Err(LedgerError::AlreadyActive {
                kind,
                target: target.to_string(),
            });
        }

        if let Err(e) = self.store.put_as(CAMPAIGNS, &id, &campaign).await {
            if let Err(release) = self.store.delete(ACTIVE_CAMPAIGNS, &slot).await {
                tracing::error!(slot = %slot, error = %release, "Failed to release campaign slot");
            }
            return Err(e.into());
        }

        metrics::record_campaign_transition("opened");
        tracing::info!(
            campaign_id = %id,
            kind = %kind,
            target = %target,
            creator = %creator.handle,
            goal_lamports = ?goal_amount.map(|g| g.0),
            "Campaign opened"
        );

        self.notifications.publish(Notice::CampaignCreated {
            campaign_id: id,
            kind: kind.to_string(),
            target: target.to_string(),
            creator_handle: creator.handle.clone(),
            goal_usd: goal_reference_value,
            goal_amount,
        });

        Ok(campaign)
    }

    /// The active campaign for (kind, target), if any.
    pub async fn find(&self, kind: CampaignKind, target: &str) -> LedgerResult<Option<Campaign>> {
        let query = Query::new()
            .equals("kind", kind.as_str())
            .equals("target", target)
            .equals("status", CampaignStatus::Active.as_str())
            .limit(1);
        let mut found: Vec<Campaign> = self.store.query_as(CAMPAIGNS, &query).await?;
        Ok(found.pop())
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Campaign>> {
        Ok(self.store.get_as(CAMPAIGNS, id).await?)
    }

    async fn require(&self, id: &str) -> LedgerResult<Campaign> {
        self.get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("campaign {}", id)))
    }

    /// Campaigns matching `filter`, newest first.
    pub async fn list(&self, filter: &CampaignFilter) -> LedgerResult<Vec<Campaign>> {
        let mut query = Query::new();
        if let Some(kind) = filter.kind {
            query = query.equals("kind", kind.as_str());
        }
        if let Some(status) = filter.status {
            query = query.equals("status", status.as_str());
        }
        let mut campaigns: Vec<Campaign> = self.store.query_as(CAMPAIGNS, &query).await?;
        campaigns.sort_by(|a, b| b.opened_at.cmp(&a.opened_at));
        if let Some(limit) = filter.limit {
            campaigns.truncate(limit);
        }
        Ok(campaigns)
    }

    /// Contributions to a campaign, newest first.
    pub async fn contributions(&self, campaign_id: &str) -> LedgerResult<Vec<Contribution>> {
        let query = Query::new().equals("campaign_id", campaign_id);
        let mut rows: Vec<Contribution> = self.store.query_as(CONTRIBUTIONS, &query).await?;
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    /// Live balance of a campaign's custodial wallet.
    pub async fn wallet_balance(&self, campaign: &Campaign) -> LedgerResult<Lamports> {
        Ok(self.settlement.balance(&campaign.custodial_public_key).await?)
    }

    /// Move `amount` from the contributor's wallet into the campaign wallet.
    pub async fn contribute(
        &self,
        campaign_id: &str,
        contributor: &Account,
        amount: Lamports,
    ) -> LedgerResult<ContributionReceipt> {
        if amount.0 == 0 {
            return Err(LedgerError::InvalidAmount("amount must be positive".to_string()));
        }

        let campaign = self.require(campaign_id).await?;
        if campaign.status != CampaignStatus::Active {
            return Err(LedgerError::NotActive {
                id: campaign.id,
                status: campaign.status,
            });
        }
        if campaign.is_past_close(self.clock.now_ms()) {
            return Err(LedgerError::Expired(campaign.id));
        }

        let available = self.settlement.balance(&contributor.public_key).await?;
        let required = amount.saturating_add(self.rules.fee_buffer);
        if available < required {
            return Err(LedgerError::InsufficientFunds {
                required,
                available,
            });
        }

        let keypair = self.accounts.keypair(contributor)?;
        let Receipt { signature } = self
            .settlement
            .transfer(&keypair, &campaign.custodial_public_key, amount)
            .await?;

        let now = self.clock.now_ms();
        let contribution = Contribution {
            id: uuid::Uuid::new_v4().to_string(),
            campaign_id: campaign.id.clone(),
            account_id: contributor.id.clone(),
            amount,
            settlement_reference: signature,
            timestamp: now,
        };
        self.store
            .put_as(CONTRIBUTIONS, &contribution.id, &contribution)
            .await?;
        metrics::record_contribution();

        let total_raised = self.settlement.balance(&campaign.custodial_public_key).await?;
        let goal_met = self.goal_met(&campaign, total_raised).await;

        // The funded transition only lands while the campaign is still active;
        // a sweep or another contribution may have closed it during the transfer.
        let fully_funded = goal_met
            && self
                .store
                .batch(vec![
                    Write::expect_field(CAMPAIGNS, &campaign.id, "status", CampaignStatus::Active.as_str()),
                    Write::merge(
                        CAMPAIGNS,
                        &campaign.id,
                        json!({
                            "total_raised": total_raised,
                            "status": CampaignStatus::Funded,
                            "closed_at": now,
                        }),
                    ),
                    Write::delete(ACTIVE_CAMPAIGNS, campaign.slot_key()),
                ])
                .await?;

        if fully_funded {
            metrics::record_campaign_transition("funded");
            tracing::info!(campaign_id = %campaign.id, total_raised = total_raised.0, "Campaign funded");
        } else {
            if goal_met {
                tracing::info!(campaign_id = %campaign.id, "Campaign closed before funding transition");
            }
            self.store
                .merge(CAMPAIGNS, &campaign.id, json!({ "total_raised": total_raised }))
                .await?;
        }

        tracing::info!(
            campaign_id = %campaign.id,
            account_id = %contributor.id,
            lamports = amount.0,
            total_raised = total_raised.0,
            signature = %contribution.settlement_reference,
            "Contribution recorded"
        );

        self.notifications.publish(Notice::Contribution {
            campaign_id: campaign.id.clone(),
            target: campaign.target.clone(),
            contributor_handle: contributor.handle.clone(),
            amount,
            total_raised,
            fully_funded,
        });

        Ok(ContributionReceipt {
            contribution,
            total_raised,
            fully_funded,
        })
    }

    /// Compare the wallet's value against the goal using a fresh price.
    /// A failed price lookup counts as "not yet"; the transfer already settled.
    async fn goal_met(&self, campaign: &Campaign, balance: Lamports) -> bool {
        match (campaign.goal_reference_value, campaign.goal_amount) {
            (Some(goal_usd), _) => match self.oracle.price_of(&self.rules.price_asset).await {
                Ok(price) => balance.as_sol() * price >= goal_usd,
                Err(e) => {
                    tracing::warn!(campaign_id = %campaign.id, error = %e, "Price lookup failed during funding check");
                    false
                }
            },
            (None, Some(goal)) => balance >= goal,
            (None, None) => false,
        }
    }

    /// Merge non-blank metadata fields into a campaign.
    pub async fn update_metadata(
        &self,
        campaign_id: &str,
        patch: &CampaignMetadata,
    ) -> LedgerResult<Campaign> {
        let mut campaign = self.require(campaign_id).await?;
        campaign.metadata.apply(patch);
        self.store
            .merge(
                CAMPAIGNS,
                campaign_id,
                json!({ "metadata": campaign.metadata }),
            )
            .await?;
        tracing::info!(campaign_id = %campaign_id, "Campaign metadata updated");
        Ok(campaign)
    }

    /// Fail every active timed campaign whose deadline has passed, in one batch.
    ///
    /// Each campaign is guarded on still being active. If one was closed
    /// between the query and the write, nothing is applied and the sweep
    /// re-queries.
    pub async fn sweep_expired(&self) -> LedgerResult<Vec<Campaign>> {
        let now = self.clock.now_ms();
        let query = Query::new()
            .equals("status", CampaignStatus::Active.as_str())
            .equals("kind", CampaignKind::Timed.as_str())
            .filter("close_at", Op::Lte, now);

        let mut expired: Vec<Campaign> = Vec::new();
        let mut applied = false;
        for attempt in 1..=SWEEP_ATTEMPTS {
            expired = self.store.query_as(CAMPAIGNS, &query).await?;
            if expired.is_empty() {
                return Ok(expired);
            }

            let writes = expired
                .iter()
                .flat_map(|c| {
                    [
                        Write::expect_field(CAMPAIGNS, &c.id, "status", CampaignStatus::Active.as_str()),
                        Write::merge(
                            CAMPAIGNS,
                            &c.id,
                            json!({ "status": CampaignStatus::Failed, "closed_at": now }),
                        ),
                        Write::delete(ACTIVE_CAMPAIGNS, c.slot_key()),
                    ]
                })
                .collect();
            if self.store.batch(writes).await? {
                applied = true;
                break;
            }
            tracing::debug!(attempt, "Expiry sweep raced a status change, retrying");
        }
        if !applied {
            tracing::warn!(attempts = SWEEP_ATTEMPTS, "Expiry sweep kept conflicting, deferring");
            return Ok(Vec::new());
        }

        for campaign in &expired {
            metrics::record_campaign_transition("failed");
            tracing::info!(campaign_id = %campaign.id, target = %campaign.target, "Campaign expired");
            self.notifications.publish(Notice::CampaignFailed {
                campaign_id: campaign.id.clone(),
                target: campaign.target.clone(),
                total_raised: campaign.total_raised,
            });
        }

        Ok(expired
            .into_iter()
            .map(|mut c| {
                c.status = CampaignStatus::Failed;
                c.closed_at = Some(now);
                c
            })
            .collect())
    }

}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
