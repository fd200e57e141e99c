//! Export, withdraw and update flows.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::{decode_public_key, Lamports, Settlement};
use crate::challenge::engine::{ChallengeEngine, Flow};
use crate::challenge::types::{
    Challenge, ChallengeError, ChallengeResult, DeliveredContent, Resolution, UpdateStatus,
};
use crate::config::schema::ChallengeTtl;
use crate::ledger::{Account, Accounts, Campaign, CampaignMetadata, Ledger, LedgerError};
use crate::store::collections::{EXPORT_CHALLENGES, UPDATE_CHALLENGES, WITHDRAW_CHALLENGES};

/// Load the subject account and check the claimed handle owns it.
async fn owned_account(accounts: &Accounts, account_id: &str, claimed_handle: &str) -> ChallengeResult<Account> {
    let account = accounts
        .get(account_id)
        .await?
        .ok_or_else(|| ChallengeError::InvalidRequest(format!("unknown account {}", account_id)))?;
    if account.handle != claimed_handle {
        return Err(ChallengeError::InvalidRequest(format!(
            "@{} does not own account {}",
            claimed_handle, account_id
        )));
    }
    Ok(account)
}

/// Hand the account's private key to the requester.
#[derive(Debug, Clone)]
pub struct ExportFlow {
    accounts: Accounts,
    ttl: ChallengeTtl,
}

impl ExportFlow {
    pub fn new(accounts: Accounts, ttl: ChallengeTtl) -> Self {
        Self { accounts, ttl }
    }
}

#[async_trait]
impl Flow for ExportFlow {
    type Payload = ();

    const NAME: &'static str = "export";

    fn collection(&self) -> &'static str {
        EXPORT_CHALLENGES
    }

    fn ttl(&self) -> ChallengeTtl {
        self.ttl
    }

    async fn validate(&self, subject_id: &str, claimed_handle: &str, _payload: &()) -> ChallengeResult<()> {
        owned_account(&self.accounts, subject_id, claimed_handle).await?;
        Ok(())
    }

    async fn execute(&self, challenge: &Challenge<()>) -> ChallengeResult<Resolution> {
        let account = self
            .accounts
            .get(&challenge.subject_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", challenge.subject_id)))?;
        let secret = self.accounts.export_secret(&account)?;
        Ok(Resolution::Deliver(DeliveredContent::PrivateKey {
            private_key: secret.as_str().to_string(),
        }))
    }
}

/// Destination and amount of a withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawPayload {
    pub destination: String,
    pub amount: Lamports,
}

/// Move funds out of a custodial wallet.
#[derive(Clone)]
pub struct WithdrawFlow {
    accounts: Accounts,
    settlement: Arc<dyn Settlement>,
    fee_buffer: Lamports,
    ttl: ChallengeTtl,
}

impl WithdrawFlow {
    pub fn new(
        accounts: Accounts,
        settlement: Arc<dyn Settlement>,
        fee_buffer: Lamports,
        ttl: ChallengeTtl,
    ) -> Self {
        Self {
            accounts,
            settlement,
            fee_buffer,
            ttl,
        }
    }

    async fn transfer(&self, challenge: &Challenge<WithdrawPayload>) -> Result<DeliveredContent, LedgerError> {
        let account = self
            .accounts
            .get(&challenge.subject_id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", challenge.subject_id)))?;
        let WithdrawPayload { destination, amount } = &challenge.payload;

        let available = self.settlement.balance(&account.public_key).await?;
        let required = amount.saturating_add(self.fee_buffer);
        if available < required {
            return Err(LedgerError::InsufficientFunds { required, available });
        }

        let keypair = self.accounts.keypair(&account)?;
        let receipt = self.settlement.transfer(&keypair, destination, *amount).await?;
        tracing::info!(
            account_id = %account.id,
            destination = %destination,
            lamports = amount.0,
            signature = %receipt.signature,
            "Withdrawal settled"
        );
        Ok(DeliveredContent::Withdrawal {
            signature: receipt.signature,
            amount: *amount,
            destination: destination.clone(),
        })
    }
}

impl std::fmt::Debug for WithdrawFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WithdrawFlow")
            .field("fee_buffer", &self.fee_buffer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Flow for WithdrawFlow {
    type Payload = WithdrawPayload;

    const NAME: &'static str = "withdraw";

    fn collection(&self) -> &'static str {
        WITHDRAW_CHALLENGES
    }

    fn ttl(&self) -> ChallengeTtl {
        self.ttl
    }

    async fn validate(
        &self,
        subject_id: &str,
        claimed_handle: &str,
        payload: &WithdrawPayload,
    ) -> ChallengeResult<()> {
        if decode_public_key(&payload.destination).is_err() {
            return Err(ChallengeError::InvalidRequest(format!(
                "invalid destination address {}",
                payload.destination
            )));
        }
        if payload.amount.0 == 0 {
            return Err(ChallengeError::InvalidRequest("amount must be positive".to_string()));
        }
        owned_account(&self.accounts, subject_id, claimed_handle).await?;
        Ok(())
    }

    /// Transfer failures are delivered, not raised, so the client can show why.
    async fn execute(&self, challenge: &Challenge<WithdrawPayload>) -> ChallengeResult<Resolution> {
        let content = match self.transfer(challenge).await {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!(account_id = %challenge.subject_id, error = %e, "Withdrawal failed");
                DeliveredContent::Failed { error: e.to_string() }
            }
        };
        Ok(Resolution::Deliver(content))
    }
}

/// Campaign whose metadata the request may edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatePayload {
    pub campaign_id: String,
}

/// Unlock one metadata edit for the campaign creator.
#[derive(Debug, Clone)]
pub struct UpdateFlow {
    ledger: Ledger,
    ttl: ChallengeTtl,
}

impl UpdateFlow {
    pub fn new(ledger: Ledger, ttl: ChallengeTtl) -> Self {
        Self { ledger, ttl }
    }

    async fn campaign(&self, campaign_id: &str) -> ChallengeResult<Campaign> {
        self.ledger
            .get(campaign_id)
            .await?
            .ok_or_else(|| ChallengeError::InvalidRequest(format!("unknown campaign {}", campaign_id)))
    }
}

#[async_trait]
impl Flow for UpdateFlow {
    type Payload = UpdatePayload;

    const NAME: &'static str = "update";

    fn collection(&self) -> &'static str {
        UPDATE_CHALLENGES
    }

    fn ttl(&self) -> ChallengeTtl {
        self.ttl
    }

    async fn validate(
        &self,
        _subject_id: &str,
        claimed_handle: &str,
        payload: &UpdatePayload,
    ) -> ChallengeResult<()> {
        let campaign = self.campaign(&payload.campaign_id).await?;
        if campaign.creator_handle != claimed_handle {
            return Err(ChallengeError::InvalidRequest(format!(
                "@{} did not create campaign {}",
                claimed_handle, campaign.id
            )));
        }
        Ok(())
    }

    async fn execute(&self, challenge: &Challenge<UpdatePayload>) -> ChallengeResult<Resolution> {
        let campaign = self
            .ledger
            .get(&challenge.payload.campaign_id)
            .await?
            .ok_or_else(|| ChallengeError::Rejected("campaign no longer exists".to_string()))?;
        let poster = self
            .ledger
            .accounts()
            .find_by_handle(&challenge.claimed_handle)
            .await?;
        match poster {
            Some(account) if account.id == campaign.creator_id => Ok(Resolution::MarkVerified),
            _ => Err(ChallengeError::Rejected(
                "only the campaign creator can update metadata".to_string(),
            )),
        }
    }
}

impl ChallengeEngine<UpdateFlow> {
    /// Begin an update request for a campaign.
    pub async fn request(&self, campaign_id: &str, claimed_handle: &str) -> ChallengeResult<crate::challenge::Issued> {
        self.begin(
            campaign_id,
            claimed_handle,
            UpdatePayload {
                campaign_id: campaign_id.to_string(),
            },
        )
        .await
    }

    async fn live(&self, delivery_key: &str) -> ChallengeResult<Challenge<UpdatePayload>> {
        let challenge = self
            .find_by_delivery_key(delivery_key)
            .await?
            .ok_or(ChallengeError::NotFound)?;
        if challenge.is_expired(self.now_ms()) {
            self.store()
                .delete(self.flow().collection(), &challenge.code)
                .await?;
            return Err(ChallengeError::Expired);
        }
        Ok(challenge)
    }

    /// Whether the request behind `delivery_key` has been verified.
    pub async fn status(&self, delivery_key: &str) -> ChallengeResult<UpdateStatus> {
        let challenge = self.live(delivery_key).await?;
        Ok(UpdateStatus {
            verified: challenge.verified,
            campaign_id: challenge.verified.then_some(challenge.payload.campaign_id),
        })
    }

    /// Apply a metadata edit through a verified request, consuming it.
    pub async fn apply(&self, delivery_key: &str, metadata: &CampaignMetadata) -> ChallengeResult<Campaign> {
        let challenge = self.live(delivery_key).await?;
        if !challenge.verified {
            return Err(ChallengeError::NotVerified);
        }

        let campaign = self
            .flow()
            .ledger
            .update_metadata(&challenge.payload.campaign_id, metadata)
            .await?;
        self.store()
            .delete(self.flow().collection(), &challenge.code)
            .await?;
        Ok(campaign)
    }
}
