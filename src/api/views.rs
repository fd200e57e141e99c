//! Response shapes. Sealed secrets never leave through these.

use serde::Serialize;

use crate::chain::Lamports;
use crate::challenge::{DeliveredContent, DeliveredSecret, Issued};
use crate::ledger::{Account, Campaign, CampaignKind, CampaignMetadata, CampaignStatus, Contribution};

#[derive(Debug, Clone, Serialize)]
pub struct LoginView {
    pub user_id: String,
    pub handle: String,
    pub wallet_pub: String,
    pub is_new: bool,
}

impl LoginView {
    pub fn new(account: &Account, is_new: bool) -> Self {
        Self {
            user_id: account.id.clone(),
            handle: account.handle.clone(),
            wallet_pub: account.public_key.clone(),
            is_new,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalletView {
    pub wallet_pub: String,
    pub balance: Lamports,
    pub balance_sol: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignView {
    pub id: String,
    pub kind: CampaignKind,
    pub status: CampaignStatus,
    pub target: String,
    pub creator_id: String,
    pub creator_handle: String,
    pub wallet_pub: String,
    pub opened_at: u64,
    pub close_at: Option<u64>,
    pub closed_at: Option<u64>,
    pub goal_amount: Option<Lamports>,
    pub goal_usd: Option<f64>,
    pub price_at_open: Option<f64>,
    pub total_raised: Lamports,
    pub metadata: CampaignMetadata,
}

impl From<&Campaign> for CampaignView {
    fn from(c: &Campaign) -> Self {
        Self {
            id: c.id.clone(),
            kind: c.kind,
            status: c.status,
            target: c.target.clone(),
            creator_id: c.creator_id.clone(),
            creator_handle: c.creator_handle.clone(),
            wallet_pub: c.custodial_public_key.clone(),
            opened_at: c.opened_at,
            close_at: c.close_at,
            closed_at: c.closed_at,
            goal_amount: c.goal_amount,
            goal_usd: c.goal_reference_value,
            price_at_open: c.price_at_open,
            total_raised: c.total_raised,
            metadata: c.metadata.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignList {
    pub campaigns: Vec<CampaignView>,
    pub count: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignDetail {
    pub campaign: CampaignView,
    pub contributions: Vec<Contribution>,
    /// Live balance of the campaign wallet.
    pub balance: Lamports,
}

/// A freshly issued challenge: the code to post and the key to poll with.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeView {
    pub verification_code: String,
    pub delivery_key: String,
    pub expires_at: u64,
}

impl From<Issued> for ChallengeView {
    fn from(issued: Issued) -> Self {
        Self {
            verification_code: issued.code,
            delivery_key: issued.delivery_key,
            expires_at: issued.expires_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportStatus {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Option<DeliveredSecret>> for ExportStatus {
    fn from(delivered: Option<DeliveredSecret>) -> Self {
        match delivered.map(|d| d.content) {
            None => Self::default(),
            Some(DeliveredContent::PrivateKey { private_key }) => Self {
                ready: true,
                private_key: Some(private_key),
                error: None,
            },
            Some(DeliveredContent::Failed { error }) => Self {
                ready: true,
                private_key: None,
                error: Some(error),
            },
            Some(DeliveredContent::Withdrawal { .. }) => Self {
                ready: true,
                private_key: None,
                error: Some("unexpected delivery".to_string()),
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct WithdrawStatus {
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Lamports>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Option<DeliveredSecret>> for WithdrawStatus {
    fn from(delivered: Option<DeliveredSecret>) -> Self {
        match delivered.map(|d| d.content) {
            None => Self::default(),
            Some(DeliveredContent::Withdrawal {
                signature,
                amount,
                destination,
            }) => Self {
                completed: true,
                signature: Some(signature),
                amount: Some(amount),
                destination: Some(destination),
                error: None,
            },
            Some(DeliveredContent::Failed { error }) => Self {
                completed: true,
                error: Some(error),
                ..Self::default()
            },
            Some(DeliveredContent::PrivateKey { .. }) => Self {
                completed: true,
                error: Some("unexpected delivery".to_string()),
                ..Self::default()
            },
        }
    }
}
