//! Ledger records and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::{ChainError, Lamports};
use crate::crypto::CryptoError;
use crate::oracle::OracleError;
use crate::store::StoreError;

/// A registered handle and its custodial wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    /// Normalized: lowercase, no leading '@'.
    pub handle: String,
    pub public_key: String,
    /// Base-58 keypair sealed under `id`.
    pub encrypted_secret_key: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignKind {
    /// Fixed duration with a USD goal.
    Timed,
    /// No deadline.
    Open,
}

impl CampaignKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignKind::Timed => "timed",
            CampaignKind::Open => "open",
        }
    }
}

impl std::fmt::Display for CampaignKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CampaignKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "timed" => Ok(CampaignKind::Timed),
            "open" => Ok(CampaignKind::Open),
            other => Err(format!("unknown campaign kind '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Active,
    /// Terminal.
    Funded,
    /// Terminal.
    Failed,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Active => "active",
            CampaignStatus::Funded => "funded",
            CampaignStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(CampaignStatus::Active),
            "funded" => Ok(CampaignStatus::Funded),
            "failed" => Ok(CampaignStatus::Failed),
            other => Err(format!("unknown campaign status '{}'", other)),
        }
    }
}

/// Presentation fields a creator may edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CampaignMetadata {
    pub main_image: Option<String>,
    pub header_image: Option<String>,
    pub description: Option<String>,
    pub twitter: Option<String>,
    pub telegram: Option<String>,
    pub website: Option<String>,
}

impl CampaignMetadata {
    /// Seed images from post media: first is the main image, second the header.
    pub fn from_media(media: &[String]) -> Self {
        Self {
            main_image: media.first().cloned(),
            header_image: media.get(1).cloned(),
            ..Self::default()
        }
    }

    /// Overwrite fields that `patch` sets to a non-blank value.
    pub fn apply(&mut self, patch: &CampaignMetadata) {
        fn take(slot: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *slot = Some(v.to_string());
            }
        }
        take(&mut self.main_image, &patch.main_image);
        take(&mut self.header_image, &patch.header_image);
        take(&mut self.description, &patch.description);
        take(&mut self.twitter, &patch.twitter);
        take(&mut self.telegram, &patch.telegram);
        take(&mut self.website, &patch.website);
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    pub kind: CampaignKind,
    pub creator_id: String,
    pub creator_handle: String,
    /// Token address the campaign raises for.
    pub target: String,
    pub custodial_public_key: String,
    /// Base-58 keypair sealed under `id`.
    pub encrypted_custodial_secret: String,
    pub opened_at: u64,
    /// Deadline for timed campaigns.
    pub close_at: Option<u64>,
    pub status: CampaignStatus,
    /// Goal in native units, converted from `goal_reference_value` at open.
    pub goal_amount: Option<Lamports>,
    /// Goal in USD.
    pub goal_reference_value: Option<f64>,
    /// USD price used for the conversion at open.
    pub price_at_open: Option<f64>,
    /// Last settled balance of the custodial wallet.
    pub total_raised: Lamports,
    #[serde(default)]
    pub metadata: CampaignMetadata,
    /// When the campaign reached a terminal status.
    #[serde(default)]
    pub closed_at: Option<u64>,
}

impl Campaign {
    /// Whether a timed campaign's deadline has passed at `now_ms`.
    pub fn is_past_close(&self, now_ms: u64) -> bool {
        self.kind == CampaignKind::Timed && self.close_at.is_some_and(|close| now_ms >= close)
    }

    /// Key of the at-most-one-active slot for this campaign's (kind, target).
    pub fn slot_key(&self) -> String {
        slot_key(self.kind, &self.target)
    }
}

pub fn slot_key(kind: CampaignKind, target: &str) -> String {
    format!("{}:{}", kind, target)
}

/// Append-only record of one settled transfer into a campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contribution {
    pub id: String,
    pub campaign_id: String,
    pub account_id: String,
    pub amount: Lamports,
    /// Transaction signature.
    pub settlement_reference: String,
    pub timestamp: u64,
}

/// Result of a successful contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionReceipt {
    pub contribution: Contribution,
    pub total_raised: Lamports,
    pub fully_funded: bool,
}

/// Campaign listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CampaignFilter {
    pub kind: Option<CampaignKind>,
    pub status: Option<CampaignStatus>,
    pub limit: Option<usize>,
}

/// Errors from account and campaign operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("campaign {id} is not active ({status})")]
    NotActive { id: String, status: CampaignStatus },

    #[error("campaign {0} has expired")]
    Expired(String),

    #[error("insufficient balance: need {required} including fee buffer, have {available}")]
    InsufficientFunds {
        required: Lamports,
        available: Lamports,
    },

    #[error("an active {kind} campaign already exists for {target}")]
    AlreadyActive { kind: CampaignKind, target: String },

    #[error("invalid handle '{0}'")]
    InvalidHandle(String),

    #[error("invalid address '{0}'")]
    InvalidAddress(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("price lookup failed: {0}")]
    Price(#[from] OracleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
