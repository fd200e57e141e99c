//! Challenge records and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::chain::Lamports;
use crate::ledger::LedgerError;
use crate::store::StoreError;

/// A pending proof-of-authorship request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge<P> {
    /// Six-digit code the user must post.
    pub code: String,
    /// Account or campaign the request acts on.
    pub subject_id: String,
    /// Normalized handle expected to author the post.
    pub claimed_handle: String,
    pub payload: P,
    /// Opaque token the requesting client polls with.
    pub delivery_key: String,
    pub created_at: u64,
    pub expires_at: u64,
    #[serde(default)]
    pub verified: bool,
}

impl<P> Challenge<P> {
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms > self.expires_at
    }
}

/// What `begin` hands back to the requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issued {
    pub code: String,
    pub delivery_key: String,
    pub expires_at: u64,
}

/// Payload of a one-time delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeliveredContent {
    /// Base-58 keypair of an exported wallet.
    PrivateKey { private_key: String },
    /// Settled withdrawal.
    Withdrawal {
        signature: String,
        amount: Lamports,
        destination: String,
    },
    /// The verified action could not be carried out.
    Failed { error: String },
}

/// A dead-drop entry: written once, read and deleted once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredSecret {
    pub delivery_key: String,
    /// Flow that wrote the entry.
    pub flow: String,
    pub content: DeliveredContent,
    pub expires_at: u64,
}

/// How a verified challenge is settled.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Write `content` to the delivery slot and consume the challenge.
    Deliver(DeliveredContent),
    /// Keep the challenge, flagged verified, for a follow-up call.
    MarkVerified,
}

/// Result of a successful `verify`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Delivered,
    Verified,
}

/// Verification state of an update request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub verified: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
}

#[derive(Debug, Error)]
pub enum ChallengeError {
    /// Never issued, already consumed, or swept.
    #[error("challenge not found")]
    NotFound,

    #[error("challenge expired")]
    Expired,

    #[error("post author @{observed} does not match @{claimed}")]
    HandleMismatch { claimed: String, observed: String },

    /// Authorship was proven but the action is not allowed.
    #[error("rejected: {0}")]
    Rejected(String),

    #[error("challenge has not been verified")]
    NotVerified,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("could not allocate a free code")]
    CodeSpaceExhausted,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub type ChallengeResult<T> = Result<T, ChallengeError>;
