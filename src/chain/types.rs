//! Settlement types and error definitions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export SettlementConfig from config module to avoid duplication
pub use crate::config::schema::SettlementConfig;

/// Lamports per SOL.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// An amount of native currency in its smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lamports(pub u64);

impl Lamports {
    /// Convert a SOL amount, flooring to whole lamports. Returns `None` for
    /// negative, non-finite or out-of-range input.
    pub fn from_sol(sol: f64) -> Option<Self> {
        if !sol.is_finite() || sol < 0.0 {
            return None;
        }
        let lamports = (sol * LAMPORTS_PER_SOL as f64).floor();
        if lamports > u64::MAX as f64 {
            return None;
        }
        Some(Self(lamports as u64))
    }

    /// Parse a decimal SOL amount such as `"4.1"` without going through
    /// floating point. Digits past the ninth decimal place are dropped.
    /// Only ASCII digits with at most one point are accepted.
    pub fn parse_sol(text: &str) -> Option<Self> {
        let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return None;
        }

        let whole: u64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let fraction = &fraction[..fraction.len().min(9)];
        let fraction: u64 = format!("{:0<9}", fraction).parse().ok()?;
        whole
            .checked_mul(LAMPORTS_PER_SOL)?
            .checked_add(fraction)
            .map(Self)
    }

    pub fn as_sol(&self) -> f64 {
        self.0 as f64 / LAMPORTS_PER_SOL as f64
    }

    pub fn saturating_add(self, other: Lamports) -> Lamports {
        Lamports(self.0.saturating_add(other.0))
    }
}

impl From<u64> for Lamports {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for Lamports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.9} SOL", self.as_sol())
    }
}

/// Proof that a transfer settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Base-58 transaction signature.
    pub signature: String,
}

/// Errors that can occur during settlement operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// RPC connection or request failed.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Transaction was not confirmed within the allowed time.
    #[error("Transaction {signature} not confirmed after {secs} seconds")]
    ConfirmationTimeout { signature: String, secs: u64 },

    /// Transaction landed but failed on-chain.
    #[error("Transaction failed: {0}")]
    Failed(String),

    /// Invalid secret key encoding.
    #[error("Keypair error: {0}")]
    Keypair(String),

    /// Not a valid base-58 public key.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

/// Result type for settlement operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// Signature confirmation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Not yet seen by the cluster, or below the requested commitment.
    Pending,
    /// Reached the requested commitment.
    Confirmed,
    /// Landed with an error.
    Failed(String),
}
