//! Settlement layer subsystem.
//!
//! # Data Flow
//! ```text
//! Ledger / challenge flows
//!     → Settlement trait (balance, transfer)
//!     → transaction.rs (build, sign, broadcast, confirm)
//!     → client.rs (JSON-RPC with timeouts and failover)
//! ```
//!
//! # Security Constraints
//! - Custodial secrets arrive here already unsealed and leave as signatures only
//! - Never log private keys or sensitive data
//! - All RPC calls have configurable timeouts

pub mod client;
pub mod keypair;
pub mod transaction;
pub mod types;

use async_trait::async_trait;

pub use client::SolanaRpc;
pub use keypair::{decode_public_key, Keypair};
pub use transaction::SolanaSettlement;
pub use types::{ChainError, ChainResult, Lamports, Receipt, SettlementConfig, LAMPORTS_PER_SOL};

/// The ledger that holds ground truth for balances and transfers.
#[async_trait]
pub trait Settlement: Send + Sync {
    /// A fresh custodial keypair.
    fn create_keypair(&self) -> Keypair {
        Keypair::generate()
    }

    /// Settled balance of a public key.
    async fn balance(&self, public_key: &str) -> ChainResult<Lamports>;

    /// Transfer `amount` from `from` to `to`. Returns only once the transfer is confirmed.
    async fn transfer(&self, from: &Keypair, to: &str, amount: Lamports) -> ChainResult<Receipt>;
}
