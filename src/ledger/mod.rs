//! Accounts and the campaign ledger.
//!
//! # Data Flow
//! ```text
//! poller / api
//!     → accounts.rs (login, handle lookup, wallet balance, unseal)
//!     → campaigns.rs (open, contribute, find, list, sweep_expired)
//!     → Settlement (transfers and balance reads)
//!     → DocumentStore (accounts, campaigns, contributions, active slots)
//! ```
//!
//! # Design Decisions
//! - The settlement layer is the source of truth for `total_raised`
//! - At most one active campaign per (kind, target), claimed with a conditional insert
//! - Custodial secrets are sealed under the owning record's id

pub mod accounts;
pub mod campaigns;
pub mod types;

pub use accounts::{normalize_handle, same_handle, Accounts};
pub use campaigns::{Ledger, LedgerRules};
pub use types::{
    Account, Campaign, CampaignFilter, CampaignKind, CampaignMetadata, CampaignStatus,
    Contribution, ContributionReceipt, LedgerError, LedgerResult,
};
