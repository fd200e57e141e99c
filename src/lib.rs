//! Crowdfunding driven by social posts.
//!
//! Users command the service by mentioning its handle. A poller turns those
//! posts into campaign and wallet operations settled on Solana, and a
//! challenge-response protocol lets a user prove authorship of a post before a
//! sensitive action (key export, withdrawal, metadata edit) runs.

// Core
pub mod config;
pub mod crypto;
pub mod command;
pub mod store;
pub mod clock;

// External collaborators
pub mod chain;
pub mod oracle;
pub mod feed;
pub mod notify;

// Domain
pub mod ledger;
pub mod challenge;
pub mod services;

// Background loops and surface
pub mod poller;
pub mod sweeper;
pub mod api;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::FunderConfig;
pub use error::{Error, Result};
pub use lifecycle::Shutdown;
pub use services::Services;
