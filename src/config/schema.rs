//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.
//! Secrets are never read from the file; see [`crate::config::loader`].

use serde::{Deserialize, Serialize};

use crate::ledger::CampaignKind;

/// Root configuration for the crowdfunding service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FunderConfig {
    /// HTTP surface settings.
    pub server: ServerConfig,

    /// Social feed ingestion.
    pub feed: FeedConfig,

    /// Settlement layer (Solana JSON-RPC).
    pub settlement: SettlementConfig,

    /// Price oracle.
    pub oracle: OracleConfig,

    /// Notification sink.
    pub notify: NotifyConfig,

    /// Post ingestion loop.
    pub poller: PollerConfig,

    /// Expiry sweeper loop.
    pub sweeper: SweeperConfig,

    /// Campaign rules.
    pub campaigns: CampaignsConfig,

    /// Challenge and delivery lifetimes per flow.
    pub challenges: ChallengesConfig,

    /// Document store persistence.
    pub store: StoreConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum request body in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
            max_body_size: 64 * 1024,
        }
    }
}

/// Mention search configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Handle whose mentions carry commands, without the leading '@'.
    pub handle: String,

    /// Search API host (RapidAPI style).
    pub api_host: String,

    /// Search API key. Overridden by `XFUNDER_FEED_API_KEY`.
    #[serde(skip_serializing)]
    pub api_key: String,

    /// Maximum posts fetched per tick.
    pub page_size: u32,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            handle: "XFundDex".to_string(),
            api_host: "twitter154.p.rapidapi.com".to_string(),
            api_key: String::new(),
            page_size: 50,
            timeout_secs: 10,
        }
    }
}

/// Settlement layer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// JSON-RPC endpoint URL. Overridden by `XFUNDER_RPC_URL`.
    pub rpc_url: String,

    /// Failover JSON-RPC endpoint URLs.
    pub failover_urls: Vec<String>,

    /// Commitment level for reads and confirmation ("confirmed" or "finalized").
    pub commitment: String,

    /// RPC request timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// How long a transfer may wait for confirmation, in seconds.
    pub confirmation_timeout_secs: u64,

    /// Lamports a sender must hold on top of the transfer amount.
    pub fee_buffer_lamports: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
            failover_urls: Vec::new(),
            commitment: "confirmed".to_string(),
            rpc_timeout_secs: 10,
            confirmation_timeout_secs: 60,
            fee_buffer_lamports: 10_000,
        }
    }
}

/// Price oracle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Price API endpoint.
    pub price_url: String,

    /// Asset id whose USD price converts campaign goals (wrapped SOL mint).
    pub asset: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            price_url: "https://lite-api.jup.ag/price/v3".to_string(),
            asset: "So11111111111111111111111111111111111111112".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Telegram notification configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,

    /// Bot token. Overridden by `XFUNDER_TELEGRAM_BOT_TOKEN`.
    #[serde(skip_serializing)]
    pub bot_token: String,

    /// Destination chat or channel id.
    pub chat_id: String,

    /// Public frontend base URL used for campaign links.
    pub frontend_url: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: String::new(),
            chat_id: String::new(),
            frontend_url: "http://localhost:3000".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Poller configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 15,
        }
    }
}

/// Expiry sweeper configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SweeperConfig {
    pub enabled: bool,
    pub interval_secs: u64,
}

impl Default for SweeperConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
        }
    }
}

/// Campaign rules.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CampaignsConfig {
    /// Kind opened by a CREATE post.
    pub default_kind: CampaignKind,

    /// Lifetime of a timed campaign in seconds.
    pub timed_duration_secs: u64,

    /// USD goal for timed campaigns.
    pub timed_goal_usd: Option<f64>,

    /// USD goal for open campaigns.
    pub open_goal_usd: Option<f64>,
}

impl CampaignsConfig {
    /// USD goal for a campaign kind, if the kind carries one.
    pub fn goal_usd(&self, kind: CampaignKind) -> Option<f64> {
        match kind {
            CampaignKind::Timed => self.timed_goal_usd,
            CampaignKind::Open => self.open_goal_usd,
        }
    }
}

impl Default for CampaignsConfig {
    fn default() -> Self {
        Self {
            default_kind: CampaignKind::Timed,
            timed_duration_secs: 24 * 60 * 60,
            timed_goal_usd: Some(299.0),
            open_goal_usd: None,
        }
    }
}

/// Lifetimes for one challenge flow.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChallengeTtl {
    /// How long the code stays valid, in seconds.
    pub ttl_secs: u64,

    /// How long a delivered result waits for collection, in seconds.
    pub delivery_ttl_secs: u64,
}

impl Default for ChallengeTtl {
    fn default() -> Self {
        Self {
            ttl_secs: 600,
            delivery_ttl_secs: 300,
        }
    }
}

/// Challenge lifetimes per flow.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChallengesConfig {
    pub export: ChallengeTtl,
    pub withdraw: ChallengeTtl,
    pub update: ChallengeTtl,
}

impl Default for ChallengesConfig {
    fn default() -> Self {
        Self {
            export: ChallengeTtl {
                ttl_secs: 120,
                delivery_ttl_secs: 30,
            },
            withdraw: ChallengeTtl {
                ttl_secs: 600,
                delivery_ttl_secs: 300,
            },
            update: ChallengeTtl {
                ttl_secs: 600,
                delivery_ttl_secs: 30,
            },
        }
    }
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file. When unset the store lives only in memory.
    pub snapshot_path: Option<String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence.
    pub log_level: String,

    /// Emit JSON log lines instead of human-readable ones.
    pub log_json: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_json: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
