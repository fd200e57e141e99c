//! Notification sink.
//!
//! # Data Flow
//! ```text
//! ledger / sweeper
//!     → Notifications::publish(Notice)   (returns immediately)
//!     → tokio::spawn
//!     → Notice::render → Notifier::send (Telegram)
//! ```
//!
//! # Design Decisions
//! - Fire and forget: failures are logged at warn, never retried, never block the caller
//! - Rendering lives here so callers only describe what happened

pub mod telegram;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::chain::Lamports;
pub use crate::config::schema::NotifyConfig;
pub use telegram::TelegramNotifier;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(String),

    #[error("notification request timed out after {0} seconds")]
    Timeout(u64),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Destination for formatted messages.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> NotifyResult<()>;
}

/// Discards every message.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _text: &str) -> NotifyResult<()> {
        Ok(())
    }
}

/// Something worth announcing.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    CampaignCreated {
        campaign_id: String,
        kind: String,
        target: String,
        creator_handle: String,
        goal_usd: Option<f64>,
        goal_amount: Option<Lamports>,
    },
    Contribution {
        campaign_id: String,
        target: String,
        contributor_handle: String,
        amount: Lamports,
        total_raised: Lamports,
        fully_funded: bool,
    },
    CampaignFailed {
        campaign_id: String,
        target: String,
        total_raised: Lamports,
    },
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn sol(amount: Lamports) -> String {
    format!("{:.4} SOL", amount.as_sol())
}

impl Notice {
    /// Telegram HTML rendering.
    pub fn render(&self, frontend_url: &str) -> String {
        let base = frontend_url.trim_end_matches('/');
        match self {
            Notice::CampaignCreated {
                campaign_id,
                kind,
                target,
                creator_handle,
                goal_usd,
                goal_amount,
            } => {
                let goal = match (goal_usd, goal_amount) {
                    (Some(usd), Some(amount)) => format!("${:.2} USD (~{})", usd, sol(*amount)),
                    (None, Some(amount)) => sol(*amount),
                    _ => "open".to_string(),
                };
                let handle = escape_html(creator_handle);
                format!(
                    "<b>New Campaign Created!</b>\n\n\
                     <b>Type:</b> {}\n\
                     <b>Goal:</b> {}\n\
                     <b>Creator:</b> <a href=\"https://x.com/{handle}\">@{handle}</a>\n\n\
                     <b>Token CA:</b>\n<code>{}</code>\n\n\
                     <b>Campaign:</b> {}/campaign/{}",
                    kind.to_uppercase(),
                    goal,
                    escape_html(target),
                    base,
                    campaign_id,
                )
            }
            Notice::Contribution {
                campaign_id,
                target,
                contributor_handle,
                amount,
                total_raised,
                fully_funded,
            } => {
                let handle = escape_html(contributor_handle);
                let mut text = format!(
                    "<b>{}</b>\n\n\
                     <b>Token:</b> <code>{}</code>\n\
                     <b>Amount:</b> {}\n\
                     <b>From:</b> <a href=\"https://x.com/{handle}\">@{handle}</a>\n\
                     <b>Raised:</b> {}",
                    if *fully_funded {
                        "Campaign Fully Funded!"
                    } else {
                        "New Contribution"
                    },
                    escape_html(target),
                    sol(*amount),
                    sol(*total_raised),
                );
                if *fully_funded {
                    text.push_str("\n\nGoal reached!");
                }
                text.push_str(&format!("\n\n<b>Campaign:</b> {}/campaign/{}", base, campaign_id));
                text
            }
            Notice::CampaignFailed {
                campaign_id,
                target,
                total_raised,
            } => format!(
                "<b>Campaign Ended</b>\n\n\
                 <b>Token:</b> <code>{}</code>\n\
                 <b>Result:</b> Not Funded\n\
                 <b>Raised:</b> {}\n\n\
                 <b>Campaign:</b> {}/campaign/{}",
                escape_html(target),
                sol(*total_raised),
                base,
                campaign_id,
            ),
        }
    }
}

/// Cheap, cloneable handle that renders and sends notices in the background.
#[derive(Clone)]
pub struct Notifications {
    sink: Arc<dyn Notifier>,
    frontend_url: String,
}

impl Notifications {
    pub fn new(sink: Arc<dyn Notifier>, frontend_url: impl Into<String>) -> Self {
        Self {
            sink,
            frontend_url: frontend_url.into(),
        }
    }

    /// Notifications that go nowhere.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopNotifier), "")
    }

    /// Send `notice` without waiting for the result.
    pub fn publish(&self, notice: Notice) {
        let sink = Arc::clone(&self.sink);
        let text = notice.render(&self.frontend_url);
        tokio::spawn(async move {
            if let Err(e) = sink.send(&text).await {
                tracing::warn!(error = %e, "Failed to send notification");
            }
        });
    }
}

impl std::fmt::Debug for Notifications {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifications")
            .field("frontend_url", &self.frontend_url)
            .finish_non_exhaustive()
    }
}
