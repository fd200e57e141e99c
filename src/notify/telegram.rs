//! Telegram bot API sink.

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;

use crate::notify::{Notifier, NotifyConfig, NotifyError, NotifyResult};

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Posts HTML messages to one chat through `sendMessage`.
#[derive(Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
    timeout_secs: u64,
}

impl TelegramNotifier {
    pub fn new(config: &NotifyConfig) -> NotifyResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| NotifyError::Request(e.to_string()))?;
        Ok(Self {
            http,
            bot_token: config.bot_token.clone(),
            chat_id: config.chat_id.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> NotifyResult<()> {
        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API, self.bot_token);
        let payload = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let request = async {
            self.http
                .post(&url)
                .json(&payload)
                .send()
                .await?
                .error_for_status()
        };

        match timeout(Duration::from_secs(self.timeout_secs), request).await {
            Ok(Ok(_)) => {
                tracing::debug!(chat_id = %self.chat_id, "Notification sent");
                Ok(())
            }
            // reqwest errors can embed the URL, which carries the bot token
            Ok(Err(e)) => Err(NotifyError::Request(e.without_url().to_string())),
            Err(_) => Err(NotifyError::Timeout(self.timeout_secs)),
        }
    }
}
