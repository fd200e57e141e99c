//! Processed-event log rows.

use serde::{Deserialize, Serialize};

use crate::command::CommandKind;
use crate::feed::EventId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Processing,
    Completed,
    Failed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Processing => "processing",
            EventStatus::Completed => "completed",
            EventStatus::Failed => "failed",
        }
    }
}

/// One row per post that resolved to a command, keyed by post id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEvent {
    pub event_id: EventId,
    pub command: CommandKind,
    pub status: EventStatus,
    /// Post author as the feed reported it.
    pub author: String,
    /// Outcome summary or error message.
    #[serde(default)]
    pub detail: Option<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl ProcessedEvent {
    pub fn processing(event_id: EventId, command: CommandKind, author: &str, now: u64) -> Self {
        Self {
            event_id,
            command,
            status: EventStatus::Processing,
            author: author.to_string(),
            detail: None,
            created_at: now,
            updated_at: now,
        }
    }
}
