//! Social feed ingestion.
//!
//! # Data Flow
//! ```text
//! Mention search API
//!     → twitter.rs (fetch, tolerate field-name variants)
//!     → Post { id, text, author, media }
//!     → poller
//! ```
//!
//! # Design Decisions
//! - Post ids are compared as integers, never as strings or floats
//! - Posts with unusable ids or authors are dropped at the boundary

pub mod twitter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use crate::config::schema::FeedConfig;
pub use twitter::TwitterFeed;

/// Monotonic external ordering key of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct EventId(pub u128);

impl std::str::FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EventId)
    }
}

impl TryFrom<String> for EventId {
    type Error = std::num::ParseIntError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.0.to_string()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A post mentioning the service handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: EventId,
    pub text: String,
    /// Author username as shown by the platform (not normalized).
    pub author: String,
    /// Attached media URLs in post order.
    pub media: Vec<String>,
}

/// Errors from the feed.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed credentials not configured")]
    NotConfigured,

    #[error("feed request failed: {0}")]
    Request(String),

    #[error("feed request timed out after {0} seconds")]
    Timeout(u64),
}

pub type FeedResult<T> = Result<T, FeedError>;

/// Source of posts mentioning a handle.
#[async_trait]
pub trait SocialFeed: Send + Sync {
    /// Posts mentioning `handle` with an id strictly greater than `since`.
    async fn mentions(&self, handle: &str, since: Option<EventId>) -> FeedResult<Vec<Post>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_id_exceeds_f64_precision() {
        // 2^53 + 1 is not representable as f64
        let a: EventId = "9007199254740993".parse().unwrap();
        let b: EventId = "9007199254740992".parse().unwrap();
        assert!(a > b);
    }

    #[test]
    fn test_event_id_serializes_as_string() {
        let id = EventId(1_850_000_000_000_000_001);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1850000000000000001\"");
        let back: EventId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
