//! Mention search over the Twitter154 RapidAPI endpoint.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tokio::time::timeout;

use crate::feed::{EventId, FeedConfig, FeedError, FeedResult, Post, SocialFeed};

/// Mention search client.
#[derive(Debug, Clone)]
pub struct TwitterFeed {
    http: reqwest::Client,
    config: FeedConfig,
}

impl TwitterFeed {
    pub fn new(config: FeedConfig) -> FeedResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| FeedError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }
}

fn str_field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

fn id_field(value: &Value, keys: &[&str]) -> Option<EventId> {
    keys.iter().find_map(|k| match value.get(*k)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_u64().map(|n| EventId(n as u128)),
        _ => None,
    })
}

fn media_urls(raw: &Value) -> Vec<String> {
    if let Some(urls) = raw.get("media_url").and_then(Value::as_array) {
        return urls
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
    }
    raw.get("media")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|m| str_field(m, &["url", "media_url_https", "media_url"]))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize one raw search result. Returns `None` when the id or author is unusable.
pub fn normalize(raw: &Value) -> Option<Post> {
    let Some(id) = id_field(raw, &["tweet_id", "id_str", "id"]) else {
        tracing::warn!(raw = %raw, "Dropping post without a usable id");
        return None;
    };
    let author = raw
        .get("user")
        .and_then(|u| str_field(u, &["username", "screen_name"]));
    let Some(author) = author else {
        tracing::warn!(post_id = %id, "Dropping post without an author");
        return None;
    };
    Some(Post {
        id,
        text: str_field(raw, &["text", "full_text"]).unwrap_or_default().to_string(),
        author: author.to_string(),
        media: media_urls(raw),
    })
}

/// Normalize a search response and keep posts newer than `since`.
pub fn normalize_results(body: &Value, since: Option<EventId>) -> Vec<Post> {
    body.get("results")
        .and_then(Value::as_array)
        .map(|results| {
            results
                .iter()
                .filter_map(normalize)
                .filter(|post| since.map_or(true, |s| post.id > s))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl SocialFeed for TwitterFeed {
    async fn mentions(&self, handle: &str, since: Option<EventId>) -> FeedResult<Vec<Post>> {
        if self.config.api_key.is_empty() || self.config.api_host.is_empty() {
            return Err(FeedError::NotConfigured);
        }

        let url = format!("https://{}/search/search", self.config.api_host);
        let query = format!("@{}", handle.trim_start_matches('@'));
        let limit = self.config.page_size.to_string();

        let request = async {
            self.http
                .get(&url)
                .query(&[
                    ("query", query.as_str()),
                    ("section", "latest"),
                    ("limit", limit.as_str()),
                ])
                .header("X-RapidAPI-Key", &self.config.api_key)
                .header("X-RapidAPI-Host", &self.config.api_host)
                .send()
                .await?
                .error_for_status()?
                .json::<Value>()
                .await
        };

        let body = match timeout(Duration::from_secs(self.config.timeout_secs), request).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(FeedError::Request(e.to_string())),
            Err(_) => return Err(FeedError::Timeout(self.config.timeout_secs)),
        };

        let posts = normalize_results(&body, since);
        tracing::debug!(count = posts.len(), since = ?since.map(|s| s.to_string()), "Fetched mentions");
        Ok(posts)
    }
}
