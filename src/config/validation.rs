//! Configuration validation.
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FunderConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{ChallengeTtl, FunderConfig};

/// One semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &FunderConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("invalid socket address '{}'", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be > 0"));
    }

    if config.feed.handle.trim_start_matches('@').is_empty() {
        errors.push(ValidationError::new("feed.handle", "must not be empty"));
    }
    if config.feed.page_size == 0 {
        errors.push(ValidationError::new("feed.page_size", "must be > 0"));
    }

    for (field, url) in std::iter::once(("settlement.rpc_url", &config.settlement.rpc_url)).chain(
        config
            .settlement
            .failover_urls
            .iter()
            .map(|u| ("settlement.failover_urls", u)),
    ) {
        if url::Url::parse(url).is_err() {
            errors.push(ValidationError::new(field, format!("invalid URL '{}'", url)));
        }
    }
    if !matches!(
        config.settlement.commitment.as_str(),
        "processed" | "confirmed" | "finalized"
    ) {
        errors.push(ValidationError::new(
            "settlement.commitment",
            "must be one of processed, confirmed, finalized",
        ));
    }
    if config.settlement.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new("settlement.rpc_timeout_secs", "must be > 0"));
    }
    if config.settlement.confirmation_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "settlement.confirmation_timeout_secs",
            "must be > 0",
        ));
    }

    if url::Url::parse(&config.oracle.price_url).is_err() {
        errors.push(ValidationError::new(
            "oracle.price_url",
            format!("invalid URL '{}'", config.oracle.price_url),
        ));
    }

    if config.notify.enabled && config.notify.chat_id.is_empty() {
        errors.push(ValidationError::new(
            "notify.chat_id",
            "required when notifications are enabled",
        ));
    }

    if config.poller.interval_secs == 0 {
        errors.push(ValidationError::new("poller.interval_secs", "must be > 0"));
    }
    if config.sweeper.interval_secs == 0 {
        errors.push(ValidationError::new("sweeper.interval_secs", "must be > 0"));
    }

    if config.campaigns.timed_duration_secs == 0 {
        errors.push(ValidationError::new(
            "campaigns.timed_duration_secs",
            "must be > 0",
        ));
    }
    for (field, goal) in [
        ("campaigns.timed_goal_usd", config.campaigns.timed_goal_usd),
        ("campaigns.open_goal_usd", config.campaigns.open_goal_usd),
    ] {
        if let Some(goal) = goal {
            if !goal.is_finite() || goal <= 0.0 {
                errors.push(ValidationError::new(field, "must be a positive number"));
            }
        }
    }

    for (flow, ttl) in [
        ("export", config.challenges.export),
        ("withdraw", config.challenges.withdraw),
        ("update", config.challenges.update),
    ] {
        check_ttl(flow, ttl, &mut errors);
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "invalid socket address '{}'",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_ttl(flow: &str, ttl: ChallengeTtl, errors: &mut Vec<ValidationError>) {
    if ttl.ttl_secs == 0 {
        errors.push(ValidationError::new(
            format!("challenges.{}.ttl_secs", flow),
            "must be > 0",
        ));
    }
    if ttl.delivery_ttl_secs == 0 {
        errors.push(ValidationError::new(
            format!("challenges.{}.delivery_ttl_secs", flow),
            "must be > 0",
        ));
    }
}
