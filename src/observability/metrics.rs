//! Metrics collection and exposition.
//!
//! # Metrics
//! - `xfunder_events_total` (counter): processed posts by command and status
//! - `xfunder_poller_ticks_total` (counter): poller ticks by outcome
//! - `xfunder_campaigns_total` (counter): campaign transitions (opened, funded, failed)
//! - `xfunder_contributions_total` (counter): settled contributions
//! - `xfunder_challenges_total` (counter): challenge outcomes by flow
//! - `xfunder_swept_total` (counter): expired documents removed, by collection
//! - `xfunder_rpc_health` (gauge): 1=healthy, 0=unhealthy, per endpoint

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new();
    match builder.with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install Prometheus recorder"),
    }
}

pub fn record_event(command: &str, status: &str) {
    metrics::counter!(
        "xfunder_events_total",
        "command" => command.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

pub fn record_poller_tick(outcome: &str) {
    metrics::counter!("xfunder_poller_ticks_total", "outcome" => outcome.to_string()).increment(1);
}

pub fn record_campaign_transition(transition: &str) {
    metrics::counter!("xfunder_campaigns_total", "transition" => transition.to_string())
        .increment(1);
}

pub fn record_contribution() {
    metrics::counter!("xfunder_contributions_total").increment(1);
}

pub fn record_challenge(flow: &str, outcome: &str) {
    metrics::counter!(
        "xfunder_challenges_total",
        "flow" => flow.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_swept(collection: &str, count: usize) {
    metrics::counter!("xfunder_swept_total", "collection" => collection.to_string())
        .increment(count as u64);
}

pub fn record_rpc_health(endpoint: &str, healthy: bool) {
    let value = if healthy { 1.0 } else { 0.0 };
    metrics::gauge!("xfunder_rpc_health", "endpoint" => endpoint.to_string()).set(value);
}
