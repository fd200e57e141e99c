//! Solana JSON-RPC client with timeout and failover.
//!
//! # Responsibilities
//! - Send JSON-RPC requests to the configured endpoints in order
//! - Query balances, blockhashes and signature statuses
//! - Handle timeouts and network errors by moving to the next endpoint
//! - Report endpoint health as a metric

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::types::{
    ChainError, ChainResult, ConfirmationStatus, Lamports, SettlementConfig,
};
use crate::observability::metrics;

/// JSON-RPC client over one primary and any number of failover endpoints.
#[derive(Clone)]
pub struct SolanaRpc {
    http: reqwest::Client,
    /// Primary first, then failovers.
    endpoints: Vec<url::Url>,
    config: SettlementConfig,
    timeout_duration: Duration,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatus {
    err: Option<Value>,
    confirmation_status: Option<String>,
}

impl SolanaRpc {
    /// Create a client. Invalid failover URLs are skipped with a warning.
    pub fn new(config: SettlementConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);

        let primary: url::Url = config.rpc_url.parse().map_err(|e| {
            ChainError::Rpc(format!("Invalid RPC URL '{}': {}", config.rpc_url, e))
        })?;
        let mut endpoints = vec![primary];
        for url_str in &config.failover_urls {
            match url_str.parse() {
                Ok(url) => endpoints.push(url),
                Err(_) => tracing::warn!(url = %url_str, "Ignoring invalid failover RPC URL"),
            }
        }

        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ChainError::Rpc(format!("HTTP client: {}", e)))?;

        tracing::info!(
            rpc_url = %config.rpc_url,
            failovers = endpoints.len() - 1,
            commitment = %config.commitment,
            "Settlement client initialized"
        );

        Ok(Self {
            http,
            endpoints,
            config,
            timeout_duration,
        })
    }

    /// Issue one JSON-RPC call, trying each endpoint until one answers.
    ///
    /// A JSON-RPC error object is an answer: it is returned without trying
    /// the remaining endpoints.
    pub async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> ChainResult<T> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        for (i, endpoint) in self.endpoints.iter().enumerate() {
            let fut = async {
                self.http
                    .post(endpoint.clone())
                    .json(&body)
                    .send()
                    .await?
                    .error_for_status()?
                    .json::<RpcResponse<T>>()
                    .await
            };
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(response)) => {
                    metrics::record_rpc_health(endpoint.as_str(), true);
                    if let Some(err) = response.error {
                        return Err(ChainError::Rpc(format!(
                            "{} failed ({}): {}",
                            method, err.code, err.message
                        )));
                    }
                    return response
                        .result
                        .ok_or_else(|| ChainError::Rpc(format!("{} returned no result", method)));
                }
                Ok(Err(e)) => {
                    metrics::record_rpc_health(endpoint.as_str(), false);
                    tracing::warn!(provider_idx = i, method, error = %e, "RPC error, trying next provider");
                }
                Err(_) => {
                    metrics::record_rpc_health(endpoint.as_str(), false);
                    tracing::warn!(provider_idx = i, method, "RPC timeout, trying next provider");
                }
            }
        }
        Err(ChainError::Rpc(format!("All RPC providers failed for {}", method)))
    }

    /// Balance of an address at the configured commitment.
    pub async fn get_balance(&self, address: &str) -> ChainResult<Lamports> {
        let result: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address, { "commitment": self.config.commitment }]),
            )
            .await?;
        Ok(Lamports(result.value))
    }

    /// Latest blockhash as raw bytes.
    pub async fn get_latest_blockhash(&self) -> ChainResult<[u8; 32]> {
        let result: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.config.commitment }]),
            )
            .await?;
        let bytes = bs58::decode(&result.value.blockhash)
            .into_vec()
            .map_err(|e| ChainError::Rpc(format!("invalid blockhash: {}", e)))?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| ChainError::Rpc("blockhash is not 32 bytes".to_string()))
    }

    /// Submit a signed, base64-encoded transaction. Returns its signature.
    pub async fn send_transaction(&self, wire_base64: &str) -> ChainResult<String> {
        self.call(
            "sendTransaction",
            json!([wire_base64, {
                "encoding": "base64",
                "preflightCommitment": self.config.commitment,
            }]),
        )
        .await
    }

    /// Current status of a signature relative to the configured commitment.
    pub async fn get_signature_status(&self, signature: &str) -> ChainResult<ConfirmationStatus> {
        let result: WithContext<Vec<Option<SignatureStatus>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature], { "searchTransactionHistory": true }]),
            )
            .await?;

        let Some(Some(status)) = result.value.into_iter().next() else {
            return Ok(ConfirmationStatus::Pending);
        };
        if let Some(err) = status.err {
            return Ok(ConfirmationStatus::Failed(err.to_string()));
        }
        Ok(match status.confirmation_status.as_deref() {
            Some("finalized") => ConfirmationStatus::Confirmed,
            Some("confirmed") if self.config.commitment != "finalized" => {
                ConfirmationStatus::Confirmed
            }
            _ => ConfirmationStatus::Pending,
        })
    }

    /// Check if the cluster is reachable and healthy.
    pub async fn is_healthy(&self) -> bool {
        self.call::<String>("getHealth", json!([])).await.is_ok()
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }
}

impl std::fmt::Debug for SolanaRpc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SolanaRpc")
            .field("rpc_url", &self.config.rpc_url)
            .field("endpoints", &self.endpoints.len())
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
