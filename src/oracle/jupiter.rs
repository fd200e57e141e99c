//! Jupiter price API client.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;

use crate::oracle::{OracleConfig, OracleError, OracleResult, PriceOracle};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceEntry {
    usd_price: Option<f64>,
}

/// Reads `{ "<mint>": { "usdPrice": n } }` from the Jupiter v3 price endpoint.
#[derive(Debug, Clone)]
pub struct JupiterOracle {
    http: reqwest::Client,
    config: OracleConfig,
}

impl JupiterOracle {
    pub fn new(config: OracleConfig) -> OracleResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| OracleError::Request(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// Price of the configured settlement asset.
    pub async fn native_price(&self) -> OracleResult<f64> {
        self.price_of(&self.config.asset).await
    }
}

/// Pull a positive finite price for `asset` out of a response body.
fn extract_price(body: HashMap<String, Option<PriceEntry>>, asset: &str) -> OracleResult<f64> {
    body.get(asset)
        .and_then(|entry| entry.as_ref())
        .and_then(|entry| entry.usd_price)
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| OracleError::Missing(asset.to_string()))
}

#[async_trait]
impl PriceOracle for JupiterOracle {
    async fn price_of(&self, asset: &str) -> OracleResult<f64> {
        let request = async {
            self.http
                .get(&self.config.price_url)
                .query(&[("ids", asset)])
                .send()
                .await?
                .error_for_status()?
                .json::<HashMap<String, Option<PriceEntry>>>()
                .await
        };

        let body = match timeout(Duration::from_secs(self.config.timeout_secs), request).await {
            Ok(Ok(body)) => body,
            Ok(Err(e)) => return Err(OracleError::Request(e.to_string())),
            Err(_) => return Err(OracleError::Timeout(self.config.timeout_secs)),
        };

        let price = extract_price(body, asset)?;
        tracing::debug!(asset, price, "Fetched price");
        Ok(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOL: &str = "So11111111111111111111111111111111111111112";

    fn parse(json: &str) -> HashMap<String, Option<PriceEntry>> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_extract_price() {
        let body = parse(&format!(r#"{{ "{SOL}": {{ "usdPrice": 188.33, "decimals": 9 }} }}"#));
        assert_eq!(extract_price(body, SOL).unwrap(), 188.33);
    }

    #[test]
    fn test_missing_or_bad_price() {
        assert!(matches!(extract_price(parse("{}"), SOL), Err(OracleError::Missing(_))));

        let zero = parse(&format!(r#"{{ "{SOL}": {{ "usdPrice": 0 }} }}"#));
        assert!(matches!(extract_price(zero, SOL), Err(OracleError::Missing(_))));

        let null = parse(&format!(r#"{{ "{SOL}": null }}"#));
        assert!(matches!(extract_price(null, SOL), Err(OracleError::Missing(_))));

        let absent = parse(&format!(r#"{{ "{SOL}": {{ "decimals": 9 }} }}"#));
        assert!(matches!(extract_price(absent, SOL), Err(OracleError::Missing(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_request_error() {
        let oracle = JupiterOracle::new(OracleConfig {
            price_url: "http://127.0.0.1:1/price".to_string(),
            timeout_secs: 2,
            ..OracleConfig::default()
        })
        .unwrap();
        assert!(oracle.native_price().await.is_err());
    }
}
