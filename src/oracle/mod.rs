//! Price oracle.
//!
//! Converts USD campaign goals into native units at campaign creation and on
//! every funding re-check. There is no fallback price: a failed lookup is an
//! error the caller decides how to handle.

pub mod jupiter;

use async_trait::async_trait;
use thiserror::Error;

pub use crate::config::schema::OracleConfig;
pub use jupiter::JupiterOracle;

/// Errors from price lookups.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("price request failed: {0}")]
    Request(String),

    #[error("price request timed out after {0} seconds")]
    Timeout(u64),

    #[error("no usable price for {0}")]
    Missing(String),
}

pub type OracleResult<T> = Result<T, OracleError>;

/// USD price source.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD price of one whole unit of `asset`. Always finite and positive.
    async fn price_of(&self, asset: &str) -> OracleResult<f64>;
}
