//! The generic challenge protocol.

use async_trait::async_trait;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::challenge::types::{
    Challenge, ChallengeError, ChallengeResult, DeliveredSecret, Issued, Resolution,
    VerifyOutcome,
};
use crate::clock::{secs_to_ms, Clock};
use crate::config::schema::ChallengeTtl;
use crate::ledger::{normalize_handle, same_handle};
use crate::observability::metrics;
use crate::store::collections::DELIVERIES;
use crate::store::{DocumentStore, DocumentStoreExt, Query, Write};

/// Attempts at finding an unused code before giving up.
const CODE_ATTEMPTS: usize = 8;

/// What distinguishes one challenge flow from another.
#[async_trait]
pub trait Flow: Send + Sync {
    type Payload: Serialize + DeserializeOwned + Clone + Send + Sync;

    /// Short name used in logs, metrics and delivery records.
    const NAME: &'static str;

    /// Collection holding this flow's pending challenges, keyed by code.
    fn collection(&self) -> &'static str;

    fn ttl(&self) -> ChallengeTtl;

    /// Check a request before any code is issued.
    async fn validate(
        &self,
        subject_id: &str,
        claimed_handle: &str,
        payload: &Self::Payload,
    ) -> ChallengeResult<()>;

    /// Carry out the action once authorship is proven.
    async fn execute(&self, challenge: &Challenge<Self::Payload>) -> ChallengeResult<Resolution>;
}

fn delivery_key() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn six_digit_code() -> String {
    OsRng.gen_range(100_000u32..1_000_000).to_string()
}

/// Issue, verify and deliver for one flow.
pub struct ChallengeEngine<F: Flow> {
    flow: F,
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl<F: Flow> ChallengeEngine<F> {
    pub fn new(flow: F, store: Arc<dyn DocumentStore>, clock: Arc<dyn Clock>) -> Self {
        Self { flow, store, clock }
    }

    pub fn flow(&self) -> &F {
        &self.flow
    }

    pub(crate) fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Validate the request and persist a fresh challenge.
    pub async fn begin(
        &self,
        subject_id: &str,
        claimed_handle: &str,
        payload: F::Payload,
    ) -> ChallengeResult<Issued> {
        let claimed_handle = normalize_handle(claimed_handle);
        self.flow
            .validate(subject_id, &claimed_handle, &payload)
            .await?;

        let now = self.clock.now_ms();
        let mut challenge = Challenge {
            code: String::new(),
            subject_id: subject_id.to_string(),
            claimed_handle,
            payload,
            delivery_key: delivery_key(),
            created_at: now,
            expires_at: now + secs_to_ms(self.flow.ttl().ttl_secs),
            verified: false,
        };

        for _ in 0..CODE_ATTEMPTS {
            challenge.code = six_digit_code();
            let doc = serde_json::to_value(&challenge).map_err(crate::store::StoreError::from)?;
            if self
                .store
                .insert_if_absent(self.flow.collection(), &challenge.code, doc)
                .await?
            {
                metrics::record_challenge(F::NAME, "issued");
                tracing::info!(
                    flow = F::NAME,
                    subject_id = %challenge.subject_id,
                    handle = %challenge.claimed_handle,
                    expires_at = challenge.expires_at,
                    "Challenge issued"
                );
                return Ok(Issued {
                    code: challenge.code,
                    delivery_key: challenge.delivery_key,
                    expires_at: challenge.expires_at,
                });
            }
        }

        metrics::record_challenge(F::NAME, "exhausted");
        Err(ChallengeError::CodeSpaceExhausted)
    }

    /// Check a posted code against its challenge and run the flow's action.
    pub async fn verify(&self, code: &str, observed_handle: &str) -> ChallengeResult<VerifyOutcome> {
        let collection = self.flow.collection();
        let Some(challenge) = self
            .store
            .get_as::<Challenge<F::Payload>>(collection, code)
            .await?
        else {
            metrics::record_challenge(F::NAME, "not_found");
            return Err(ChallengeError::NotFound);
        };

        // A verified challenge is waiting for its follow-up, not for another proof
        if challenge.verified {
            metrics::record_challenge(F::NAME, "not_found");
            return Err(ChallengeError::NotFound);
        }

        let now = self.clock.now_ms();
        if challenge.is_expired(now) {
            self.store.delete(collection, code).await?;
            metrics::record_challenge(F::NAME, "expired");
            tracing::info!(flow = F::NAME, code, "Challenge expired");
            return Err(ChallengeError::Expired);
        }

        if !same_handle(&challenge.claimed_handle, observed_handle) {
            let observed = normalize_handle(observed_handle);
            metrics::record_challenge(F::NAME, "handle_mismatch");
            tracing::warn!(
                flow = F::NAME,
                code,
                claimed = %challenge.claimed_handle,
                observed = %observed,
                "Challenge author mismatch"
            );
            return Err(ChallengeError::HandleMismatch {
                claimed: challenge.claimed_handle,
                observed,
            });
        }

        let resolution = self.flow.execute(&challenge).await.inspect_err(|e| {
            metrics::record_challenge(F::NAME, "rejected");
            tracing::warn!(flow = F::NAME, code, error = %e, "Challenge action failed");
        })?;

        match resolution {
            Resolution::Deliver(content) => {
                let delivered = DeliveredSecret {
                    delivery_key: challenge.delivery_key.clone(),
                    flow: F::NAME.to_string(),
                    content,
                    expires_at: now + secs_to_ms(self.flow.ttl().delivery_ttl_secs),
                };
                let doc = serde_json::to_value(&delivered).map_err(crate::store::StoreError::from)?;
                self.store
                    .batch(vec![
                        Write::put(DELIVERIES, &challenge.delivery_key, doc),
                        Write::delete(collection, code),
                    ])
                    .await?;
                metrics::record_challenge(F::NAME, "delivered");
                tracing::info!(flow = F::NAME, subject_id = %challenge.subject_id, "Challenge verified and delivered");
                Ok(VerifyOutcome::Delivered)
            }
            Resolution::MarkVerified => {
                self.store
                    .merge(collection, code, json!({ "verified": true, "verified_at": now }))
                    .await?;
                metrics::record_challenge(F::NAME, "verified");
                tracing::info!(flow = F::NAME, subject_id = %challenge.subject_id, "Challenge verified");
                Ok(VerifyOutcome::Verified)
            }
        }
    }

    /// Read and burn the delivery for `delivery_key`. `None` means not ready
    /// (or already collected, or expired).
    pub async fn collect(&self, delivery_key: &str) -> ChallengeResult<Option<DeliveredSecret>> {
        let Some(delivered) = self
            .store
            .get_as::<DeliveredSecret>(DELIVERIES, delivery_key)
            .await?
        else {
            return Ok(None);
        };
        if delivered.flow != F::NAME {
            return Ok(None);
        }

        // Whoever deletes the entry owns it; a concurrent reader gets nothing
        let removed = self.store.delete(DELIVERIES, delivery_key).await?;
        if !removed || self.clock.now_ms() > delivered.expires_at {
            return Ok(None);
        }

        metrics::record_challenge(F::NAME, "collected");
        Ok(Some(delivered))
    }

    /// Find a pending challenge by its delivery key.
    pub(crate) async fn find_by_delivery_key(
        &self,
        delivery_key: &str,
    ) -> ChallengeResult<Option<Challenge<F::Payload>>> {
        let query = Query::new().equals("delivery_key", delivery_key).limit(1);
        let mut found: Vec<Challenge<F::Payload>> =
            self.store.query_as(self.flow.collection(), &query).await?;
        Ok(found.pop())
    }
}

impl<F: Flow> std::fmt::Debug for ChallengeEngine<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChallengeEngine")
            .field("flow", &F::NAME)
            .finish_non_exhaustive()
    }
}
