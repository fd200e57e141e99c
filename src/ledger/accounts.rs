//! Handle registration and custodial account wallets.

use regex::Regex;
use serde_json::json;
use std::sync::{Arc, LazyLock};

use crate::chain::{Keypair, Lamports, Settlement};
use crate::clock::Clock;
use crate::crypto::Envelope;
use crate::ledger::types::{Account, LedgerError, LedgerResult};
use crate::store::collections::{ACCOUNTS, ACCOUNT_HANDLES};
use crate::store::{DocumentStore, DocumentStoreExt, StoreError, Write};

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[a-z0-9_]{1,15}$").expect("handle regex is valid"));

/// Canonical form of a handle: trimmed, one leading '@' removed, lowercased.
pub fn normalize_handle(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_prefix('@').unwrap_or(trimmed).to_lowercase()
}

/// Whether two handles name the same account.
pub fn same_handle(a: &str, b: &str) -> bool {
    normalize_handle(a) == normalize_handle(b)
}

/// Account registry.
#[derive(Clone)]
pub struct Accounts {
    store: Arc<dyn DocumentStore>,
    settlement: Arc<dyn Settlement>,
    envelope: Arc<Envelope>,
    clock: Arc<dyn Clock>,
}

impl Accounts {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settlement: Arc<dyn Settlement>,
        envelope: Arc<Envelope>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            settlement,
            envelope,
            clock,
        }
    }

    /// Return the account for `handle`, creating it on first sight.
    /// The flag is true when the account was created by this call.
    pub async fn login(&self, handle: &str) -> LedgerResult<(Account, bool)> {
        let handle = normalize_handle(handle);
        if !HANDLE.is_match(&handle) {
            return Err(LedgerError::InvalidHandle(handle));
        }

        if let Some(account) = self.find_by_handle(&handle).await? {
            return Ok((account, false));
        }

        let id = uuid::Uuid::new_v4().to_string();
        let keypair = self.settlement.create_keypair();
        let sealed = self.envelope.seal(keypair.to_base58().as_bytes(), &id)?;
        let account = Account {
            id: id.clone(),
            handle: handle.clone(),
            public_key: keypair.public_key(),
            encrypted_secret_key: sealed,
            created_at: self.clock.now_ms(),
        };

        // The handle index is the uniqueness guard. Index and account land
        // together, so a failed write never leaves a dangling index entry and
        // a concurrent login that loses the claim finds the winner's account.
        let doc = serde_json::to_value(&account).map_err(StoreError::from)?;
        let claimed = self
            .store
            .batch(vec![
                Write::expect_absent(ACCOUNT_HANDLES, &handle),
                Write::put(ACCOUNT_HANDLES, &handle, json!({ "account_id": id })),
                Write::put(ACCOUNTS, &id, doc),
            ])
            .await?;
        if !claimed {
            return match self.find_by_handle(&handle).await? {
                Some(existing) => Ok((existing, false)),
                None => Err(LedgerError::NotFound(format!("account for @{}", handle))),
            };
        }

        tracing::info!(account_id = %id, handle = %handle, public_key = %account.public_key, "Account created");
        Ok((account, true))
    }

    pub async fn get(&self, id: &str) -> LedgerResult<Option<Account>> {
        Ok(self.store.get_as(ACCOUNTS, id).await?)
    }

    /// Look up by handle in any accepted spelling.
    pub async fn find_by_handle(&self, handle: &str) -> LedgerResult<Option<Account>> {
        let handle = normalize_handle(handle);
        let Some(index) = self.store.get(ACCOUNT_HANDLES, &handle).await? else {
            return Ok(None);
        };
        let Some(account_id) = index.get("account_id").and_then(|v| v.as_str()) else {
            return Ok(None);
        };
        self.get(account_id).await
    }

    /// Public key and settled balance of an account's wallet.
    pub async fn wallet(&self, id: &str) -> LedgerResult<(String, Lamports)> {
        let account = self
            .get(id)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", id)))?;
        let balance = self.settlement.balance(&account.public_key).await?;
        Ok((account.public_key, balance))
    }

    /// Unseal the account's keypair.
    pub fn keypair(&self, account: &Account) -> LedgerResult<Keypair> {
        let encoded = self
            .envelope
            .open_string(&account.encrypted_secret_key, &account.id)
            .inspect_err(|e| {
                tracing::error!(account_id = %account.id, error = %e, "Failed to open account envelope")
            })?;
        Ok(Keypair::from_base58(&encoded)?)
    }

    /// Unseal the account's keypair in its base-58 export form.
    pub fn export_secret(&self, account: &Account) -> LedgerResult<zeroize::Zeroizing<String>> {
        Ok(self.keypair(account)?.to_base58())
    }
}

impl std::fmt::Debug for Accounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accounts").finish_non_exhaustive()
    }
}
