//! Shared fakes and harness for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xfunder::chain::{ChainError, ChainResult, Keypair, Lamports, Receipt, Settlement, LAMPORTS_PER_SOL};
use xfunder::clock::ManualClock;
use xfunder::config::schema::{CampaignsConfig, ChallengesConfig};
use xfunder::crypto::Envelope;
use xfunder::feed::{EventId, FeedResult, Post, SocialFeed};
use xfunder::ledger::{Account, CampaignKind};
use xfunder::notify::{Notifications, Notifier, NotifyResult};
use xfunder::oracle::{OracleError, OracleResult, PriceOracle};
use xfunder::services::{Collaborators, CoreSettings, Services};
use xfunder::store::{DocumentStore, MemoryStore, Query, StoreError, StoreResult, Write};

pub const SECRET: &str = "integration-test-secret-0123456789abcdef";
pub const MINT: &str = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM";
pub const OTHER_MINT: &str = "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263";
pub const FEE_BUFFER: Lamports = Lamports(10_000);
pub const START_MS: u64 = 1_700_000_000_000;

pub fn sol(amount: u64) -> Lamports {
    Lamports(amount * LAMPORTS_PER_SOL)
}

/// In-memory settlement ledger. Transfers move balances instantly.
#[derive(Debug, Default)]
pub struct FakeSettlement {
    balances: Mutex<HashMap<String, u64>>,
    transfers: Mutex<Vec<(String, String, Lamports)>>,
    fail_transfers: AtomicBool,
}

impl FakeSettlement {
    pub fn fund(&self, public_key: &str, amount: Lamports) {
        *self
            .balances
            .lock()
            .unwrap()
            .entry(public_key.to_string())
            .or_default() += amount.0;
    }

    pub fn balance_of(&self, public_key: &str) -> Lamports {
        Lamports(*self.balances.lock().unwrap().get(public_key).unwrap_or(&0))
    }

    pub fn fail_transfers(&self, fail: bool) {
        self.fail_transfers.store(fail, Ordering::SeqCst);
    }

    pub fn transfer_count(&self) -> usize {
        self.transfers.lock().unwrap().len()
    }
}

#[async_trait]
impl Settlement for FakeSettlement {
    async fn balance(&self, public_key: &str) -> ChainResult<Lamports> {
        Ok(self.balance_of(public_key))
    }

    async fn transfer(&self, from: &Keypair, to: &str, amount: Lamports) -> ChainResult<Receipt> {
        if self.fail_transfers.load(Ordering::SeqCst) {
            return Err(ChainError::Rpc("All RPC providers failed".to_string()));
        }
        let sender = from.public_key();
        let mut balances = self.balances.lock().unwrap();
        let available = balances.get(&sender).copied().unwrap_or(0);
        if available < amount.0 {
            return Err(ChainError::Failed("insufficient lamports".to_string()));
        }
        balances.insert(sender.clone(), available - amount.0);
        *balances.entry(to.to_string()).or_default() += amount.0;
        drop(balances);

        self.transfers
            .lock()
            .unwrap()
            .push((sender, to.to_string(), amount));
        Ok(Receipt {
            signature: uuid::Uuid::new_v4().simple().to_string(),
        })
    }
}

/// Oracle returning one price for every asset.
#[derive(Debug)]
pub struct FixedPrice(pub f64);

#[async_trait]
impl PriceOracle for FixedPrice {
    async fn price_of(&self, _asset: &str) -> OracleResult<f64> {
        Ok(self.0)
    }
}

/// Oracle whose price can be switched off mid-test.
#[derive(Debug)]
pub struct SwitchablePrice {
    pub price: f64,
    pub down: AtomicBool,
}

#[async_trait]
impl PriceOracle for SwitchablePrice {
    async fn price_of(&self, asset: &str) -> OracleResult<f64> {
        if self.down.load(Ordering::SeqCst) {
            return Err(OracleError::Missing(asset.to_string()));
        }
        Ok(self.price)
    }
}

/// Feed serving whatever posts the test pushed.
#[derive(Debug, Default)]
pub struct ScriptedFeed {
    posts: Mutex<Vec<Post>>,
}

impl ScriptedFeed {
    pub fn push(&self, id: u128, author: &str, text: &str) {
        self.push_with_media(id, author, text, Vec::new());
    }

    pub fn push_with_media(&self, id: u128, author: &str, text: &str, media: Vec<String>) {
        self.posts.lock().unwrap().push(Post {
            id: EventId(id),
            text: text.to_string(),
            author: author.to_string(),
            media,
        });
    }
}

#[async_trait]
impl SocialFeed for ScriptedFeed {
    async fn mentions(&self, _handle: &str, since: Option<EventId>) -> FeedResult<Vec<Post>> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| since.map_or(true, |s| p.id > s))
            .cloned()
            .collect())
    }
}

/// Notifier that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> NotifyResult<()> {
        self.sent.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// Store wrapper that can fail the next batch or slip in a concurrent merge
/// just before it.
#[derive(Debug, Default)]
pub struct InterceptStore {
    pub inner: Arc<MemoryStore>,
    fail_next_batch: AtomicBool,
    merge_before_batch: Mutex<Option<(String, String, Value)>>,
}

impl InterceptStore {
    pub fn new(inner: Arc<MemoryStore>) -> Self {
        Self {
            inner,
            ..Default::default()
        }
    }

    pub fn fail_next_batch(&self) {
        self.fail_next_batch.store(true, Ordering::SeqCst);
    }

    pub fn merge_before_next_batch(&self, collection: &str, id: &str, patch: Value) {
        *self.merge_before_batch.lock().unwrap() =
            Some((collection.to_string(), id.to_string(), patch));
    }
}

#[async_trait]
impl DocumentStore for InterceptStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        self.inner.get(collection, id).await
    }

    async fn put(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()> {
        self.inner.put(collection, id, doc).await
    }

    async fn insert_if_absent(&self, collection: &str, id: &str, doc: Value) -> StoreResult<bool> {
        self.inner.insert_if_absent(collection, id, doc).await
    }

    async fn merge(&self, collection: &str, id: &str, patch: Value) -> StoreResult<bool> {
        self.inner.merge(collection, id, patch).await
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.inner.delete(collection, id).await
    }

    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<(String, Value)>> {
        self.inner.query(collection, query).await
    }

    async fn batch(&self, writes: Vec<Write>) -> StoreResult<bool> {
        if self.fail_next_batch.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Io(std::io::Error::other("disk full")));
        }
        let pending = self.merge_before_batch.lock().unwrap().take();
        if let Some((collection, id, patch)) = pending {
            self.inner.merge(&collection, &id, patch).await?;
        }
        self.inner.batch(writes).await
    }
}

/// Services routed through wrappers instead of the plain fakes.
#[derive(Default)]
pub struct Overrides {
    pub settlement: Option<Arc<dyn Settlement>>,
    pub store: Option<Arc<dyn DocumentStore>>,
}

/// Everything a test needs, wired the way `main` wires it.
pub struct TestApp {
    pub services: Arc<Services>,
    pub store: Arc<MemoryStore>,
    pub settlement: Arc<FakeSettlement>,
    pub oracle: Arc<SwitchablePrice>,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    /// Timed campaigns with a 10 USD goal, SOL priced at 1 USD.
    pub fn new() -> Self {
        Self::with_campaigns(Self::timed_campaigns())
    }

    pub fn timed_campaigns() -> CampaignsConfig {
        CampaignsConfig {
            default_kind: CampaignKind::Timed,
            timed_duration_secs: 24 * 60 * 60,
            timed_goal_usd: Some(10.0),
            open_goal_usd: None,
        }
    }

    pub fn with_campaigns(campaigns: CampaignsConfig) -> Self {
        Self::with_overrides(
            campaigns,
            Arc::new(FakeSettlement::default()),
            Arc::new(MemoryStore::new()),
            Overrides::default(),
        )
    }

    /// Build around caller-owned fakes, optionally routing the services
    /// through wrappers around them.
    pub fn with_overrides(
        campaigns: CampaignsConfig,
        settlement: Arc<FakeSettlement>,
        store: Arc<MemoryStore>,
        overrides: Overrides,
    ) -> Self {
        let oracle = Arc::new(SwitchablePrice {
            price: 1.0,
            down: AtomicBool::new(false),
        });
        let clock = ManualClock::new(START_MS);
        let notifier = Arc::new(RecordingNotifier::default());

        let services = Arc::new(Services::new(
            Collaborators {
                store: overrides
                    .store
                    .unwrap_or_else(|| store.clone() as Arc<dyn DocumentStore>),
                settlement: overrides
                    .settlement
                    .unwrap_or_else(|| settlement.clone() as Arc<dyn Settlement>),
                oracle: oracle.clone(),
                envelope: Arc::new(Envelope::new(SECRET).unwrap()),
                clock: Arc::new(clock.clone()),
                notifications: Notifications::new(notifier.clone(), "https://xfund.test"),
            },
            CoreSettings {
                campaigns,
                challenges: ChallengesConfig::default(),
                fee_buffer: FEE_BUFFER,
                price_asset: "SOL".to_string(),
            },
        ));

        Self {
            services,
            store,
            settlement,
            oracle,
            clock,
            notifier,
        }
    }

    /// Register `handle` and put `amount` in its wallet.
    pub async fn funded_account(&self, handle: &str, amount: Lamports) -> Account {
        let (account, _) = self.services.accounts().login(handle).await.unwrap();
        self.settlement.fund(&account.public_key, amount);
        account
    }

    pub fn advance(&self, by: Duration) {
        self.clock.advance(by);
    }

    /// Give spawned notification tasks a chance to run.
    pub async fn settle_notifications(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}
