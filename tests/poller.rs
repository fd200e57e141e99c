//! Post ingestion through the poller.

mod common;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

use common::{sol, ScriptedFeed, TestApp, MINT, OTHER_MINT};
use xfunder::chain::Lamports;
use xfunder::config::schema::PollerConfig;
use xfunder::feed::{EventId, FeedResult, Post, SocialFeed};
use xfunder::ledger::{CampaignFilter, CampaignKind};
use xfunder::poller::{Poller, PollerError, PollerState};
use xfunder::store::collections::{CONTRIBUTIONS, PROCESSED_EVENTS};
use xfunder::store::DocumentStore;

fn poller(app: &TestApp, feed: Arc<dyn SocialFeed>) -> Poller {
    Poller::new(app.services.clone(), feed, "@XFundDex", &PollerConfig::default())
}

async fn event_row(app: &TestApp, id: u128) -> Option<Value> {
    app.store.get(PROCESSED_EVENTS, &id.to_string()).await.unwrap()
}

#[tokio::test]
async fn test_create_post_opens_campaign_with_media() {
    let app = TestApp::new();
    app.funded_account("alice", sol(1)).await;
    let feed = Arc::new(ScriptedFeed::default());
    feed.push_with_media(
        100,
        "Alice",
        &format!("@XFundDex create {}", MINT),
        vec!["https://img/main.png".into(), "https://img/header.png".into()],
    );

    let mut state = PollerState::default();
    let summary = poller(&app, feed).tick(&mut state).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.completed, 1);

    let campaign = app
        .services
        .ledger
        .find(CampaignKind::Timed, MINT)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(campaign.creator_handle, "alice");
    assert_eq!(campaign.metadata.main_image.as_deref(), Some("https://img/main.png"));
    assert_eq!(campaign.metadata.header_image.as_deref(), Some("https://img/header.png"));

    let row = event_row(&app, 100).await.unwrap();
    assert_eq!(row["status"], "completed");
    assert_eq!(row["command"], "CREATE");
}

#[tokio::test]
async fn test_fund_post_contributes() {
    let app = TestApp::new();
    let alice = app.funded_account("alice", sol(1)).await;
    app.funded_account("bob", sol(10)).await;
    let campaign = app
        .services
        .ledger
        .open(CampaignKind::Timed, MINT, &alice, &[])
        .await
        .unwrap();

    let feed = Arc::new(ScriptedFeed::default());
    feed.push(200, "bob", &format!("@XFundDex fund 2 {}", MINT));
    feed.push(201, "bob", &format!("@XFundDex fund 4.1 {}", MINT));

    let mut state = PollerState::default();
    poller(&app, feed).tick(&mut state).await.unwrap();

    let contributions = app.services.ledger.contributions(&campaign.id).await.unwrap();
    assert_eq!(contributions.len(), 2);
    let mut amounts: Vec<Lamports> = contributions.iter().map(|c| c.amount).collect();
    amounts.sort();
    assert_eq!(amounts, vec![sol(2), Lamports(4_100_000_000)]);
    assert_eq!(
        app.settlement.balance_of(&campaign.custodial_public_key),
        Lamports(6_100_000_000)
    );
}

#[tokio::test]
async fn test_fund_falls_back_to_the_other_kind() {
    let app = TestApp::new();
    let alice = app.funded_account("alice", sol(1)).await;
    app.funded_account("bob", sol(5)).await;
    let campaign = app
        .services
        .ledger
        .open(CampaignKind::Open, OTHER_MINT, &alice, &[])
        .await
        .unwrap();

    let feed = Arc::new(ScriptedFeed::default());
    feed.push(1, "bob", &format!("fund 1.5 {}", OTHER_MINT));
    poller(&app, feed).tick(&mut PollerState::default()).await.unwrap();

    let contributions = app.services.ledger.contributions(&campaign.id).await.unwrap();
    assert_eq!(contributions.len(), 1);
    assert_eq!(contributions[0].amount.0, 1_500_000_000);
}

#[tokio::test]
async fn test_same_post_is_handled_once() {
    let app = TestApp::new();
    let alice = app.funded_account("alice", sol(1)).await;
    app.funded_account("bob", sol(5)).await;
    app.services
        .ledger
        .open(CampaignKind::Timed, MINT, &alice, &[])
        .await
        .unwrap();

    let feed = Arc::new(ScriptedFeed::default());
    let text = format!("fund 1 {}", MINT);
    feed.push(300, "bob", &text);
    feed.push(300, "bob", &text);
    let poller = poller(&app, feed);

    let summary = poller.tick(&mut PollerState::default()).await.unwrap();
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.duplicates, 1);

    // A restarted poller with no cursor sees the same posts again
    let summary = poller.tick(&mut PollerState::default()).await.unwrap();
    assert_eq!(summary.completed, 0);
    assert_eq!(summary.duplicates, 2);

    assert_eq!(app.store.count(CONTRIBUTIONS).await, 1);
    assert_eq!(app.settlement.transfer_count(), 1);
}

#[tokio::test]
async fn test_unknown_author_leaves_row_processing() {
    let app = TestApp::new();
    let feed = Arc::new(ScriptedFeed::default());
    feed.push(400, "stranger", &format!("create {}", MINT));

    let summary = poller(&app, feed).tick(&mut PollerState::default()).await.unwrap();
    assert_eq!(summary.abandoned, 1);

    let row = event_row(&app, 400).await.unwrap();
    assert_eq!(row["status"], "processing");
    assert_eq!(row["author"], "stranger");
    let open = app.services.ledger.list(&CampaignFilter::default()).await.unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn test_unrecognized_text_writes_nothing() {
    let app = TestApp::new();
    app.funded_account("alice", sol(1)).await;
    let feed = Arc::new(ScriptedFeed::default());
    feed.push(500, "alice", "gm @XFundDex");
    feed.push(501, "alice", "@XFundDex create");
    feed.push(502, "alice", &format!("fund 0 {}", MINT));

    let mut state = PollerState::default();
    let summary = poller(&app, feed).tick(&mut state).await.unwrap();
    assert_eq!(summary.ignored, 3);
    assert_eq!(app.store.count(PROCESSED_EVENTS).await, 0);
    assert_eq!(state.last_seen, Some(EventId(502)));
}

#[tokio::test]
async fn test_failed_command_is_recorded_with_detail() {
    let app = TestApp::new();
    app.funded_account("bob", sol(5)).await;
    let feed = Arc::new(ScriptedFeed::default());
    feed.push(600, "bob", &format!("fund 1 {}", MINT));

    let summary = poller(&app, feed).tick(&mut PollerState::default()).await.unwrap();
    assert_eq!(summary.failed, 1);

    let row = event_row(&app, 600).await.unwrap();
    assert_eq!(row["status"], "failed");
    assert!(row["detail"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_export_code_post_delivers() {
    let app = TestApp::new();
    let alice = app.funded_account("alice", sol(1)).await;
    let issued = app.services.export.begin(&alice.id, "alice", ()).await.unwrap();

    let feed = Arc::new(ScriptedFeed::default());
    feed.push(700, "ALICE", &format!("@XFundDex export {}", issued.code));
    poller(&app, feed).tick(&mut PollerState::default()).await.unwrap();

    assert_eq!(event_row(&app, 700).await.unwrap()["status"], "completed");
    assert!(app.services.export.collect(&issued.delivery_key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_export_from_wrong_author_fails() {
    let app = TestApp::new();
    let alice = app.funded_account("alice", sol(1)).await;
    app.funded_account("mallory", sol(1)).await;
    let issued = app.services.export.begin(&alice.id, "alice", ()).await.unwrap();

    let feed = Arc::new(ScriptedFeed::default());
    feed.push(701, "mallory", &format!("export {}", issued.code));
    poller(&app, feed).tick(&mut PollerState::default()).await.unwrap();

    assert_eq!(event_row(&app, 701).await.unwrap()["status"], "failed");
    assert!(app.services.export.collect(&issued.delivery_key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cursor_advances_past_handled_posts() {
    let app = TestApp::new();
    app.funded_account("alice", sol(1)).await;
    let feed = Arc::new(ScriptedFeed::default());
    feed.push(12, "alice", &format!("create {}", MINT));
    feed.push(10, "alice", "hello");
    let poller = poller(&app, feed.clone());

    let mut state = PollerState::default();
    let summary = poller.tick(&mut state).await.unwrap();
    assert_eq!(summary.fetched, 2);
    assert_eq!(state.last_seen, Some(EventId(12)));

    let summary = poller.tick(&mut state).await.unwrap();
    assert_eq!(summary.fetched, 0);

    feed.push(13, "alice", &format!("create {}", OTHER_MINT));
    let summary = poller.tick(&mut state).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(state.last_seen, Some(EventId(13)));
}

/// Feed that takes a while to answer.
#[derive(Debug)]
struct SlowFeed;

#[async_trait]
impl SocialFeed for SlowFeed {
    async fn mentions(&self, _handle: &str, _since: Option<EventId>) -> FeedResult<Vec<Post>> {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_overlapping_tick_is_refused() {
    let app = TestApp::new();
    let poller = poller(&app, Arc::new(SlowFeed));

    let mut first = PollerState::default();
    let mut second = PollerState::default();
    let (a, b) = tokio::join!(poller.tick(&mut first), poller.tick(&mut second));
    assert!(a.is_ok());
    assert!(matches!(b, Err(PollerError::Busy)));

    // The flag is released once the first tick finishes
    assert!(poller.tick(&mut second).await.is_ok());
}
