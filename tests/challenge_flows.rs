//! Export, withdraw and update flows end to end.

mod common;

use std::time::Duration;

use common::{sol, TestApp, MINT};
use xfunder::chain::{Keypair, Lamports};
use xfunder::challenge::{ChallengeError, DeliveredContent, VerifyOutcome, WithdrawPayload};
use xfunder::ledger::{CampaignKind, CampaignMetadata};
use xfunder::store::collections::{DELIVERIES, EXPORT_CHALLENGES, UPDATE_CHALLENGES, WITHDRAW_CHALLENGES};
use xfunder::store::DocumentStore;

#[tokio::test]
async fn test_export_delivers_key_exactly_once() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(1)).await;
    let export = &app.services.export;

    let issued = export.begin(&account.id, "@Alice", ()).await.unwrap();
    assert_eq!(issued.code.len(), 6);
    assert!(export.collect(&issued.delivery_key).await.unwrap().is_none());

    let outcome = export.verify(&issued.code, "ALICE").await.unwrap();
    assert_eq!(outcome, VerifyOutcome::Delivered);
    assert!(app.store.get(EXPORT_CHALLENGES, &issued.code).await.unwrap().is_none());

    let delivered = export.collect(&issued.delivery_key).await.unwrap().unwrap();
    let DeliveredContent::PrivateKey { private_key } = delivered.content else {
        panic!("expected a private key");
    };
    let keypair = Keypair::from_base58(&private_key).unwrap();
    assert_eq!(keypair.public_key(), account.public_key);

    // Read and burn
    assert!(export.collect(&issued.delivery_key).await.unwrap().is_none());
    assert!(matches!(
        export.verify(&issued.code, "alice").await,
        Err(ChallengeError::NotFound)
    ));
}

#[tokio::test]
async fn test_expired_challenge_is_removed() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(1)).await;
    let export = &app.services.export;

    let issued = export.begin(&account.id, "alice", ()).await.unwrap();
    app.advance(Duration::from_secs(121));

    assert!(matches!(
        export.verify(&issued.code, "alice").await,
        Err(ChallengeError::Expired)
    ));
    assert!(matches!(
        export.verify(&issued.code, "alice").await,
        Err(ChallengeError::NotFound)
    ));
}

#[tokio::test]
async fn test_handle_mismatch_keeps_challenge() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(1)).await;
    let export = &app.services.export;

    let issued = export.begin(&account.id, "alice", ()).await.unwrap();
    let err = export.verify(&issued.code, "@mallory").await.unwrap_err();
    match err {
        ChallengeError::HandleMismatch { claimed, observed } => {
            assert_eq!(claimed, "alice");
            assert_eq!(observed, "mallory");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(app.store.get(EXPORT_CHALLENGES, &issued.code).await.unwrap().is_some());
    assert!(export.collect(&issued.delivery_key).await.unwrap().is_none());

    // The rightful author can still complete it
    export.verify(&issued.code, "@Alice").await.unwrap();
    assert!(export.collect(&issued.delivery_key).await.unwrap().is_some());
}

#[tokio::test]
async fn test_begin_requires_the_claimed_handle_to_own_the_account() {
    let app = TestApp::new();
    let alice = app.funded_account("alice", sol(1)).await;
    app.funded_account("bob", sol(1)).await;

    let err = app.services.export.begin(&alice.id, "bob", ()).await.unwrap_err();
    assert!(matches!(err, ChallengeError::InvalidRequest(_)));
    let err = app.services.export.begin("missing", "alice", ()).await.unwrap_err();
    assert!(matches!(err, ChallengeError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_withdraw_settles_and_delivers_receipt() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(3)).await;
    let destination = Keypair::generate().public_key();
    let withdraw = &app.services.withdraw;

    let issued = withdraw
        .begin(
            &account.id,
            "alice",
            WithdrawPayload {
                destination: destination.clone(),
                amount: sol(1),
            },
        )
        .await
        .unwrap();
    withdraw.verify(&issued.code, "alice").await.unwrap();

    let delivered = withdraw.collect(&issued.delivery_key).await.unwrap().unwrap();
    match delivered.content {
        DeliveredContent::Withdrawal { amount, destination: to, .. } => {
            assert_eq!(amount, sol(1));
            assert_eq!(to, destination);
        }
        other => panic!("unexpected delivery: {other:?}"),
    }
    assert_eq!(app.settlement.balance_of(&destination), sol(1));
    assert_eq!(app.settlement.balance_of(&account.public_key), sol(2));
}

#[tokio::test]
async fn test_withdraw_failure_is_delivered() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(1)).await;
    let destination = Keypair::generate().public_key();
    let withdraw = &app.services.withdraw;

    let issued = withdraw
        .begin(
            &account.id,
            "alice",
            WithdrawPayload {
                destination,
                amount: sol(5),
            },
        )
        .await
        .unwrap();
    assert_eq!(
        withdraw.verify(&issued.code, "alice").await.unwrap(),
        VerifyOutcome::Delivered
    );
    assert!(app.store.get(WITHDRAW_CHALLENGES, &issued.code).await.unwrap().is_none());

    let delivered = withdraw.collect(&issued.delivery_key).await.unwrap().unwrap();
    let DeliveredContent::Failed { error } = delivered.content else {
        panic!("expected a failure delivery");
    };
    assert!(error.contains("insufficient"));
    assert_eq!(app.settlement.transfer_count(), 0);
}

#[tokio::test]
async fn test_withdraw_settlement_outage_is_delivered() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(10)).await;
    let withdraw = &app.services.withdraw;
    app.settlement.fail_transfers(true);

    let issued = withdraw
        .begin(
            &account.id,
            "alice",
            WithdrawPayload {
                destination: Keypair::generate().public_key(),
                amount: sol(1),
            },
        )
        .await
        .unwrap();
    withdraw.verify(&issued.code, "alice").await.unwrap();

    let delivered = withdraw.collect(&issued.delivery_key).await.unwrap().unwrap();
    assert!(matches!(delivered.content, DeliveredContent::Failed { .. }));
}

#[tokio::test]
async fn test_withdraw_rejects_bad_requests_up_front() {
    let app = TestApp::new();
    let account = app.funded_account("alice", sol(10)).await;
    let withdraw = &app.services.withdraw;

    let bad_destination = withdraw
        .begin(
            &account.id,
            "alice",
            WithdrawPayload {
                destination: "not-an-address".into(),
                amount: sol(1),
            },
        )
        .await;
    assert!(matches!(bad_destination, Err(ChallengeError::InvalidRequest(_))));

    let zero = withdraw
        .begin(
            &account.id,
            "alice",
            WithdrawPayload {
                destination: Keypair::generate().public_key(),
                amount: Lamports(0),
            },
        )
        .await;
    assert!(matches!(zero, Err(ChallengeError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_update_unlocks_one_metadata_edit() {
    let app = TestApp::new();
    let creator = app.funded_account("creator", sol(1)).await;
    let campaign = app
        .services
        .ledger
        .open(CampaignKind::Timed, MINT, &creator, &[])
        .await
        .unwrap();
    let update = &app.services.update;

    let issued = update.request(&campaign.id, "@Creator").await.unwrap();
    let status = update.status(&issued.delivery_key).await.unwrap();
    assert!(!status.verified);
    assert_eq!(status.campaign_id, None);

    let patch = CampaignMetadata {
        description: Some("to the moon".into()),
        ..CampaignMetadata::default()
    };
    assert!(matches!(
        update.apply(&issued.delivery_key, &patch).await,
        Err(ChallengeError::NotVerified)
    ));

    assert_eq!(
        update.verify(&issued.code, "creator").await.unwrap(),
        VerifyOutcome::Verified
    );
    // Verified challenges stay for the follow-up but cannot be verified again
    assert!(app.store.get(UPDATE_CHALLENGES, &issued.code).await.unwrap().is_some());
    assert!(matches!(
        update.verify(&issued.code, "creator").await,
        Err(ChallengeError::NotFound)
    ));

    let status = update.status(&issued.delivery_key).await.unwrap();
    assert!(status.verified);
    assert_eq!(status.campaign_id.as_deref(), Some(campaign.id.as_str()));

    let edited = update.apply(&issued.delivery_key, &patch).await.unwrap();
    assert_eq!(edited.metadata.description.as_deref(), Some("to the moon"));

    assert!(matches!(
        update.apply(&issued.delivery_key, &patch).await,
        Err(ChallengeError::NotFound)
    ));
    assert_eq!(app.store.count(DELIVERIES).await, 0);
}

#[tokio::test]
async fn test_update_is_creator_only() {
    let app = TestApp::new();
    let creator = app.funded_account("creator", sol(1)).await;
    app.funded_account("bob", sol(1)).await;
    let campaign = app
        .services
        .ledger
        .open(CampaignKind::Timed, MINT, &creator, &[])
        .await
        .unwrap();

    let err = app.services.update.request(&campaign.id, "bob").await.unwrap_err();
    assert!(matches!(err, ChallengeError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_verified_update_expires() {
    let app = TestApp::new();
    let creator = app.funded_account("creator", sol(1)).await;
    let campaign = app
        .services
        .ledger
        .open(CampaignKind::Timed, MINT, &creator, &[])
        .await
        .unwrap();
    let update = &app.services.update;

    let issued = update.request(&campaign.id, "creator").await.unwrap();
    update.verify(&issued.code, "creator").await.unwrap();
    app.advance(Duration::from_secs(601));

    let patch = CampaignMetadata {
        website: Some("https://token.test".into()),
        ..CampaignMetadata::default()
    };
    assert!(matches!(
        update.apply(&issued.delivery_key, &patch).await,
        Err(ChallengeError::Expired)
    ));
    assert!(app.store.get(UPDATE_CHALLENGES, &issued.code).await.unwrap().is_none());
}
