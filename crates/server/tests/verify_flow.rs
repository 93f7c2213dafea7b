//! End-to-end verification flow against a tempdir store and a scripted
//! mock gateway. The mock's empty queue doubles as a tripwire: any path
//! that must not consult the classifier fails loudly if it does.

use cointask_common::{ActionKind, LedgerError};
use cointask_server::gateway::{GatewayError, MockVisionGateway, Verdict};
use cointask_server::{run_verification, VerifyOutcome};
use cointask_store::{LedgerDb, NewAd};

fn open_db() -> (tempfile::TempDir, LedgerDb) {
    let tmp = tempfile::TempDir::new().expect("tempdir");
    let db = LedgerDb::open(tmp.path()).expect("open");
    (tmp, db)
}

fn seed(db: &LedgerDb) -> (u64, u64) {
    let owner = db
        .register("Owner", "owner@mail", "1", "pw", None, 0)
        .expect("owner");
    let user = db
        .register("User", "user@mail", "2", "pw", None, 0)
        .expect("user");
    let ad = db
        .create_ad(
            owner.id,
            NewAd {
                title: "Promo".into(),
                description: None,
                link: "https://example.com".into(),
                interests: vec![],
                category: None,
                subcategory: None,
                coin_per_click: 1,
            },
            0,
        )
        .expect("ad");
    db.approve_ad(ad.id, 0).expect("approve");
    (user.id, ad.id)
}

fn png(tag: u8) -> Vec<u8> {
    let mut v = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    v.extend_from_slice(&[tag; 16]);
    v
}

#[tokio::test]
async fn confirmed_claim_credits_balance() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();
    mock.push_verdict(Verdict::Confirmed);

    let out = run_verification(&db, &mock, user, ad, ActionKind::Comment, Some("budi"), &png(1), 100)
        .await
        .expect("verify");
    assert_eq!(out, VerifyOutcome::Credited { amount: 20, balance: 20 });

    // Comment instruction carries the submitting username.
    let seen = mock.seen_instructions();
    assert_eq!(seen.len(), 1);
    assert!(seen[0].contains("budi"));
}

#[tokio::test]
async fn not_confirmed_leaves_image_claimable() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();
    mock.push_verdict(Verdict::NotConfirmed);
    mock.push_verdict(Verdict::Confirmed);

    let image = png(2);
    let first = run_verification(&db, &mock, user, ad, ActionKind::Like, None, &image, 100)
        .await
        .expect("verify");
    assert_eq!(first, VerifyOutcome::NotConfirmed);
    assert_eq!(db.get_account(user).expect("get").expect("some").coins, 0);

    // Retry with the very same image succeeds: the fingerprint was never
    // consumed by the negative verdict.
    let second = run_verification(&db, &mock, user, ad, ActionKind::Like, None, &image, 101)
        .await
        .expect("verify");
    assert_eq!(second, VerifyOutcome::Credited { amount: 10, balance: 10 });
}

#[tokio::test]
async fn indeterminate_is_internal_and_mutates_nothing() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();
    mock.push_verdict(Verdict::Indeterminate);
    mock.push_verdict(Verdict::Confirmed);

    let image = png(3);
    let err = run_verification(&db, &mock, user, ad, ActionKind::Share, None, &image, 100)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Internal(_)));
    assert_eq!(db.get_account(user).expect("get").expect("some").coins, 0);

    // Retry-safe.
    let out = run_verification(&db, &mock, user, ad, ActionKind::Share, None, &image, 101)
        .await
        .expect("verify");
    assert!(matches!(out, VerifyOutcome::Credited { .. }));
}

#[tokio::test]
async fn gateway_unavailable_maps_to_unavailable() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();
    mock.push_error(GatewayError::Timeout);

    let err = run_verification(&db, &mock, user, ad, ActionKind::Like, None, &png(4), 100)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Unavailable(_)));
    assert_eq!(db.get_account(user).expect("get").expect("some").coins, 0);
}

#[tokio::test]
async fn duplicate_image_skips_the_gateway() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();
    mock.push_verdict(Verdict::Confirmed);

    let image = png(5);
    run_verification(&db, &mock, user, ad, ActionKind::Like, None, &image, 100)
        .await
        .expect("verify");

    // Same image, different kind. The mock queue is now empty, so any
    // classify call would error; a duplicate verdict proves it was skipped.
    let out = run_verification(&db, &mock, user, ad, ActionKind::Share, None, &image, 101)
        .await
        .expect("verify");
    assert_eq!(out, VerifyOutcome::DuplicateImage);
    assert_eq!(mock.seen_instructions().len(), 1);
}

#[tokio::test]
async fn completed_action_skips_the_gateway() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();
    mock.push_verdict(Verdict::Confirmed);

    run_verification(&db, &mock, user, ad, ActionKind::Subscribe, None, &png(6), 100)
        .await
        .expect("verify");

    let out = run_verification(&db, &mock, user, ad, ActionKind::Subscribe, None, &png(7), 101)
        .await
        .expect("verify");
    assert_eq!(out, VerifyOutcome::AlreadyCompleted);
    assert_eq!(mock.seen_instructions().len(), 1);
    assert_eq!(db.get_account(user).expect("get").expect("some").coins, 50);
}

#[tokio::test]
async fn invalid_image_rejected_before_any_call() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();

    let err = run_verification(&db, &mock, user, ad, ActionKind::Like, None, b"not an image", 100)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
    assert!(mock.seen_instructions().is_empty());
}

#[tokio::test]
async fn unknown_account_or_ad_rejected_before_any_call() {
    let (_tmp, db) = open_db();
    let (user, ad) = seed(&db);
    let mock = MockVisionGateway::new();

    let err = run_verification(&db, &mock, 999, ad, ActionKind::Like, None, &png(8), 100)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));

    let err = run_verification(&db, &mock, user, 999, ActionKind::Like, None, &png(8), 100)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotFound(_)));
    assert!(mock.seen_instructions().is_empty());
}
