use std::sync::Arc;

use chrono::{Duration, Utc};
use futures::future::join_all;

use crate::{
    accountant::DownloadAccountant,
    coordinator::{NewShare, UploadCoordinator},
    errors::AppError,
    password,
    policy::{self, PolicyError},
    store::{MemoryShareStore, ShareStore, StoreError},
    tests::support::{record, FlakyShareStore},
    token::TOKEN_LENGTH,
};

fn engine() -> (Arc<dyn ShareStore>, UploadCoordinator, DownloadAccountant) {
    let store: Arc<dyn ShareStore> = Arc::new(MemoryShareStore::new());
    let coordinator = UploadCoordinator::new(
        store.clone(),
        "http://localhost:8080".to_string(),
        1024 * 1024,
    );
    let accountant = DownloadAccountant::new(store.clone());
    (store, coordinator, accountant)
}

fn new_share(owner: &str) -> NewShare {
    NewShare {
        file_reference: "blob-1".to_string(),
        file_name: "hello_world.txt".to_string(),
        file_size_bytes: 42,
        description: None,
        password: None,
        max_downloads: None,
        expiry_hours: None,
        owner: owner.to_string(),
    }
}

#[tokio::test]
async fn create_share_returns_public_descriptor() {
    let (_, coordinator, _) = engine();

    let descriptor = coordinator
        .create_share(new_share("alice"), Utc::now())
        .await
        .unwrap();

    assert_eq!(descriptor.share_token.len(), TOKEN_LENGTH);
    assert_eq!(
        descriptor.share_url,
        format!("http://localhost:8080/share/{}", descriptor.share_token)
    );
    assert_eq!(descriptor.file_name, "hello_world.txt");
    assert_eq!(descriptor.file_size_bytes, 42);
}

#[tokio::test]
async fn create_share_rejects_bad_parameters() {
    let (_, coordinator, _) = engine();

    let mut too_large = new_share("alice");
    too_large.file_size_bytes = 10 * 1024 * 1024;
    let err = coordinator
        .create_share(too_large, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FileTooLarge));

    let mut bad_expiry = new_share("alice");
    bad_expiry.expiry_hours = Some(-2.0);
    let err = coordinator
        .create_share(bad_expiry, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn zero_max_downloads_means_unlimited() {
    let (store, coordinator, accountant) = engine();

    let mut share = new_share("alice");
    share.max_downloads = Some(0);
    let descriptor = coordinator.create_share(share, Utc::now()).await.unwrap();

    let stored = store.get(&descriptor.share_token).await.unwrap();
    assert_eq!(stored.max_downloads, None);

    for _ in 0..5 {
        accountant
            .authorize_download(&descriptor.share_token, None, Utc::now())
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn upload_then_list_round_trip() {
    let (_, coordinator, _) = engine();
    let now = Utc::now();

    let mut share = new_share("alice");
    share.max_downloads = Some(3);
    share.expiry_hours = Some(1.0);
    share.password = Some("x".to_string());
    coordinator.create_share(share, now).await.unwrap();

    let shares = coordinator.list_shares("alice").await.unwrap();
    assert_eq!(shares.len(), 1);
    assert!(shares[0].has_password());
    assert_eq!(shares[0].current_downloads, 0);
    assert!(shares[0].is_active(now));
    assert!(!shares[0].is_expired(now));

    assert!(coordinator.list_shares("mallory").await.unwrap().is_empty());
}

#[tokio::test]
async fn listing_is_newest_first() {
    let (store, coordinator, _) = engine();
    let now = Utc::now();

    for (token, age_hours) in [("older", 3), ("newest", 1), ("oldest", 5)] {
        let mut rec = record(token, "alice");
        rec.upload_time = now - Duration::hours(age_hours);
        store.create(rec).await.unwrap();
    }

    let shares = coordinator.list_shares("alice").await.unwrap();
    let tokens: Vec<_> = shares.iter().map(|s| s.token.as_str()).collect();
    assert_eq!(tokens, vec!["newest", "older", "oldest"]);
}

#[tokio::test]
async fn duplicate_token_is_rejected_by_the_store() {
    let (store, _, _) = engine();

    store.create(record("same", "alice")).await.unwrap();
    let err = store.create(record("same", "bob")).await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicateToken));
}

#[tokio::test]
async fn download_limit_is_enforced_in_order() {
    let (store, _, accountant) = engine();

    let mut rec = record("limited", "alice");
    rec.max_downloads = Some(1);
    store.create(rec).await.unwrap();

    let grant = accountant
        .authorize_download("limited", None, Utc::now())
        .await
        .unwrap();
    assert_eq!(grant.file_reference, "blob-limited");

    let err = accountant
        .authorize_download("limited", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Policy(PolicyError::DownloadLimitExceeded)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_downloads_never_exceed_the_quota() {
    let (store, _, accountant) = engine();
    let accountant = Arc::new(accountant);

    let mut rec = record("contended", "alice");
    rec.max_downloads = Some(3);
    store.create(rec).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let accountant = accountant.clone();
        tasks.push(tokio::spawn(async move {
            accountant
                .authorize_download("contended", None, Utc::now())
                .await
        }));
    }

    let outcomes = join_all(tasks).await;
    let mut approved = 0;
    let mut rejected = 0;
    for outcome in outcomes {
        match outcome.unwrap() {
            Ok(_) => approved += 1,
            Err(AppError::Policy(PolicyError::DownloadLimitExceeded)) => rejected += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(approved, 3);
    assert_eq!(rejected, 5);
    assert_eq!(store.get("contended").await.unwrap().current_downloads, 3);
}

#[tokio::test]
async fn expired_share_is_rejected_even_with_quota_left() {
    let (store, _, accountant) = engine();

    let mut rec = record("stale", "alice");
    rec.max_downloads = Some(10);
    rec.expiry_time = Some(Utc::now() - Duration::hours(1));
    store.create(rec).await.unwrap();

    let err = accountant
        .authorize_download("stale", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Policy(PolicyError::TokenExpired)));
}

#[tokio::test]
async fn expiry_is_disclosed_before_password_status() {
    let (store, _, accountant) = engine();

    let mut rec = record("secret-stale", "alice");
    rec.password_hash = Some(password::hash_password("x").unwrap());
    rec.expiry_time = Some(Utc::now() - Duration::minutes(5));
    store.create(rec).await.unwrap();

    // A prober without the password must not learn this share is protected.
    let err = accountant
        .authorize_download("secret-stale", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Policy(PolicyError::TokenExpired)));
}

#[tokio::test]
async fn password_checks_run_last() {
    let (store, _, accountant) = engine();

    let mut rec = record("secret", "alice");
    rec.password_hash = Some(password::hash_password("hunter2").unwrap());
    store.create(rec).await.unwrap();

    let err = accountant
        .authorize_download("secret", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Policy(PolicyError::PasswordRequired)
    ));

    let err = accountant
        .authorize_download("secret", Some("hunter3"), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Policy(PolicyError::PasswordMismatch)
    ));

    let grant = accountant
        .authorize_download("secret", Some("hunter2"), Utc::now())
        .await
        .unwrap();
    assert_eq!(grant.file_name, "hello_world.txt");
}

#[tokio::test]
async fn unknown_token_is_not_found() {
    let (_, _, accountant) = engine();

    let err = accountant
        .authorize_download("nope", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Policy(PolicyError::TokenNotFound)));
}

#[tokio::test]
async fn revocation_requires_ownership() {
    let (_, coordinator, accountant) = engine();

    let descriptor = coordinator
        .create_share(new_share("alice"), Utc::now())
        .await
        .unwrap();

    let err = coordinator
        .revoke_share(&descriptor.share_token, "mallory")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotShareOwner));

    coordinator
        .revoke_share(&descriptor.share_token, "alice")
        .await
        .unwrap();

    let err = accountant
        .authorize_download(&descriptor.share_token, None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Policy(PolicyError::TokenRevoked)));
}

#[tokio::test]
async fn transient_store_outages_are_retried() {
    let store = FlakyShareStore::new();
    store.seed(record("blippy", "alice")).await;
    let accountant = DownloadAccountant::new(store.clone());

    // Two outages fit inside the bounded retry budget.
    store.fail_next(2);
    let grant = accountant
        .authorize_download("blippy", None, Utc::now())
        .await
        .unwrap();
    assert_eq!(grant.file_reference, "blob-blippy");
}

#[tokio::test]
async fn store_outage_exhaustion_surfaces_storage_unavailable() {
    let store = FlakyShareStore::new();
    store.seed(record("down", "alice")).await;
    let accountant = DownloadAccountant::new(store.clone());

    store.fail_next(10);
    let err = accountant
        .authorize_download("down", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageUnavailable));
}

#[tokio::test]
async fn quota_rejection_is_never_retried() {
    // The snapshot says a slot is free, but the authoritative increment
    // reports the quota consumed: the losing side of the last-slot race.
    let store = FlakyShareStore::with_forced_limit();
    let mut rec = record("racy", "alice");
    rec.max_downloads = Some(5);
    store.seed(rec).await;
    let accountant = DownloadAccountant::new(store.clone());

    let err = accountant
        .authorize_download("racy", None, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::Policy(PolicyError::DownloadLimitExceeded)
    ));
    assert_eq!(store.increment_calls(), 1);
}

#[tokio::test]
async fn upload_survives_a_token_probe_blip() {
    let store = FlakyShareStore::new();
    let coordinator = UploadCoordinator::new(
        store.clone(),
        "http://localhost:8080".to_string(),
        1024 * 1024,
    );

    store.fail_next(1);
    let descriptor = coordinator
        .create_share(new_share("alice"), Utc::now())
        .await
        .unwrap();
    assert_eq!(store.get(&descriptor.share_token).await.unwrap().owner, "alice");
}

#[test]
fn policy_evaluation_order_is_stable() {
    let now = Utc::now();

    assert_eq!(
        policy::evaluate(None, now, Some("x")),
        Err(PolicyError::TokenNotFound)
    );

    // Revoked wins over everything else on the record.
    let mut rec = record("r", "alice");
    rec.revoked = true;
    rec.expiry_time = Some(now - Duration::hours(1));
    rec.password_hash = Some("not-even-a-hash".to_string());
    assert_eq!(
        policy::evaluate(Some(&rec), now, None),
        Err(PolicyError::TokenRevoked)
    );

    // Quota loss is disclosed before password status.
    let mut rec = record("q", "alice");
    rec.max_downloads = Some(2);
    rec.current_downloads = 2;
    rec.password_hash = Some("not-even-a-hash".to_string());
    assert_eq!(
        policy::evaluate(Some(&rec), now, None),
        Err(PolicyError::DownloadLimitExceeded)
    );

    assert_eq!(policy::evaluate(Some(&record("ok", "alice")), now, None), Ok(()));
}
