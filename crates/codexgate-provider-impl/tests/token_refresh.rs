mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use codexgate_provider_core::{
    Credential, CredentialStore, DispatchError, HttpMethod, UpstreamTransportErrorKind, header_get,
};
use codexgate_provider_impl::MemoryCredentialStore;
use codexgate_provider_impl::codex::oauth::TokenRefresher;

use support::{FakeReply, FakeUpstream, FixedClock, connect_failure};

const NOW: i64 = 1_700_000_000_000;

fn expired() -> Credential {
    Credential::oauth("old-access", "refresh-1", NOW - 1)
}

#[tokio::test]
async fn refresh_posts_form_and_persists_before_returning() {
    let upstream = FakeUpstream::new(|_| {
        Ok(FakeReply::json(
            200,
            json!({"access_token": "new-access", "refresh_token": "refresh-2", "expires_in": 600}),
        ))
    });
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(
        upstream.clone(),
        store.clone(),
        FixedClock::new(NOW),
        "https://auth.example.com/",
    );

    let refreshed = refresher.refresh(&expired()).await.unwrap();
    assert_eq!(
        refreshed,
        Credential::oauth("new-access", "refresh-2", NOW + 600_000)
    );
    assert_eq!(store.writes().await, 1);
    assert_eq!(store.get().await.unwrap(), refreshed);

    let requests = upstream.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.method, HttpMethod::Post);
    assert_eq!(req.url, "https://auth.example.com/oauth/token");
    assert_eq!(
        header_get(&req.headers, "content-type"),
        Some("application/x-www-form-urlencoded")
    );
    let body = String::from_utf8(req.body.clone().unwrap().to_vec()).unwrap();
    assert!(body.contains("grant_type=refresh_token"));
    assert!(body.contains("refresh_token=refresh-1"));
    assert!(body.contains("client_id=app_EMoamEEZ73f0CkXaXp7hrann"));
}

#[tokio::test]
async fn missing_rotation_keeps_refresh_token_and_default_expiry() {
    let upstream = FakeUpstream::new(|_| Ok(FakeReply::json(200, json!({"access_token": "a2"}))));
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(upstream, store, FixedClock::new(NOW), "https://auth");

    let refreshed = refresher.refresh(&expired()).await.unwrap();
    assert_eq!(refreshed.refresh, "refresh-1");
    assert_eq!(refreshed.expires_at, NOW + 3_600_000);
}

#[tokio::test]
async fn concurrent_refreshes_share_one_request() {
    let upstream = FakeUpstream::delayed(Duration::from_millis(50), |_| {
        Ok(FakeReply::json(
            200,
            json!({"access_token": "shared", "refresh_token": "refresh-2", "expires_in": 60}),
        ))
    });
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let clock = FixedClock::new(NOW);
    let refresher = TokenRefresher::new(
        upstream.clone(),
        store.clone(),
        clock.clone(),
        "https://auth",
    );

    let credential = expired();
    let (a, b, c) = tokio::join!(
        refresher.refresh(&credential),
        refresher.refresh(&credential),
        refresher.refresh(&credential),
    );
    assert_eq!(upstream.request_count(), 1);
    assert_eq!(store.writes().await, 1);
    let a = a.unwrap();
    assert_eq!(a.access, "shared");
    assert_eq!(b.unwrap(), a);
    assert_eq!(c.unwrap(), a);

    // The in-flight entry is gone once settled; once the stored token lapses too,
    // a later refresh goes out again.
    clock.advance(60_000);
    refresher.refresh(&credential).await.unwrap();
    assert_eq!(upstream.request_count(), 2);
}

#[tokio::test]
async fn stale_snapshot_reuses_credential_already_in_store() {
    let upstream = FakeUpstream::new(|req| {
        let body = String::from_utf8(req.body.clone().unwrap_or_default().to_vec()).unwrap();
        if body.contains("refresh_token=refresh-1") {
            Ok(FakeReply::json(
                200,
                json!({"access_token": "rotated", "refresh_token": "refresh-2", "expires_in": 600}),
            ))
        } else {
            Ok(FakeReply::json(400, json!({"error": "invalid_grant"})))
        }
    });
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(
        upstream.clone(),
        store.clone(),
        FixedClock::new(NOW),
        "https://auth",
    );

    // Both calls read the store before either refreshed.
    let snapshot = store.get().await.unwrap();
    let first = refresher.refresh(&snapshot).await.unwrap();
    let second = refresher.refresh(&snapshot).await.unwrap();

    assert_eq!(first.access, "rotated");
    assert_eq!(second, first);
    assert_eq!(upstream.request_count(), 1);
    assert_eq!(store.writes().await, 1);
}

#[tokio::test]
async fn rejected_refresh_is_auth_expired_and_not_persisted() {
    let upstream = FakeUpstream::new(|_| {
        Ok(FakeReply::json(400, json!({"error": "invalid_grant"})))
    });
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(upstream, store.clone(), FixedClock::new(NOW), "https://auth");

    let err = refresher.refresh(&expired()).await.unwrap_err();
    assert!(matches!(err, DispatchError::AuthExpired { .. }));
    assert_eq!(store.writes().await, 0);
}

#[tokio::test]
async fn empty_access_token_is_auth_expired() {
    let upstream = FakeUpstream::new(|_| Ok(FakeReply::json(200, json!({"access_token": ""}))));
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(upstream, store, FixedClock::new(NOW), "https://auth");

    let err = refresher.refresh(&expired()).await.unwrap_err();
    assert!(matches!(err, DispatchError::AuthExpired { .. }));
}

#[tokio::test]
async fn transport_failure_is_network_failure() {
    let upstream = FakeUpstream::new(|_| Err(connect_failure()));
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(upstream, store, FixedClock::new(NOW), "https://auth");

    let err = refresher.refresh(&expired()).await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::NetworkFailure {
            kind: UpstreamTransportErrorKind::Connect,
            message: "connection refused".to_string(),
        }
    );
}

#[tokio::test]
async fn blank_refresh_token_never_calls_the_issuer() {
    let upstream = FakeUpstream::new(|_| Ok(FakeReply::json(200, json!({"access_token": "x"}))));
    let store = Arc::new(MemoryCredentialStore::new(expired()));
    let refresher = TokenRefresher::new(
        upstream.clone(),
        store,
        FixedClock::new(NOW),
        "https://auth",
    );

    let err = refresher
        .refresh(&Credential::oauth("a", "  ", NOW - 1))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AuthExpired { .. }));
    assert_eq!(upstream.request_count(), 0);
}
