use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use base64::Engine;
use bytes::Bytes;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use codexgate_provider_core::{
    Clock, Credential, CredentialStore, DispatchError, HttpMethod, UpstreamClient,
    UpstreamHttpRequest,
};

use super::CLIENT_ID;

const TOKEN_PATH: &str = "/oauth/token";
const AUTH_CLAIM: &str = "https://api.openai.com/auth";
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// True when the credential cannot be sent as-is.
pub fn should_refresh(credential: &Credential, now_ms: i64) -> bool {
    !credential.is_usable(now_ms)
}

/// Reads `chatgpt_account_id` from a JWT payload without checking its signature.
pub fn extract_account_id(access_token: &str) -> Option<String> {
    let mut parts = access_token.split('.');
    let payload_b64 = match (parts.next(), parts.next(), parts.next()) {
        (Some(h), Some(p), Some(s)) if !h.is_empty() && !p.is_empty() && !s.is_empty() => p,
        _ => return None,
    };
    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(payload_b64.trim_end_matches('='))
        .ok()?;
    let payload = serde_json::from_slice::<Value>(&payload_bytes).ok()?;
    payload
        .get(AUTH_CLAIM)?
        .get("chatgpt_account_id")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<Credential, DispatchError>>>;

/// Exchanges refresh tokens at `<issuer>/oauth/token`.
///
/// Concurrent refreshes of the same credential share one request; the
/// credential is identified by a hash of its refresh token.
pub struct TokenRefresher {
    client: Arc<dyn UpstreamClient>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    token_url: String,
    in_flight: Mutex<HashMap<String, RefreshFuture>>,
}

impl TokenRefresher {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        issuer: &str,
    ) -> Self {
        Self {
            client,
            store,
            clock,
            token_url: format!("{}{TOKEN_PATH}", issuer.trim_end_matches('/')),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the refreshed credential after it has been handed to the store.
    pub async fn refresh(&self, credential: &Credential) -> Result<Credential, DispatchError> {
        let refresh_token = credential.refresh.trim();
        if refresh_token.is_empty() {
            return Err(DispatchError::auth_expired("no refresh token available"));
        }
        let key = blake3::hash(refresh_token.as_bytes()).to_hex().to_string();

        let future = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match in_flight.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let future = refresh_once(
                        self.client.clone(),
                        self.store.clone(),
                        self.clock.clone(),
                        self.token_url.clone(),
                        refresh_token.to_string(),
                    )
                    .boxed()
                    .shared();
                    in_flight.insert(key.clone(), future.clone());
                    future
                }
            }
        };

        let result = future.clone().await;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if in_flight
            .get(&key)
            .is_some_and(|current| current.ptr_eq(&future))
        {
            in_flight.remove(&key);
        }
        result
    }
}

async fn refresh_once(
    client: Arc<dyn UpstreamClient>,
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    token_url: String,
    refresh_token: String,
) -> Result<Credential, DispatchError> {
    // Another call may have rotated the token after this caller read the store.
    if let Ok(stored) = store.get().await
        && stored.is_usable(clock.now_ms())
    {
        info!(event = "token_refresh_reused", expires_at = stored.expires_at);
        return Ok(stored);
    }

    let body = format!(
        "grant_type=refresh_token&refresh_token={}&client_id={}",
        urlencoding::encode(&refresh_token),
        urlencoding::encode(CLIENT_ID),
    );
    let request = UpstreamHttpRequest {
        method: HttpMethod::Post,
        url: token_url,
        headers: vec![
            (
                "content-type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            ),
            ("accept".to_string(), "application/json".to_string()),
        ],
        body: Some(Bytes::from(body)),
        is_stream: false,
    };

    let response = client.send(request).await?;
    let status = response.status;
    let bytes = response.body.into_bytes().await?;
    if !(200..300).contains(&status) {
        warn!(
            event = "token_refresh_rejected",
            status,
            body = %String::from_utf8_lossy(&bytes)
        );
        return Err(DispatchError::auth_expired(format!(
            "token refresh rejected with status {status}"
        )));
    }

    let token = serde_json::from_slice::<TokenResponse>(&bytes).map_err(|err| {
        DispatchError::auth_expired(format!("token refresh returned an invalid body: {err}"))
    })?;
    if token.access_token.is_empty() {
        return Err(DispatchError::auth_expired(
            "token refresh returned an empty access token",
        ));
    }

    let expires_in = token
        .expires_in
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_EXPIRES_IN_SECS);
    let credential = Credential::oauth(
        token.access_token,
        token
            .refresh_token
            .filter(|value| !value.is_empty())
            .unwrap_or(refresh_token),
        clock.now_ms().saturating_add(expires_in.saturating_mul(1000)),
    );

    if let Err(err) = store.set(credential.clone()).await {
        warn!(event = "credential_persist_failed", error = %err);
    }
    info!(event = "token_refreshed", expires_at = credential.expires_at);
    Ok(credential)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codexgate_provider_core::CredentialKind;
    use serde_json::json;

    fn jwt(payload: Value) -> String {
        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        format!(
            "{}.{}.sig",
            engine.encode(br#"{"alg":"none"}"#),
            engine.encode(payload.to_string())
        )
    }

    #[test]
    fn reads_account_id_claim() {
        let token = jwt(json!({
            "email": "dev@example.com",
            "https://api.openai.com/auth": {"chatgpt_account_id": "acct_123", "chatgpt_plan_type": "plus"}
        }));
        assert_eq!(extract_account_id(&token).as_deref(), Some("acct_123"));
    }

    #[test]
    fn malformed_tokens_have_no_claims() {
        assert_eq!(extract_account_id("not-a-jwt"), None);
        assert_eq!(extract_account_id("a.!!!.c"), None);
        assert_eq!(extract_account_id(&jwt(json!({"sub": "x"}))), None);
    }

    #[test]
    fn refresh_needed_at_or_after_expiry() {
        let credential = Credential::oauth("access", "refresh", 5_000);
        assert!(!should_refresh(&credential, 4_999));
        assert!(should_refresh(&credential, 5_000));
        assert!(should_refresh(&credential, 5_001));

        let api_key = Credential {
            kind: CredentialKind::ApiKey,
            ..credential
        };
        assert!(should_refresh(&api_key, 0));
    }
}
