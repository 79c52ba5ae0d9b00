mod support;

use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Value, json};

use codexgate_common::UserConfig;
use codexgate_provider_core::{
    Credential, CredentialStore, DispatchError, HttpMethod, LogStage, UpstreamFailure,
    UpstreamHttpRequest, header_get,
};
use codexgate_provider_impl::codex::instructions::InstructionCache;
use codexgate_provider_impl::codex::oauth::TokenRefresher;
use codexgate_provider_impl::{CodexDispatcher, DispatchSettings, MemoryCredentialStore, OutboundCall};

use support::{
    FakeInstructionSource, FakeReply, FakeUpstream, FixedClock, RecordingSink, access_token,
    connect_failure, sse,
};

const NOW: i64 = 1_700_000_000_000;
const BASE_URL: &str = "https://chatgpt.com/backend-api/codex";
const ISSUER: &str = "https://auth.openai.com";

struct Harness {
    dispatcher: CodexDispatcher,
    upstream: Arc<FakeUpstream>,
    store: Arc<MemoryCredentialStore>,
    sink: Arc<RecordingSink>,
}

impl Harness {
    fn backend_requests(&self) -> Vec<UpstreamHttpRequest> {
        self.upstream
            .requests()
            .into_iter()
            .filter(|req| req.url.starts_with(BASE_URL))
            .collect()
    }
}

fn harness<F>(credential: Credential, codex_mode: bool, responder: F) -> Harness
where
    F: Fn(&UpstreamHttpRequest) -> Result<FakeReply, UpstreamFailure> + Send + Sync + 'static,
{
    let upstream = FakeUpstream::new(responder);
    let store = Arc::new(MemoryCredentialStore::new(credential));
    let clock = FixedClock::new(NOW);
    let sink = Arc::new(RecordingSink::default());
    let refresher = TokenRefresher::new(upstream.clone(), store.clone(), clock.clone(), ISSUER);
    let instructions =
        InstructionCache::new(FakeInstructionSource::fixed("BACKEND PROMPT"), clock.clone());
    let dispatcher = CodexDispatcher::new(
        upstream.clone(),
        store.clone(),
        refresher,
        instructions,
        clock,
        sink.clone(),
        DispatchSettings {
            base_url: BASE_URL.to_string(),
            codex_mode,
            user_config: UserConfig::default(),
        },
    );
    Harness {
        dispatcher,
        upstream,
        store,
        sink,
    }
}

fn valid_credential() -> Credential {
    Credential::oauth(access_token("acct_42"), "refresh-1", NOW + 60_000)
}

fn call(body: Value) -> OutboundCall {
    OutboundCall {
        trace_id: Some("trace-1".to_string()),
        method: HttpMethod::Post,
        url: "http://localhost:8787/v1/responses".to_string(),
        headers: vec![
            ("authorization".to_string(), "Bearer sk-caller".to_string()),
            ("x-api-key".to_string(), "sk-caller".to_string()),
            ("x-client-tag".to_string(), "kept".to_string()),
        ],
        body: Bytes::from(body.to_string()),
    }
}

fn completed_stream() -> String {
    sse(&[
        json!({"type": "response.created", "response": {"id": "resp_1", "status": "in_progress", "output": []}}),
        json!({"type": "response.output_text.delta", "output_index": 0, "delta": "Hel"}),
        json!({"type": "response.output_item.done", "output_index": 0, "item": {
            "type": "message", "role": "assistant",
            "content": [{"type": "output_text", "text": "Hello"}]
        }}),
        json!({"type": "response.completed", "response": {"id": "resp_1", "status": "completed", "output": []}}),
    ])
}

fn backend_ok(
    body: String,
) -> impl Fn(&UpstreamHttpRequest) -> Result<FakeReply, UpstreamFailure> + Send + Sync + 'static {
    move |_| Ok(FakeReply::new(200, body.clone()).with_header("content-type", "text/event-stream"))
}

#[tokio::test]
async fn buffered_caller_gets_one_json_document() {
    let h = harness(valid_credential(), true, backend_ok(completed_stream()));
    let response = h
        .dispatcher
        .dispatch(call(json!({
            "model": "gpt-5.1-codex-high",
            "input": [{"role": "user", "content": "hi"}],
            "prompt_cache_key": "conv-9"
        })))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(header_get(&response.headers, "content-type"), Some("application/json"));
    let body: Value = serde_json::from_slice(&response.body.into_bytes().await.unwrap()).unwrap();
    assert_eq!(body["id"], "resp_1");
    assert_eq!(body["status"], "completed");
    assert_eq!(body["output"][0]["content"][0]["text"], "Hello");

    let requests = h.backend_requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.url, format!("{BASE_URL}/responses"));
    assert_eq!(header_get(&req.headers, "chatgpt-account-id"), Some("acct_42"));
    let expected_auth = format!("Bearer {}", access_token("acct_42"));
    assert_eq!(header_get(&req.headers, "authorization"), Some(expected_auth.as_str()));
    assert_eq!(header_get(&req.headers, "x-api-key"), None);
    assert_eq!(header_get(&req.headers, "x-client-tag"), Some("kept"));
    assert_eq!(header_get(&req.headers, "conversation_id"), Some("conv-9"));
    assert_eq!(header_get(&req.headers, "session_id"), Some("conv-9"));
    assert_eq!(header_get(&req.headers, "originator"), Some("codex_cli_rs"));

    let sent: Value = serde_json::from_slice(req.body.as_ref().unwrap()).unwrap();
    assert_eq!(sent["model"], "gpt-5.1-codex");
    assert_eq!(sent["instructions"], "BACKEND PROMPT");
    assert_eq!(sent["stream"], true);
    assert_eq!(sent["store"], false);
    assert_eq!(sent["reasoning"]["effort"], "high");
    assert!(
        sent["include"]
            .as_array()
            .unwrap()
            .contains(&json!("reasoning.encrypted_content"))
    );

    assert_eq!(
        h.sink.stages(),
        vec![
            LogStage::BeforeTransform,
            LogStage::AfterTransform,
            LogStage::StreamAggregated,
            LogStage::Response,
        ]
    );
}

#[tokio::test]
async fn streaming_caller_gets_backend_bytes_unchanged() {
    let stream = completed_stream();
    let h = harness(valid_credential(), true, backend_ok(stream.clone()));
    let response = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi", "stream": true})))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(header_get(&response.headers, "content-type"), Some("text/event-stream"));
    let bytes = response.body.into_bytes().await.unwrap();
    assert_eq!(bytes, Bytes::from(stream));
    assert!(!h.sink.stages().contains(&LogStage::StreamAggregated));
}

#[tokio::test]
async fn stream_error_event_becomes_bad_gateway() {
    let body = sse(&[
        json!({"type": "response.created", "response": {"id": "resp_1"}}),
        json!({"type": "error", "error": {"code": "server_error", "message": "boom"}}),
    ]);
    let h = harness(valid_credential(), true, backend_ok(body));
    let response = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap();

    assert_eq!(response.status, 502);
    let body: Value = serde_json::from_slice(&response.body.into_bytes().await.unwrap()).unwrap();
    assert_eq!(body, json!({"error": {"code": "server_error", "message": "boom"}}));
}

#[tokio::test]
async fn usage_limit_not_found_becomes_too_many_requests() {
    let error = json!({"error": {"code": "usage_limit_reached", "message": "You have hit your usage limit"}});
    let error_body = error.to_string();
    let h = harness(valid_credential(), true, move |_| {
        Ok(FakeReply::new(404, error_body.clone()).with_header("x-request-id", "req_1"))
    });
    let response = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(header_get(&response.headers, "x-request-id"), Some("req_1"));
    let body: Value = serde_json::from_slice(&response.body.into_bytes().await.unwrap()).unwrap();
    assert_eq!(body, error);
    let remap = h.sink.payload(LogStage::ErrorRemap).unwrap();
    assert_eq!(remap["from"], 404);
    assert_eq!(remap["to"], 429);
}

#[tokio::test]
async fn plain_text_usage_limit_is_remapped_too() {
    let h = harness(valid_credential(), true, |_| {
        Ok(FakeReply::new(404, "Usage_Limit_Reached: try again later"))
    });
    let response = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap();

    assert_eq!(response.status, 429);
    assert_eq!(
        response.body.into_bytes().await.unwrap(),
        Bytes::from_static(b"Usage_Limit_Reached: try again later")
    );
}

#[tokio::test]
async fn other_errors_pass_through() {
    let h = harness(valid_credential(), true, |req: &UpstreamHttpRequest| {
        let status = if req.url.ends_with("/responses") { 404 } else { 500 };
        Ok(FakeReply::json(status, json!({"detail": "Not Found"})))
    });
    let response = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status, 404);
    assert!(!h.sink.stages().contains(&LogStage::ErrorRemap));

    let h = harness(valid_credential(), true, |_: &UpstreamHttpRequest| {
        Ok(FakeReply::new(503, "upstream busy"))
    });
    let response = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(
        response.body.into_bytes().await.unwrap(),
        Bytes::from_static(b"upstream busy")
    );
}

#[tokio::test]
async fn unparseable_body_is_forwarded_verbatim() {
    let h = harness(valid_credential(), true, backend_ok(completed_stream()));
    let raw = Bytes::from_static(b"{not json");
    let response = h
        .dispatcher
        .dispatch(OutboundCall {
            body: raw.clone(),
            ..call(json!({}))
        })
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    let requests = h.backend_requests();
    assert_eq!(requests[0].body.as_ref(), Some(&raw));
    assert_eq!(
        h.sink.stages(),
        vec![LogStage::TransformSkipped, LogStage::Response]
    );
    // Passthrough never aggregates, so SSE comes back as-is.
    assert_eq!(
        response.body.into_bytes().await.unwrap(),
        Bytes::from(completed_stream())
    );
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_persisted_before_sending() {
    let new_access = access_token("acct_77");
    let token_reply = json!({"access_token": new_access, "refresh_token": "refresh-2", "expires_in": 3600});
    let stream = completed_stream();
    let h = harness(
        Credential::oauth(access_token("acct_42"), "refresh-1", NOW),
        true,
        move |req: &UpstreamHttpRequest| {
            if req.url.ends_with("/oauth/token") {
                Ok(FakeReply::json(200, token_reply.clone()))
            } else {
                Ok(FakeReply::new(200, stream.clone()))
            }
        },
    );
    h.dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi", "stream": true})))
        .await
        .unwrap();

    let all = h.upstream.requests();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].url, format!("{ISSUER}/oauth/token"));
    assert_eq!(header_get(&all[1].headers, "chatgpt-account-id"), Some("acct_77"));
    assert_eq!(h.store.writes().await, 1);
    assert_eq!(h.store.get().await.unwrap().refresh, "refresh-2");
    assert_eq!(h.sink.stages()[0], LogStage::Refresh);
}

#[tokio::test]
async fn failed_refresh_never_reaches_the_backend() {
    let h = harness(
        Credential::oauth("stale", "refresh-1", NOW - 5),
        true,
        |_: &UpstreamHttpRequest| Ok(FakeReply::json(401, json!({"error": "invalid_grant"}))),
    );
    let err = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AuthExpired { .. }));
    assert!(h.backend_requests().is_empty());
}

#[tokio::test]
async fn token_without_account_id_is_auth_expired() {
    let h = harness(
        Credential::oauth("opaque-token", "refresh-1", NOW + 60_000),
        true,
        backend_ok(completed_stream()),
    );
    let err = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::AuthExpired { .. }));
    assert_eq!(h.upstream.request_count(), 0);
}

#[tokio::test]
async fn transport_failure_is_reported_not_retried() {
    let h = harness(valid_credential(), true, |_: &UpstreamHttpRequest| {
        Err(connect_failure())
    });
    let err = h
        .dispatcher
        .dispatch(call(json!({"model": "gpt-5.1", "input": "hi"})))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NetworkFailure { .. }));
    assert_eq!(h.upstream.request_count(), 1);
}

#[tokio::test]
async fn non_codex_mode_prepends_tool_remap_message() {
    let h = harness(valid_credential(), false, backend_ok(completed_stream()));
    h.dispatcher
        .dispatch(call(json!({
            "model": "gpt-5-codex",
            "input": [{"role": "user", "content": "list files"}],
            "tools": [{"type": "function", "name": "bash"}],
            "stream": true
        })))
        .await
        .unwrap();

    let requests = h.backend_requests();
    let sent: Value = serde_json::from_slice(requests[0].body.as_ref().unwrap()).unwrap();
    assert_eq!(sent["model"], "gpt-5.1-codex");
    assert_eq!(sent["input"][0]["role"], "developer");
    assert_eq!(sent["input"][1]["role"], "user");
    assert_eq!(header_get(&requests[0].headers, "conversation_id"), None);
}
