use std::sync::Arc;

use bytes::Bytes;
use serde_json::{Value, json};
use tracing::{info, warn};

use codexgate_common::UserConfig;
use codexgate_provider_core::{
    Clock, Credential, CredentialStore, DispatchError, Event, EventSink, Headers, HttpMethod,
    LogStage, UpstreamClient, UpstreamHttpRequest, UpstreamHttpResponse,
};
use codexgate_transform::error_remap::{NoRemapReason, RemapDecision};
use codexgate_transform::request::{
    TransformContext, TransformSkipReason, parse_request_body, request_family,
    transform_request_body,
};
use codexgate_transform::stream2nostream::AggregateOutcome;

use super::headers::{HeaderOptions, build_headers};
use super::instructions::InstructionCache;
use super::oauth::{TokenRefresher, extract_account_id, should_refresh};
use super::response::{ReshapeMode, handle_error, handle_success};
use super::url::rewrite_url;

/// A caller request as it would have been sent to an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OutboundCall {
    pub trace_id: Option<String>,
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub base_url: String,
    pub codex_mode: bool,
    pub user_config: UserConfig,
}

struct PreparedBody {
    bytes: Bytes,
    mode: ReshapeMode,
    prompt_cache_key: Option<String>,
}

/// Entry point of the pipeline: credential, URL, body, headers, send, reshape.
pub struct CodexDispatcher {
    client: Arc<dyn UpstreamClient>,
    store: Arc<dyn CredentialStore>,
    refresher: TokenRefresher,
    instructions: InstructionCache,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    settings: DispatchSettings,
}

impl CodexDispatcher {
    pub fn new(
        client: Arc<dyn UpstreamClient>,
        store: Arc<dyn CredentialStore>,
        refresher: TokenRefresher,
        instructions: InstructionCache,
        clock: Arc<dyn Clock>,
        sink: Arc<dyn EventSink>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            client,
            store,
            refresher,
            instructions,
            clock,
            sink,
            settings,
        }
    }

    pub async fn dispatch(&self, call: OutboundCall) -> Result<UpstreamHttpResponse, DispatchError> {
        let trace_id = call.trace_id.as_deref();
        let credential = self.usable_credential(trace_id).await?;
        let account_id = extract_account_id(&credential.access).ok_or_else(|| {
            DispatchError::auth_expired("access token carries no ChatGPT account id")
        })?;

        let url = rewrite_url(&call.url, &self.settings.base_url);
        let prepared = self.prepare_body(trace_id, &call.body).await;
        let headers = build_headers(
            call.headers,
            &account_id,
            &credential.access,
            HeaderOptions {
                prompt_cache_key: prepared.prompt_cache_key.as_deref(),
            },
        );

        info!(
            event = "upstream_request",
            trace_id = trace_id.unwrap_or_default(),
            method = call.method.as_str(),
            url = %url,
            mode = ?prepared.mode
        );
        let response = self
            .client
            .send(UpstreamHttpRequest {
                method: call.method,
                url,
                headers,
                body: Some(prepared.bytes),
                is_stream: true,
            })
            .await
            .map_err(|failure| {
                warn!(
                    event = "upstream_failure",
                    trace_id = trace_id.unwrap_or_default(),
                    kind = ?failure.kind,
                    error = %failure.message
                );
                DispatchError::from(failure)
            })?;
        info!(
            event = "upstream_response",
            trace_id = trace_id.unwrap_or_default(),
            status = response.status
        );

        if (200..300).contains(&response.status) {
            let (response, outcome) = handle_success(response, prepared.mode).await?;
            if let Some(outcome) = outcome {
                self.log(trace_id, LogStage::StreamAggregated, aggregate_payload(&outcome))
                    .await;
            }
            self.log(trace_id, LogStage::Response, response_payload(&response))
                .await;
            return Ok(response);
        }

        let original_status = response.status;
        let (response, decision) = handle_error(response).await;
        if decision == RemapDecision::NotRemapped(NoRemapReason::BodyUnreadable) {
            warn!(
                event = "error_body_unreadable",
                trace_id = trace_id.unwrap_or_default(),
                status = original_status
            );
        }
        if let RemapDecision::Remapped { status, marker } = &decision {
            info!(
                event = "usage_limit_remapped",
                trace_id = trace_id.unwrap_or_default(),
                from = original_status,
                to = *status,
                marker = *marker
            );
            self.log(
                trace_id,
                LogStage::ErrorRemap,
                json!({"from": original_status, "to": status, "marker": marker}),
            )
            .await;
        }
        self.log(trace_id, LogStage::Response, response_payload(&response))
            .await;
        Ok(response)
    }

    async fn usable_credential(&self, trace_id: Option<&str>) -> Result<Credential, DispatchError> {
        let credential = self.store.get().await.map_err(|err| {
            DispatchError::auth_expired(format!("credential store unavailable: {err}"))
        })?;
        let now = self.clock.now_ms();
        if !should_refresh(&credential, now) {
            return Ok(credential);
        }

        self.log(
            trace_id,
            LogStage::Refresh,
            json!({"expires_at": credential.expires_at, "now": now}),
        )
        .await;
        let refreshed = self.refresher.refresh(&credential).await;
        if let Err(err) = &refreshed {
            warn!(
                event = "token_refresh_failed",
                trace_id = trace_id.unwrap_or_default(),
                error = %err
            );
        }
        refreshed
    }

    async fn prepare_body(&self, trace_id: Option<&str>, raw: &Bytes) -> PreparedBody {
        let body = match parse_request_body(raw) {
            Ok(body) => body,
            Err(reason) => return self.skip_transform(trace_id, raw, reason).await,
        };
        self.log(trace_id, LogStage::BeforeTransform, body_payload(raw))
            .await;

        let family = request_family(&body);
        let instructions = self.instructions.instructions(family).await;
        let caller_prompt = if self.settings.codex_mode {
            self.instructions.caller_prompt().await
        } else {
            None
        };
        let ctx = TransformContext {
            instructions: &instructions,
            caller_prompt: caller_prompt.as_deref(),
            user_config: &self.settings.user_config,
            codex_mode: self.settings.codex_mode,
        };
        let transformed = transform_request_body(body, &ctx);
        let bytes = match transformed.to_bytes() {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                let reason = TransformSkipReason::Unparseable(err.to_string());
                return self.skip_transform(trace_id, raw, reason).await;
            }
        };
        self.log(trace_id, LogStage::AfterTransform, body_payload(&bytes))
            .await;

        PreparedBody {
            bytes,
            mode: if transformed.caller_stream {
                ReshapeMode::Stream
            } else {
                ReshapeMode::Buffer
            },
            prompt_cache_key: transformed.prompt_cache_key,
        }
    }

    async fn skip_transform(
        &self,
        trace_id: Option<&str>,
        raw: &Bytes,
        reason: TransformSkipReason,
    ) -> PreparedBody {
        warn!(
            event = "transform_skipped",
            trace_id = trace_id.unwrap_or_default(),
            reason = %reason
        );
        self.log(
            trace_id,
            LogStage::TransformSkipped,
            json!({"reason": reason.to_string(), "body": String::from_utf8_lossy(raw)}),
        )
        .await;
        PreparedBody {
            bytes: raw.clone(),
            mode: ReshapeMode::Passthrough,
            prompt_cache_key: None,
        }
    }

    async fn log(&self, trace_id: Option<&str>, stage: LogStage, payload: Value) {
        let event = Event::new(stage, trace_id, self.clock.now_ms(), payload);
        self.sink.write(&event).await;
    }
}

fn body_payload(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

fn response_payload(response: &UpstreamHttpResponse) -> Value {
    json!({
        "status": response.status,
        "headers": response.headers,
    })
}

fn aggregate_payload(outcome: &AggregateOutcome) -> Value {
    match outcome {
        AggregateOutcome::Complete(response) => json!({"outcome": "complete", "response": response}),
        AggregateOutcome::UpstreamError(error) => json!({"outcome": "upstream_error", "body": error}),
        AggregateOutcome::MissingTerminalEvent => json!({"outcome": "missing_terminal_event"}),
    }
}
