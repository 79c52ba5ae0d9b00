use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get, post};
use bytes::Bytes;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use codexgate_provider_core::{
    DispatchError, Headers, HttpMethod, UpstreamBody, UpstreamHttpResponse,
    UpstreamTransportErrorKind,
};
use codexgate_provider_impl::{CodexDispatcher, OutboundCall};

const REQUEST_ID_HEADER: &str = "x-codexgate-request-id";

/// Never copied between the caller and the backend.
const HOP_HEADERS: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "proxy-connection",
];

pub(crate) struct ServerState {
    pub(crate) dispatcher: Arc<CodexDispatcher>,
}

pub(crate) fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/responses", post(responses_handler))
        .route("/responses", post(responses_handler))
        .route("/v1/responses/{*rest}", any(responses_handler))
        .route("/responses/{*rest}", any(responses_handler))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn responses_handler(
    State(state): State<Arc<ServerState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let trace_id = Uuid::now_v7().to_string();
    let Some(method) = HttpMethod::parse(method.as_str()) else {
        return error_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "invalid_request_error",
            "method not allowed",
            &trace_id,
        );
    };
    let started_at = Instant::now();
    info!(
        event = "downstream_received",
        trace_id = %trace_id,
        method = method.as_str(),
        path = %uri.path(),
        body_len = body.len()
    );

    let call = OutboundCall {
        trace_id: Some(trace_id.clone()),
        method,
        url: uri.to_string(),
        headers: forwardable_headers(&headers),
        body,
    };
    match state.dispatcher.dispatch(call).await {
        Ok(response) => {
            info!(
                event = "downstream_responded",
                trace_id = %trace_id,
                status = response.status,
                elapsed_ms = started_at.elapsed().as_millis()
            );
            upstream_response(response, &trace_id)
        }
        Err(err) => {
            warn!(
                event = "downstream_failed",
                trace_id = %trace_id,
                error = %err,
                elapsed_ms = started_at.elapsed().as_millis()
            );
            dispatch_error_response(&err, &trace_id)
        }
    }
}

fn forwardable_headers(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .filter(|(name, _)| !HOP_HEADERS.contains(&name.as_str()))
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect()
}

fn upstream_response(response: UpstreamHttpResponse, trace_id: &str) -> Response {
    let body = match response.body {
        UpstreamBody::Bytes(bytes) => Body::from(bytes),
        UpstreamBody::Stream(stream) => Body::from_stream(stream),
    };
    let mut resp = Response::new(body);
    *resp.status_mut() = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
    for (name, value) in response.headers {
        if HOP_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            resp.headers_mut().append(name, value);
        }
    }
    set_request_id(&mut resp, trace_id);
    resp
}

fn dispatch_error_response(err: &DispatchError, trace_id: &str) -> Response {
    let (status, kind) = dispatch_error_status(err);
    error_response(status, kind, &err.to_string(), trace_id)
}

fn dispatch_error_status(err: &DispatchError) -> (StatusCode, &'static str) {
    match err {
        DispatchError::AuthExpired { .. } => (StatusCode::UNAUTHORIZED, "authentication_error"),
        DispatchError::NetworkFailure {
            kind: UpstreamTransportErrorKind::Timeout | UpstreamTransportErrorKind::ReadTimeout,
            ..
        } => (StatusCode::GATEWAY_TIMEOUT, "upstream_timeout"),
        DispatchError::NetworkFailure { .. } => (StatusCode::BAD_GATEWAY, "upstream_unreachable"),
    }
}

fn error_response(status: StatusCode, kind: &str, message: &str, trace_id: &str) -> Response {
    let body = json!({"error": {"type": kind, "message": message}});
    let mut resp = (status, axum::Json(body)).into_response();
    set_request_id(&mut resp, trace_id);
    resp
}

fn set_request_id(resp: &mut Response, trace_id: &str) {
    if let Ok(value) = HeaderValue::from_str(trace_id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
}
