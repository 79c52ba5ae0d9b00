use bytes::Bytes;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};

use codexgate_provider_core::{
    DispatchError, Headers, UpstreamBody, UpstreamHttpResponse, header_get,
    header_remove, header_set,
};
use codexgate_transform::error_remap::{NoRemapReason, RemapDecision, decide_remap};
use codexgate_transform::stream2nostream::{AggregateOutcome, ResponseAggregator};

/// How a successful backend response is handed back, decided from the caller's request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReshapeMode {
    /// Caller asked for SSE: forward the byte stream untouched.
    Stream,
    /// Caller asked for one JSON document: fold the SSE stream.
    Buffer,
    /// The request was not transformed; forward whatever came back.
    Passthrough,
}

pub const STATUS_BAD_GATEWAY: u16 = 502;

pub async fn handle_success(
    response: UpstreamHttpResponse,
    mode: ReshapeMode,
) -> Result<(UpstreamHttpResponse, Option<AggregateOutcome>), DispatchError> {
    match mode {
        ReshapeMode::Passthrough => Ok((response, None)),
        ReshapeMode::Stream => {
            let UpstreamHttpResponse {
                status,
                mut headers,
                body,
            } = response;
            if header_get(&headers, CONTENT_TYPE.as_str()).is_none() {
                header_set(&mut headers, CONTENT_TYPE.as_str(), "text/event-stream");
            }
            Ok((
                UpstreamHttpResponse {
                    status,
                    headers,
                    body,
                },
                None,
            ))
        }
        ReshapeMode::Buffer => {
            let UpstreamHttpResponse {
                status,
                headers,
                body,
            } = response;
            let raw = body.into_bytes().await?;
            let mut aggregator = ResponseAggregator::new();
            aggregator.push_bytes(&raw);
            let outcome = aggregator.finish();
            let reshaped = match &outcome {
                AggregateOutcome::Complete(value) => json_response(status, headers, value),
                AggregateOutcome::UpstreamError(value) => {
                    json_response(STATUS_BAD_GATEWAY, headers, value)
                }
                AggregateOutcome::MissingTerminalEvent => UpstreamHttpResponse {
                    status,
                    headers,
                    body: UpstreamBody::Bytes(raw),
                },
            };
            Ok((reshaped, Some(outcome)))
        }
    }
}

/// Remaps usage-limit 404s to 429; every other error status passes through.
///
/// Inspection never fails the call: a 404 body that breaks off mid-read is
/// returned as far as it arrived, with its status untouched.
pub async fn handle_error(response: UpstreamHttpResponse) -> (UpstreamHttpResponse, RemapDecision) {
    let UpstreamHttpResponse {
        status,
        headers,
        body,
    } = response;
    if status != 404 {
        let decision = decide_remap(status, &[]);
        return (
            UpstreamHttpResponse {
                status,
                headers,
                body,
            },
            decision,
        );
    }

    let (raw, failure) = body.into_partial_bytes().await;
    let decision = match failure {
        Some(_) => RemapDecision::NotRemapped(NoRemapReason::BodyUnreadable),
        None => decide_remap(status, &raw),
    };
    (
        UpstreamHttpResponse {
            status: decision.status(status),
            headers,
            body: UpstreamBody::Bytes(raw),
        },
        decision,
    )
}

fn json_response(status: u16, mut headers: Headers, value: &serde_json::Value) -> UpstreamHttpResponse {
    for name in [CONTENT_LENGTH, CONTENT_ENCODING, TRANSFER_ENCODING] {
        header_remove(&mut headers, name.as_str());
    }
    header_set(&mut headers, CONTENT_TYPE.as_str(), "application/json");
    UpstreamHttpResponse {
        status,
        headers,
        body: UpstreamBody::Bytes(Bytes::from(value.to_string())),
    }
}
