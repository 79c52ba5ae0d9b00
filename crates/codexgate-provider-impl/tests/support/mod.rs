#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use base64::Engine;
use bytes::Bytes;
use futures_util::StreamExt;
use serde_json::{Value, json};

use codexgate_provider_core::{
    Clock, Event, EventSink, LogStage, ProviderError, UpstreamBody, UpstreamClient,
    UpstreamFailure, UpstreamHttpRequest, UpstreamHttpResponse, UpstreamTransportErrorKind,
};
use codexgate_provider_impl::codex::instructions::{FetchResult, InstructionKey, InstructionSource};

#[derive(Debug, Clone)]
pub struct FakeReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl FakeReply {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, value: Value) -> Self {
        Self::new(status, value.to_string())
            .with_header("content-type", "application/json")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type Responder = dyn Fn(&UpstreamHttpRequest) -> Result<FakeReply, UpstreamFailure> + Send + Sync;

/// Records every request and answers from a closure. Stream bodies are split
/// into small chunks to exercise incremental parsing.
pub struct FakeUpstream {
    requests: Mutex<Vec<UpstreamHttpRequest>>,
    responder: Box<Responder>,
    delay: Option<Duration>,
}

impl FakeUpstream {
    pub fn new<F>(responder: F) -> Arc<Self>
    where
        F: Fn(&UpstreamHttpRequest) -> Result<FakeReply, UpstreamFailure> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: None,
        })
    }

    pub fn delayed<F>(delay: Duration, responder: F) -> Arc<Self>
    where
        F: Fn(&UpstreamHttpRequest) -> Result<FakeReply, UpstreamFailure> + Send + Sync + 'static,
    {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            responder: Box::new(responder),
            delay: Some(delay),
        })
    }

    pub fn requests(&self) -> Vec<UpstreamHttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl UpstreamClient for FakeUpstream {
    fn send<'a>(
        &'a self,
        request: UpstreamHttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpstreamHttpResponse, UpstreamFailure>> + Send + 'a>>
    {
        Box::pin(async move {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let reply = (self.responder)(&request)?;
            let body = if request.is_stream {
                let chunks = reply
                    .body
                    .chunks(11)
                    .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
                    .collect::<Vec<_>>();
                UpstreamBody::Stream(futures_util::stream::iter(chunks).boxed())
            } else {
                UpstreamBody::Bytes(reply.body)
            };
            Ok(UpstreamHttpResponse {
                status: reply.status,
                headers: reply.headers,
                body,
            })
        })
    }
}

pub fn connect_failure() -> UpstreamFailure {
    UpstreamFailure {
        kind: UpstreamTransportErrorKind::Connect,
        message: "connection refused".to_string(),
    }
}

#[derive(Debug)]
pub struct FixedClock {
    now: AtomicI64,
}

impl FixedClock {
    pub fn new(now: i64) -> Arc<Self> {
        Arc::new(Self {
            now: AtomicI64::new(now),
        })
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

type FetchFn = dyn Fn(InstructionKey, Option<&str>) -> Result<FetchResult, ProviderError> + Send + Sync;

pub struct FakeInstructionSource {
    calls: AtomicUsize,
    etags: Mutex<Vec<Option<String>>>,
    fetch: Box<FetchFn>,
}

impl FakeInstructionSource {
    pub fn new<F>(fetch: F) -> Arc<Self>
    where
        F: Fn(InstructionKey, Option<&str>) -> Result<FetchResult, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            etags: Mutex::new(Vec::new()),
            fetch: Box::new(fetch),
        })
    }

    /// Serves fixed text for every family and no caller prompt.
    pub fn fixed(text: &'static str) -> Arc<Self> {
        Self::new(move |key, _| match key {
            InstructionKey::Family(_) => Ok(FetchResult::Modified {
                text: text.to_string(),
                etag: None,
            }),
            InstructionKey::CallerPrompt => Err(ProviderError::Unsupported("no caller prompt")),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn etags_sent(&self) -> Vec<Option<String>> {
        self.etags.lock().unwrap().clone()
    }
}

impl InstructionSource for FakeInstructionSource {
    fn fetch<'a>(
        &'a self,
        key: InstructionKey,
        etag: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResult, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.etags.lock().unwrap().push(etag.map(str::to_string));
            (self.fetch)(key, etag)
        })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn stages(&self) -> Vec<LogStage> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.stage)
            .collect()
    }

    pub fn payload(&self, stage: LogStage) -> Option<Value> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .find(|event| event.stage == stage)
            .map(|event| event.payload.clone())
    }
}

impl EventSink for RecordingSink {
    fn write<'a>(&'a self, event: &'a Event) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.events.lock().unwrap().push(event.clone());
        })
    }
}

/// Unsigned JWT carrying a ChatGPT account id claim.
pub fn access_token(account_id: &str) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let payload = json!({
        "exp": 4_102_444_800i64,
        "https://api.openai.com/auth": {"chatgpt_account_id": account_id}
    });
    format!(
        "{}.{}.signature",
        engine.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        engine.encode(payload.to_string())
    )
}

pub fn sse(events: &[Value]) -> String {
    events
        .iter()
        .map(|event| {
            format!(
                "event: {}\ndata: {}\n\n",
                event["type"].as_str().unwrap_or("message"),
                event
            )
        })
        .collect::<String>()
}
