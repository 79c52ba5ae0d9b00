use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use tracing::{debug, warn};

use codexgate_provider_core::{
    Clock, HttpMethod, ProviderError, UpstreamClient, UpstreamHttpRequest, header_get,
};
use codexgate_transform::model::ModelFamily;

pub const CACHE_WINDOW_MS: i64 = 15 * 60 * 1000;
pub const PROMPT_BASE_URL: &str =
    "https://raw.githubusercontent.com/openai/codex/main/codex-rs/core";

const CODEX_MAX_INSTRUCTIONS: &str = include_str!("instructions/gpt-5.1-codex-max_prompt.md");
const CODEX_INSTRUCTIONS: &str = include_str!("instructions/gpt_5_codex_prompt.md");
const GPT_5_1_INSTRUCTIONS: &str = include_str!("instructions/gpt_5_1_prompt.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKey {
    Family(ModelFamily),
    /// The caller's own system prompt, filtered out of the input in codex mode.
    CallerPrompt,
}

impl InstructionKey {
    fn remote_file(&self) -> Option<&'static str> {
        match self {
            InstructionKey::Family(ModelFamily::CodexMax) => Some("gpt-5.1-codex-max_prompt.md"),
            InstructionKey::Family(ModelFamily::Codex | ModelFamily::CodexMini) => {
                Some("gpt_5_codex_prompt.md")
            }
            InstructionKey::Family(ModelFamily::Gpt51) => Some("gpt_5_1_prompt.md"),
            InstructionKey::CallerPrompt => None,
        }
    }

    fn bundled(&self) -> Option<&'static str> {
        match self {
            InstructionKey::Family(family) => Some(bundled_instructions(*family)),
            InstructionKey::CallerPrompt => None,
        }
    }
}

pub fn bundled_instructions(family: ModelFamily) -> &'static str {
    match family {
        ModelFamily::CodexMax => CODEX_MAX_INSTRUCTIONS,
        ModelFamily::Codex | ModelFamily::CodexMini => CODEX_INSTRUCTIONS,
        ModelFamily::Gpt51 => GPT_5_1_INSTRUCTIONS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    Modified { text: String, etag: Option<String> },
    NotModified,
}

/// Conditional fetch of instruction text.
pub trait InstructionSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        key: InstructionKey,
        etag: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResult, ProviderError>> + Send + 'a>>;
}

/// Reads prompt files over HTTP with `If-None-Match`.
pub struct HttpInstructionSource {
    client: Arc<dyn UpstreamClient>,
    base_url: String,
    caller_prompt_url: Option<String>,
}

impl HttpInstructionSource {
    pub fn new(client: Arc<dyn UpstreamClient>, caller_prompt_url: Option<String>) -> Self {
        Self {
            client,
            base_url: PROMPT_BASE_URL.to_string(),
            caller_prompt_url,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url_for(&self, key: InstructionKey) -> Option<String> {
        match key.remote_file() {
            Some(file) => Some(format!("{}/{file}", self.base_url.trim_end_matches('/'))),
            None => self.caller_prompt_url.clone(),
        }
    }
}

impl InstructionSource for HttpInstructionSource {
    fn fetch<'a>(
        &'a self,
        key: InstructionKey,
        etag: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<FetchResult, ProviderError>> + Send + 'a>> {
        Box::pin(async move {
            let url = self
                .url_for(key)
                .ok_or(ProviderError::Unsupported("no source configured"))?;
            let mut headers = Vec::new();
            if let Some(etag) = etag {
                headers.push(("If-None-Match".to_string(), etag.to_string()));
            }
            let response = self
                .client
                .send(UpstreamHttpRequest {
                    method: HttpMethod::Get,
                    url,
                    headers,
                    body: None,
                    is_stream: false,
                })
                .await
                .map_err(|err| ProviderError::Other(err.to_string()))?;

            if response.status == 304 {
                return Ok(FetchResult::NotModified);
            }
            if !(200..300).contains(&response.status) {
                return Err(ProviderError::Other(format!(
                    "instruction fetch failed with status {}",
                    response.status
                )));
            }
            let etag = header_get(&response.headers, "etag").map(str::to_string);
            let body = response
                .body
                .into_bytes()
                .await
                .map_err(|err| ProviderError::Other(err.to_string()))?;
            let text = String::from_utf8(body.to_vec())
                .map_err(|err| ProviderError::Other(err.to_string()))?;
            Ok(FetchResult::Modified { text, etag })
        })
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Option<Arc<str>>,
    etag: Option<String>,
    last_fetched_at_ms: i64,
}

type Entries = HashMap<InstructionKey, CacheEntry>;

/// Instruction text with at most one remote fetch per key and window.
///
/// Readers load an immutable snapshot; writers swap in a new map, so a
/// half-written entry is never observed.
pub struct InstructionCache {
    source: Arc<dyn InstructionSource>,
    clock: Arc<dyn Clock>,
    window_ms: i64,
    entries: ArcSwap<Entries>,
    fetch_locks: Mutex<HashMap<InstructionKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl InstructionCache {
    pub fn new(source: Arc<dyn InstructionSource>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            clock,
            window_ms: CACHE_WINDOW_MS,
            entries: ArcSwap::from_pointee(HashMap::new()),
            fetch_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_window_ms(mut self, window_ms: i64) -> Self {
        self.window_ms = window_ms;
        self
    }

    /// Never fails: falls back to cached text, then to the bundled prompt.
    pub async fn instructions(&self, family: ModelFamily) -> Arc<str> {
        self.get(InstructionKey::Family(family))
            .await
            .unwrap_or_else(|| Arc::from(bundled_instructions(family)))
    }

    /// `None` when the prompt was never fetched successfully.
    pub async fn caller_prompt(&self) -> Option<Arc<str>> {
        self.get(InstructionKey::CallerPrompt).await
    }

    pub async fn get(&self, key: InstructionKey) -> Option<Arc<str>> {
        if let Some(entry) = self.fresh_entry(key, self.clock.now_ms()) {
            return entry.value;
        }

        let lock = self.fetch_lock(key);
        let _guard = lock.lock().await;
        let now = self.clock.now_ms();
        if let Some(entry) = self.fresh_entry(key, now) {
            return entry.value;
        }

        let previous = self.entries.load().get(&key).cloned();
        let previous_etag = previous.as_ref().and_then(|entry| entry.etag.clone());
        let previous_value = previous.and_then(|entry| entry.value);

        let entry = match self.source.fetch(key, previous_etag.as_deref()).await {
            Ok(FetchResult::Modified { text, etag }) => {
                debug!(event = "instructions_fetched", key = ?key, etag = ?etag);
                CacheEntry {
                    value: Some(Arc::from(text)),
                    etag,
                    last_fetched_at_ms: now,
                }
            }
            Ok(FetchResult::NotModified) if previous_value.is_some() => CacheEntry {
                value: previous_value,
                etag: previous_etag,
                last_fetched_at_ms: now,
            },
            Ok(FetchResult::NotModified) => {
                warn!(event = "instructions_not_modified_without_cache", key = ?key);
                self.fallback_entry(key, None, None, now)
            }
            Err(err) => {
                warn!(event = "instructions_fetch_failed", key = ?key, error = %err);
                self.fallback_entry(key, previous_value, previous_etag, now)
            }
        };

        let value = entry.value.clone();
        self.entries.rcu(|current| {
            let mut next = Entries::clone(current);
            next.insert(key, entry.clone());
            next
        });
        value
    }

    fn fresh_entry(&self, key: InstructionKey, now: i64) -> Option<CacheEntry> {
        self.entries
            .load()
            .get(&key)
            .filter(|entry| now.saturating_sub(entry.last_fetched_at_ms) < self.window_ms)
            .cloned()
    }

    /// The failed attempt still counts against the window.
    fn fallback_entry(
        &self,
        key: InstructionKey,
        previous: Option<Arc<str>>,
        etag: Option<String>,
        now: i64,
    ) -> CacheEntry {
        CacheEntry {
            value: previous.or_else(|| key.bundled().map(Arc::from)),
            etag,
            last_fetched_at_ms: now,
        }
    }

    fn fetch_lock(&self, key: InstructionKey) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self
            .fetch_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks.entry(key).or_default().clone()
    }
}
