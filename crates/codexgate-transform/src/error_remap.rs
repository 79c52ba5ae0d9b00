use serde_json::Value;

pub const STATUS_NOT_FOUND: u16 = 404;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Lowercase markers the backend uses when a 404 really means "out of quota".
pub const USAGE_LIMIT_MARKERS: &[&str] = &[
    "usage_limit_reached",
    "usage_not_included",
    "rate_limit_exceeded",
    "usage limit",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoRemapReason {
    StatusNotInspected,
    /// The body could not be read to the end; inspection is skipped.
    BodyUnreadable,
    NoUsageMarker,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemapDecision {
    Remapped {
        status: u16,
        marker: &'static str,
    },
    NotRemapped(NoRemapReason),
}

impl RemapDecision {
    pub fn status(&self, original: u16) -> u16 {
        match self {
            RemapDecision::Remapped { status, .. } => *status,
            RemapDecision::NotRemapped(_) => original,
        }
    }
}

/// Decides whether an error response should be surfaced as a retryable 429.
///
/// Only 404 bodies are inspected. The error code (or type) of a JSON body and
/// the raw text are matched case-insensitively; a body that is not JSON is
/// matched on its text alone.
pub fn decide_remap(status: u16, body: &[u8]) -> RemapDecision {
    if status != STATUS_NOT_FOUND {
        return RemapDecision::NotRemapped(NoRemapReason::StatusNotInspected);
    }
    let text = String::from_utf8_lossy(body);
    let json = serde_json::from_str::<Value>(&text).ok();
    let code = json.as_ref().and_then(error_code).unwrap_or_default();
    let haystack = format!("{code} {text}").to_ascii_lowercase();
    match USAGE_LIMIT_MARKERS
        .iter()
        .find(|marker| haystack.contains(*marker))
    {
        Some(marker) => RemapDecision::Remapped {
            status: STATUS_TOO_MANY_REQUESTS,
            marker: *marker,
        },
        None => RemapDecision::NotRemapped(NoRemapReason::NoUsageMarker),
    }
}

fn error_code(json: &Value) -> Option<&str> {
    let error = json.get("error");
    error
        .and_then(|error| error.get("code"))
        .or_else(|| error.and_then(|error| error.get("type")))
        .or_else(|| json.get("code"))
        .or_else(|| json.get("type"))
        .and_then(Value::as_str)
}
