use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use codexgate_provider_core::{Headers, header_remove, header_set};

use super::{
    ACCOUNT_ID_HEADER, CONVERSATION_ID_HEADER, OPENAI_BETA_HEADER, OPENAI_BETA_RESPONSES,
    ORIGINATOR, ORIGINATOR_HEADER, SESSION_ID_HEADER,
};

/// Caller credentials that must never reach the backend.
const CALLER_KEY_HEADERS: &[&str] = &["x-api-key", "api-key", "openai-organization", "openai-project"];

#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderOptions<'a> {
    pub prompt_cache_key: Option<&'a str>,
}

pub fn build_headers(
    mut headers: Headers,
    account_id: &str,
    access_token: &str,
    opts: HeaderOptions<'_>,
) -> Headers {
    for name in CALLER_KEY_HEADERS {
        header_remove(&mut headers, name);
    }
    header_set(
        &mut headers,
        AUTHORIZATION.as_str(),
        format!("Bearer {access_token}"),
    );
    header_set(&mut headers, ACCOUNT_ID_HEADER, account_id);
    header_set(&mut headers, OPENAI_BETA_HEADER, OPENAI_BETA_RESPONSES);
    header_set(&mut headers, ORIGINATOR_HEADER, ORIGINATOR);

    match opts.prompt_cache_key.filter(|key| !key.is_empty()) {
        Some(key) => {
            header_set(&mut headers, CONVERSATION_ID_HEADER, key);
            header_set(&mut headers, SESSION_ID_HEADER, key);
        }
        None => {
            header_remove(&mut headers, CONVERSATION_ID_HEADER);
            header_remove(&mut headers, SESSION_ID_HEADER);
        }
    }

    header_set(&mut headers, ACCEPT.as_str(), "text/event-stream");
    header_set(&mut headers, CONTENT_TYPE.as_str(), "application/json");
    headers
}
