use codexgate_common::UserConfig;
use codexgate_protocol::responses::{
    InputItem, InputParam, MessageItem, ResponseTextParam, ResponsesRequestBody,
};

use crate::input::{
    add_bridge_message, add_tool_remap_message, filter_input, filter_system_prompts,
    normalize_orphaned_tool_outputs,
};
use crate::model::{ModelFamily, model_family, normalize_model};
use crate::reasoning::{resolve_include, resolve_reasoning, resolve_verbosity};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformSkipReason {
    EmptyBody,
    Unparseable(String),
}

impl std::fmt::Display for TransformSkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransformSkipReason::EmptyBody => write!(f, "empty request body"),
            TransformSkipReason::Unparseable(message) => {
                write!(f, "request body is not a Responses object: {message}")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    Transformed(Box<TransformedRequest>),
    /// The original body should be forwarded unmodified.
    Skipped(TransformSkipReason),
}

pub struct TransformContext<'a> {
    pub instructions: &'a str,
    /// Caller system prompt to filter out in codex mode, when known.
    pub caller_prompt: Option<&'a str>,
    pub user_config: &'a UserConfig,
    pub codex_mode: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransformedRequest {
    pub body: ResponsesRequestBody,
    pub original_model: Option<String>,
    pub family: ModelFamily,
    /// The caller's `stream` flag; the backend is always asked to stream.
    pub caller_stream: bool,
    pub prompt_cache_key: Option<String>,
}

impl TransformedRequest {
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.body)
    }
}

pub fn parse_request_body(raw: &[u8]) -> Result<ResponsesRequestBody, TransformSkipReason> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(TransformSkipReason::EmptyBody);
    }
    serde_json::from_slice(raw).map_err(|err| TransformSkipReason::Unparseable(err.to_string()))
}

/// Family of the model a parsed body asks for; selects the instruction text.
pub fn request_family(body: &ResponsesRequestBody) -> ModelFamily {
    model_family(&normalize_model(body.model.as_deref()))
}

pub fn transform_raw_body(raw: &[u8], ctx: &TransformContext<'_>) -> TransformOutcome {
    match parse_request_body(raw) {
        Ok(body) => TransformOutcome::Transformed(Box::new(transform_request_body(body, ctx))),
        Err(reason) => TransformOutcome::Skipped(reason),
    }
}

pub fn transform_request_body(
    mut body: ResponsesRequestBody,
    ctx: &TransformContext<'_>,
) -> TransformedRequest {
    let original_model = body.model.clone();
    let canonical = normalize_model(original_model.as_deref());
    let family = model_family(&canonical);
    let options = ctx
        .user_config
        .resolve(original_model.as_deref(), &canonical);

    // Resolved values replace the caller's; other `reasoning.*` and `text.*` keys survive.
    let requested_reasoning = body.reasoning.take().unwrap_or_default();
    let mut reasoning = resolve_reasoning(original_model.as_deref(), family, &options);
    reasoning.extra = requested_reasoning.extra;
    let mut text = body.text.take().unwrap_or_else(ResponseTextParam::default);
    text.verbosity = Some(resolve_verbosity(&options));

    let has_tools = body.has_tools();
    let items = match body.input.take() {
        Some(InputParam::Items(items)) => items,
        Some(InputParam::Text(text)) => vec![InputItem::Message(MessageItem::text("user", text))],
        None => Vec::new(),
    };
    let mut items = filter_input(items);
    if ctx.codex_mode {
        items = filter_system_prompts(items, ctx.caller_prompt);
        items = add_bridge_message(items, has_tools);
    } else {
        items = add_tool_remap_message(items, has_tools);
    }
    let items = normalize_orphaned_tool_outputs(items);

    let caller_stream = body.stream.unwrap_or(false);
    body.model = Some(canonical);
    body.input = Some(InputParam::Items(items));
    body.instructions = Some(ctx.instructions.to_string());
    body.reasoning = Some(reasoning);
    body.text = Some(text);
    body.include = Some(resolve_include(body.include.take(), &options));
    body.store = Some(false);
    body.stream = Some(true);
    body.max_output_tokens = None;
    body.max_completion_tokens = None;
    body.stream_options = None;

    TransformedRequest {
        prompt_cache_key: body.prompt_cache_key.clone(),
        body,
        original_model,
        family,
        caller_stream,
    }
}
