use codexgate_common::ModelOptions;
use codexgate_protocol::responses::{
    INCLUDE_REASONING_ENCRYPTED_CONTENT, Reasoning, ReasoningEffort, ReasoningSummary, Verbosity,
};

use crate::model::{ModelFamily, tier_suffix};

pub const DEFAULT_EFFORT: ReasoningEffort = ReasoningEffort::Medium;
pub const DEFAULT_SUMMARY: ReasoningSummary = ReasoningSummary::Auto;
pub const DEFAULT_VERBOSITY: Verbosity = Verbosity::Medium;

/// Effort and summary for one call.
///
/// Precedence for effort: tier suffix on the caller's model name, then
/// model/global options, then `medium`. The result is clamped to what the
/// family accepts. Effort and summary sent by the caller are overridden.
pub fn resolve_reasoning(
    original_model: Option<&str>,
    family: ModelFamily,
    options: &ModelOptions,
) -> Reasoning {
    let effort = original_model
        .and_then(tier_suffix)
        .and_then(ReasoningEffort::parse)
        .or_else(|| {
            options
                .reasoning_effort
                .as_deref()
                .and_then(ReasoningEffort::parse)
        })
        .unwrap_or(DEFAULT_EFFORT);

    let summary = options
        .reasoning_summary
        .as_deref()
        .and_then(ReasoningSummary::parse)
        .unwrap_or(DEFAULT_SUMMARY);

    Reasoning {
        effort: Some(clamp_effort(effort, family)),
        summary: Some(summary),
        ..Reasoning::default()
    }
}

pub fn clamp_effort(effort: ReasoningEffort, family: ModelFamily) -> ReasoningEffort {
    match (family, effort) {
        (ModelFamily::CodexMini, ReasoningEffort::High | ReasoningEffort::Xhigh) => {
            ReasoningEffort::High
        }
        (ModelFamily::CodexMini, _) => ReasoningEffort::Medium,
        (ModelFamily::Codex | ModelFamily::CodexMax, ReasoningEffort::None)
        | (ModelFamily::Codex | ModelFamily::CodexMax, ReasoningEffort::Minimal) => {
            ReasoningEffort::Low
        }
        (ModelFamily::Codex | ModelFamily::Gpt51, ReasoningEffort::Xhigh) => ReasoningEffort::High,
        (_, effort) => effort,
    }
}

/// The backend default is `medium`, whatever verbosity the caller asked for.
pub fn resolve_verbosity(options: &ModelOptions) -> Verbosity {
    options
        .text_verbosity
        .as_deref()
        .and_then(Verbosity::parse)
        .unwrap_or(DEFAULT_VERBOSITY)
}

/// Union of request and configured includes, always asking for encrypted reasoning.
pub fn resolve_include(requested: Option<Vec<String>>, options: &ModelOptions) -> Vec<String> {
    let mut include: Vec<String> = Vec::new();
    let sources = requested
        .into_iter()
        .flatten()
        .chain(options.include.iter().flatten().cloned())
        .chain(std::iter::once(INCLUDE_REASONING_ENCRYPTED_CONTENT.to_string()));
    for entry in sources {
        if !include.contains(&entry) {
            include.push(entry);
        }
    }
    include
}
