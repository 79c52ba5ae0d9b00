use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-key request options. Every field resolves independently:
/// model entry, then global options, then the built-in default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(
        default,
        alias = "reasoningEffort",
        skip_serializing_if = "Option::is_none"
    )]
    pub reasoning_effort: Option<String>,
    #[serde(
        default,
        alias = "reasoningSummary",
        skip_serializing_if = "Option::is_none"
    )]
    pub reasoning_summary: Option<String>,
    #[serde(
        default,
        alias = "textVerbosity",
        skip_serializing_if = "Option::is_none"
    )]
    pub text_verbosity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
}

impl ModelOptions {
    pub fn overlay(&mut self, other: ModelOptions) {
        if other.reasoning_effort.is_some() {
            self.reasoning_effort = other.reasoning_effort;
        }
        if other.reasoning_summary.is_some() {
            self.reasoning_summary = other.reasoning_summary;
        }
        if other.text_verbosity.is_some() {
            self.text_verbosity = other.text_verbosity;
        }
        if other.include.is_some() {
            self.include = other.include;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    #[serde(default)]
    pub options: ModelOptions,
}

/// Global options plus per-model overrides, keyed by the name callers use.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub options: ModelOptions,
    #[serde(default)]
    pub models: BTreeMap<String, ModelEntry>,
}

impl UserConfig {
    /// Merge options for one request.
    ///
    /// Each key resolves on its own: the entry for the caller's original model
    /// name, then the entry for the canonical name, then global options.
    pub fn resolve(&self, original: Option<&str>, canonical: &str) -> ModelOptions {
        let mut merged = self.options.clone();
        if let Some(entry) = self.models.get(canonical) {
            merged.overlay(entry.options.clone());
        }
        if let Some(entry) = original
            .filter(|name| *name != canonical)
            .and_then(|name| self.models.get(name))
        {
            merged.overlay(entry.options.clone());
        }
        merged
    }
}
