pub const GPT_51_CODEX_MAX: &str = "gpt-5.1-codex-max";
pub const GPT_51_CODEX: &str = "gpt-5.1-codex";
pub const GPT_51_CODEX_MINI: &str = "gpt-5.1-codex-mini";
pub const GPT_51: &str = "gpt-5.1";

pub const DEFAULT_MODEL: &str = GPT_51;

const VENDOR_PREFIXES: &[&str] = &["openai/", "chatgpt/", "codex/"];
const TIER_SUFFIXES: &[&str] = &["-xhigh", "-minimal", "-medium", "-high", "-none", "-low"];

/// Caller-facing identifiers and the canonical name each one maps to.
const MODEL_ALIASES: &[(&str, &str)] = &[
    ("gpt-5.1-codex-max", GPT_51_CODEX_MAX),
    ("gpt-5.1-codex-max-low", GPT_51_CODEX_MAX),
    ("gpt-5.1-codex-max-medium", GPT_51_CODEX_MAX),
    ("gpt-5.1-codex-max-high", GPT_51_CODEX_MAX),
    ("gpt-5.1-codex-max-xhigh", GPT_51_CODEX_MAX),
    ("gpt-5.1-codex", GPT_51_CODEX),
    ("gpt-5.1-codex-low", GPT_51_CODEX),
    ("gpt-5.1-codex-medium", GPT_51_CODEX),
    ("gpt-5.1-codex-high", GPT_51_CODEX),
    ("gpt-5.1-codex-mini", GPT_51_CODEX_MINI),
    ("gpt-5.1-codex-mini-medium", GPT_51_CODEX_MINI),
    ("gpt-5.1-codex-mini-high", GPT_51_CODEX_MINI),
    ("gpt-5-codex", GPT_51_CODEX),
    ("gpt-5-codex-low", GPT_51_CODEX),
    ("gpt-5-codex-medium", GPT_51_CODEX),
    ("gpt-5-codex-high", GPT_51_CODEX),
    ("gpt-5-codex-mini", GPT_51_CODEX_MINI),
    ("codex-mini-latest", GPT_51_CODEX_MINI),
    ("gpt-5.1", GPT_51),
    ("gpt-5.1-none", GPT_51),
    ("gpt-5.1-low", GPT_51),
    ("gpt-5.1-medium", GPT_51),
    ("gpt-5.1-high", GPT_51),
    ("gpt-5", GPT_51),
    ("gpt-5-minimal", GPT_51),
    ("gpt-5-low", GPT_51),
    ("gpt-5-medium", GPT_51),
    ("gpt-5-high", GPT_51),
    ("gpt-5-mini", GPT_51),
    ("gpt-5-nano", GPT_51),
];

/// Instruction groups; each family shares one prompt file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ModelFamily {
    CodexMax,
    Codex,
    CodexMini,
    #[default]
    Gpt51,
}

impl ModelFamily {
    pub const ALL: [ModelFamily; 4] = [
        ModelFamily::CodexMax,
        ModelFamily::Codex,
        ModelFamily::CodexMini,
        ModelFamily::Gpt51,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::CodexMax => "codex-max",
            ModelFamily::Codex => "codex",
            ModelFamily::CodexMini => "codex-mini",
            ModelFamily::Gpt51 => "gpt-5.1",
        }
    }

    pub fn is_codex(&self) -> bool {
        !matches!(self, ModelFamily::Gpt51)
    }
}

pub fn normalize_model(raw: Option<&str>) -> String {
    let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return DEFAULT_MODEL.to_string();
    };
    if let Some(canonical) = lookup_alias(raw) {
        return canonical.to_string();
    }

    let lowered = raw.to_ascii_lowercase();
    let stripped = strip_tier_suffix(strip_vendor_prefix(&lowered));
    if let Some(canonical) = lookup_alias(stripped) {
        return canonical.to_string();
    }

    let canonical = if stripped.contains("codex-max") {
        GPT_51_CODEX_MAX
    } else if stripped.contains("codex-mini") {
        GPT_51_CODEX_MINI
    } else if stripped.contains("codex") {
        GPT_51_CODEX
    } else {
        DEFAULT_MODEL
    };
    canonical.to_string()
}

pub fn model_family(canonical: &str) -> ModelFamily {
    match canonical {
        GPT_51_CODEX_MAX => ModelFamily::CodexMax,
        GPT_51_CODEX => ModelFamily::Codex,
        GPT_51_CODEX_MINI => ModelFamily::CodexMini,
        _ => ModelFamily::Gpt51,
    }
}

fn lookup_alias(name: &str) -> Option<&'static str> {
    MODEL_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| *canonical)
}

fn strip_vendor_prefix(name: &str) -> &str {
    VENDOR_PREFIXES
        .iter()
        .find_map(|prefix| name.strip_prefix(prefix))
        .unwrap_or(name)
}

fn strip_tier_suffix(name: &str) -> &str {
    TIER_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .unwrap_or(name)
}

/// Effort tier named by a `-low`/`-high`/... suffix on the caller's model name.
pub fn tier_suffix(raw: &str) -> Option<&'static str> {
    let lowered = raw.trim().to_ascii_lowercase();
    TIER_SUFFIXES
        .iter()
        .find(|suffix| lowered.ends_with(*suffix))
        .map(|suffix| &suffix[1..])
}
