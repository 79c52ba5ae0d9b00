use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

mod user_config;

pub use user_config::{ModelEntry, ModelOptions, UserConfig};

pub const DEFAULT_BASE_URL: &str = "https://chatgpt.com/backend-api/codex";
pub const DEFAULT_ISSUER: &str = "https://auth.openai.com";
pub const CODEX_MODE_ENV: &str = "CODEX_MODE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// Final, merged configuration used by the running process.
///
/// Merge order: CLI > ENV > config file > defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Optional outbound proxy (for backend egress).
    pub proxy: Option<String>,
    pub codex_mode: bool,
    /// Backend base; request paths after `/responses` are appended to it.
    pub base_url: String,
    pub issuer: String,
    /// Where the caller's own system prompt is published, for codex-mode filtering.
    pub caller_prompt_url: Option<String>,
    pub request_log: RequestLogMode,
}

/// Where pipeline stage events go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RequestLogMode {
    #[default]
    Off,
    /// One JSON file per stage under `<data_dir>/logs`.
    File,
    /// One JSON line per stage on stderr.
    Stderr,
}

impl RequestLogMode {
    /// Boolean flags select `File`; `stderr` (or `terminal`) selects `Stderr`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "file" => Some(Self::File),
            "stderr" | "terminal" => Some(Self::Stderr),
            other => parse_bool_flag(other).map(|on| if on { Self::File } else { Self::Off }),
        }
    }
}

/// Optional layer used for merging config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigPatch {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub proxy: Option<String>,
    pub codex_mode: Option<bool>,
    pub base_url: Option<String>,
    pub issuer: Option<String>,
    pub caller_prompt_url: Option<String>,
    pub request_log: Option<RequestLogMode>,
}

impl ConfigPatch {
    pub fn overlay(&mut self, other: ConfigPatch) {
        if other.host.is_some() {
            self.host = other.host;
        }
        if other.port.is_some() {
            self.port = other.port;
        }
        if other.proxy.is_some() {
            self.proxy = other.proxy;
        }
        if other.codex_mode.is_some() {
            self.codex_mode = other.codex_mode;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.issuer.is_some() {
            self.issuer = other.issuer;
        }
        if other.caller_prompt_url.is_some() {
            self.caller_prompt_url = other.caller_prompt_url;
        }
        if other.request_log.is_some() {
            self.request_log = other.request_log;
        }
    }

    /// Layer read from process-level variables that are not CLI flags.
    pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let codex_mode = match sanitize_env_value(lookup(CODEX_MODE_ENV)) {
            Some(raw) => Some(parse_bool_flag(&raw).ok_or(ConfigError::InvalidValue {
                field: CODEX_MODE_ENV,
                value: raw,
            })?),
            None => None,
        };
        Ok(Self {
            codex_mode,
            ..Self::default()
        })
    }

    pub fn into_config(self) -> Result<AppConfig, ConfigError> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                value: base_url,
            });
        }
        Ok(AppConfig {
            host: self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
            port: self.port.unwrap_or(8787),
            proxy: self.proxy.filter(|value| !value.trim().is_empty()),
            codex_mode: self.codex_mode.unwrap_or(true),
            base_url,
            issuer: self
                .issuer
                .unwrap_or_else(|| DEFAULT_ISSUER.to_string())
                .trim_end_matches('/')
                .to_string(),
            caller_prompt_url: self
                .caller_prompt_url
                .filter(|value| !value.trim().is_empty()),
            request_log: self.request_log.unwrap_or_default(),
        })
    }
}

impl From<AppConfig> for ConfigPatch {
    fn from(value: AppConfig) -> Self {
        Self {
            host: Some(value.host),
            port: Some(value.port),
            proxy: value.proxy,
            codex_mode: Some(value.codex_mode),
            base_url: Some(value.base_url),
            issuer: Some(value.issuer),
            caller_prompt_url: value.caller_prompt_url,
            request_log: Some(value.request_log),
        }
    }
}

/// On-disk JSON configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default, alias = "codexMode")]
    pub codex_mode: Option<bool>,
    #[serde(default, alias = "baseUrl")]
    pub base_url: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub proxy: Option<String>,
    #[serde(default, alias = "callerPromptUrl")]
    pub caller_prompt_url: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub provider: UserConfig,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Split into the process layer and the per-request model options.
    pub fn split(self) -> (ConfigPatch, UserConfig) {
        let patch = ConfigPatch {
            host: self.host,
            port: self.port,
            proxy: self.proxy,
            codex_mode: self.codex_mode,
            base_url: self.base_url,
            issuer: self.issuer,
            caller_prompt_url: self.caller_prompt_url,
            request_log: None,
        };
        (patch, self.provider)
    }
}

/// Accepts `1/0`, `true/false`, `yes/no`, `on/off` (any case).
pub fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Treats empty values and unexpanded `${VAR}` placeholders as unset.
pub fn sanitize_env_value(value: Option<String>) -> Option<String> {
    let value = value?;
    let trimmed = value.trim();
    if trimmed.is_empty() || (trimmed.starts_with("${") && trimmed.ends_with('}')) {
        return None;
    }
    Some(trimmed.to_string())
}
