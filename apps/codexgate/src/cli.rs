use anyhow::Context;
use clap::Parser;

use codexgate_common::{ConfigPatch, RequestLogMode, parse_bool_flag, sanitize_env_value};

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "codexgate",
    version,
    about = "Bridge OpenAI Responses callers to the ChatGPT Codex backend"
)]
pub(crate) struct CliArgs {
    /// Bind host.
    #[arg(long, env = "CODEXGATE_HOST")]
    pub(crate) host: Option<String>,

    /// Bind port.
    #[arg(long, env = "CODEXGATE_PORT")]
    pub(crate) port: Option<String>,

    /// JSON config file with backend settings and per-model options.
    #[arg(long, env = "CODEXGATE_CONFIG")]
    pub(crate) config: Option<String>,

    /// Holds `auth.json` and the request log directory.
    #[arg(long, env = "CODEXGATE_DATA_DIR")]
    pub(crate) data_dir: Option<String>,

    /// Optional outbound proxy for backend requests.
    #[arg(long, env = "CODEXGATE_PROXY")]
    pub(crate) proxy: Option<String>,

    #[arg(long, env = "CODEXGATE_CODEX_MODE")]
    pub(crate) codex_mode: Option<String>,

    #[arg(long, env = "CODEXGATE_BASE_URL")]
    pub(crate) base_url: Option<String>,

    /// OAuth issuer used for token refresh.
    #[arg(long, env = "CODEXGATE_ISSUER")]
    pub(crate) issuer: Option<String>,

    /// Where the caller's own system prompt is published (codex mode filtering).
    #[arg(long, env = "CODEXGATE_CALLER_PROMPT_URL")]
    pub(crate) caller_prompt_url: Option<String>,

    /// Log each pipeline stage: `1`/`file` writes to `<data_dir>/logs`, `stderr` prints JSON lines.
    #[arg(long, env = "CODEXGATE_REQUEST_LOG")]
    pub(crate) request_log: Option<String>,
}

impl CliArgs {
    /// The CLI layer; clap has already applied CLI > ENV for each field.
    pub(crate) fn patch(&self) -> anyhow::Result<ConfigPatch> {
        Ok(ConfigPatch {
            host: sanitize_env_value(self.host.clone()),
            port: parse_u16_value(self.port.clone(), "CODEXGATE_PORT")?,
            proxy: sanitize_env_value(self.proxy.clone()),
            codex_mode: parse_bool_value(self.codex_mode.clone(), "CODEXGATE_CODEX_MODE")?,
            base_url: sanitize_env_value(self.base_url.clone()),
            issuer: sanitize_env_value(self.issuer.clone()),
            caller_prompt_url: sanitize_env_value(self.caller_prompt_url.clone()),
            request_log: parse_log_mode(self.request_log.clone(), "CODEXGATE_REQUEST_LOG")?,
        })
    }
}

fn parse_u16_value(value: Option<String>, name: &str) -> anyhow::Result<Option<u16>> {
    let Some(raw) = sanitize_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<u16>()
        .with_context(|| format!("invalid {name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_bool_value(value: Option<String>, name: &str) -> anyhow::Result<Option<bool>> {
    let Some(raw) = sanitize_env_value(value) else {
        return Ok(None);
    };
    match parse_bool_flag(&raw) {
        Some(parsed) => Ok(Some(parsed)),
        None => Err(anyhow::anyhow!("invalid {name} value: {raw}")),
    }
}

fn parse_log_mode(value: Option<String>, name: &str) -> anyhow::Result<Option<RequestLogMode>> {
    let Some(raw) = sanitize_env_value(value) else {
        return Ok(None);
    };
    match RequestLogMode::parse(&raw) {
        Some(mode) => Ok(Some(mode)),
        None => Err(anyhow::anyhow!("invalid {name} value: {raw}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_into_patch() {
        let args = CliArgs::try_parse_from([
            "codexgate",
            "--port",
            "9000",
            "--codex-mode",
            "off",
            "--request-log",
            "1",
            "--base-url",
            "${UNSET}",
        ])
        .unwrap();
        let patch = args.patch().unwrap();
        assert_eq!(patch.port, Some(9000));
        assert_eq!(patch.codex_mode, Some(false));
        assert_eq!(patch.request_log, Some(RequestLogMode::File));
        assert_eq!(patch.base_url, None);
        assert_eq!(patch.host, None);
    }

    #[test]
    fn rejects_bad_values() {
        let args = CliArgs {
            port: Some("http".to_string()),
            ..CliArgs::default()
        };
        assert!(args.patch().is_err());

        let args = CliArgs {
            codex_mode: Some("maybe".to_string()),
            ..CliArgs::default()
        };
        assert!(args.patch().is_err());
    }
}
