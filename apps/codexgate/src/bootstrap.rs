use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use codexgate_common::{AppConfig, ConfigFile, ConfigPatch, RequestLogMode, UserConfig};
use codexgate_provider_core::{
    EventSink, NoopEventSink, SystemClock, TerminalEventSink, UpstreamClient,
};
use codexgate_provider_impl::codex::instructions::{HttpInstructionSource, InstructionCache};
use codexgate_provider_impl::codex::oauth::TokenRefresher;
use codexgate_provider_impl::{
    CodexDispatcher, DispatchSettings, FileCredentialStore, FileEventSink, UpstreamClientConfig,
    WreqUpstreamClient,
};

use crate::cli::CliArgs;
use crate::data_dir::resolve_data_dir;

pub(crate) const AUTH_FILE: &str = "auth.json";
pub(crate) const LOG_DIR: &str = "logs";

pub(crate) struct Bootstrap {
    pub(crate) config: AppConfig,
    pub(crate) dispatcher: Arc<CodexDispatcher>,
}

pub(crate) fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let data_dir = resolve_data_dir(args.data_dir.as_deref());
    let (config, user_config) = load_config(&args)?;
    info!(
        event = "config_loaded",
        host = %config.host,
        port = config.port,
        codex_mode = config.codex_mode,
        base_url = %config.base_url,
        proxy = %config.proxy.as_deref().unwrap_or(""),
        data_dir = %data_dir.display(),
        request_log = ?config.request_log,
        models = user_config.models.len()
    );

    let client: Arc<dyn UpstreamClient> = Arc::new(
        WreqUpstreamClient::new(&UpstreamClientConfig::from_app(&config))
            .context("build upstream client")?,
    );
    let clock = Arc::new(SystemClock);
    let store = Arc::new(FileCredentialStore::new(data_dir.join(AUTH_FILE)));
    let sink = event_sink(&config, &data_dir);

    let source = HttpInstructionSource::new(client.clone(), config.caller_prompt_url.clone());
    let instructions = InstructionCache::new(Arc::new(source), clock.clone());
    let refresher = TokenRefresher::new(client.clone(), store.clone(), clock.clone(), &config.issuer);

    let dispatcher = CodexDispatcher::new(
        client,
        store,
        refresher,
        instructions,
        clock,
        sink,
        DispatchSettings {
            base_url: config.base_url.clone(),
            codex_mode: config.codex_mode,
            user_config,
        },
    );
    Ok(Bootstrap {
        config,
        dispatcher: Arc::new(dispatcher),
    })
}

/// Merge once: CLI > ENV > config file > defaults.
fn load_config(args: &CliArgs) -> anyhow::Result<(AppConfig, UserConfig)> {
    let (mut merged, user_config) = match args.config.as_deref().filter(|path| !path.is_empty()) {
        Some(path) => ConfigFile::load(Path::new(path))
            .context("load config file")?
            .split(),
        None => (ConfigPatch::default(), UserConfig::default()),
    };
    merged.overlay(ConfigPatch::from_env_with(|name| std::env::var(name).ok())?);
    merged.overlay(args.patch()?);
    let config = merged.into_config().context("finalize merged config")?;
    Ok((config, user_config))
}

fn event_sink(config: &AppConfig, data_dir: &Path) -> Arc<dyn EventSink> {
    match config.request_log {
        RequestLogMode::Off => Arc::new(NoopEventSink),
        RequestLogMode::File => {
            let dir = data_dir.join(LOG_DIR);
            info!(event = "request_log_enabled", dir = %dir.display());
            Arc::new(FileEventSink::new(dir))
        }
        RequestLogMode::Stderr => Arc::new(TerminalEventSink::new()),
    }
}
