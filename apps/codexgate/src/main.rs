use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

mod bootstrap;
mod cli;
mod data_dir;
mod server;

use crate::bootstrap::bootstrap;
use crate::cli::CliArgs;
use crate::server::{ServerState, router};

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("codexgate failed: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let boot = bootstrap(CliArgs::parse())?;
    let bind = format!("{}:{}", boot.config.host, boot.config.port);
    let app = router(Arc::new(ServerState {
        dispatcher: boot.dispatcher,
    }));

    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .with_context(|| format!("bind {bind}"))?;
    info!(event = "listening", addr = %bind);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("codexgate=info,info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!(event = "shutdown");
    }
}
