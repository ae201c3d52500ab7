mod cli;
mod commands;
mod prompt;
mod render;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use recon_core::{ApiClient, DashboardConfig, ScanApi, Session};
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{cli::Cli, prompt::TerminalPrompt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Ok(path) = dotenvy::dotenv() {
        debug!(path = %path.display(), "loaded .env file");
    }

    let (mut config, source) = DashboardConfig::load_from_env()
        .context("failed to load configuration")?;
    if let Some(server) = cli.server.clone() {
        config.server_url = server;
    }
    info!(
        source = %source,
        server = %config.server_url,
        page_size = config.page_size,
        progress_poll_ms = config.progress_poll_ms,
        "configuration in effect"
    );

    let client = ApiClient::new(&config.server_url, config.request_timeout())
        .context("failed to build HTTP client")?;
    let api: Arc<dyn ScanApi> = Arc::new(client);
    let mut session =
        Session::new(api, Arc::new(TerminalPrompt::new(cli.yes)), config);

    let outcome = commands::run(cli.command, &mut session).await;
    session.shutdown();
    outcome
}
