// autopushd: runs a scheduler for every repository in the config file.

use anyhow::Context;
use autopush_daemon::config::AutopushConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = AutopushConfig::load().context("failed to load autopush config")?;
    info!(repositories = config.repositories.len(), "starting autopush daemon");
    autopush_daemon::runtime::run(config).await.context("autopush daemon terminated unexpectedly")
}
