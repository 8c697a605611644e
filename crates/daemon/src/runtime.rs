use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::config::{AutopushConfig, FailurePolicy, RepositoryConfig};
use crate::error::AutopushError;
use crate::git::gate::RepositoryGate;
use crate::scheduler::{registry, Autopush, ExitProcessSink, FailureSink, SchedulerOptions, TracingSink};

/// Start one scheduler per configured repository. If any fails to start, the
/// ones already running are shut down and the error is returned.
pub async fn start_all(config: &AutopushConfig) -> Result<Vec<Autopush>> {
    let sink: Arc<dyn FailureSink> = match config.on_failure {
        FailurePolicy::Log => Arc::new(TracingSink),
        FailurePolicy::Exit => Arc::new(ExitProcessSink),
    };

    let mut started = Vec::with_capacity(config.repositories.len());
    for repository in &config.repositories {
        let result = start_one(config, repository, sink.clone()).await.with_context(|| {
            format!("failed to start autopush for `{}`", repository.path.display())
        });

        match result {
            Ok(scheduler) => started.push(scheduler),
            Err(error) => {
                stop_all(&started).await;
                return Err(error);
            }
        }
    }
    Ok(started)
}

/// Run until Ctrl-C, then shut every scheduler down and wait for in-flight
/// cycles.
pub async fn run(config: AutopushConfig) -> Result<()> {
    if config.repositories.is_empty() {
        warn!("no repositories configured, nothing to do");
        return Ok(());
    }

    let schedulers = start_all(&config).await?;
    info!(count = schedulers.len(), "autopush running");

    tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
    info!("ctrl-c received, shutting down");

    registry::shutdown_all(true).await.context("autopush did not shut down cleanly")
}

async fn start_one(
    config: &AutopushConfig,
    repository: &RepositoryConfig,
    sink: Arc<dyn FailureSink>,
) -> Result<Autopush, AutopushError> {
    let period = config.period_for(repository)?;
    let handle = RepositoryGate::open_with_target(&repository.path, repository.remote_target())?;
    let options = SchedulerOptions::default().with_shared_failure_sink(sink);
    Autopush::start_with_options(period, handle, options).await
}

async fn stop_all(schedulers: &[Autopush]) {
    for scheduler in schedulers {
        if let Err(error) = scheduler.shutdown(true).await {
            warn!(scheduler = %scheduler.id(), %error, "failed to stop scheduler");
        }
    }
}
