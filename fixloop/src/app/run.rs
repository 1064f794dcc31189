//! Main application run

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info};

use crate::app::options::LoopConfig;
use crate::app::orchestrator::Orchestrator;
use crate::apply::queue::FileQueueApplicator;
use crate::deploy::git::GitDeployer;
use crate::deploy::Deployer;
use crate::errors::LoopError;
use crate::filesys::dir::Dir;
use crate::fixgen::build_generator;
use crate::http::client::HttpClient;
use crate::models::iteration::Iteration;
use crate::models::result::LoopResult;
use crate::models::stats::DebugLoopStats;
use crate::monitor::sources::build_sources;
use crate::monitor::Monitor;
use crate::storage::layout::StorageLayout;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Report written to the runs directory when a run ends
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub name: String,
    pub finished_at: chrono::DateTime<Utc>,
    pub result: LoopResult,
    pub stats: DebugLoopStats,
    pub iterations: Vec<Iteration>,
}

/// Check the loop configuration and the deployment target
pub async fn validate(config: &LoopConfig) -> Result<(), LoopError> {
    config.validate()?;
    let deployer = GitDeployer::new(config.deployment.clone(), HttpClient::new(HTTP_TIMEOUT)?);
    let validation = deployer.validate_config().await?;
    if !validation.valid {
        return Err(LoopError::ConfigError(validation.errors.join("; ")));
    }
    Ok(())
}

/// Wire the git deployer, configured sources, rule generator and file queue
pub fn build(config: &LoopConfig) -> Result<Orchestrator, LoopError> {
    let http = HttpClient::new(HTTP_TIMEOUT)?;

    let deployer = Arc::new(GitDeployer::new(config.deployment.clone(), http.clone()));
    let sources = build_sources(
        &config.monitoring.sources,
        config.monitoring.poll_interval,
        Arc::new(http),
    );
    let monitor = Arc::new(Monitor::new(&config.monitoring, sources)?);
    let generator = Arc::new(build_generator(&config.fix_generation)?);
    let applicator = Arc::new(FileQueueApplicator::new(
        &Dir::new(&config.fix_generation.queue_dir),
        config.fix_generation.min_confidence,
    ));

    Ok(Orchestrator::new(
        config.clone(),
        deployer,
        monitor,
        generator,
        applicator,
    ))
}

/// Run the fix loop until it ends or `shutdown_signal` fires
pub async fn run(
    config: LoopConfig,
    layout: &StorageLayout,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<LoopResult, LoopError> {
    info!("Initializing fix loop {}...", config.name);
    validate(&config).await?;
    layout.setup().await?;

    let orchestrator = Arc::new(build(&config)?);
    let mut loop_task = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };

    let joined = tokio::select! {
        joined = &mut loop_task => joined,
        _ = shutdown_signal => {
            info!("Shutdown signal received, stopping fix loop...");
            orchestrator.stop();
            loop_task.await
        }
    };
    let result = joined.map_err(|e| LoopError::ShutdownError(e.to_string()))?;

    let report = RunReport {
        name: config.name.clone(),
        finished_at: Utc::now(),
        result: result.clone(),
        stats: orchestrator.stats(),
        iterations: orchestrator.iterations(),
    };
    let file = layout.runs_dir().file(&format!(
        "{}-{}.json",
        config.name,
        report.finished_at.format("%Y%m%dT%H%M%S")
    ));
    if let Err(e) = file.write_json(&report).await {
        error!("Failed to write run report: {}", e);
    } else {
        info!("Run report written to {}", file.path().display());
    }

    Ok(result)
}
