//! Fakes shared by the integration tests

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fixloop::app::options::{LoopConfig, MonitorConfig, SafetyConfig, TimingConfig};
use fixloop::app::orchestrator::Orchestrator;
use fixloop::apply::{ApplyOutcome, FixApplicator};
use fixloop::deploy::{
    ConfigValidation, DeployOptions, DeployResult, Deployer, DeploymentPhase, DeploymentStatus,
    RollbackResult,
};
use fixloop::errors::LoopError;
use fixloop::fixgen::RuleBasedGenerator;
use fixloop::models::error::{NormalizedError, SourceLocation};
use fixloop::models::fix::FixSuggestion;
use fixloop::models::levels::Severity;
use fixloop::monitor::session::SessionSink;
use fixloop::monitor::sources::{ErrorSource, SourceKind};
use fixloop::monitor::Monitor;
use tokio_util::sync::CancellationToken;

pub fn error(message: &str, file: &str, line: u32, severity: Severity) -> NormalizedError {
    NormalizedError::new(message, severity, "runtime", SourceLocation::new(file, line))
}

/// Config with short windows and no backup branches
pub fn config(max_iterations: u32, auto_apply: bool) -> LoopConfig {
    let mut config = LoopConfig {
        name: "test".to_string(),
        monitoring: MonitorConfig::default(),
        safety: SafetyConfig {
            max_iterations,
            max_duration_minutes: 30,
            create_backup_branch: false,
            rollback_on_failure: false,
        },
        timing: TimingConfig {
            propagation_delay: Duration::from_secs(5),
            monitor_window: Duration::from_secs(60),
            status_poll_interval: Duration::from_secs(1),
        },
        ..Default::default()
    };
    config.fix_generation.auto_apply = auto_apply;
    config
}

// ================================ DEPLOYER ================================ //

#[derive(Default)]
pub struct FakeDeployer {
    pub deploys: AtomicU32,
    pub rollbacks: AtomicU32,
    pub options: Mutex<Vec<DeployOptions>>,
    /// Deployment number that reports failure
    pub fail_on: Option<u32>,
    /// Time each deployment takes
    pub delay: Duration,
}

impl FakeDeployer {
    pub fn failing_on(n: u32) -> Self {
        Self {
            fail_on: Some(n),
            ..Default::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn deploy_count(&self) -> u32 {
        self.deploys.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    async fn deploy(&self, options: DeployOptions) -> Result<DeployResult, LoopError> {
        let n = self.deploys.fetch_add(1, Ordering::SeqCst) + 1;
        self.options.lock().unwrap().push(options.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_on == Some(n) {
            return Ok(DeployResult::failed("push rejected", vec!["remote: denied".to_string()]));
        }
        Ok(DeployResult {
            success: true,
            deployment_url: Some(format!("https://preview.example.com/{}", n)),
            commit_hash: Some(format!("commit-{}", n)),
            branch: options.branch_name,
            error: None,
            logs: Vec::new(),
        })
    }

    async fn check_status(&self, url: &str) -> Result<DeploymentStatus, LoopError> {
        Ok(DeploymentStatus {
            status: DeploymentPhase::Success,
            url: url.to_string(),
            logs: Vec::new(),
            started_at: None,
            completed_at: None,
        })
    }

    async fn rollback(&self) -> Result<RollbackResult, LoopError> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(RollbackResult {
            success: true,
            previous_commit: None,
            error: None,
        })
    }

    async fn validate_config(&self) -> Result<ConfigValidation, LoopError> {
        Ok(ConfigValidation::from_errors(Vec::new()))
    }
}

// ================================ SOURCES ================================= //

/// Emits a scripted batch of errors per session, then idles until cancelled
pub struct ScriptedSource {
    name: String,
    sessions: Mutex<Vec<Vec<NormalizedError>>>,
    repeat_last: bool,
    pub runs: AtomicU32,
}

impl ScriptedSource {
    /// One batch per session, empty once the script runs out
    pub fn new(sessions: Vec<Vec<NormalizedError>>) -> Self {
        Self {
            name: "scripted".to_string(),
            sessions: Mutex::new(sessions),
            repeat_last: false,
            runs: AtomicU32::new(0),
        }
    }

    /// The same batch every session
    pub fn repeating(errors: Vec<NormalizedError>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new(vec![errors])
        }
    }

    pub fn clean() -> Self {
        Self::new(Vec::new())
    }

    fn next_batch(&self) -> Vec<NormalizedError> {
        let mut sessions = self.sessions.lock().unwrap();
        if sessions.is_empty() {
            return Vec::new();
        }
        if self.repeat_last && sessions.len() == 1 {
            return sessions[0].clone();
        }
        sessions.remove(0)
    }
}

#[async_trait]
impl ErrorSource for ScriptedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Push
    }

    async fn run(
        &self,
        _url: String,
        sink: SessionSink,
        cancel: CancellationToken,
    ) -> Result<(), LoopError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        for error in self.next_batch() {
            // Fresh ids per session, identities stay the same
            let fresh = NormalizedError::new(
                error.message.clone(),
                error.severity,
                error.category.clone(),
                error.source.clone(),
            )
            .with_stack(error.stack.clone());
            sink.emit_error(fresh);
        }
        cancel.cancelled().await;
        Ok(())
    }
}

/// Fails as soon as it is opened
pub struct BrokenSource;

#[async_trait]
impl ErrorSource for BrokenSource {
    fn name(&self) -> &str {
        "broken"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Tracker
    }

    async fn run(
        &self,
        _url: String,
        _sink: SessionSink,
        _cancel: CancellationToken,
    ) -> Result<(), LoopError> {
        Err(LoopError::SourceError("401 Unauthorized".to_string()))
    }
}

// =============================== APPLICATOR =============================== //

#[derive(Default)]
pub struct RecordingApplicator {
    pub applied: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<String>>,
    pub reject_all: bool,
    pub fail_all: bool,
}

impl RecordingApplicator {
    pub fn rejecting() -> Self {
        Self {
            reject_all: true,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl FixApplicator for RecordingApplicator {
    async fn apply(&self, fix: &FixSuggestion) -> Result<ApplyOutcome, LoopError> {
        if self.fail_all {
            return Err(LoopError::ApplyError("merge conflict".to_string()));
        }
        if self.reject_all {
            return Ok(ApplyOutcome::Rejected("reviewer declined".to_string()));
        }
        self.applied.lock().unwrap().push(fix.id.clone());
        Ok(ApplyOutcome::Applied)
    }

    async fn submit_for_approval(&self, fix: &FixSuggestion) -> Result<(), LoopError> {
        self.submitted.lock().unwrap().push(fix.id.clone());
        Ok(())
    }
}

// ================================ HARNESS ================================= //

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    pub deployer: Arc<FakeDeployer>,
    pub monitor: Arc<Monitor>,
    pub applicator: Arc<RecordingApplicator>,
}

pub fn harness(
    config: LoopConfig,
    deployer: FakeDeployer,
    sources: Vec<Arc<dyn ErrorSource>>,
    applicator: RecordingApplicator,
) -> Harness {
    let deployer = Arc::new(deployer);
    let monitor = Arc::new(Monitor::new(&config.monitoring, sources).unwrap());
    let applicator = Arc::new(applicator);
    let orchestrator = Arc::new(Orchestrator::new(
        config,
        deployer.clone(),
        monitor.clone(),
        Arc::new(RuleBasedGenerator::new()),
        applicator.clone(),
    ));
    Harness {
        orchestrator,
        deployer,
        monitor,
        applicator,
    }
}
