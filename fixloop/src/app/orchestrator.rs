//! Deploy, monitor, fix loop

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

use crate::app::events::{EventBus, LoopEvent};
use crate::app::fsm::{LoopFsm, LoopState, LoopTransition};
use crate::app::options::LoopConfig;
use crate::apply::{ApplyOutcome, FixApplicator};
use crate::deploy::{DeployOptions, Deployer, DeploymentPhase};
use crate::errors::LoopError;
use crate::fixgen::{FixGenerator, FixRequest};
use crate::models::fix::FixStatus;
use crate::models::iteration::{Iteration, IterationOutcome};
use crate::models::result::LoopResult;
use crate::models::stats::{DebugLoopStats, DEFAULT_TOP_ERRORS};
use crate::monitor::Monitor;

const STOPPED_REASON: &str = "Stopped by user";

/// Point-in-time view of the loop
#[derive(Debug, Clone, Serialize)]
pub struct LoopSnapshot {
    pub state: LoopState,
    pub iteration: u32,
    pub stats: DebugLoopStats,
    pub running: bool,
    pub paused: bool,
}

/// Cancellation of the current run
struct StopSignal {
    token: CancellationToken,
    /// `stop` was called since the run started
    stopping: bool,
}

/// How an iteration ended without a fatal error
enum IterationEnd {
    /// No errors on the deployment
    Clean { url: String },
    /// Fixes were handled, deploy again
    Continue,
    /// `stop` was observed
    Stopped,
}

/// Drives iterations until the target is clean, the budget runs out or the
/// operator stops the loop
pub struct Orchestrator {
    config: LoopConfig,
    deployer: Arc<dyn Deployer>,
    monitor: Arc<Monitor>,
    generator: Arc<dyn FixGenerator>,
    applicator: Arc<dyn FixApplicator>,

    /// Held from a successful `start` until it returns
    running: AtomicBool,
    current_iteration: AtomicU32,
    fsm: Mutex<LoopFsm>,
    history: Mutex<Vec<Iteration>>,
    paused: watch::Sender<bool>,
    cancel: Mutex<StopSignal>,
    events: EventBus,
}

impl Orchestrator {
    pub fn new(
        config: LoopConfig,
        deployer: Arc<dyn Deployer>,
        monitor: Arc<Monitor>,
        generator: Arc<dyn FixGenerator>,
        applicator: Arc<dyn FixApplicator>,
    ) -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            config,
            deployer,
            monitor,
            generator,
            applicator,
            running: AtomicBool::new(false),
            current_iteration: AtomicU32::new(0),
            fsm: Mutex::new(LoopFsm::new()),
            history: Mutex::new(Vec::new()),
            paused,
            cancel: Mutex::new(StopSignal {
                token: CancellationToken::new(),
                stopping: false,
            }),
            events: EventBus::default(),
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoopEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_paused(&self) -> bool {
        *self.paused.borrow()
    }

    /// Run the loop to a terminal state
    pub async fn start(&self) -> LoopResult {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Fix loop is already running, ignoring start");
            return LoopResult::already_running();
        }

        let cancel = CancellationToken::new();
        {
            let mut signal = self.stop_signal();
            // A stop that raced the token swap still applies
            if signal.stopping {
                cancel.cancel();
            }
            signal.token = cancel.clone();
        }

        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        self.current_iteration.store(0, Ordering::SeqCst);
        self.paused.send_replace(false);
        let _ = self.transition(LoopTransition::Reset);

        self.announce(format!(
            "Fix loop {} starting (max {} iterations, {} minutes)",
            self.config.name,
            self.config.safety.max_iterations,
            self.config.safety.max_duration_minutes
        ));

        let started = Instant::now();
        let result = self.run(&cancel, started).await;

        self.monitor.stop_monitoring();

        if result.success {
            info!("Fix loop finished after {} iterations", result.iterations);
        } else {
            warn!(
                "Fix loop ended after {} iterations: {}",
                result.iterations,
                result.reason.as_deref().unwrap_or("unknown")
            );
        }
        self.events.publish(LoopEvent::Finished {
            result: result.clone(),
        });

        // Release the guard last so a new run never overlaps this one
        let mut signal = self.stop_signal();
        signal.stopping = false;
        self.running.store(false, Ordering::SeqCst);
        drop(signal);
        result
    }

    /// Suspend at the next iteration boundary
    pub fn pause(&self) {
        if !self.is_running() || self.is_stopping() {
            warn!("Fix loop is not running, nothing to pause");
            return;
        }
        if self.paused.send_replace(true) {
            return;
        }
        if let Err(e) = self.transition(LoopTransition::Pause) {
            debug!("Pause transition skipped: {}", e);
        }
        self.announce("Fix loop paused, the current iteration will complete".to_string());
    }

    pub fn resume(&self) {
        if !self.paused.send_replace(false) {
            return;
        }
        if let Err(e) = self.transition(LoopTransition::Resume) {
            debug!("Resume transition skipped: {}", e);
        }
        self.announce("Fix loop resumed".to_string());
    }

    /// Stop the loop. The in-flight iteration is abandoned and `start`
    /// returns once it has unwound.
    pub fn stop(&self) {
        {
            let mut signal = self.stop_signal();
            if !self.is_running() {
                debug!("Fix loop is not running, nothing to stop");
                return;
            }
            if signal.stopping {
                debug!("Fix loop is already stopping");
                return;
            }
            info!("Stopping fix loop...");
            signal.stopping = true;
            signal.token.cancel();
        }
        self.paused.send_replace(false);
        self.monitor.stop_monitoring();
        if let Err(e) = self.transition(LoopTransition::Stop) {
            debug!("Stop transition skipped: {}", e);
        }
    }

    /// A stop was requested and the run is still unwinding
    pub fn is_stopping(&self) -> bool {
        self.is_running() && self.stop_signal().stopping
    }

    fn stop_signal(&self) -> std::sync::MutexGuard<'_, StopSignal> {
        self.cancel.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_state(&self) -> LoopSnapshot {
        let state = self
            .fsm
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .state();
        LoopSnapshot {
            state,
            iteration: self.current_iteration.load(Ordering::SeqCst),
            stats: self.stats(),
            running: self.is_running(),
            paused: self.is_paused(),
        }
    }

    /// Statistics computed from the current history
    pub fn stats(&self) -> DebugLoopStats {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        DebugLoopStats::from_history(
            &history,
            self.monitor.degraded_sources(),
            DEFAULT_TOP_ERRORS,
        )
    }

    pub fn iterations(&self) -> Vec<Iteration> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    async fn run(&self, cancel: &CancellationToken, started: Instant) -> LoopResult {
        let safety = &self.config.safety;

        loop {
            if cancel.is_cancelled() || !self.wait_while_paused(cancel).await {
                return self.stopped(started);
            }

            let done = self.current_iteration.load(Ordering::SeqCst);
            if done >= safety.max_iterations {
                let reason = format!("Reached max iterations ({})", safety.max_iterations);
                return self.exhausted(reason, started);
            }
            if started.elapsed() > safety.max_duration() {
                let reason = format!(
                    "Exceeded max duration ({} minutes)",
                    safety.max_duration_minutes
                );
                return self.exhausted(reason, started);
            }

            let number = self.current_iteration.fetch_add(1, Ordering::SeqCst) + 1;
            match self.run_iteration(number, cancel).await {
                Ok(IterationEnd::Clean { url }) => {
                    self.announce(format!("Iteration {} is clean, deployment {} has no errors", number, url));
                    return self.result(true, Some(url), None, started);
                }
                Ok(IterationEnd::Continue) => {}
                Ok(IterationEnd::Stopped) => return self.stopped(started),
                // Transitions fail once stop() moved the FSM to stopped
                Err(_) if cancel.is_cancelled() => return self.stopped(started),
                Err(e) => return self.failed(number, e, started).await,
            }
        }
    }

    async fn run_iteration(
        &self,
        number: u32,
        cancel: &CancellationToken,
    ) -> Result<IterationEnd, LoopError> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Iteration::new(number));
        self.events.publish(LoopEvent::IterationStarted { number });
        self.announce(format!("Iteration {} starting", number));

        // Deploy
        self.transition(LoopTransition::Deploy)?;
        let url = match self.deploy(number, cancel).await? {
            Some(url) => url,
            None => return Ok(IterationEnd::Stopped),
        };
        if !self.await_propagation(&url, cancel).await? {
            return Ok(IterationEnd::Stopped);
        }

        // Monitor
        self.transition(LoopTransition::Monitor)?;
        self.monitor.start_monitoring(&url)?;
        let watched = tokio::select! {
            _ = cancel.cancelled() => false,
            _ = tokio::time::sleep(self.config.timing.monitor_window) => true,
        };
        let errors = self.monitor.get_current_errors();
        self.monitor.stop_monitoring();
        if !watched {
            return Ok(IterationEnd::Stopped);
        }
        info!("Iteration {} observed {} distinct errors", number, errors.len());
        self.record(|it| it.record_errors(errors.clone()))?;

        if errors.is_empty() {
            self.transition(LoopTransition::Complete)?;
            self.record(|it| it.finish(IterationOutcome::Completed))?;
            return Ok(IterationEnd::Clean { url });
        }

        // Analyze
        self.transition(LoopTransition::Analyze)?;
        let generation = &self.config.fix_generation;
        let request = FixRequest {
            errors,
            max_fixes: generation.max_fixes_per_iteration,
            require_approval: !generation.auto_apply,
        };
        let batch = tokio::select! {
            _ = cancel.cancelled() => return Ok(IterationEnd::Stopped),
            batch = self.generator.generate_fixes(request) => batch?,
        };
        debug!("{}", batch.reasoning);
        self.record(|it| it.record_fixes(batch.fixes.clone()))?;

        // Fix
        self.transition(LoopTransition::Fix)?;
        for mut fix in batch.fixes {
            if cancel.is_cancelled() {
                return Ok(IterationEnd::Stopped);
            }

            if !generation.auto_apply {
                if let Err(e) = self.applicator.submit_for_approval(&fix).await {
                    warn!("Failed to submit fix {} for approval: {}", fix.id, e);
                }
                continue;
            }

            match self.applicator.apply(&fix).await {
                Ok(ApplyOutcome::Applied) => {
                    fix.resolve(FixStatus::Applied)?;
                    self.record(|it| it.record_applied(fix))?;
                }
                Ok(ApplyOutcome::Rejected(reason)) => {
                    info!("Fix {} rejected: {}", fix.id, reason);
                    fix.resolve(FixStatus::Rejected)?;
                    self.record(|it| it.record_rejected(fix))?;
                }
                Err(e) => {
                    warn!("Fix {} failed to apply: {}", fix.id, e);
                    fix.resolve(FixStatus::Failed)?;
                    self.record(|it| it.record_rejected(fix))?;
                }
            }
        }

        self.record(|it| it.finish(IterationOutcome::Running))?;
        Ok(IterationEnd::Continue)
    }

    /// Deploy the current code. `None` when stopped meanwhile.
    async fn deploy(
        &self,
        number: u32,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, LoopError> {
        let backup = self.config.safety.create_backup_branch;
        let options = DeployOptions {
            commit_message: format!("fixloop: iteration {}", number),
            create_branch: backup,
            branch_name: backup.then(|| format!("{}-iteration-{}", self.config.name, number)),
        };

        let deployed = tokio::select! {
            _ = cancel.cancelled() => return Ok(None),
            deployed = self.deployer.deploy(options) => deployed?,
        };
        if !deployed.success {
            for line in &deployed.logs {
                debug!("deploy: {}", line);
            }
            return Err(LoopError::DeployError(
                deployed
                    .error
                    .unwrap_or_else(|| "deployment failed".to_string()),
            ));
        }
        let url = deployed
            .deployment_url
            .ok_or_else(|| LoopError::DeployError("deployment returned no URL".to_string()))?;

        self.record(|it| it.record_deployment(&url, deployed.commit_hash, deployed.branch))?;
        self.announce(format!("Iteration {} deployed to {}", number, url));
        Ok(Some(url))
    }

    /// Poll the deployment until it is live or the propagation delay
    /// elapsed. `false` when stopped meanwhile.
    async fn await_propagation(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, LoopError> {
        let timing = &self.config.timing;
        let deadline = Instant::now() + timing.propagation_delay;

        loop {
            let status = tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                status = self.deployer.check_status(url) => status,
            };
            match status {
                Ok(status) if status.status == DeploymentPhase::Success => {
                    debug!("Deployment {} is live", url);
                    return Ok(true);
                }
                Ok(status) if status.status == DeploymentPhase::Failed => {
                    return Err(LoopError::DeployError(format!(
                        "deployment {} failed: {}",
                        url,
                        status.logs.join("\n")
                    )));
                }
                Ok(status) => debug!("Deployment {} is {:?}", url, status.status),
                Err(e) => warn!("Status check for {} failed: {}", url, e),
            }

            let now = Instant::now();
            if now >= deadline {
                debug!("Propagation delay for {} elapsed", url);
                return Ok(true);
            }
            let wait = timing.status_poll_interval.min(deadline - now);
            tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Block while paused. `false` when stopped meanwhile.
    async fn wait_while_paused(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.paused.subscribe();
        let mut announced = false;
        loop {
            let paused = *rx.borrow_and_update();
            if !paused {
                return true;
            }
            if !announced {
                info!("Fix loop paused at iteration boundary");
                announced = true;
            }
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = rx.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    async fn failed(&self, number: u32, err: LoopError, started: Instant) -> LoopResult {
        let reason = err.to_string();
        error!("Iteration {} failed: {}", number, reason);
        self.events.log(Level::ERROR, format!("Iteration {} failed: {}", number, reason));

        self.monitor.stop_monitoring();
        self.fail_open_iteration(&reason);
        if let Err(e) = self.transition(LoopTransition::Fail(reason.clone())) {
            debug!("Fail transition skipped: {}", e);
        }

        if self.config.safety.rollback_on_failure {
            info!("Rolling back last deployment...");
            match self.deployer.rollback().await {
                Ok(r) if r.success => info!("Rollback succeeded"),
                Ok(r) => warn!("Rollback failed: {}", r.error.unwrap_or_default()),
                Err(e) => error!("Rollback failed: {}", e),
            }
        }

        self.result(false, None, Some(reason), started)
    }

    fn exhausted(&self, reason: String, started: Instant) -> LoopResult {
        self.announce(format!("Stopping: {}", reason));
        if let Err(e) = self.transition(LoopTransition::Fail(reason.clone())) {
            debug!("Fail transition skipped: {}", e);
        }
        let final_url = self.last_url();
        self.result(false, final_url, Some(reason), started)
    }

    fn stopped(&self, started: Instant) -> LoopResult {
        self.fail_open_iteration(STOPPED_REASON);
        let final_url = self.last_url();
        self.result(false, final_url, Some(STOPPED_REASON.to_string()), started)
    }

    fn result(
        &self,
        success: bool,
        final_url: Option<String>,
        reason: Option<String>,
        started: Instant,
    ) -> LoopResult {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        LoopResult {
            success,
            iterations: self.current_iteration.load(Ordering::SeqCst),
            errors_fixed: history.iter().map(|it| it.applied.len()).sum(),
            errors_remaining: history.last().map(|it| it.errors.len()).unwrap_or(0),
            total_duration: started.elapsed(),
            final_url,
            reason,
        }
    }

    fn last_url(&self) -> Option<String> {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .rev()
            .find_map(|it| it.deployment_url.clone())
    }

    /// Apply `update` to the in-flight iteration and publish the result
    fn record<F>(&self, update: F) -> Result<(), LoopError>
    where
        F: FnOnce(&mut Iteration) -> Result<(), LoopError>,
    {
        let snapshot = {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            let current = history
                .last_mut()
                .ok_or_else(|| LoopError::Internal("no iteration in progress".to_string()))?;
            update(current)?;
            current.clone()
        };
        self.events.publish(LoopEvent::IterationUpdated {
            iteration: Box::new(snapshot),
        });
        Ok(())
    }

    fn fail_open_iteration(&self, cause: &str) {
        let open = self
            .history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .is_some_and(|it| !it.is_finished());
        if open {
            if let Err(e) = self.record(|it| it.fail(cause)) {
                debug!("Could not close iteration: {}", e);
            }
        }
    }

    fn transition(&self, transition: LoopTransition) -> Result<(), LoopError> {
        let (from, to) = {
            let mut fsm = self.fsm.lock().unwrap_or_else(|e| e.into_inner());
            let from = fsm.state();
            fsm.process(transition)?;
            (from, fsm.state())
        };
        if from != to {
            debug!("Loop state {} -> {}", from, to);
            self.events.publish(LoopEvent::StateChanged { from, to });
        }
        Ok(())
    }

    fn announce(&self, message: String) {
        info!("{}", message);
        self.events.log(Level::INFO, message);
    }
}
