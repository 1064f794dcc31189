//! Orchestrator tests, driven on a paused clock

use std::sync::Arc;
use std::time::Duration;

use fixloop::app::events::LoopEvent;
use fixloop::app::fsm::LoopState;
use fixloop::models::fix::FixStatus;
use fixloop::models::iteration::IterationOutcome;
use fixloop::models::levels::Severity;
use fixloop::monitor::sources::ErrorSource;

use crate::support::{
    config, error, harness, BrokenSource, FakeDeployer, RecordingApplicator, ScriptedSource,
};

fn sources(source: ScriptedSource) -> Vec<Arc<dyn ErrorSource>> {
    vec![Arc::new(source)]
}

fn crash() -> Vec<fixloop::models::error::NormalizedError> {
    vec![error(
        "TypeError: Cannot read properties of undefined (reading 'map')",
        "src/cart.js",
        42,
        Severity::Critical,
    )]
}

#[tokio::test(start_paused = true)]
async fn test_clean_deployment_finishes_after_one_iteration() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::clean()),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert!(result.success);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.errors_fixed, 0);
    assert_eq!(result.errors_remaining, 0);
    assert_eq!(result.final_url.as_deref(), Some("https://preview.example.com/1"));
    assert!(result.reason.is_none());

    let history = h.orchestrator.iterations();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, IterationOutcome::Completed);
    assert_eq!(history[0].commit_hash.as_deref(), Some("commit-1"));

    let state = h.orchestrator.get_state();
    assert_eq!(state.state, LoopState::Completed);
    assert!(!state.running);
    assert!(!h.monitor.is_active());
}

#[tokio::test(start_paused = true)]
async fn test_fixes_converge_to_clean() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::new(vec![crash(), Vec::new()])),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert!(result.success);
    assert_eq!(result.iterations, 2);
    assert_eq!(result.errors_fixed, 1);
    assert_eq!(result.errors_remaining, 0);
    assert_eq!(result.final_url.as_deref(), Some("https://preview.example.com/2"));

    let history = h.orchestrator.iterations();
    assert_eq!(history[0].outcome, IterationOutcome::Running);
    assert!(history[0].is_finished());
    assert_eq!(history[0].applied.len(), 1);
    assert_eq!(history[0].applied[0].status, FixStatus::Applied);
    assert_eq!(history[1].outcome, IterationOutcome::Completed);

    let stats = h.orchestrator.stats();
    assert_eq!(stats.total_iterations, 2);
    assert_eq!(stats.total_fixes_applied, 1);
    assert_eq!(stats.errors_remaining, 0);
}

#[tokio::test(start_paused = true)]
async fn test_max_iterations_exhausted() {
    let h = harness(
        config(3, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert!(!result.success);
    assert_eq!(result.iterations, 3);
    assert_eq!(h.deployer.deploy_count(), 3);
    assert_eq!(result.reason.as_deref(), Some("Reached max iterations (3)"));
    assert_eq!(result.final_url.as_deref(), Some("https://preview.example.com/3"));

    let history = h.orchestrator.iterations();
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|it| it.outcome == IterationOutcome::Running));
    assert_eq!(h.orchestrator.get_state().state, LoopState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_single_iteration_with_critical_error() {
    let h = harness(
        config(1, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert!(!result.success);
    assert_eq!(result.iterations, 1);
    assert_eq!(result.errors_fixed, 1);
    assert_eq!(result.errors_remaining, 1);

    let history = h.orchestrator.iterations();
    assert_eq!(history[0].errors[0].severity, Severity::Critical);
    assert_eq!(history[0].fixes[0].category, "undefined-reference");
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_start_rejected() {
    let h = harness(
        config(5, true),
        FakeDeployer::slow(Duration::from_secs(10)),
        sources(ScriptedSource::clean()),
        RecordingApplicator::default(),
    );

    let first = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    while !h.orchestrator.is_running() {
        tokio::task::yield_now().await;
    }

    let second = h.orchestrator.start().await;
    assert!(!second.success);
    assert_eq!(second.iterations, 0);
    assert!(second.reason.unwrap().contains("already running"));

    // The first run is unaffected
    let first = first.await.unwrap();
    assert!(first.success);
    assert_eq!(h.deployer.deploy_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_abandons_iteration() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let task = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    // Inside the first monitor window
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.orchestrator.stop();

    let result = task.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.reason.as_deref(), Some("Stopped by user"));
    assert_eq!(result.iterations, 1);

    let history = h.orchestrator.iterations();
    assert_eq!(history[0].outcome, IterationOutcome::Failed);
    assert_eq!(history[0].failure.as_deref(), Some("Stopped by user"));
    assert_eq!(h.orchestrator.get_state().state, LoopState::Stopped);
    assert!(!h.orchestrator.is_running());
    assert!(!h.monitor.is_active());

    // Stopping twice is harmless
    h.orchestrator.stop();
}

#[tokio::test(start_paused = true)]
async fn test_pause_waits_at_iteration_boundary() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let task = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.orchestrator.pause();
    assert!(h.orchestrator.is_paused());
    assert_eq!(h.orchestrator.get_state().state, LoopState::Paused);

    // The in-flight iteration completes, no new one starts
    tokio::time::sleep(Duration::from_secs(3600)).await;
    let history = h.orchestrator.iterations();
    assert_eq!(history.len(), 1);
    assert!(history[0].is_finished());
    assert_eq!(h.deployer.deploy_count(), 1);
    assert!(h.orchestrator.is_running());

    // The hour spent paused counts against the duration budget
    h.orchestrator.resume();
    let result = task.await.unwrap();
    assert!(!result.success);
    assert_eq!(result.iterations, 1);
    assert_eq!(
        result.reason.as_deref(),
        Some("Exceeded max duration (30 minutes)")
    );
}

#[tokio::test(start_paused = true)]
async fn test_resume_continues_iterations() {
    let h = harness(
        config(2, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let task = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.orchestrator.pause();
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(h.deployer.deploy_count(), 1);

    h.orchestrator.resume();
    assert!(!h.orchestrator.is_paused());
    let result = task.await.unwrap();
    assert_eq!(result.iterations, 2);
    assert_eq!(h.deployer.deploy_count(), 2);
    assert_eq!(result.reason.as_deref(), Some("Reached max iterations (2)"));
}

#[tokio::test(start_paused = true)]
async fn test_stop_while_paused() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let task = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.orchestrator.pause();
    tokio::time::sleep(Duration::from_secs(120)).await;
    h.orchestrator.stop();

    let result = task.await.unwrap();
    assert_eq!(result.reason.as_deref(), Some("Stopped by user"));
    // The paused iteration had already finished
    assert_eq!(
        h.orchestrator.iterations()[0].outcome,
        IterationOutcome::Running
    );
    assert_eq!(h.orchestrator.get_state().state, LoopState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_failure_is_fatal() {
    let h = harness(
        config(5, true),
        FakeDeployer::failing_on(1),
        sources(ScriptedSource::clean()),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert!(!result.success);
    assert_eq!(result.iterations, 1);
    assert!(result.reason.unwrap().contains("push rejected"));
    assert!(result.final_url.is_none());

    let history = h.orchestrator.iterations();
    assert_eq!(history[0].outcome, IterationOutcome::Failed);
    assert_eq!(h.orchestrator.get_state().state, LoopState::Failed);
    assert_eq!(h.deployer.rollbacks.load(std::sync::atomic::Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_deploy_failure_rolls_back_when_enabled() {
    let mut cfg = config(5, true);
    cfg.safety.rollback_on_failure = true;
    let h = harness(
        cfg,
        FakeDeployer::failing_on(2),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert!(!result.success);
    assert_eq!(result.iterations, 2);
    // Fixes applied before the failure still count
    assert_eq!(result.errors_fixed, 1);
    assert_eq!(h.deployer.rollbacks.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_fixes_are_recorded() {
    let h = harness(
        config(1, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::rejecting(),
    );

    let result = h.orchestrator.start().await;

    assert_eq!(result.errors_fixed, 0);
    let history = h.orchestrator.iterations();
    assert!(history[0].applied.is_empty());
    assert_eq!(history[0].rejected.len(), 1);
    assert_eq!(history[0].rejected[0].status, FixStatus::Rejected);
}

#[tokio::test(start_paused = true)]
async fn test_failed_apply_does_not_end_loop() {
    let h = harness(
        config(2, true),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::failing(),
    );

    let result = h.orchestrator.start().await;

    assert_eq!(result.iterations, 2);
    assert_eq!(result.reason.as_deref(), Some("Reached max iterations (2)"));
    let history = h.orchestrator.iterations();
    assert_eq!(history[0].rejected[0].status, FixStatus::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_fixes_wait_for_approval_without_auto_apply() {
    let h = harness(
        config(1, false),
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    assert_eq!(result.errors_fixed, 0);
    let history = h.orchestrator.iterations();
    let fix_ids: Vec<String> = history[0].fixes.iter().map(|f| f.id.clone()).collect();
    assert_eq!(*h.applicator.submitted.lock().unwrap(), fix_ids);
    assert!(h.applicator.applied.lock().unwrap().is_empty());
    assert!(history[0].fixes.iter().all(|f| f.status == FixStatus::Pending));
}

#[tokio::test(start_paused = true)]
async fn test_backup_branch_per_iteration() {
    let mut cfg = config(2, true);
    cfg.safety.create_backup_branch = true;
    let h = harness(
        cfg,
        FakeDeployer::default(),
        sources(ScriptedSource::repeating(crash())),
        RecordingApplicator::default(),
    );

    h.orchestrator.start().await;

    let options = h.deployer.options.lock().unwrap().clone();
    assert_eq!(options.len(), 2);
    assert!(options[0].create_branch);
    assert_eq!(options[0].branch_name.as_deref(), Some("test-iteration-1"));
    assert_eq!(options[1].branch_name.as_deref(), Some("test-iteration-2"));
    assert_eq!(options[1].commit_message, "fixloop: iteration 2");

    let history = h.orchestrator.iterations();
    assert_eq!(history[1].branch.as_deref(), Some("test-iteration-2"));
}

#[tokio::test(start_paused = true)]
async fn test_degraded_source_surfaces_in_stats() {
    let sources: Vec<Arc<dyn ErrorSource>> =
        vec![Arc::new(BrokenSource), Arc::new(ScriptedSource::clean())];
    let h = harness(
        config(3, true),
        FakeDeployer::default(),
        sources,
        RecordingApplicator::default(),
    );

    let result = h.orchestrator.start().await;

    // One source failing does not fail the session
    assert!(result.success);
    assert_eq!(h.orchestrator.stats().degraded_sources, vec!["broken".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_events_published() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::clean()),
        RecordingApplicator::default(),
    );
    let mut rx = h.orchestrator.subscribe();

    h.orchestrator.start().await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    assert!(events
        .iter()
        .any(|e| matches!(e, LoopEvent::IterationStarted { number: 1 })));
    assert!(events.iter().any(|e| matches!(
        e,
        LoopEvent::StateChanged {
            to: LoopState::Monitoring,
            ..
        }
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, LoopEvent::Log { .. })));
    assert!(matches!(
        events.last(),
        Some(LoopEvent::Finished { result }) if result.success
    ));
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_finish() {
    let h = harness(
        config(5, true),
        FakeDeployer::default(),
        sources(ScriptedSource::clean()),
        RecordingApplicator::default(),
    );

    assert!(h.orchestrator.start().await.success);
    let second = h.orchestrator.start().await;

    // History is per run
    assert!(second.success);
    assert_eq!(second.iterations, 1);
    assert_eq!(h.orchestrator.iterations().len(), 1);
    assert_eq!(h.deployer.deploy_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_start_rejected_while_stop_unwinds() {
    let h = harness(
        config(5, true),
        FakeDeployer::slow(Duration::from_secs(10)),
        sources(ScriptedSource::clean()),
        RecordingApplicator::default(),
    );

    let first = {
        let orchestrator = h.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start().await })
    };
    // Mid-deploy
    tokio::time::sleep(Duration::from_secs(1)).await;
    h.orchestrator.stop();

    // The first run has not returned yet, so the guard still holds
    assert!(h.orchestrator.is_running());
    assert!(h.orchestrator.is_stopping());
    let second = h.orchestrator.start().await;
    assert!(!second.success);
    assert_eq!(second.iterations, 0);
    assert!(second.reason.unwrap().contains("already running"));

    let first = first.await.unwrap();
    assert_eq!(first.reason.as_deref(), Some("Stopped by user"));
    let history = h.orchestrator.iterations();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].outcome, IterationOutcome::Failed);
    assert_eq!(history[0].failure.as_deref(), Some("Stopped by user"));
    assert_eq!(h.deployer.deploy_count(), 1);
    assert!(!h.orchestrator.is_running());
    assert!(!h.orchestrator.is_stopping());

    // Once unwound, a new run starts cleanly
    let third = h.orchestrator.start().await;
    assert!(third.success);
    assert_eq!(third.iterations, 1);
    assert_eq!(h.deployer.deploy_count(), 2);
    assert_eq!(h.orchestrator.get_state().state, LoopState::Completed);
}
