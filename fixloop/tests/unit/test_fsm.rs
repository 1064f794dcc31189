//! FSM unit tests

use fixloop::app::fsm::{LoopFsm, LoopState, LoopTransition};

fn run_to(fsm: &mut LoopFsm, transitions: &[LoopTransition]) {
    for t in transitions {
        fsm.process(t.clone()).unwrap();
    }
}

#[test]
fn test_fsm_initial_state() {
    let fsm = LoopFsm::new();
    assert_eq!(fsm.state(), LoopState::Idle);
    assert!(fsm.error().is_none());
    assert!(!fsm.is_paused());
}

#[test]
fn test_fsm_clean_flow() {
    let mut fsm = LoopFsm::new();

    // Idle -> Deploying -> Monitoring -> Completed
    fsm.process(LoopTransition::Deploy).unwrap();
    assert_eq!(fsm.state(), LoopState::Deploying);
    fsm.process(LoopTransition::Monitor).unwrap();
    assert_eq!(fsm.state(), LoopState::Monitoring);
    fsm.process(LoopTransition::Complete).unwrap();
    assert_eq!(fsm.state(), LoopState::Completed);
    assert!(fsm.state().is_terminal());
}

#[test]
fn test_fsm_fix_cycle_redeploys() {
    let mut fsm = LoopFsm::new();
    run_to(
        &mut fsm,
        &[
            LoopTransition::Deploy,
            LoopTransition::Monitor,
            LoopTransition::Analyze,
            LoopTransition::Fix,
        ],
    );
    assert_eq!(fsm.state(), LoopState::Fixing);

    // Fixing -> Deploying starts the next iteration
    fsm.process(LoopTransition::Deploy).unwrap();
    assert_eq!(fsm.state(), LoopState::Deploying);
}

#[test]
fn test_fsm_failure_records_cause() {
    let mut fsm = LoopFsm::new();
    fsm.process(LoopTransition::Deploy).unwrap();
    fsm.process(LoopTransition::Fail("push rejected".to_string()))
        .unwrap();

    assert_eq!(fsm.state(), LoopState::Failed);
    assert_eq!(fsm.error(), Some("push rejected"));
    assert!(fsm.process(LoopTransition::Deploy).is_err());
}

#[test]
fn test_fsm_pause_keeps_phase() {
    let mut fsm = LoopFsm::new();
    run_to(&mut fsm, &[LoopTransition::Deploy, LoopTransition::Monitor]);

    fsm.process(LoopTransition::Pause).unwrap();
    assert_eq!(fsm.state(), LoopState::Paused);
    assert_eq!(fsm.phase(), LoopState::Monitoring);

    // The in-flight iteration keeps moving while paused
    fsm.process(LoopTransition::Analyze).unwrap();
    assert_eq!(fsm.state(), LoopState::Paused);
    assert_eq!(fsm.phase(), LoopState::Analyzing);

    fsm.process(LoopTransition::Resume).unwrap();
    assert_eq!(fsm.state(), LoopState::Analyzing);
}

#[test]
fn test_fsm_double_pause_rejected() {
    let mut fsm = LoopFsm::new();
    fsm.process(LoopTransition::Deploy).unwrap();
    fsm.process(LoopTransition::Pause).unwrap();
    assert!(fsm.process(LoopTransition::Pause).is_err());

    fsm.process(LoopTransition::Resume).unwrap();
    assert!(fsm.process(LoopTransition::Resume).is_err());
}

#[test]
fn test_fsm_stop_from_paused() {
    let mut fsm = LoopFsm::new();
    run_to(&mut fsm, &[LoopTransition::Deploy, LoopTransition::Pause]);

    fsm.process(LoopTransition::Stop).unwrap();
    assert_eq!(fsm.state(), LoopState::Stopped);
    assert!(!fsm.is_paused());
    assert!(fsm.process(LoopTransition::Stop).is_err());
}

#[test]
fn test_fsm_invalid_transition() {
    let mut fsm = LoopFsm::new();

    // Can't monitor before deploying
    assert!(fsm.process(LoopTransition::Monitor).is_err());
    // Can't pause a finished loop
    run_to(
        &mut fsm,
        &[
            LoopTransition::Deploy,
            LoopTransition::Monitor,
            LoopTransition::Complete,
        ],
    );
    assert!(fsm.process(LoopTransition::Pause).is_err());
}

#[test]
fn test_fsm_reset() {
    let mut fsm = LoopFsm::new();
    fsm.process(LoopTransition::Deploy).unwrap();
    fsm.process(LoopTransition::Fail("boom".to_string())).unwrap();

    fsm.process(LoopTransition::Reset).unwrap();
    assert_eq!(fsm.state(), LoopState::Idle);
    assert!(fsm.error().is_none());
}
