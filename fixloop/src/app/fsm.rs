//! Finite state machine for the fix loop

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::LoopError;

/// Loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopState {
    /// Not started
    Idle,

    /// Publishing a build
    Deploying,

    /// Observing the deployment for errors
    Monitoring,

    /// Generating fixes
    Analyzing,

    /// Applying fixes
    Fixing,

    /// Target is error-free
    Completed,

    /// Budget exhausted or fatal error
    Failed,

    /// Suspended at the iteration boundary
    Paused,

    /// Stopped by the operator
    Stopped,
}

impl LoopState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoopState::Completed | LoopState::Failed | LoopState::Stopped
        )
    }
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoopState::Idle => "idle",
            LoopState::Deploying => "deploying",
            LoopState::Monitoring => "monitoring",
            LoopState::Analyzing => "analyzing",
            LoopState::Fixing => "fixing",
            LoopState::Completed => "completed",
            LoopState::Failed => "failed",
            LoopState::Paused => "paused",
            LoopState::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

/// Input to the loop FSM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopTransition {
    /// Start a deployment
    Deploy,

    /// Deployment is live, start observing
    Monitor,

    /// Errors were observed
    Analyze,

    /// Suggestions are ready
    Fix,

    /// No errors observed
    Complete,

    /// Fatal error or exhausted budget
    Fail(String),

    /// Operator stop
    Stop,

    /// Suspend at the next boundary
    Pause,

    /// Lift a pause
    Resume,

    /// Back to idle for a new run
    Reset,
}

/// Loop FSM
///
/// Pausing is tracked beside the phase so the in-flight iteration keeps
/// moving while [`LoopFsm::state`] reports `Paused`.
#[derive(Debug, Clone)]
pub struct LoopFsm {
    phase: LoopState,
    paused: bool,
    error: Option<String>,
}

impl LoopFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            phase: LoopState::Idle,
            paused: false,
            error: None,
        }
    }

    /// Current observable state
    pub fn state(&self) -> LoopState {
        if self.paused && !self.phase.is_terminal() {
            LoopState::Paused
        } else {
            self.phase
        }
    }

    /// Step the loop is in, ignoring a pause
    pub fn phase(&self) -> LoopState {
        self.phase
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Cause of the last failure
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process a transition
    pub fn process(&mut self, transition: LoopTransition) -> Result<(), LoopError> {
        let next = match (self.phase, &transition) {
            (LoopState::Idle | LoopState::Fixing, LoopTransition::Deploy) => LoopState::Deploying,
            (LoopState::Deploying, LoopTransition::Monitor) => LoopState::Monitoring,
            (LoopState::Monitoring, LoopTransition::Complete) => LoopState::Completed,
            (LoopState::Monitoring, LoopTransition::Analyze) => LoopState::Analyzing,
            (LoopState::Analyzing, LoopTransition::Fix) => LoopState::Fixing,

            (phase, LoopTransition::Pause) if !phase.is_terminal() && !self.paused => {
                self.paused = true;
                phase
            }
            (phase, LoopTransition::Resume) if self.paused => {
                self.paused = false;
                phase
            }

            (phase, LoopTransition::Fail(err)) if !phase.is_terminal() => {
                self.error = Some(err.clone());
                self.paused = false;
                LoopState::Failed
            }
            (phase, LoopTransition::Stop) if !phase.is_terminal() => {
                self.paused = false;
                LoopState::Stopped
            }
            (_, LoopTransition::Reset) => {
                self.error = None;
                self.paused = false;
                LoopState::Idle
            }

            (phase, transition) => {
                return Err(LoopError::InvalidTransition(format!(
                    "{} -> {:?}",
                    phase, transition
                )));
            }
        };

        self.phase = next;
        Ok(())
    }
}

impl Default for LoopFsm {
    fn default() -> Self {
        Self::new()
    }
}
