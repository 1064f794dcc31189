//! Iteration records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::LoopError;
use crate::models::error::NormalizedError;
use crate::models::fix::FixSuggestion;

/// Outcome tag of an iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IterationOutcome {
    /// Target was clean, the loop is done
    Completed,
    /// A fatal error ended the iteration
    Failed,
    /// Fixes were applied, another pass follows
    Running,
}

/// One deploy, monitor, fix pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Iteration {
    pub number: u32,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub errors: Vec<NormalizedError>,
    pub fixes: Vec<FixSuggestion>,
    pub applied: Vec<FixSuggestion>,
    pub rejected: Vec<FixSuggestion>,
    pub outcome: IterationOutcome,
    /// Cause of a failed outcome
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl Iteration {
    /// Start a new iteration
    pub fn new(number: u32) -> Self {
        Self {
            number,
            started_at: Utc::now(),
            completed_at: None,
            commit_hash: None,
            deployment_url: None,
            branch: None,
            errors: Vec::new(),
            fixes: Vec::new(),
            applied: Vec::new(),
            rejected: Vec::new(),
            outcome: IterationOutcome::Running,
            failure: None,
        }
    }

    /// Whether the outcome has been set
    pub fn is_finished(&self) -> bool {
        self.completed_at.is_some()
    }

    fn ensure_open(&self) -> Result<(), LoopError> {
        if self.is_finished() {
            return Err(LoopError::InvalidTransition(format!(
                "iteration {} is already {:?}",
                self.number, self.outcome
            )));
        }
        Ok(())
    }

    pub fn record_deployment(
        &mut self,
        url: &str,
        commit_hash: Option<String>,
        branch: Option<String>,
    ) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.deployment_url = Some(url.to_string());
        self.commit_hash = commit_hash;
        self.branch = branch;
        Ok(())
    }

    pub fn record_errors(&mut self, errors: Vec<NormalizedError>) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.errors = errors;
        Ok(())
    }

    pub fn record_fixes(&mut self, fixes: Vec<FixSuggestion>) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.fixes = fixes;
        Ok(())
    }

    pub fn record_applied(&mut self, fix: FixSuggestion) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.sync_generated(&fix);
        self.applied.push(fix);
        Ok(())
    }

    pub fn record_rejected(&mut self, fix: FixSuggestion) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.sync_generated(&fix);
        self.rejected.push(fix);
        Ok(())
    }

    // Keep the generated list's status in step with the apply result
    fn sync_generated(&mut self, fix: &FixSuggestion) {
        if let Some(generated) = self.fixes.iter_mut().find(|f| f.id == fix.id) {
            generated.status = fix.status;
        }
    }

    /// Set the outcome. The iteration is immutable afterwards.
    pub fn finish(&mut self, outcome: IterationOutcome) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.outcome = outcome;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Finish as failed, keeping the cause
    pub fn fail(&mut self, cause: impl Into<String>) -> Result<(), LoopError> {
        self.ensure_open()?;
        self.failure = Some(cause.into());
        self.finish(IterationOutcome::Failed)
    }

    /// Wall-clock duration, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_at.map(|end| end - self.started_at)
    }
}
