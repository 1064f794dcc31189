//! Fix application

pub mod queue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::LoopError;
use crate::models::fix::FixSuggestion;

/// Result of one apply attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "reason", rename_all = "lowercase")]
pub enum ApplyOutcome {
    Applied,
    Rejected(String),
}

/// Commits a suggestion to the code base
#[async_trait]
pub trait FixApplicator: Send + Sync {
    async fn apply(&self, fix: &FixSuggestion) -> Result<ApplyOutcome, LoopError>;

    /// Hand a suggestion over for external approval
    async fn submit_for_approval(&self, _fix: &FixSuggestion) -> Result<(), LoopError> {
        Ok(())
    }
}
