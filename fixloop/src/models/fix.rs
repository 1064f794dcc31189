//! Fix suggestions

use serde::{Deserialize, Serialize};

use crate::errors::LoopError;
use crate::models::levels::{Impact, Priority};

/// Kind of remediation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FixKind {
    CodeChange,
    DependencyUpdate,
}

/// Apply status of a suggestion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FixStatus {
    Pending,
    Applied,
    Rejected,
    Failed,
}

/// Before/after sketch of the change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeSketch {
    pub before: String,
    pub after: String,
}

/// A proposed remediation for one error group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixSuggestion {
    pub id: String,
    /// Id of the representative error this fix addresses
    pub error_id: String,
    pub kind: FixKind,
    pub priority: Priority,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    pub impact: Impact,
    /// Classification label, e.g. `null-reference`
    pub category: String,
    /// File the fix targets
    pub file: String,
    pub explanation: String,
    pub reasoning: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sketch: Option<CodeSketch>,
    pub status: FixStatus,
}

impl FixSuggestion {
    /// Record the outcome of an apply attempt. Allowed once, from `Pending`.
    pub fn resolve(&mut self, status: FixStatus) -> Result<(), LoopError> {
        if self.status != FixStatus::Pending {
            return Err(LoopError::InvalidTransition(format!(
                "fix {} already {:?}",
                self.id, self.status
            )));
        }
        if status == FixStatus::Pending {
            return Err(LoopError::InvalidTransition(format!(
                "fix {} cannot be resolved to pending",
                self.id
            )));
        }
        self.status = status;
        Ok(())
    }
}
