//! Deployment module
//!
//! The loop drives any target through the [`Deployer`] trait. The bundled
//! [`git::GitDeployer`] commits and pushes a working tree and derives the
//! preview URL from a template.

pub mod git;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::LoopError;

/// Options of a single deployment
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Commit message recorded for the deployed change
    pub commit_message: String,

    /// Deploy from a dedicated branch
    pub create_branch: bool,

    /// Name of that branch
    pub branch_name: Option<String>,
}

/// Result of a deployment request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeployResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
}

impl DeployResult {
    /// A failed deployment carrying its cause
    pub fn failed(error: impl Into<String>, logs: Vec<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            logs,
            ..Default::default()
        }
    }
}

/// Lifecycle of a deployment on the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentPhase {
    Pending,
    Building,
    Deploying,
    Success,
    Failed,
}

impl DeploymentPhase {
    /// Whether the deployment reached an end state
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentPhase::Success | DeploymentPhase::Failed)
    }
}

/// Status of a deployment URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentStatus {
    pub status: DeploymentPhase,
    pub url: String,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of a rollback request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollbackResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Outcome of configuration validation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigValidation {
    pub valid: bool,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Deploys the current state of the code to a reachable URL
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Deploy and return the URL once the target accepted the change
    async fn deploy(&self, options: DeployOptions) -> Result<DeployResult, LoopError>;

    /// Report the status of a deployment URL
    async fn check_status(&self, url: &str) -> Result<DeploymentStatus, LoopError>;

    /// Undo the most recent deployment
    async fn rollback(&self) -> Result<RollbackResult, LoopError>;

    /// Validate the deployer configuration
    async fn validate_config(&self) -> Result<ConfigValidation, LoopError>;
}
