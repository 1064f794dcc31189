//! Loop result

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal result of `Orchestrator::start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopResult {
    pub success: bool,
    /// Number of iterations run
    pub iterations: u32,
    /// Fixes applied across all iterations
    pub errors_fixed: usize,
    /// Errors observed in the latest iteration
    pub errors_remaining: usize,
    pub total_duration: Duration,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl LoopResult {
    /// Result returned when `start` is called on a running loop
    pub fn already_running() -> Self {
        Self {
            success: false,
            iterations: 0,
            errors_fixed: 0,
            errors_remaining: 0,
            total_duration: Duration::ZERO,
            final_url: None,
            reason: Some("Fix loop is already running".to_string()),
        }
    }
}
