//! Loop configuration

use std::path::PathBuf;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::LoopError;
use crate::models::levels::Severity;
use crate::monitor::sources::SourceConfig;

/// Immutable per-run configuration
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Run name, also used for backup branch names
    pub name: String,

    /// Deployment target
    pub deployment: DeploymentConfig,

    /// Error monitoring
    pub monitoring: MonitorConfig,

    /// Fix generation and application
    pub fix_generation: FixGenerationConfig,

    /// Safety budget
    pub safety: SafetyConfig,

    /// Delays and windows between steps
    pub timing: TimingConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            name: "fixloop".to_string(),
            deployment: DeploymentConfig::default(),
            monitoring: MonitorConfig::default(),
            fix_generation: FixGenerationConfig::default(),
            safety: SafetyConfig::default(),
            timing: TimingConfig::default(),
        }
    }
}

impl LoopConfig {
    /// Check the configuration before a run
    pub fn validate(&self) -> Result<(), LoopError> {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }
        if self.safety.max_iterations == 0 {
            errors.push("safety.max_iterations must be at least 1".to_string());
        }
        if self.safety.max_duration_minutes == 0 {
            errors.push("safety.max_duration_minutes must be at least 1".to_string());
        }
        if self.timing.monitor_window.is_zero() {
            errors.push("timing.monitor_window must be greater than zero".to_string());
        }
        if self.monitoring.sources.is_empty() {
            errors.push("monitoring.sources must list at least one source".to_string());
        }
        if self.monitoring.poll_interval.is_zero() {
            errors.push("monitoring.poll_interval must be greater than zero".to_string());
        }
        for pattern in &self.monitoring.ignore_patterns {
            if let Err(e) = Regex::new(pattern) {
                errors.push(format!("invalid ignore pattern {:?}: {}", pattern, e));
            }
        }
        for source in &self.monitoring.sources {
            if let Err(e) = source.validate() {
                errors.push(e);
            }
        }
        if self.fix_generation.max_fixes_per_iteration == 0 {
            errors.push("fix_generation.max_fixes_per_iteration must be at least 1".to_string());
        }
        if !(0.0..=1.0).contains(&self.fix_generation.min_confidence) {
            errors.push("fix_generation.min_confidence must be within [0, 1]".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(LoopError::ValidationError(errors.join("; ")))
        }
    }
}

/// Deployment target configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Target identifier, e.g. `preview`
    #[serde(default = "default_target")]
    pub target: String,

    /// Working tree to commit and push
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,

    /// Git remote the hosting provider builds from
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Branch deployed when no backup branch is requested
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Deployment URL with `{branch}` and `{commit}` placeholders
    #[serde(default)]
    pub url_template: String,
}

fn default_target() -> String {
    "preview".to_string()
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            repo_dir: default_repo_dir(),
            remote: default_remote(),
            branch: default_branch(),
            url_template: String::new(),
        }
    }
}

/// Monitoring configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Sources opened for every session
    pub sources: Vec<SourceConfig>,

    /// Interval between pulls of polling sources
    pub poll_interval: Duration,

    /// Errors ranked below this severity are dropped
    pub severity_threshold: Severity,

    /// Regular expressions matched against message and stack
    pub ignore_patterns: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            poll_interval: Duration::from_secs(10),
            severity_threshold: Severity::Low,
            ignore_patterns: Vec::new(),
        }
    }
}

/// Fix generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixGenerationConfig {
    /// Generator backend, `rules` is built in
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Model for model-backed providers. `rules` rejects one.
    #[serde(default)]
    pub model: Option<String>,

    /// Apply fixes without waiting for approval
    #[serde(default)]
    pub auto_apply: bool,

    /// Upper bound of suggestions per iteration
    #[serde(default = "default_max_fixes")]
    pub max_fixes_per_iteration: usize,

    /// Directory the file-queue applicator writes to
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,

    /// Suggestions below this confidence are rejected by the applicator
    #[serde(default)]
    pub min_confidence: f64,
}

fn default_provider() -> String {
    "rules".to_string()
}

fn default_max_fixes() -> usize {
    5
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from(".fixloop/queue")
}

impl Default for FixGenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            auto_apply: false,
            max_fixes_per_iteration: default_max_fixes(),
            queue_dir: default_queue_dir(),
            min_confidence: 0.0,
        }
    }
}

/// Safety budget
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Hard cap on iterations
    pub max_iterations: u32,

    /// Hard cap on wall-clock run time
    pub max_duration_minutes: u64,

    /// Deploy each iteration from its own branch
    pub create_backup_branch: bool,

    /// Roll back the last deployment after a fatal error
    pub rollback_on_failure: bool,
}

impl SafetyConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_minutes * 60)
    }
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_iterations: 5,
            max_duration_minutes: 30,
            create_backup_branch: true,
            rollback_on_failure: false,
        }
    }
}

/// Delays between loop steps
#[derive(Debug, Clone)]
pub struct TimingConfig {
    /// Upper bound of the wait for a deployment to go live
    pub propagation_delay: Duration,

    /// How long each monitoring session observes the target
    pub monitor_window: Duration,

    /// Interval between deployment status checks
    pub status_poll_interval: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            propagation_delay: Duration::from_secs(30),
            monitor_window: Duration::from_secs(60),
            status_poll_interval: Duration::from_secs(5),
        }
    }
}
