//! Settings file management

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::options::{
    DeploymentConfig, FixGenerationConfig, LoopConfig, MonitorConfig, SafetyConfig, TimingConfig,
};
use crate::logs::{LogLevel, LogOptions};
use crate::models::levels::Severity;
use crate::monitor::sources::SourceConfig;

/// Contents of `fixloop.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit logs as JSON
    #[serde(default)]
    pub log_json: bool,

    /// Directory for rolling log files, stdout only when unset
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Run name
    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default)]
    pub deployment: DeploymentConfig,

    #[serde(default)]
    pub monitoring: MonitoringSettings,

    #[serde(default)]
    pub fix_generation: FixGenerationConfig,

    #[serde(default)]
    pub safety: SafetySettings,

    #[serde(default)]
    pub timing: TimingSettings,
}

fn default_name() -> String {
    "fixloop".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            log_dir: None,
            name: default_name(),
            deployment: DeploymentConfig::default(),
            monitoring: MonitoringSettings::default(),
            fix_generation: FixGenerationConfig::default(),
            safety: SafetySettings::default(),
            timing: TimingSettings::default(),
        }
    }
}

impl Settings {
    /// Runtime loop configuration
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            name: self.name.clone(),
            deployment: self.deployment.clone(),
            monitoring: MonitorConfig {
                sources: self.monitoring.sources.clone(),
                poll_interval: Duration::from_secs(self.monitoring.poll_interval_secs),
                severity_threshold: self.monitoring.severity_threshold,
                ignore_patterns: self.monitoring.ignore_patterns.clone(),
            },
            fix_generation: self.fix_generation.clone(),
            safety: SafetyConfig {
                max_iterations: self.safety.max_iterations,
                max_duration_minutes: self.safety.max_duration_minutes,
                create_backup_branch: self.safety.create_backup_branch,
                rollback_on_failure: self.safety.rollback_on_failure,
            },
            timing: TimingConfig {
                propagation_delay: Duration::from_secs(self.timing.propagation_delay_secs),
                monitor_window: Duration::from_secs(self.timing.monitor_window_secs),
                status_poll_interval: Duration::from_secs(self.timing.status_poll_interval_secs),
            },
        }
    }

    pub fn log_options(&self) -> LogOptions {
        LogOptions {
            log_level: self.log_level,
            json_format: self.log_json,
            log_dir: self.log_dir.clone(),
            ..Default::default()
        }
    }
}

/// Monitoring settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringSettings {
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_severity_threshold")]
    pub severity_threshold: Severity,

    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

fn default_poll_interval() -> u64 {
    10
}

fn default_severity_threshold() -> Severity {
    Severity::Low
}

impl Default for MonitoringSettings {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            poll_interval_secs: default_poll_interval(),
            severity_threshold: default_severity_threshold(),
            ignore_patterns: Vec::new(),
        }
    }
}

/// Safety budget settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetySettings {
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default = "default_max_duration_minutes")]
    pub max_duration_minutes: u64,

    #[serde(default = "default_true")]
    pub create_backup_branch: bool,

    #[serde(default)]
    pub rollback_on_failure: bool,
}

fn default_max_iterations() -> u32 {
    5
}

fn default_max_duration_minutes() -> u64 {
    30
}

impl Default for SafetySettings {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            max_duration_minutes: default_max_duration_minutes(),
            create_backup_branch: true,
            rollback_on_failure: false,
        }
    }
}

/// Timing settings, all in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    #[serde(default = "default_propagation_delay")]
    pub propagation_delay_secs: u64,

    #[serde(default = "default_monitor_window")]
    pub monitor_window_secs: u64,

    #[serde(default = "default_status_poll_interval")]
    pub status_poll_interval_secs: u64,
}

fn default_propagation_delay() -> u64 {
    30
}

fn default_monitor_window() -> u64 {
    60
}

fn default_status_poll_interval() -> u64 {
    5
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            propagation_delay_secs: default_propagation_delay(),
            monitor_window_secs: default_monitor_window(),
            status_poll_interval_secs: default_status_poll_interval(),
        }
    }
}
