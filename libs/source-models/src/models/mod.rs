//! Source payload models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Frame pushed over the live error stream websocket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamErrorFrame {
    #[serde(rename = "type", default = "default_frame_type")]
    pub frame_type: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub lineno: Option<u32>,
    #[serde(default)]
    pub colno: Option<u32>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

fn default_frame_type() -> String {
    "error".to_string()
}

/// Issue returned by the error-tracking API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerIssue {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub culprit: Option<String>,
    /// One of `fatal`, `error`, `warning`, `info`
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default = "default_count")]
    pub count: u64,
    #[serde(default)]
    pub first_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: TrackerIssueMetadata,
    #[serde(default)]
    pub stacktrace: Option<String>,
}

fn default_count() -> u64 {
    1
}

/// Location metadata attached to a tracker issue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerIssueMetadata {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub lineno: Option<u32>,
    #[serde(default)]
    pub colno: Option<u32>,
}

/// Session recorded by the session-replay API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySession {
    pub session_id: String,
    #[serde(default)]
    pub errors: Vec<ReplayError>,
}

/// Error captured inside a replay session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayError {
    pub id: String,
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    /// One of `fatal`, `error`, `warn`, `info`
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Error report posted to the generic push endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushReport {
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub column: Option<u32>,
    /// One of `low`, `medium`, `high`, `critical`
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// CI pipeline run status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CiRun {
    pub id: String,
    pub name: String,
    /// One of `queued`, `in_progress`, `completed`
    pub status: String,
    /// Set once `status` is `completed`
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub head_sha: Option<String>,
}

/// Line returned by the server-log endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// One of `fatal`, `error`, `warn`, `info`
    pub level: String,
    pub message: String,
    #[serde(default)]
    pub file: Option<String>,
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub stack: Option<String>,
}

/// Page of server-log lines
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogPage {
    #[serde(default)]
    pub entries: Vec<LogEntry>,
}
