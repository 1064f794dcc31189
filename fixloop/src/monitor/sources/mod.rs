//! Error sources

pub mod ci;
pub mod events;
pub mod poll;
pub mod push;
pub mod replay;
pub mod server_log;
pub mod stream;
pub mod tracker;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::errors::LoopError;
use crate::http::client::HttpClient;
use crate::monitor::session::SessionSink;
use crate::monitor::sources::ci::CiFetch;
use crate::monitor::sources::poll::PollingSource;
use crate::monitor::sources::push::PushSource;
use crate::monitor::sources::replay::ReplayFetch;
use crate::monitor::sources::server_log::ServerLogFetch;
use crate::monitor::sources::stream::StreamSource;
use crate::monitor::sources::tracker::TrackerFetch;

/// Kind of observability backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Live websocket error stream
    Stream,
    /// Error-tracking poll API
    Tracker,
    /// Session-replay API
    Replay,
    /// Local HTTP receiver
    Push,
    /// CI pipeline status
    Ci,
    /// Server log poller
    ServerLog,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Stream => "stream",
            SourceKind::Tracker => "tracker",
            SourceKind::Replay => "replay",
            SourceKind::Push => "push",
            SourceKind::Ci => "ci",
            SourceKind::ServerLog => "server_log",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration of one source, tagged by `kind`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceConfig {
    Stream {
        /// Explicit websocket URL, derived from the deployment URL when unset
        #[serde(default)]
        url: Option<String>,
        #[serde(default = "default_stream_path")]
        path: String,
    },
    Tracker {
        api_url: String,
        project: String,
        #[serde(default)]
        token: Option<String>,
    },
    Replay {
        api_url: String,
        app_id: String,
        #[serde(default)]
        token: Option<String>,
    },
    Push {
        #[serde(default = "default_push_bind")]
        bind: String,
    },
    Ci {
        status_url: String,
        #[serde(default)]
        token: Option<String>,
    },
    ServerLog {
        logs_url: String,
        #[serde(default)]
        token: Option<String>,
    },
}

fn default_stream_path() -> String {
    "/__errors".to_string()
}

fn default_push_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn check_url(field: &str, value: &str) -> Result<(), String> {
    match url::Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "ws" | "wss") => Ok(()),
        Ok(url) => Err(format!("{} has unsupported scheme {}", field, url.scheme())),
        Err(e) => Err(format!("{} is not a valid URL ({}): {}", field, e, value)),
    }
}

impl SourceConfig {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceConfig::Stream { .. } => SourceKind::Stream,
            SourceConfig::Tracker { .. } => SourceKind::Tracker,
            SourceConfig::Replay { .. } => SourceKind::Replay,
            SourceConfig::Push { .. } => SourceKind::Push,
            SourceConfig::Ci { .. } => SourceKind::Ci,
            SourceConfig::ServerLog { .. } => SourceKind::ServerLog,
        }
    }

    /// Check endpoint fields
    pub fn validate(&self) -> Result<(), String> {
        match self {
            SourceConfig::Stream { url, .. } => match url {
                Some(url) => check_url("stream.url", url),
                None => Ok(()),
            },
            SourceConfig::Tracker { api_url, project, .. } => {
                if project.is_empty() {
                    return Err("tracker.project must not be empty".to_string());
                }
                check_url("tracker.api_url", api_url)
            }
            SourceConfig::Replay { api_url, app_id, .. } => {
                if app_id.is_empty() {
                    return Err("replay.app_id must not be empty".to_string());
                }
                check_url("replay.api_url", api_url)
            }
            SourceConfig::Push { bind } => bind
                .parse::<std::net::SocketAddr>()
                .map(|_| ())
                .map_err(|e| format!("push.bind is not a socket address ({}): {}", e, bind)),
            SourceConfig::Ci { status_url, .. } => check_url("ci.status_url", status_url),
            SourceConfig::ServerLog { logs_url, .. } => check_url("server_log.logs_url", logs_url),
        }
    }
}

/// A backend that reports errors for a deployment URL
#[async_trait]
pub trait ErrorSource: Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Feed `sink` until `cancel` fires. An error marks the source degraded
    /// for the session.
    async fn run(
        &self,
        url: String,
        sink: SessionSink,
        cancel: CancellationToken,
    ) -> Result<(), LoopError>;
}

/// Build the configured sources
pub fn build_sources(
    configs: &[SourceConfig],
    poll_interval: Duration,
    http: Arc<HttpClient>,
) -> Vec<Arc<dyn ErrorSource>> {
    configs
        .iter()
        .map(|config| -> Arc<dyn ErrorSource> {
            match config.clone() {
                SourceConfig::Stream { url, path } => Arc::new(StreamSource::new(url, path)),
                SourceConfig::Tracker {
                    api_url,
                    project,
                    token,
                } => Arc::new(PollingSource::new(
                    SourceKind::Tracker,
                    poll_interval,
                    TrackerFetch::new(http.clone(), api_url, project, token),
                )),
                SourceConfig::Replay {
                    api_url,
                    app_id,
                    token,
                } => Arc::new(PollingSource::new(
                    SourceKind::Replay,
                    poll_interval,
                    ReplayFetch::new(http.clone(), api_url, app_id, token),
                )),
                SourceConfig::Push { bind } => Arc::new(PushSource::new(bind)),
                SourceConfig::Ci { status_url, token } => Arc::new(PollingSource::new(
                    SourceKind::Ci,
                    poll_interval,
                    CiFetch::new(http.clone(), status_url, token),
                )),
                SourceConfig::ServerLog { logs_url, token } => Arc::new(PollingSource::new(
                    SourceKind::ServerLog,
                    poll_interval,
                    ServerLogFetch::new(http.clone(), logs_url, token),
                )),
            }
        })
        .collect()
}
