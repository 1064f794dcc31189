//! Session-replay API poller

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::LoopError;
use crate::http::client::HttpClient;
use crate::monitor::sources::events::RawEvent;
use crate::monitor::sources::poll::{PollFetch, Polled};

pub struct ReplayFetch {
    http: Arc<HttpClient>,
    api_url: String,
    app_id: String,
    token: Option<String>,
}

impl ReplayFetch {
    pub fn new(http: Arc<HttpClient>, api_url: String, app_id: String, token: Option<String>) -> Self {
        Self {
            http,
            api_url,
            app_id,
            token,
        }
    }
}

#[async_trait]
impl PollFetch for ReplayFetch {
    async fn fetch(&self, url: &str, _since: DateTime<Utc>) -> Result<Vec<Polled>, LoopError> {
        let sessions = self
            .http
            .list_replay_sessions(&self.api_url, &self.app_id, self.token.as_deref(), url)
            .await?;

        // Errors are flattened across sessions, keyed by session and error id
        Ok(sessions
            .into_iter()
            .flat_map(|session| {
                let session_id = session.session_id;
                session.errors.into_iter().map(move |error| {
                    Polled::new(format!("{}/{}", session_id, error.id), RawEvent::Replay(error))
                })
            })
            .collect())
    }
}
