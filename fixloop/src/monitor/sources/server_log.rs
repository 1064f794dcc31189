//! Server log poller

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::LoopError;
use crate::http::client::HttpClient;
use crate::monitor::sources::events::RawEvent;
use crate::monitor::sources::poll::{PollFetch, Polled};

pub struct ServerLogFetch {
    http: Arc<HttpClient>,
    logs_url: String,
    token: Option<String>,
}

impl ServerLogFetch {
    pub fn new(http: Arc<HttpClient>, logs_url: String, token: Option<String>) -> Self {
        Self {
            http,
            logs_url,
            token,
        }
    }
}

#[async_trait]
impl PollFetch for ServerLogFetch {
    async fn fetch(&self, _url: &str, since: DateTime<Utc>) -> Result<Vec<Polled>, LoopError> {
        let page = self
            .http
            .fetch_server_logs(&self.logs_url, self.token.as_deref(), Some(since))
            .await?;

        Ok(page
            .entries
            .into_iter()
            .filter(|entry| entry.timestamp >= since)
            .map(|entry| {
                let key = format!("{}|{}", entry.timestamp.timestamp_millis(), entry.message);
                Polled::new(key, RawEvent::ServerLog(entry))
            })
            .collect())
    }
}
