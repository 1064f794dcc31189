//! Error-tracking API poller

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::LoopError;
use crate::http::client::HttpClient;
use crate::monitor::sources::events::RawEvent;
use crate::monitor::sources::poll::{PollFetch, Polled};

pub struct TrackerFetch {
    http: Arc<HttpClient>,
    api_url: String,
    project: String,
    token: Option<String>,
}

impl TrackerFetch {
    pub fn new(http: Arc<HttpClient>, api_url: String, project: String, token: Option<String>) -> Self {
        Self {
            http,
            api_url,
            project,
            token,
        }
    }
}

#[async_trait]
impl PollFetch for TrackerFetch {
    async fn fetch(&self, url: &str, _since: DateTime<Utc>) -> Result<Vec<Polled>, LoopError> {
        let issues = self
            .http
            .list_tracker_issues(&self.api_url, &self.project, self.token.as_deref(), url)
            .await?;

        Ok(issues
            .into_iter()
            .map(|issue| Polled::new(issue.id.clone(), RawEvent::Tracker(issue)))
            .collect())
    }
}
