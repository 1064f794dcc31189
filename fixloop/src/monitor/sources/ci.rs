//! CI status poller

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::errors::LoopError;
use crate::http::client::HttpClient;
use crate::monitor::sources::events::RawEvent;
use crate::monitor::sources::poll::{PollFetch, Polled};

pub struct CiFetch {
    http: Arc<HttpClient>,
    status_url: String,
    token: Option<String>,
}

impl CiFetch {
    pub fn new(http: Arc<HttpClient>, status_url: String, token: Option<String>) -> Self {
        Self {
            http,
            status_url,
            token,
        }
    }
}

#[async_trait]
impl PollFetch for CiFetch {
    async fn fetch(&self, _url: &str, _since: DateTime<Utc>) -> Result<Vec<Polled>, LoopError> {
        let runs = self
            .http
            .list_ci_runs(&self.status_url, self.token.as_deref())
            .await?;

        // Runs still in progress are not keyed yet so their conclusion is seen later
        Ok(runs
            .into_iter()
            .filter(|run| run.status == "completed")
            .map(|run| {
                let key = format!("{}:{}", run.id, run.conclusion.as_deref().unwrap_or(""));
                Polled::new(key, RawEvent::Ci(run))
            })
            .collect())
    }
}
