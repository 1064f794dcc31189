//! Server-log endpoint client

use chrono::{DateTime, SecondsFormat, Utc};
use source_models::models::LogPage;

use crate::errors::LoopError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Fetch server log lines newer than `since`
    pub async fn fetch_server_logs(
        &self,
        logs_url: &str,
        token: Option<&str>,
        since: Option<DateTime<Utc>>,
    ) -> Result<LogPage, LoopError> {
        let mut query = vec![("level", "warn".to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339_opts(SecondsFormat::Millis, true)));
        }
        self.get_json(logs_url, token, &query).await
    }
}
