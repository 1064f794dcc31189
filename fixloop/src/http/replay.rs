//! Session-replay API client

use source_models::models::ReplaySession;

use crate::errors::LoopError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// List recorded sessions that captured errors on a deployment
    pub async fn list_replay_sessions(
        &self,
        api_url: &str,
        app_id: &str,
        token: Option<&str>,
        deployment_url: &str,
    ) -> Result<Vec<ReplaySession>, LoopError> {
        let url = format!("{}/apps/{}/sessions", api_url.trim_end_matches('/'), app_id);
        let query = [
            ("has_errors", "true".to_string()),
            ("url", deployment_url.to_string()),
        ];
        self.get_json(&url, token, &query).await
    }
}
