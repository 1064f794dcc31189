//! Error-tracking API client

use source_models::models::TrackerIssue;

use crate::errors::LoopError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// List unresolved issues of a project seen for an environment URL
    pub async fn list_tracker_issues(
        &self,
        api_url: &str,
        project: &str,
        token: Option<&str>,
        deployment_url: &str,
    ) -> Result<Vec<TrackerIssue>, LoopError> {
        let url = format!(
            "{}/projects/{}/issues",
            api_url.trim_end_matches('/'),
            project
        );
        let query = [
            ("query", "is:unresolved".to_string()),
            ("url", deployment_url.to_string()),
        ];
        self.get_json(&url, token, &query).await
    }
}
