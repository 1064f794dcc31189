//! CI status API client

use source_models::models::CiRun;

use crate::errors::LoopError;
use crate::http::client::HttpClient;

impl HttpClient {
    /// Fetch the latest pipeline runs
    pub async fn list_ci_runs(
        &self,
        status_url: &str,
        token: Option<&str>,
    ) -> Result<Vec<CiRun>, LoopError> {
        self.get_json(status_url, token, &[]).await
    }
}
