//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use crate::errors::LoopError;

/// Shared HTTP client for source APIs and deployment probes
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(timeout: Duration) -> Result<Self, LoopError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fixloop/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        token: Option<&str>,
        query: &[(&str, String)],
    ) -> Result<T, LoopError> {
        debug!("GET {}", url);

        let mut request = self.client.get(url).query(query);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP GET failed: {} - {}", status, body);
            return Err(LoopError::SourceError(format!("{}: {}", status, body)));
        }

        let body = response.json().await?;
        Ok(body)
    }

    /// Issue a GET and return only the status code
    pub async fn probe(&self, url: &str) -> Result<u16, LoopError> {
        debug!("PROBE {}", url);
        let response = self.client.get(url).send().await?;
        Ok(response.status().as_u16())
    }
}
