//! Live error stream over a websocket

use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use source_models::models::StreamErrorFrame;
use http::header::{HeaderValue, USER_AGENT};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::LoopError;
use crate::monitor::session::SessionSink;
use crate::monitor::sources::events::RawEvent;
use crate::monitor::sources::{ErrorSource, SourceKind};
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Subscribes to the error stream the deployed app exposes
pub struct StreamSource {
    url: Option<String>,
    path: String,
    cooldown: CooldownOptions,
    heartbeat_interval: Duration,
}

impl StreamSource {
    pub fn new(url: Option<String>, path: String) -> Self {
        Self {
            url,
            path,
            cooldown: CooldownOptions::default(),
            heartbeat_interval: Duration::from_secs(30),
        }
    }

    pub fn with_cooldown(mut self, cooldown: CooldownOptions) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Websocket URL for a deployment
    pub fn stream_url(&self, deployment_url: &str) -> Result<Url, LoopError> {
        if let Some(url) = &self.url {
            return Url::parse(url).map_err(|e| LoopError::ConfigError(e.to_string()));
        }

        let mut url =
            Url::parse(deployment_url).map_err(|e| LoopError::ConfigError(e.to_string()))?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(LoopError::ConfigError(format!(
                    "Unsupported deployment URL scheme: {}",
                    other
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|_| LoopError::ConfigError("Failed to set scheme".to_string()))?;
        url.set_path(&format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            self.path.trim_start_matches('/')
        ));
        Ok(url)
    }
}

#[async_trait]
impl ErrorSource for StreamSource {
    fn name(&self) -> &str {
        SourceKind::Stream.as_str()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Stream
    }

    async fn run(
        &self,
        url: String,
        sink: SessionSink,
        cancel: CancellationToken,
    ) -> Result<(), LoopError> {
        let stream_url = self.stream_url(&url)?;
        let mut attempt: u32 = 0;

        loop {
            info!("Connecting to error stream: {}", stream_url);
            let mut request = stream_url
                .as_str()
                .into_client_request()
                .map_err(|e| LoopError::ConfigError(e.to_string()))?;
            request
                .headers_mut()
                .insert(USER_AGENT, HeaderValue::from_static("fixloop"));

            let connection = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                conn = connect_async(request) => conn,
            };

            match connection {
                Ok((mut ws, _)) => {
                    info!("Connected to error stream");
                    attempt = 0;
                    let mut heartbeat = tokio::time::interval(self.heartbeat_interval);

                    loop {
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("Error stream shutting down...");
                                let _ = ws.close(None).await;
                                return Ok(());
                            }
                            _ = heartbeat.tick() => {
                                if let Err(e) = ws.send(Message::Ping(Vec::new().into())).await {
                                    sink.mark_degraded(&format!("heartbeat failed: {}", e));
                                    break;
                                }
                            }
                            msg = ws.next() => {
                                match msg {
                                    Some(Ok(Message::Text(text))) => handle_frame(&sink, &text),
                                    Some(Ok(Message::Close(_))) | None => {
                                        sink.mark_degraded("stream closed by peer");
                                        break;
                                    }
                                    Some(Err(e)) => {
                                        error!("Error stream failed: {}", e);
                                        sink.mark_degraded(&format!("stream failed: {}", e));
                                        break;
                                    }
                                    _ => {}
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    sink.mark_degraded(&format!("connect failed: {}", e));
                }
            }

            let delay = calc_exp_backoff(&self.cooldown, attempt);
            attempt = attempt.saturating_add(1);
            debug!("Reconnecting to error stream in {:?}", delay);
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

fn handle_frame(sink: &SessionSink, text: &str) {
    match serde_json::from_str::<StreamErrorFrame>(text) {
        Ok(frame) => sink.emit(RawEvent::Stream(frame)),
        Err(e) => debug!("Ignoring stream frame: {}", e),
    }
}
