//! Interval-driven sources

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::errors::LoopError;
use crate::monitor::session::SessionSink;
use crate::monitor::sources::events::RawEvent;
use crate::monitor::sources::{ErrorSource, SourceKind};

/// Event fetched by a poll, keyed so repeated polls do not count it twice
#[derive(Debug, Clone)]
pub struct Polled {
    pub key: String,
    pub event: RawEvent,
}

impl Polled {
    pub fn new(key: impl Into<String>, event: RawEvent) -> Self {
        Self {
            key: key.into(),
            event,
        }
    }
}

/// One pull against a backend API
#[async_trait]
pub trait PollFetch: Send + Sync {
    /// Fetch events reported for `url` since the session started
    async fn fetch(&self, url: &str, since: DateTime<Utc>) -> Result<Vec<Polled>, LoopError>;
}

/// Polls a fetcher on a fixed interval until cancelled
pub struct PollingSource<F> {
    kind: SourceKind,
    interval: Duration,
    fetcher: F,
}

impl<F: PollFetch> PollingSource<F> {
    pub fn new(kind: SourceKind, interval: Duration, fetcher: F) -> Self {
        Self {
            kind,
            interval,
            fetcher,
        }
    }
}

#[async_trait]
impl<F: PollFetch> ErrorSource for PollingSource<F> {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn run(
        &self,
        url: String,
        sink: SessionSink,
        cancel: CancellationToken,
    ) -> Result<(), LoopError> {
        info!("{} poller starting...", self.kind);

        let since = Utc::now();
        let mut seen = HashSet::new();

        loop {
            match self.fetcher.fetch(&url, since).await {
                Ok(polled) => {
                    let mut fresh = 0;
                    for item in polled {
                        if seen.insert(item.key) {
                            sink.emit(item.event);
                            fresh += 1;
                        }
                    }
                    debug!("{} poll returned {} new events", self.kind, fresh);
                }
                Err(e) => sink.mark_degraded(&e.to_string()),
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("{} poller shutting down...", self.kind);
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
