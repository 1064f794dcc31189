//! Error monitoring
//!
//! A [`Monitor`] owns one session at a time. Starting a session spawns one
//! task per configured [`ErrorSource`]; every task feeds the session through
//! a [`SessionSink`], which normalizes, deduplicates and filters events.

pub mod filter;
pub mod session;
pub mod sources;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::app::options::MonitorConfig;
use crate::errors::LoopError;
use crate::models::error::NormalizedError;
use crate::monitor::filter::ErrorFilter;
use crate::monitor::session::{ErrorSession, SessionSink};
use crate::monitor::sources::ErrorSource;
use crate::utils::generate_uuid;

/// Time a cancelled source gets to clean up before it is aborted
pub const SOURCE_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Identifies a started monitoring session
#[derive(Debug, Clone, Serialize)]
pub struct SessionHandle {
    pub id: String,
    pub url: String,
    pub started_at: DateTime<Utc>,
    pub sources: Vec<String>,
}

struct Inner {
    session: Arc<Mutex<ErrorSession>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

/// Opens error sources against a deployment and keeps the session snapshot
pub struct Monitor {
    filter: Arc<ErrorFilter>,
    sources: Vec<Arc<dyn ErrorSource>>,
    inner: Mutex<Inner>,
}

impl Monitor {
    pub fn new(config: &MonitorConfig, sources: Vec<Arc<dyn ErrorSource>>) -> Result<Self, LoopError> {
        let filter = Arc::new(ErrorFilter::new(
            config.severity_threshold,
            &config.ignore_patterns,
        )?);
        let session = Arc::new(Mutex::new(ErrorSession::new("", filter.clone())));

        Ok(Self {
            filter,
            sources,
            inner: Mutex::new(Inner {
                session,
                cancel: CancellationToken::new(),
                tasks: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn session(&self) -> Arc<Mutex<ErrorSession>> {
        self.lock().session.clone()
    }

    /// Open every source against `url` in a fresh session
    pub fn start_monitoring(&self, url: &str) -> Result<SessionHandle, LoopError> {
        let mut inner = self.lock();
        if inner.session.lock().unwrap_or_else(|e| e.into_inner()).is_active() {
            warn!("Monitor session already active, closing it first");
            close(&mut inner);
        }

        info!("Monitor session starting for {}...", url);
        let mut session = ErrorSession::new(url, self.filter.clone());
        session.set_active(true);
        let session = Arc::new(Mutex::new(session));
        let cancel = CancellationToken::new();

        let mut tasks = Vec::with_capacity(self.sources.len());
        let mut names = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let source = source.clone();
            let sink = SessionSink::new(source.name(), session.clone());
            let token = cancel.child_token();
            let url = url.to_string();
            names.push(source.name().to_string());

            tasks.push(tokio::spawn(async move {
                debug!("Source {} ({}) starting", sink.source(), source.kind());
                match source.run(url, sink.clone(), token).await {
                    Ok(()) => debug!("Source {} finished", sink.source()),
                    Err(e) => {
                        error!("Source {} failed: {}", sink.source(), e);
                        sink.mark_degraded(&e.to_string());
                    }
                }
            }));
        }

        let handle = SessionHandle {
            id: generate_uuid(),
            url: url.to_string(),
            started_at: Utc::now(),
            sources: names,
        };

        inner.session = session;
        inner.cancel = cancel;
        inner.tasks = tasks;
        Ok(handle)
    }

    /// Close all sources. Safe to call repeatedly.
    pub fn stop_monitoring(&self) {
        let mut inner = self.lock();
        close(&mut inner);
    }

    pub fn is_active(&self) -> bool {
        self.session()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_active()
    }

    /// Snapshot of the deduplicated, filtered errors
    pub fn get_current_errors(&self) -> Vec<NormalizedError> {
        self.session()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .errors()
            .to_vec()
    }

    /// Empty the snapshot, sources stay open
    pub fn clear_errors(&self) {
        self.session()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Record an error in the current session
    pub fn add_error(&self, error: NormalizedError) -> bool {
        self.session()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add_error(error)
    }

    /// Sources that failed during the latest session
    pub fn degraded_sources(&self) -> Vec<String> {
        self.session()
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .degraded()
            .to_vec()
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }
}

fn close(inner: &mut Inner) {
    let mut session = inner.session.lock().unwrap_or_else(|e| e.into_inner());
    if !session.is_active() && inner.tasks.is_empty() {
        return;
    }
    info!("Monitor session stopping for {}...", session.url());
    session.set_active(false);
    drop(session);

    inner.cancel.cancel();
    let tasks: Vec<_> = inner.tasks.drain(..).collect();
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(reap(tasks));
        }
        Err(_) => tasks.iter().for_each(JoinHandle::abort),
    }
}

/// Let cancelled sources finish their cleanup, abort the ones that hang
async fn reap(tasks: Vec<JoinHandle<()>>) {
    for mut task in tasks {
        if tokio::time::timeout(SOURCE_SHUTDOWN_GRACE, &mut task)
            .await
            .is_err()
        {
            warn!("Source ignored cancellation for {:?}, aborting", SOURCE_SHUTDOWN_GRACE);
            task.abort();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(|e| e.into_inner());
        close(inner);
    }
}
