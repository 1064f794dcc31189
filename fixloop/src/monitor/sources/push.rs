//! Generic push endpoint

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::errors::LoopError;
use crate::monitor::session::SessionSink;
use crate::monitor::sources::{ErrorSource, SourceKind};
use crate::server::serve::serve;
use crate::server::state::ServerState;

/// Local HTTP receiver the deployed app posts error reports to
pub struct PushSource {
    bind: String,
    bound: Mutex<Option<SocketAddr>>,
}

impl PushSource {
    pub fn new(bind: String) -> Self {
        Self {
            bind,
            bound: Mutex::new(None),
        }
    }

    /// Address of the running receiver
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.bound.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_bound(&self, addr: Option<SocketAddr>) {
        *self.bound.lock().unwrap_or_else(|e| e.into_inner()) = addr;
    }
}

#[async_trait]
impl ErrorSource for PushSource {
    fn name(&self) -> &str {
        SourceKind::Push.as_str()
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Push
    }

    async fn run(
        &self,
        _url: String,
        sink: SessionSink,
        cancel: CancellationToken,
    ) -> Result<(), LoopError> {
        let state = Arc::new(ServerState::new(sink));
        let (addr, handle) = serve(&self.bind, state, cancel.cancelled_owned()).await?;
        self.set_bound(Some(addr));
        // Cleared even if this task is aborted
        let _bound = ClearBound(self);

        let result = handle
            .await
            .map_err(|e| LoopError::ServerError(e.to_string()));
        info!("Push receiver on {} stopped", addr);
        result?
    }
}

struct ClearBound<'a>(&'a PushSource);

impl Drop for ClearBound<'_> {
    fn drop(&mut self) {
        self.0.set_bound(None);
    }
}
