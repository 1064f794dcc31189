//! Server state

use std::sync::atomic::{AtomicU64, Ordering};

use crate::monitor::session::SessionSink;

/// Server state shared across handlers
pub struct ServerState {
    pub sink: SessionSink,
    received: AtomicU64,
}

impl ServerState {
    pub fn new(sink: SessionSink) -> Self {
        Self {
            sink,
            received: AtomicU64::new(0),
        }
    }

    pub fn record_received(&self, count: u64) -> u64 {
        self.received.fetch_add(count, Ordering::Relaxed) + count
    }

    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }
}
