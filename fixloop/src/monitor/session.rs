//! Error accumulation for one monitoring session

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::models::error::NormalizedError;
use crate::monitor::filter::ErrorFilter;
use crate::monitor::sources::events::RawEvent;

/// Deduplicated errors observed against one deployment URL
#[derive(Debug)]
pub struct ErrorSession {
    url: String,
    started_at: DateTime<Utc>,
    active: bool,
    errors: Vec<NormalizedError>,
    degraded: Vec<String>,
    filter: Arc<ErrorFilter>,
}

impl ErrorSession {
    pub fn new(url: impl Into<String>, filter: Arc<ErrorFilter>) -> Self {
        Self {
            url: url.into(),
            started_at: Utc::now(),
            active: false,
            errors: Vec::new(),
            degraded: Vec::new(),
            filter,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Insert or merge an error. Returns whether a record for its identity
    /// remains in the session.
    pub fn add_error(&mut self, error: NormalizedError) -> bool {
        let index = match self
            .errors
            .iter()
            .position(|e| e.identity() == error.identity())
        {
            Some(i) => {
                let existing = &mut self.errors[i];
                existing.occurrence_count += 1;
                existing.last_seen_at = Utc::now();
                i
            }
            None => {
                self.errors.push(error);
                self.errors.len() - 1
            }
        };

        if self.filter.allows(&self.errors[index]) {
            true
        } else {
            let dropped = self.errors.remove(index);
            debug!("Filtered out error: {}", dropped.message);
            false
        }
    }

    pub fn errors(&self) -> &[NormalizedError] {
        &self.errors
    }

    pub fn clear(&mut self) {
        self.errors.clear();
    }

    pub fn mark_degraded(&mut self, source: &str) {
        if !self.degraded.iter().any(|s| s == source) {
            self.degraded.push(source.to_string());
        }
    }

    pub fn degraded(&self) -> &[String] {
        &self.degraded
    }
}

/// Handle a source uses to feed its session
#[derive(Debug, Clone)]
pub struct SessionSink {
    source: String,
    session: Arc<Mutex<ErrorSession>>,
}

impl SessionSink {
    pub fn new(source: impl Into<String>, session: Arc<Mutex<ErrorSession>>) -> Self {
        Self {
            source: source.into(),
            session,
        }
    }

    /// Name of the source this sink belongs to
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Normalize and record a raw event. Events without an error are skipped.
    pub fn emit(&self, event: RawEvent) {
        match event.normalize() {
            Some(error) => self.emit_error(error),
            None => debug!("{}: event carried no error", self.source),
        }
    }

    pub fn emit_error(&self, error: NormalizedError) {
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        if !session.is_active() {
            debug!("{}: session closed, dropping error", self.source);
            return;
        }
        session.add_error(error);
    }

    /// Record that this source stopped delivering
    pub fn mark_degraded(&self, reason: &str) {
        warn!("Source {} degraded: {}", self.source, reason);
        let mut session = self.session.lock().unwrap_or_else(|e| e.into_inner());
        session.mark_degraded(&self.source);
    }
}
