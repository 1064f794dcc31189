//! HTTP request handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use source_models::models::PushReport;
use tracing::debug;

use crate::monitor::sources::events::RawEvent;
use crate::server::state::ServerState;
use crate::utils::version_info;

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub received: u64,
}

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "fixloop".to_string(),
        version: version_info().version,
        received: state.received(),
    })
}

/// A single report or a batch
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum PushPayload {
    Batch(Vec<PushReport>),
    One(PushReport),
}

impl PushPayload {
    fn into_reports(self) -> Vec<PushReport> {
        match self {
            PushPayload::Batch(reports) => reports,
            PushPayload::One(report) => vec![report],
        }
    }
}

/// Push acknowledgement
#[derive(Debug, Serialize, Deserialize)]
pub struct PushResponse {
    pub accepted: usize,
}

/// Error report handler
pub async fn errors_handler(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<PushPayload>,
) -> impl IntoResponse {
    let reports = payload.into_reports();
    let accepted = reports.len();
    debug!("Received {} pushed error reports", accepted);

    for report in reports {
        state.sink.emit(RawEvent::Push(report));
    }
    state.record_received(accepted as u64);

    (StatusCode::ACCEPTED, Json(PushResponse { accepted }))
}
