//! The bus surface: an `axum::Router` exposing scan control and progress
//! over plain HTTP + SSE, grounded on `wkmp-ap::api::server`'s router
//! shape and `wkmp-ap::api::sse`'s event-stream handler.

use crate::coordinator::CoordinatorHandle;
use crate::error::{DaemonError, Result};
use crate::state::ScanRequest;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::Sse;
use axum::routing::{get, post};
use axum::{Json, Router};
use scand_common::events::EventBus;
use std::collections::HashMap;

#[derive(Clone)]
pub struct ApiState {
    pub coordinator: CoordinatorHandle,
    pub bus: EventBus,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/scan", post(scan))
        .route("/stop", post(stop))
        .route("/write-lock", post(acquire_write_lock))
        .route("/release-write-lock", post(release_write_lock))
        .route("/events", get(events))
        .with_state(state)
}

async fn status(State(state): State<ApiState>) -> Json<scand_common::events::DaemonStatus> {
    Json(state.coordinator.status().await)
}

async fn scan(
    State(state): State<ApiState>,
    Json(body): Json<HashMap<String, Vec<String>>>,
) -> Result<()> {
    let request = ScanRequest::canonicalize(body);
    state.coordinator.scan(request).await
}

async fn stop(State(state): State<ApiState>) -> Result<()> {
    state.coordinator.stop().await
}

fn client_id(headers: &HeaderMap) -> Result<String> {
    headers
        .get("X-Client-Id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .ok_or_else(|| DaemonError::InvalidRequest("missing X-Client-Id header".into()))
}

async fn acquire_write_lock(State(state): State<ApiState>, headers: HeaderMap) -> Result<()> {
    let client_id = client_id(&headers)?;
    state.coordinator.acquire_write_lock(client_id).await
}

async fn release_write_lock(State(state): State<ApiState>, headers: HeaderMap) -> Result<()> {
    let client_id = client_id(&headers)?;
    state.coordinator.release_write_lock(client_id).await
}

async fn events(
    State(state): State<ApiState>,
) -> Sse<impl futures::Stream<Item = std::result::Result<axum::response::sse::Event, std::convert::Infallible>>> {
    scand_common::sse::create_event_sse_stream(state.bus)
}

impl axum::response::IntoResponse for Result<()> {
    fn into_response(self) -> axum::response::Response {
        match self {
            Ok(()) => axum::http::StatusCode::ACCEPTED.into_response(),
            Err(error) => error.into_response(),
        }
    }
}
