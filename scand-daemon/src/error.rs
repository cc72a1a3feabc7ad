//! Daemon-level errors, mapped to the bus surface's `{"error": "<Name>"}`
//! bodies per section 4.6's error-name-to-HTTP-status table.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("a scan is already in progress")]
    AlreadyScanning,

    #[error("no scan is in progress")]
    NotScanning,

    #[error("a stop request is already pending")]
    AlreadyStopping,

    #[error("the write lock is already held by another client")]
    AlreadyLocked,

    #[error("the write lock is held by another client")]
    WriteLocked,

    #[error("this client does not hold the write lock")]
    NotLocked,

    #[error("invalid scan request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Engine(#[from] scand_engine::ScanError),

    #[error(transparent)]
    Common(#[from] scand_common::Error),
}

pub type Result<T> = std::result::Result<T, DaemonError>;

impl DaemonError {
    fn name(&self) -> &'static str {
        match self {
            DaemonError::AlreadyScanning => "AlreadyScanning",
            DaemonError::NotScanning => "NotScanning",
            DaemonError::AlreadyStopping => "AlreadyStopping",
            DaemonError::AlreadyLocked => "AlreadyLocked",
            DaemonError::WriteLocked => "WriteLocked",
            DaemonError::NotLocked => "NotLocked",
            DaemonError::InvalidRequest(_) => "InvalidRequest",
            DaemonError::Engine(_) => "EngineError",
            DaemonError::Common(_) => "InternalError",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            DaemonError::AlreadyScanning
            | DaemonError::NotScanning
            | DaemonError::AlreadyStopping
            | DaemonError::AlreadyLocked
            | DaemonError::WriteLocked
            | DaemonError::NotLocked => StatusCode::CONFLICT,
            DaemonError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            DaemonError::Engine(_) | DaemonError::Common(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for DaemonError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({ "error": self.name(), "message": self.to_string() }));
        (status, body).into_response()
    }
}
