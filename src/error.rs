// error.rs
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::StatusResponse;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("No device cloud backend configured, set meross.backend (APP_MEROSS__BACKEND)")]
    BackendNotConfigured,
    #[error("Meross credentials are not configured")]
    MissingCredentials,
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Remote endpoint unreachable: {0}")]
    Connectivity(String),
    #[error("No online device of type {0}")]
    DeviceNotFound(String),
    #[error("Found {count} online devices of type {device_type}, expected exactly one")]
    AmbiguousDevice { device_type: String, count: usize },
    #[error("Device error: {0}")]
    Device(String),
    #[error("Outlet {0} does not exist on this device")]
    InvalidChannel(u8),
    #[error("Command queue closed")]
    QueueClosed,
    #[error("Worker loop panicked")]
    WorkerPanicked,
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

/// Rejections produced by the Control API before anything reaches the queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Invalid socket number")]
    InvalidSocketNumber,
    #[error("Socket number out of bounds")]
    SocketOutOfBounds,
}

impl IntoResponse for ValidationError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(StatusResponse::new(self.to_string())),
        )
            .into_response()
    }
}
