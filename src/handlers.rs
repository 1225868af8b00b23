// handlers.rs

use crate::{
    docs,
    error::ValidationError,
    models::{AppState, Command, StatusResponse},
};
use axum::{
    Json, Router,
    extract::{Path, State, rejection::PathRejection},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
};
use percent_encoding::percent_decode_str;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub const GREETING: &str = "Hello to MerossIOT REST!";
pub const NOT_READY: &str = "Meross loop not initialised";
pub const QUEUED: &str = "Operation queued";

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthcheck", get(healthcheck))
        .route(
            "/sockets/{operation}",
            get(sockets_default_outlet).post(sockets_default_outlet),
        )
        .route("/sockets/{operation}/{socket}", get(sockets).post(sockets))
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", docs::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Greeting", body = String))
)]
pub async fn index() -> &'static str {
    GREETING
}

#[utoipa::path(
    get,
    path = "/healthcheck",
    responses(
        (status = 200, description = "Device bound, commands are being processed", body = StatusResponse),
        (status = 500, description = "Worker loop not running", body = StatusResponse)
    )
)]
pub async fn healthcheck(State(state): State<Arc<AppState>>) -> (StatusCode, Json<StatusResponse>) {
    if state.readiness.is_ready() {
        (StatusCode::OK, Json(StatusResponse::new("OK")))
    } else {
        not_ready()
    }
}

#[utoipa::path(
    get,
    path = "/sockets/{operation}/{socket}",
    params(
        ("operation" = String, Path, description = "on, off or toggle"),
        ("socket" = String, Path, description = "Outlet index, 0 or 1")
    ),
    responses(
        (status = 202, description = "Command queued", body = StatusResponse),
        (status = 400, description = "Invalid operation, invalid socket number or socket number out of bounds", body = StatusResponse),
        (status = 500, description = "Worker loop gone", body = StatusResponse)
    )
)]
pub async fn sockets(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    path: Result<Path<(String, String)>, PathRejection>,
) -> Response {
    let (operation, socket) = match path {
        Ok(Path(params)) => params,
        Err(rejection) => {
            debug!(%rejection, "Falling back to lossy path decoding");
            lossy_socket_params(&uri)
        }
    };
    queue_command(&state, &operation, &socket)
}

/// Same as `/sockets/{operation}/0`.
#[utoipa::path(
    get,
    path = "/sockets/{operation}",
    params(("operation" = String, Path, description = "on, off or toggle")),
    responses(
        (status = 202, description = "Command queued for outlet 0", body = StatusResponse),
        (status = 400, description = "Invalid operation", body = StatusResponse),
        (status = 500, description = "Worker loop gone", body = StatusResponse)
    )
)]
pub async fn sockets_default_outlet(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    let operation = match path {
        Ok(Path(operation)) => operation,
        Err(rejection) => {
            debug!(%rejection, "Falling back to lossy path decoding");
            lossy_socket_params(&uri).0
        }
    };
    queue_command(&state, &operation, "0")
}

/// `(operation, socket)` taken straight from `/sockets/...`, with invalid
/// UTF-8 replaced so it fails validation like any other bad value. A missing
/// socket segment means outlet 0.
fn lossy_socket_params(uri: &Uri) -> (String, String) {
    let mut segments = uri
        .path()
        .trim_start_matches('/')
        .split('/')
        .skip(1)
        .map(|raw| percent_decode_str(raw).decode_utf8_lossy().into_owned());
    let operation = segments.next().unwrap_or_default();
    let socket = segments.next().unwrap_or_else(|| "0".to_string());
    (operation, socket)
}

/// Operation is checked first, so a bad operation wins over a bad socket.
pub fn parse_command(operation: &str, socket: &str) -> Result<Command, ValidationError> {
    let operation = operation.parse()?;
    let outlet = socket.parse()?;
    Ok(Command::new(operation, outlet))
}

fn queue_command(state: &AppState, operation: &str, socket: &str) -> Response {
    let command = match parse_command(operation, socket) {
        Ok(command) => command,
        Err(e) => {
            warn!(operation, socket, reason = %e, "Rejected socket request");
            return e.into_response();
        }
    };

    match state.commands.enqueue(command) {
        Ok(()) => {
            metrics::counter!("meross_commands_queued_total", "operation" => command.operation.as_str())
                .increment(1);
            info!(operation = %command.operation, outlet = %command.outlet, "Command queued");
            (StatusCode::ACCEPTED, Json(StatusResponse::new(QUEUED))).into_response()
        }
        Err(e) => {
            error!(error = %e, "Worker loop is not accepting commands");
            not_ready().into_response()
        }
    }
}

fn not_ready() -> (StatusCode, Json<StatusResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(StatusResponse::new(NOT_READY)),
    )
}
