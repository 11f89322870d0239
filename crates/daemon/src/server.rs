// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP routes over the key-value service.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{debug, error};

use crate::service::{KvService, ServiceError, Status};

#[derive(Clone)]
struct AppState {
    service: Arc<KvService>,
    start_time: Instant,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    #[serde(flatten)]
    status: Status,
    uptime_secs: u64,
}

/// Build the router for a running service
pub fn router(service: Arc<KvService>, start_time: Instant) -> Router {
    Router::new()
        .route("/v1/key/:key", get(get_key).put(put_key).delete(delete_key))
        .route("/v1/status", get(status))
        .with_state(AppState {
            service,
            start_time,
        })
}

/// Serve until `shutdown` resolves, then finish in-flight requests
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn put_key(
    State(app): State<AppState>,
    Path(key): Path<String>,
    value: String,
) -> Result<StatusCode, ServiceError> {
    debug!(%key, "PUT");
    app.service.put(&key, &value).await?;
    Ok(StatusCode::CREATED)
}

async fn get_key(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<String, ServiceError> {
    app.service.get(&key)
}

async fn delete_key(
    State(app): State<AppState>,
    Path(key): Path<String>,
) -> Result<&'static str, ServiceError> {
    debug!(%key, "DELETE");
    app.service.delete(&key).await?;
    Ok("entry deleted successfully")
}

async fn status(State(app): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: app.service.status().await,
        uptime_secs: app.start_time.elapsed().as_secs(),
    })
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            ServiceError::LogUnavailable | ServiceError::Log(_) => {
                error!(error = %self, "write failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
