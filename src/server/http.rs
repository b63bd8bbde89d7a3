//! HTTP routes
//!
//! A thin JSON surface over the registry, plus the WebSocket upgrade.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::gateway::Gateway;
use crate::registry::{RegistryEntry, RegistryError, SourceId};
use crate::stats::StatsSnapshot;

use super::websocket::ws_handler;

/// State shared by all handlers
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub connection_limit: Option<Arc<Semaphore>>,
    pub max_message_size: usize,
}

impl AppState {
    pub fn new(gateway: Arc<Gateway>, max_connections: usize, max_message_size: usize) -> Self {
        let connection_limit = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            gateway,
            connection_limit,
            max_message_size,
        }
    }

    /// Take a connection slot; `Err` when the limit is reached
    pub fn try_admit(&self) -> Result<Option<OwnedSemaphorePermit>, AppError> {
        match self.connection_limit {
            Some(ref sem) => sem
                .clone()
                .try_acquire_owned()
                .map(Some)
                .map_err(|_| AppError::service_unavailable("Connection limit reached")),
            None => Ok(None),
        }
    }
}

/// Build the router with all endpoints
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/computers", get(list_computers))
        .route("/api/computers/register", post(register_computer))
        .route("/api/stats", get(stats))
        .route("/ws", get(ws_handler))
        .with_state(state)
}

/// Error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status;
        let body = Json(ErrorResponse {
            error: self.message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Validation(_) => AppError::bad_request(err.to_string()),
            RegistryError::DuplicateCode { .. } => AppError::conflict(err.to_string()),
            RegistryError::UnknownCode => AppError::not_found(err.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::bad_request(rejection.body_text())
    }
}

/// Body of `POST /api/computers/register`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub connection_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub message: String,
    pub id: SourceId,
}

async fn list_computers(State(state): State<AppState>) -> Json<Vec<RegistryEntry>> {
    Json(state.gateway.registry().list_all().await)
}

async fn register_computer(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisterResponse>), AppError> {
    let Json(body) = payload?;

    let id = state
        .gateway
        .register_durable(
            body.name.as_deref().unwrap_or_default(),
            body.connection_code.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            message: "Computer registered successfully".into(),
            id,
        }),
    ))
}

async fn stats(State(state): State<AppState>) -> Json<StatsSnapshot> {
    Json(state.gateway.stats().snapshot())
}
