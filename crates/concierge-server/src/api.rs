//! Shared API plumbing and the browser token endpoint.

use crate::AppState;
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use concierge_crm::CrmError;
use concierge_voice::VoiceError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<CrmError> for ApiError {
    fn from(e: CrmError) -> Self {
        match e {
            CrmError::NotFound(what) => ApiError::NotFound(what),
            // A dangling reference is the caller's mistake; anything else is a duplicate.
            CrmError::Constraint(msg) if msg.contains("FOREIGN KEY") => ApiError::BadRequest(msg),
            CrmError::Constraint(msg) => ApiError::Conflict(msg),
            CrmError::InvalidLabel(e) => ApiError::BadRequest(e.to_string()),
            CrmError::Database(e) => ApiError::InternalServerError(format!("db query failed: {}", e)),
        }
    }
}

impl From<VoiceError> for ApiError {
    fn from(e: VoiceError) -> Self {
        ApiError::InternalServerError(e.to_string())
    }
}

/// Runs `f` with a pooled connection on the blocking thread pool.
pub(crate) async fn with_conn<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&rusqlite::Connection) -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    let pool = state.pool.clone();
    tokio::task::spawn_blocking(move || {
        let conn = pool
            .get()
            .map_err(|e| ApiError::InternalServerError(format!("db connection failed: {}", e)))?;
        f(&conn)
    })
    .await
    .map_err(|e| ApiError::InternalServerError(format!("task join error: {}", e)))?
}

/// Eight hex characters for room and participant names.
pub(crate) fn short_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Request body for a browser join token.
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    #[serde(default)]
    pub business_id: Option<String>,
    pub room_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Handler for `POST /api/token`.
pub async fn token_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    if payload.room_name.trim().is_empty() {
        return Err(ApiError::BadRequest("room_name is required".to_string()));
    }
    if !state.voice.config().can_sign() {
        return Err(ApiError::InternalServerError(
            "LiveKit server credentials not configured".to_string(),
        ));
    }

    let identity = format!("visitor-{}", uuid::Uuid::new_v4());
    let token = state
        .voice
        .generate_join_token(&payload.room_name, &identity, "Website Visitor")?;

    tracing::info!(
        room = %payload.room_name,
        business_id = ?payload.business_id,
        identity = %identity,
        "issued visitor token"
    );
    Ok(Json(TokenResponse { token }))
}
