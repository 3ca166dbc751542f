//! Configuration status for operators.

use crate::AppState;
use axum::extract::{Extension, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    /// `"set"` or `"missing"` per credential. Values are never echoed.
    pub environment: Environment,
    pub endpoints: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct Environment {
    pub livekit_url: &'static str,
    pub livekit_api_key: &'static str,
    pub livekit_api_secret: &'static str,
    pub sip_trunk_id: &'static str,
    pub google_calendar: &'static str,
}

const ENDPOINTS: &[&str] = &[
    "POST /api/token",
    "POST /api/make-call",
    "POST /api/create-trunk",
    "/api/businesses",
    "/api/leads",
    "/api/prospects",
    "/api/call-logs",
    "/api/calendar/*",
    "/api/agent/*",
];

fn presence(present: bool) -> &'static str {
    if present {
        "set"
    } else {
        "missing"
    }
}

/// Handler for `GET /api/status`.
pub async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> Json<StatusResponse> {
    let livekit = state.voice.config();
    let set = |value: &str| presence(!value.trim().is_empty());

    Json(StatusResponse {
        service: "concierge-server",
        version: env!("CARGO_PKG_VERSION"),
        environment: Environment {
            livekit_url: set(livekit.url.as_str()),
            livekit_api_key: set(livekit.api_key.as_str()),
            livekit_api_secret: set(livekit.api_secret.as_str()),
            sip_trunk_id: presence(state.voice.sip_trunk_id().is_some()),
            google_calendar: presence(state.calendar.is_some()),
        },
        endpoints: ENDPOINTS.to_vec(),
    })
}
