//! Concierge backend: token issuance, outbound calls, CRM records and
//! calendar booking over a JSON HTTP API.

pub mod api;
pub mod api_calendar;
pub mod api_calls;
pub mod api_crm;
pub mod api_status;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use concierge_calendar::CalendarService;
use concierge_db::DbPool;
use concierge_voice::VoiceService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub pool: DbPool,
    /// LiveKit tokens, rooms and SIP.
    pub voice: Arc<VoiceService>,
    /// Present only when calendar credentials were found at startup.
    pub calendar: Option<Arc<CalendarService>>,
    pub config: Arc<config::Config>,
}

/// Maximum request body size (1 MiB).
const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors.allowed_origins);

    Router::new()
        .route("/health", get(health))
        .route("/api/token", post(api::token_handler))
        .route("/api/status", get(api_status::status_handler))
        .route("/api/make-call", post(api_calls::make_call_handler))
        .route("/api/create-trunk", post(api_calls::create_trunk_handler))
        .route(
            "/api/businesses",
            post(api_crm::create_business_handler).get(api_crm::list_businesses_handler),
        )
        .route("/api/businesses/{id}", get(api_crm::get_business_handler))
        .route(
            "/api/leads",
            post(api_crm::create_lead_handler).get(api_crm::list_leads_handler),
        )
        .route(
            "/api/leads/{id}",
            get(api_crm::get_lead_handler).patch(api_crm::update_lead_handler),
        )
        .route(
            "/api/prospects",
            post(api_crm::create_prospect_handler).get(api_crm::list_prospects_handler),
        )
        .route(
            "/api/prospects/{id}",
            get(api_crm::get_prospect_handler)
                .patch(api_crm::update_prospect_handler)
                .delete(api_crm::delete_prospect_handler),
        )
        .route(
            "/api/call-logs",
            post(api_crm::create_call_log_handler).get(api_crm::list_call_logs_handler),
        )
        .route(
            "/api/call-logs/{id}",
            patch(api_crm::update_call_log_handler),
        )
        .route(
            "/api/calendar/availability",
            get(api_calendar::availability_handler),
        )
        .route("/api/calendar/book", post(api_calendar::book_handler))
        .route("/api/calendar/upcoming", get(api_calendar::upcoming_handler))
        .route(
            "/api/agent/check-availability",
            post(api_calendar::agent_check_availability_handler),
        )
        .route(
            "/api/agent/book-appointment",
            post(api_calendar::agent_book_handler),
        )
        .route(
            "/api/agent/available-dates",
            get(api_calendar::agent_available_dates_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(Arc::new(state)))
}
