//! Outbound dialing through the SIP trunk.

use crate::api::{short_id, with_conn, ApiError};
use crate::config::default_caller_name;
use crate::AppState;
use axum::extract::{Extension, Json};
use concierge_crm::{create_call_log, record_call_attempt, NewCallLog};
use concierge_types::CallStatus;
use concierge_voice::{CreateOutboundTrunk, DialRequest};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Rooms created for outbound calls start with this, which routes them
/// to the outbound script.
pub const OUTBOUND_ROOM_PREFIX: &str = "newport_outbound_";
const CALLER_IDENTITY_PREFIX: &str = "newport_caller_";
const TRUNK_NAME: &str = "newport-trunk";
const TRUNK_METADATA: &str = "Outbound SIP trunk for Newport Beach Vacation Properties";

#[derive(Debug, Deserialize)]
pub struct MakeCallRequest {
    pub phone_number: String,
    #[serde(default = "default_caller_name")]
    pub caller_name: String,
    #[serde(default)]
    pub business_id: Option<String>,
    /// Dialer list entry this call is for.
    #[serde(default)]
    pub prospect_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MakeCallResponse {
    pub success: bool,
    pub room_name: String,
    pub call_id: String,
    pub phone_number: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateTrunkRequest {
    pub sip_address: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_phone_numbers")]
    pub phone_numbers: Vec<String>,
}

fn default_phone_numbers() -> Vec<String> {
    vec!["*".to_string()]
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateTrunkResponse {
    pub success: bool,
    pub trunk_id: String,
    pub name: String,
    pub message: String,
}

fn ensure_livekit(state: &AppState) -> Result<(), ApiError> {
    if state.voice.is_enabled() {
        Ok(())
    } else {
        Err(ApiError::InternalServerError(
            "LiveKit credentials not configured".to_string(),
        ))
    }
}

/// Handler for `POST /api/make-call`.
///
/// Dials the number into a fresh room and waits until it is answered. The
/// attempt is logged either way; logging failures never fail the call.
pub async fn make_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<MakeCallRequest>,
) -> Result<Json<MakeCallResponse>, ApiError> {
    ensure_livekit(&state)?;
    let trunk_id = state.voice.sip_trunk_id().ok_or_else(|| {
        ApiError::InternalServerError(
            "SIP_TRUNK_ID not configured. Please set up outbound SIP trunk first.".to_string(),
        )
    })?;
    let phone_number = payload.phone_number.trim().to_string();
    if phone_number.is_empty() {
        return Err(ApiError::BadRequest("phone_number is required".to_string()));
    }

    let room_name = format!("{OUTBOUND_ROOM_PREFIX}{}", short_id());
    if let Err(e) = state.voice.create_room(&room_name).await {
        // The dial creates the room anyway.
        tracing::warn!(room = %room_name, error = %e, "room creation failed, continuing");
    }

    let dial = DialRequest {
        sip_trunk_id: trunk_id.to_string(),
        sip_call_to: phone_number.clone(),
        room_name: room_name.clone(),
        participant_identity: format!("{CALLER_IDENTITY_PREFIX}{}", short_id()),
        participant_name: payload.caller_name.clone(),
        wait_until_answered: true,
    };
    tracing::info!(room = %room_name, trunk = %trunk_id, "placing outbound call");
    let result = state.voice.create_sip_participant(&dial).await;

    let status = if result.is_ok() {
        CallStatus::Connected
    } else {
        CallStatus::Failed
    };
    let business_id = payload
        .business_id
        .clone()
        .unwrap_or_else(|| state.config.dialer.business_id.clone());
    record_attempt(&state, business_id, &phone_number, &room_name, payload.prospect_id, status)
        .await;

    let info = result.map_err(|e| {
        tracing::error!(room = %room_name, error = %e, "outbound call failed");
        ApiError::InternalServerError(format!("Failed to initiate call: {}", e))
    })?;

    Ok(Json(MakeCallResponse {
        success: true,
        room_name,
        call_id: info.participant_identity,
        message: format!("Calling {phone_number}..."),
        phone_number,
    }))
}

async fn record_attempt(
    state: &AppState,
    business_id: String,
    phone_number: &str,
    room_name: &str,
    prospect_id: Option<i64>,
    status: CallStatus,
) {
    let log = NewCallLog {
        prospect_id,
        business_id,
        phone_number: phone_number.to_string(),
        room_name: Some(room_name.to_string()),
        call_status: status,
        notes: None,
    };
    let result = with_conn(state, move |conn| {
        create_call_log(conn, &log)?;
        if let Some(id) = prospect_id {
            record_call_attempt(conn, id)?;
        }
        Ok(())
    })
    .await;

    if let Err(e) = result {
        tracing::warn!(room = %room_name, error = %e, "failed to record call attempt");
    }
}

/// Handler for `POST /api/create-trunk`.
pub async fn create_trunk_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateTrunkRequest>,
) -> Result<Json<CreateTrunkResponse>, ApiError> {
    ensure_livekit(&state)?;

    let request = CreateOutboundTrunk {
        name: TRUNK_NAME.to_string(),
        metadata: TRUNK_METADATA.to_string(),
        address: payload.sip_address,
        numbers: payload.phone_numbers,
        auth_username: payload.username,
        auth_password: payload.password,
    };
    let trunk = state
        .voice
        .create_outbound_trunk(&request)
        .await
        .map_err(|e| ApiError::InternalServerError(format!("Failed to create SIP trunk: {}", e)))?;

    tracing::info!(trunk_id = %trunk.sip_trunk_id, "outbound trunk created");
    Ok(Json(CreateTrunkResponse {
        success: true,
        message: format!(
            "SIP trunk '{TRUNK_NAME}' created successfully! Set SIP_TRUNK_ID={} to use it.",
            trunk.sip_trunk_id
        ),
        trunk_id: trunk.sip_trunk_id,
        name: trunk.name,
    }))
}
