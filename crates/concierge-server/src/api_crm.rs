//! CRUD endpoints over the CRM records.

use crate::api::{with_conn, ApiError};
use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
};
use concierge_crm::{
    create_business, create_call_log, create_lead, create_prospect, delete_prospect, get_business,
    get_lead, get_prospect, list_businesses, list_call_logs, list_leads, list_prospects,
    update_call_status, update_lead_status, update_prospect, Business, CallLog, Lead, NewBusiness,
    NewCallLog, NewLead, NewProspect, Prospect, ProspectFilter, UpdateProspectParams,
};
use concierge_crm::CrmError;
use concierge_types::{CallStatus, LeadStatus, LeadSubmission};
use serde::Deserialize;
use std::sync::Arc;

/// Registers the dialer's business on first start so leads and call logs
/// filed under it satisfy their foreign keys. Returns `true` if it was created.
pub fn ensure_dialer_business(
    conn: &rusqlite::Connection,
    dialer: &crate::config::DialerConfig,
) -> Result<bool, CrmError> {
    match get_business(conn, &dialer.business_id) {
        Ok(_) => Ok(false),
        Err(CrmError::NotFound(_)) => {
            create_business(
                conn,
                &NewBusiness {
                    id: dialer.business_id.clone(),
                    business_name: dialer.caller_name.clone(),
                    contact_name: None,
                    phone_number: None,
                    email: None,
                    knowledge_base: None,
                },
            )?;
            Ok(true)
        }
        Err(e) => Err(e),
    }
}

/// Query string for listings scoped to one business.
#[derive(Debug, Default, Deserialize)]
pub struct BusinessScope {
    pub business_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateLeadRequest {
    pub status: LeadStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCallLogRequest {
    pub call_status: CallStatus,
    #[serde(default)]
    pub call_duration: Option<i64>,
}

fn require(value: &str, field: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::BadRequest(format!("{field} is required")));
    }
    Ok(())
}

pub async fn create_business_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewBusiness>,
) -> Result<(StatusCode, Json<Business>), ApiError> {
    require(&payload.id, "id")?;
    require(&payload.business_name, "business_name")?;

    let business = with_conn(&state, move |conn| Ok(create_business(conn, &payload)?)).await?;
    tracing::info!(business_id = %business.id, "business registered");
    Ok((StatusCode::CREATED, Json(business)))
}

pub async fn list_businesses_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Vec<Business>>, ApiError> {
    let businesses = with_conn(&state, |conn| Ok(list_businesses(conn)?)).await?;
    Ok(Json(businesses))
}

pub async fn get_business_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Business>, ApiError> {
    let business = with_conn(&state, move |conn| Ok(get_business(conn, &id)?)).await?;
    Ok(Json(business))
}

/// Handler for `POST /api/leads`, the default webhook target of the agent.
///
/// Submissions without a business are filed under the dialer's business.
pub async fn create_lead_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<LeadSubmission>,
) -> Result<(StatusCode, Json<Lead>), ApiError> {
    require(&payload.inquiry, "inquiry")?;
    let submission = payload.with_default_business(Some(&state.config.dialer.business_id));
    let new = NewLead {
        business_id: submission.business_id.unwrap_or_default(),
        visitor_name: submission.visitor_name,
        visitor_phone: submission.visitor_phone,
        visitor_email: submission.visitor_email,
        inquiry: submission.inquiry,
    };

    let lead = with_conn(&state, move |conn| Ok(create_lead(conn, &new)?)).await?;
    tracing::info!(lead_id = lead.id, business_id = %lead.business_id, "lead captured");
    Ok((StatusCode::CREATED, Json(lead)))
}

pub async fn list_leads_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(scope): Query<BusinessScope>,
) -> Result<Json<Vec<Lead>>, ApiError> {
    let leads = with_conn(&state, move |conn| {
        Ok(list_leads(conn, scope.business_id.as_deref())?)
    })
    .await?;
    Ok(Json(leads))
}

pub async fn get_lead_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Lead>, ApiError> {
    let lead = with_conn(&state, move |conn| Ok(get_lead(conn, id)?)).await?;
    Ok(Json(lead))
}

pub async fn update_lead_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateLeadRequest>,
) -> Result<Json<Lead>, ApiError> {
    let lead = with_conn(&state, move |conn| {
        update_lead_status(conn, id, payload.status)?;
        Ok(get_lead(conn, id)?)
    })
    .await?;
    Ok(Json(lead))
}

pub async fn create_prospect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewProspect>,
) -> Result<(StatusCode, Json<Prospect>), ApiError> {
    require(&payload.phone_number, "phone_number")?;

    let prospect = with_conn(&state, move |conn| Ok(create_prospect(conn, &payload)?)).await?;
    Ok((StatusCode::CREATED, Json(prospect)))
}

pub async fn list_prospects_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(filter): Query<ProspectFilter>,
) -> Result<Json<Vec<Prospect>>, ApiError> {
    let prospects = with_conn(&state, move |conn| Ok(list_prospects(conn, &filter)?)).await?;
    Ok(Json(prospects))
}

pub async fn get_prospect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<Prospect>, ApiError> {
    let prospect = with_conn(&state, move |conn| Ok(get_prospect(conn, id)?)).await?;
    Ok(Json(prospect))
}

pub async fn update_prospect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateProspectParams>,
) -> Result<Json<Prospect>, ApiError> {
    if let Some(phone) = &payload.phone_number {
        require(phone, "phone_number")?;
    }
    let prospect =
        with_conn(&state, move |conn| Ok(update_prospect(conn, id, &payload)?)).await?;
    Ok(Json(prospect))
}

pub async fn delete_prospect_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    with_conn(&state, move |conn| Ok(delete_prospect(conn, id)?)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn create_call_log_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<NewCallLog>,
) -> Result<(StatusCode, Json<CallLog>), ApiError> {
    require(&payload.phone_number, "phone_number")?;

    let log = with_conn(&state, move |conn| Ok(create_call_log(conn, &payload)?)).await?;
    Ok((StatusCode::CREATED, Json(log)))
}

pub async fn list_call_logs_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(scope): Query<BusinessScope>,
) -> Result<Json<Vec<CallLog>>, ApiError> {
    let logs = with_conn(&state, move |conn| {
        Ok(list_call_logs(conn, scope.business_id.as_deref())?)
    })
    .await?;
    Ok(Json(logs))
}

/// Handler for `PATCH /api/call-logs/{id}`: records how a call ended.
pub async fn update_call_log_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCallLogRequest>,
) -> Result<Json<CallLog>, ApiError> {
    let log = with_conn(&state, move |conn| {
        Ok(update_call_status(conn, id, payload.call_status, payload.call_duration)?)
    })
    .await?;
    Ok(Json(log))
}
