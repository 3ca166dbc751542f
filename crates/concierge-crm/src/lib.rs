//! Customer records for the concierge backend.
//!
//! Implements persistence for the four record kinds the product keeps:
//! businesses (whose phone line the agent answers), leads captured during
//! calls, dialer prospects, and the log of outbound calls placed to them.
//!
//! All functions take a plain `rusqlite::Connection`; callers decide how
//! connections are pooled and which thread runs the blocking work.

mod business;
mod call_log;
mod lead;
mod prospect;

pub use business::{create_business, get_business, list_businesses, Business, NewBusiness};
pub use call_log::{create_call_log, list_call_logs, update_call_status, CallLog, NewCallLog};
pub use lead::{create_lead, get_lead, list_leads, update_lead_status, Lead, NewLead};
pub use prospect::{
    create_prospect, delete_prospect, get_prospect, list_prospects, record_call_attempt,
    update_prospect, NewProspect, Prospect, ProspectFilter, UpdateProspectParams,
};

use concierge_types::ParseLabelError;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors that can occur during CRM operations.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("database error: {0}")]
    Database(rusqlite::Error),
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness or foreign-key constraint rejected the write.
    #[error("constraint violated: {0}")]
    Constraint(String),
    #[error(transparent)]
    InvalidLabel(#[from] ParseLabelError),
}

impl From<rusqlite::Error> for CrmError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::ConstraintViolation) => CrmError::Constraint(e.to_string()),
            _ => CrmError::Database(e),
        }
    }
}

/// Converts a stored status label inside a row mapper.
fn parse_label<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = ParseLabelError>,
{
    let label: String = row.get(idx)?;
    label.parse().map_err(|e: ParseLabelError| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}
