use crate::{parse_label, CrmError};
use concierge_types::LeadStatus;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A captured lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: i64,
    pub business_id: String,
    pub visitor_name: Option<String>,
    pub visitor_phone: Option<String>,
    pub visitor_email: Option<String>,
    pub inquiry: String,
    pub status: LeadStatus,
    pub captured_at: String,
}

/// Parameters for storing a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLead {
    pub business_id: String,
    pub visitor_name: Option<String>,
    pub visitor_phone: Option<String>,
    pub visitor_email: Option<String>,
    pub inquiry: String,
}

const LEAD_COLUMNS: &str =
    "id, business_id, visitor_name, visitor_phone, visitor_email, inquiry, status, captured_at";

/// Stores a lead with status `new`.
///
/// The business must exist; an unknown `business_id` is a `Constraint` error.
pub fn create_lead(conn: &Connection, new: &NewLead) -> Result<Lead, CrmError> {
    conn.execute(
        "INSERT INTO leads (business_id, visitor_name, visitor_phone, visitor_email, inquiry, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.business_id,
            new.visitor_name,
            new.visitor_phone,
            new.visitor_email,
            new.inquiry,
            LeadStatus::New.as_str(),
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(lead_id = id, business_id = %new.business_id, "lead stored");
    get_lead(conn, id)
}

pub fn get_lead(conn: &Connection, id: i64) -> Result<Lead, CrmError> {
    conn.query_row(
        &format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?1"),
        [id],
        map_row_to_lead,
    )
    .optional()?
    .ok_or_else(|| CrmError::NotFound(format!("lead {id}")))
}

/// Lists leads, newest first, optionally for one business.
pub fn list_leads(conn: &Connection, business_id: Option<&str>) -> Result<Vec<Lead>, CrmError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LEAD_COLUMNS} FROM leads
         WHERE (?1 IS NULL OR business_id = ?1)
         ORDER BY captured_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map([business_id], map_row_to_lead)?;
    let mut leads = Vec::new();
    for row in rows {
        leads.push(row?);
    }
    Ok(leads)
}

pub fn update_lead_status(conn: &Connection, id: i64, status: LeadStatus) -> Result<(), CrmError> {
    let count = conn.execute(
        "UPDATE leads SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    if count == 0 {
        return Err(CrmError::NotFound(format!("lead {id}")));
    }
    Ok(())
}

fn map_row_to_lead(row: &Row) -> rusqlite::Result<Lead> {
    Ok(Lead {
        id: row.get(0)?,
        business_id: row.get(1)?,
        visitor_name: row.get(2)?,
        visitor_phone: row.get(3)?,
        visitor_email: row.get(4)?,
        inquiry: row.get(5)?,
        status: parse_label(row, 6)?,
        captured_at: row.get(7)?,
    })
}
