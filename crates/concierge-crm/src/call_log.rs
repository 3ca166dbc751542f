use crate::{parse_label, CrmError};
use concierge_types::CallStatus;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// One outbound call placed by the dialer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallLog {
    pub id: i64,
    pub prospect_id: Option<i64>,
    pub business_id: String,
    pub phone_number: String,
    pub room_name: Option<String>,
    pub call_duration: Option<i64>,
    pub call_status: CallStatus,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCallLog {
    #[serde(default)]
    pub prospect_id: Option<i64>,
    pub business_id: String,
    pub phone_number: String,
    #[serde(default)]
    pub room_name: Option<String>,
    #[serde(default)]
    pub call_status: CallStatus,
    #[serde(default)]
    pub notes: Option<String>,
}

const CALL_LOG_COLUMNS: &str = "id, prospect_id, business_id, phone_number, room_name, \
                                call_duration, call_status, notes, created_at";

pub fn create_call_log(conn: &Connection, new: &NewCallLog) -> Result<CallLog, CrmError> {
    conn.execute(
        "INSERT INTO call_logs (prospect_id, business_id, phone_number, room_name, call_status, notes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.prospect_id,
            new.business_id,
            new.phone_number,
            new.room_name,
            new.call_status.as_str(),
            new.notes,
        ],
    )?;
    let id = conn.last_insert_rowid();
    tracing::debug!(call_log_id = id, room = ?new.room_name, "call logged");
    get_call_log(conn, id)
}

fn get_call_log(conn: &Connection, id: i64) -> Result<CallLog, CrmError> {
    conn.query_row(
        &format!("SELECT {CALL_LOG_COLUMNS} FROM call_logs WHERE id = ?1"),
        [id],
        map_row_to_call_log,
    )
    .optional()?
    .ok_or_else(|| CrmError::NotFound(format!("call log {id}")))
}

/// Newest first, optionally scoped to one business.
pub fn list_call_logs(
    conn: &Connection,
    business_id: Option<&str>,
) -> Result<Vec<CallLog>, CrmError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {CALL_LOG_COLUMNS} FROM call_logs
         WHERE (?1 IS NULL OR business_id = ?1)
         ORDER BY created_at DESC, id DESC"
    ))?;
    let rows = stmt.query_map([business_id], map_row_to_call_log)?;
    let mut logs = Vec::new();
    for row in rows {
        logs.push(row?);
    }
    Ok(logs)
}

/// Records the outcome of a call. `duration_secs` is only written when given.
pub fn update_call_status(
    conn: &Connection,
    id: i64,
    status: CallStatus,
    duration_secs: Option<i64>,
) -> Result<CallLog, CrmError> {
    let count = conn.execute(
        "UPDATE call_logs
         SET call_status = ?1, call_duration = COALESCE(?2, call_duration)
         WHERE id = ?3",
        params![status.as_str(), duration_secs, id],
    )?;
    if count == 0 {
        return Err(CrmError::NotFound(format!("call log {id}")));
    }
    get_call_log(conn, id)
}

fn map_row_to_call_log(row: &Row) -> rusqlite::Result<CallLog> {
    Ok(CallLog {
        id: row.get(0)?,
        prospect_id: row.get(1)?,
        business_id: row.get(2)?,
        phone_number: row.get(3)?,
        room_name: row.get(4)?,
        call_duration: row.get(5)?,
        call_status: parse_label(row, 6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
    })
}
