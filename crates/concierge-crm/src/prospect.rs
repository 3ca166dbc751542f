use crate::{parse_label, CrmError};
use concierge_types::ProspectStatus;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// Someone on the outbound dialer list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prospect {
    pub id: i64,
    pub business_id: String,
    pub name: Option<String>,
    pub phone_number: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub status: ProspectStatus,
    pub last_called: Option<String>,
    pub call_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProspect {
    pub business_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub phone_number: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: ProspectStatus,
}

/// Partial update; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateProspectParams {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub status: Option<ProspectStatus>,
}

/// Listing filter.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProspectFilter {
    pub business_id: Option<String>,
    pub status: Option<ProspectStatus>,
}

const PROSPECT_COLUMNS: &str = "id, business_id, name, phone_number, email, notes, status, \
                                last_called, call_count, created_at";

pub fn create_prospect(conn: &Connection, new: &NewProspect) -> Result<Prospect, CrmError> {
    conn.execute(
        "INSERT INTO prospects (business_id, name, phone_number, email, notes, status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.business_id,
            new.name,
            new.phone_number,
            new.email,
            new.notes,
            new.status.as_str(),
        ],
    )?;
    get_prospect(conn, conn.last_insert_rowid())
}

pub fn get_prospect(conn: &Connection, id: i64) -> Result<Prospect, CrmError> {
    conn.query_row(
        &format!("SELECT {PROSPECT_COLUMNS} FROM prospects WHERE id = ?1"),
        [id],
        map_row_to_prospect,
    )
    .optional()?
    .ok_or_else(|| CrmError::NotFound(format!("prospect {id}")))
}

/// Lists prospects, least recently created first.
pub fn list_prospects(
    conn: &Connection,
    filter: &ProspectFilter,
) -> Result<Vec<Prospect>, CrmError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {PROSPECT_COLUMNS} FROM prospects
         WHERE (?1 IS NULL OR business_id = ?1)
           AND (?2 IS NULL OR status = ?2)
         ORDER BY created_at ASC, id ASC"
    ))?;
    let rows = stmt.query_map(
        params![filter.business_id, filter.status.map(ProspectStatus::as_str)],
        map_row_to_prospect,
    )?;
    let mut prospects = Vec::new();
    for row in rows {
        prospects.push(row?);
    }
    Ok(prospects)
}

/// Applies a partial update in a single UPDATE statement.
pub fn update_prospect(
    conn: &Connection,
    id: i64,
    updates: &UpdateProspectParams,
) -> Result<Prospect, CrmError> {
    let mut set_parts: Vec<String> = Vec::new();
    let mut values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    let mut push = |column: &str, value: Box<dyn rusqlite::types::ToSql>| {
        values.push(value);
        set_parts.push(format!("{column} = ?{}", values.len()));
    };

    if let Some(name) = &updates.name {
        push("name", Box::new(name.clone()));
    }
    if let Some(phone) = &updates.phone_number {
        push("phone_number", Box::new(phone.clone()));
    }
    if let Some(email) = &updates.email {
        push("email", Box::new(email.clone()));
    }
    if let Some(notes) = &updates.notes {
        push("notes", Box::new(notes.clone()));
    }
    if let Some(status) = updates.status {
        push("status", Box::new(status.as_str()));
    }

    if set_parts.is_empty() {
        return get_prospect(conn, id);
    }

    values.push(Box::new(id));
    let sql = format!(
        "UPDATE prospects SET {} WHERE id = ?{}",
        set_parts.join(", "),
        values.len()
    );
    let params: Vec<&dyn rusqlite::types::ToSql> = values.iter().map(|v| v.as_ref()).collect();
    let count = conn.execute(&sql, params.as_slice())?;
    if count == 0 {
        return Err(CrmError::NotFound(format!("prospect {id}")));
    }
    get_prospect(conn, id)
}

pub fn delete_prospect(conn: &Connection, id: i64) -> Result<(), CrmError> {
    let count = conn.execute("DELETE FROM prospects WHERE id = ?1", [id])?;
    if count == 0 {
        return Err(CrmError::NotFound(format!("prospect {id}")));
    }
    Ok(())
}

/// Bumps the call counter and stamps `last_called`.
///
/// A prospect still marked `new` moves to `contacted`; later statuses are kept.
pub fn record_call_attempt(conn: &Connection, id: i64) -> Result<(), CrmError> {
    let count = conn.execute(
        "UPDATE prospects
         SET call_count = call_count + 1,
             last_called = datetime('now'),
             status = CASE WHEN status = ?1 THEN ?2 ELSE status END
         WHERE id = ?3",
        params![
            ProspectStatus::New.as_str(),
            ProspectStatus::Contacted.as_str(),
            id
        ],
    )?;
    if count == 0 {
        return Err(CrmError::NotFound(format!("prospect {id}")));
    }
    Ok(())
}

fn map_row_to_prospect(row: &Row) -> rusqlite::Result<Prospect> {
    Ok(Prospect {
        id: row.get(0)?,
        business_id: row.get(1)?,
        name: row.get(2)?,
        phone_number: row.get(3)?,
        email: row.get(4)?,
        notes: row.get(5)?,
        status: parse_label(row, 6)?,
        last_called: row.get(7)?,
        call_count: row.get(8)?,
        created_at: row.get(9)?,
    })
}
