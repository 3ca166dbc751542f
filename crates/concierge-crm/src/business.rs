use crate::CrmError;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

/// A business whose calls the agent handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    /// Slug-style public ID (e.g. `newport-rentals`).
    pub id: String,
    pub business_name: String,
    pub contact_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    /// Free-form facts the agent may draw on during calls.
    pub knowledge_base: Option<String>,
    pub created_at: String,
}

/// Parameters for registering a business.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBusiness {
    pub id: String,
    pub business_name: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub knowledge_base: Option<String>,
}

const BUSINESS_COLUMNS: &str =
    "id, business_name, contact_name, phone_number, email, knowledge_base, created_at";

/// Registers a business. Fails with `Constraint` if the ID is taken.
pub fn create_business(conn: &Connection, new: &NewBusiness) -> Result<Business, CrmError> {
    conn.execute(
        "INSERT INTO businesses (id, business_name, contact_name, phone_number, email, knowledge_base)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            new.id,
            new.business_name,
            new.contact_name,
            new.phone_number,
            new.email,
            new.knowledge_base,
        ],
    )?;
    get_business(conn, &new.id)
}

pub fn get_business(conn: &Connection, id: &str) -> Result<Business, CrmError> {
    conn.query_row(
        &format!("SELECT {BUSINESS_COLUMNS} FROM businesses WHERE id = ?1"),
        [id],
        map_row_to_business,
    )
    .optional()?
    .ok_or_else(|| CrmError::NotFound(format!("business {id}")))
}

pub fn list_businesses(conn: &Connection) -> Result<Vec<Business>, CrmError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BUSINESS_COLUMNS} FROM businesses ORDER BY business_name ASC"
    ))?;
    let rows = stmt.query_map([], map_row_to_business)?;
    let mut businesses = Vec::new();
    for row in rows {
        businesses.push(row?);
    }
    Ok(businesses)
}

fn map_row_to_business(row: &Row) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(0)?,
        business_name: row.get(1)?,
        contact_name: row.get(2)?,
        phone_number: row.get(3)?,
        email: row.get(4)?,
        knowledge_base: row.get(5)?,
        created_at: row.get(6)?,
    })
}
