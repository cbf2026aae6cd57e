use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Form {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub allow_multiple_submissions: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct NewForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub allow_multiple_submissions: bool,
}

fn default_true() -> bool {
    true
}

fn row_to_form(row: &rusqlite::Row) -> rusqlite::Result<Form> {
    Ok(Form {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        is_active: row.get("is_active")?,
        allow_multiple_submissions: row.get("allow_multiple_submissions")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

const SELECT_FORM: &str = "\
    SELECT id, name, description, is_active, allow_multiple_submissions, \
           created_at, updated_at \
    FROM forms";

pub fn create(conn: &Connection, form: &NewForm) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO forms (name, description, is_active, allow_multiple_submissions) \
         VALUES (?1, ?2, ?3, ?4)",
        params![
            form.name,
            form.description,
            form.is_active,
            form.allow_multiple_submissions
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Form>> {
    conn.query_row(
        &format!("{SELECT_FORM} WHERE id = ?1"),
        params![id],
        row_to_form,
    )
    .optional()
}

/// List forms, newest first, optionally restricted to active/inactive.
pub fn find_all(conn: &Connection, is_active: Option<bool>) -> rusqlite::Result<Vec<Form>> {
    match is_active {
        Some(active) => {
            let mut stmt = conn.prepare(&format!(
                "{SELECT_FORM} WHERE is_active = ?1 ORDER BY created_at DESC, id DESC"
            ))?;
            stmt.query_map(params![active], row_to_form)?
                .collect::<Result<Vec<_>, _>>()
        }
        None => {
            let mut stmt =
                conn.prepare(&format!("{SELECT_FORM} ORDER BY created_at DESC, id DESC"))?;
            stmt.query_map([], row_to_form)?
                .collect::<Result<Vec<_>, _>>()
        }
    }
}

pub fn update(conn: &Connection, id: i64, form: &NewForm) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE forms SET name = ?1, description = ?2, is_active = ?3, \
         allow_multiple_submissions = ?4, updated_at = CURRENT_TIMESTAMP WHERE id = ?5",
        params![
            form.name,
            form.description,
            form.is_active,
            form.allow_multiple_submissions,
            id
        ],
    )?;
    Ok(changed > 0)
}

pub fn submission_count(conn: &Connection, form_id: i64) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM submissions WHERE form_id = ?1",
        params![form_id],
        |row| row.get(0),
    )
}

/// Soft-disable a form that still has submissions referencing it.
pub fn soft_disable(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE forms SET is_active = 0, updated_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![id],
    )?;
    Ok(changed > 0)
}

/// Hard delete; only valid for forms with no submissions (fields cascade).
pub fn delete(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute("DELETE FROM forms WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}
