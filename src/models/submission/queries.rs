use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, ToSql, params, params_from_iter};
use serde_json::Value;

use super::types::*;
use crate::models::field::FieldType;

fn row_to_submission(row: &rusqlite::Row) -> rusqlite::Result<Submission> {
    let status_str: String = row.get("status")?;
    Ok(Submission {
        id: row.get("id")?,
        form_id: row.get("form_id")?,
        submitted_by: row.get("submitted_by")?,
        status: Status::parse(&status_str).unwrap_or(Status::Draft),
        submitted_at: row.get("submitted_at")?,
        created_at: row.get("created_at")?,
        ip_address: row.get("ip_address")?,
    })
}

const SELECT_SUBMISSION: &str = "\
    SELECT s.id, s.form_id, s.submitted_by, s.status, s.submitted_at, \
           s.created_at, s.ip_address \
    FROM submissions s";

/// Persist a submission and all of its responses in one transaction.
///
/// Either every row commits or none does; a failed response insert rolls the
/// submission back with it. Returns the new submission id and its
/// `submitted_at` timestamp (UTC, `YYYY-MM-DD HH:MM:SS`).
pub fn create(
    conn: &mut Connection,
    form_id: i64,
    submitted_by: &str,
    ip_address: Option<&str>,
    answers: &[(i64, FieldValue)],
) -> rusqlite::Result<(i64, String)> {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let tx = conn.transaction()?;

    tx.execute(
        "INSERT INTO submissions (form_id, submitted_by, status, submitted_at, ip_address) \
         VALUES (?1, ?2, 'submitted', ?3, ?4)",
        params![form_id, submitted_by, now, ip_address],
    )?;
    let submission_id = tx.last_insert_rowid();

    for (field_id, value) in answers {
        insert_response(&tx, submission_id, *field_id, value)?;
    }

    tx.commit()?;
    Ok((submission_id, now))
}

/// Insert one response row, mapping the value variant onto its column.
fn insert_response(
    tx: &Connection,
    submission_id: i64,
    field_id: i64,
    value: &FieldValue,
) -> rusqlite::Result<()> {
    let (text, number, date, boolean, json): (
        Option<String>,
        Option<f64>,
        Option<String>,
        Option<bool>,
        Option<String>,
    ) = match value {
        FieldValue::Text(s) => (Some(s.clone()), None, None, None, None),
        FieldValue::Number(n) => (None, Some(*n), None, None, None),
        FieldValue::Date(d) => (None, None, Some(d.format("%Y-%m-%d").to_string()), None, None),
        FieldValue::Toggle(b) => (None, None, None, Some(*b), None),
        FieldValue::Choice(s) => (Some(s.clone()), None, None, None, None),
        FieldValue::Choices(list) => (
            None,
            None,
            None,
            None,
            Some(serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())),
        ),
        // File answers live in the uploaded_files child table.
        FieldValue::Files(_) => (None, None, None, None, None),
    };

    tx.execute(
        "INSERT INTO field_responses \
         (submission_id, field_id, value_text, value_number, value_date, value_boolean, value_json) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![submission_id, field_id, text, number, date, boolean, json],
    )?;
    let response_id = tx.last_insert_rowid();

    if let FieldValue::Files(filenames) = value {
        for filename in filenames {
            tx.execute(
                "INSERT INTO uploaded_files (response_id, filename) VALUES (?1, ?2)",
                params![response_id, filename],
            )?;
        }
    }
    Ok(())
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<Submission>> {
    conn.query_row(
        &format!("{SELECT_SUBMISSION} WHERE s.id = ?1"),
        params![id],
        row_to_submission,
    )
    .optional()
}

pub fn set_status(conn: &Connection, id: i64, status: Status) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE submissions SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(changed > 0)
}

/// Whether a named submitter already has a submission against a form. Used
/// to enforce `allow_multiple_submissions = false`; anonymous submitters
/// (empty name) are never deduplicated.
pub fn has_submission_from(
    conn: &Connection,
    form_id: i64,
    submitted_by: &str,
) -> rusqlite::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM submissions WHERE form_id = ?1 AND submitted_by = ?2",
        params![form_id, submitted_by],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Page of submissions for list endpoints.
pub struct SubmissionPage {
    pub submissions: Vec<Submission>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

/// Filtered, paginated submission listing, newest first. `form_id` narrows
/// to one form; `None` spans all forms.
pub fn find_filtered(
    conn: &Connection,
    form_id: Option<i64>,
    filter: &SubmissionFilter,
    page: i64,
    per_page: i64,
) -> rusqlite::Result<SubmissionPage> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let (clause, clause_binds) = filter.clause();
    let mut where_sql = String::from(" WHERE 1=1");
    let mut binds: Vec<Box<dyn ToSql>> = Vec::new();
    if let Some(fid) = form_id {
        where_sql.push_str(" AND s.form_id = ?");
        binds.push(Box::new(fid));
    }
    where_sql.push_str(&clause);
    binds.extend(clause_binds);

    let count_sql = format!("SELECT COUNT(*) FROM submissions s{where_sql}");
    let total_count: i64 = conn.query_row(
        &count_sql,
        params_from_iter(binds.iter().map(|b| b.as_ref())),
        |row| row.get(0),
    )?;
    let total_pages = (total_count as f64 / per_page as f64).ceil() as i64;

    let sql = format!(
        "{SELECT_SUBMISSION}{where_sql} ORDER BY s.created_at DESC, s.id DESC LIMIT ? OFFSET ?"
    );
    binds.push(Box::new(per_page));
    binds.push(Box::new(offset));
    let mut stmt = conn.prepare(&sql)?;
    let submissions = stmt
        .query_map(
            params_from_iter(binds.iter().map(|b| b.as_ref())),
            row_to_submission,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(SubmissionPage {
        submissions,
        page,
        per_page,
        total_count,
        total_pages,
    })
}

/// Decode one stored response back into its tagged value. Returns None when
/// every value slot is empty (legacy rows only; writes skip empty answers).
fn decode_columns(
    field_type: FieldType,
    text: Option<String>,
    number: Option<f64>,
    date: Option<String>,
    boolean: Option<bool>,
    json: Option<String>,
) -> Option<FieldValue> {
    match field_type {
        FieldType::Text => text.map(FieldValue::Text),
        FieldType::Number => number.map(FieldValue::Number),
        FieldType::Date => date
            .and_then(|d| chrono::NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok())
            .map(FieldValue::Date),
        FieldType::Checkbox => boolean.map(FieldValue::Toggle).or_else(|| {
            json.and_then(|j| serde_json::from_str::<Vec<String>>(&j).ok())
                .map(FieldValue::Choices)
        }),
        FieldType::Dropdown => text.map(FieldValue::Choice).or_else(|| {
            json.and_then(|j| serde_json::from_str::<Vec<String>>(&j).ok())
                .map(FieldValue::Choices)
        }),
        // Filenames are looked up separately by the caller.
        FieldType::File => None,
    }
}

/// All answers of one submission as a label → value map, in field order.
pub fn answers_for(
    conn: &Connection,
    submission_id: i64,
) -> rusqlite::Result<serde_json::Map<String, Value>> {
    let mut stmt = conn.prepare(
        "SELECT r.id, f.label, f.field_type, r.value_text, r.value_number, \
                r.value_date, r.value_boolean, r.value_json \
         FROM field_responses r \
         JOIN fields f ON f.id = r.field_id \
         WHERE r.submission_id = ?1 \
         ORDER BY f.sort_order",
    )?;
    let rows = stmt
        .query_map(params![submission_id], |row| {
            let type_str: String = row.get("field_type")?;
            Ok((
                row.get::<_, i64>("id")?,
                row.get::<_, String>("label")?,
                FieldType::parse(&type_str).unwrap_or(FieldType::Text),
                row.get::<_, Option<String>>("value_text")?,
                row.get::<_, Option<f64>>("value_number")?,
                row.get::<_, Option<String>>("value_date")?,
                row.get::<_, Option<bool>>("value_boolean")?,
                row.get::<_, Option<String>>("value_json")?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut answers = serde_json::Map::new();
    for (response_id, label, field_type, text, number, date, boolean, json) in rows {
        let value = if field_type == FieldType::File {
            Some(FieldValue::Files(filenames_for(conn, response_id)?))
        } else {
            decode_columns(field_type, text, number, date, boolean, json)
        };
        let json_value = match value {
            Some(v) => serde_json::to_value(v).unwrap_or(Value::Null),
            None => Value::Null,
        };
        answers.insert(label, json_value);
    }
    Ok(answers)
}

fn filenames_for(conn: &Connection, response_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT filename FROM uploaded_files WHERE response_id = ?1 ORDER BY id",
    )?;
    stmt.query_map(params![response_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()
}

// ---------- Global statistics ----------

pub fn total_count(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))
}

/// Submissions created at or after a UTC `YYYY-MM-DD HH:MM:SS` cutoff.
pub fn count_created_since(conn: &Connection, cutoff: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM submissions WHERE created_at >= ?1",
        params![cutoff],
        |row| row.get(0),
    )
}

pub fn count_by_status(conn: &Connection) -> rusqlite::Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT status, COUNT(*) FROM submissions GROUP BY status ORDER BY status",
    )?;
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()
}

/// Per-form submission counts, busiest form first.
pub fn count_by_form(conn: &Connection) -> rusqlite::Result<Vec<(i64, String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT f.id, f.name, COUNT(s.id) AS n \
         FROM submissions s \
         JOIN forms f ON f.id = s.form_id \
         GROUP BY f.id, f.name \
         ORDER BY n DESC, f.id",
    )?;
    stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
        .collect::<Result<Vec<_>, _>>()
}
