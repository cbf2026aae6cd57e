//! Shared test infrastructure for model and handler tests.
//!
//! Every test gets its own temporary SQLite database with the full schema
//! applied. The TempDir must be kept alive for the connection/pool to stay
//! valid.

#![allow(dead_code)]

use rusqlite::Connection;
use tempfile::TempDir;

use formbase::db::{self, DbPool, MIGRATIONS};
use formbase::models::field::{FieldType, NewField};
use formbase::models::form::NewForm;
use formbase::models::submission::FieldValue;
use formbase::models::{field, form, submission};

pub fn setup_test_db() -> (TempDir, Connection) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let conn = Connection::open(&db_path).expect("Failed to open test DB");

    conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA journal_mode=WAL;")
        .expect("Failed to set pragmas");
    conn.execute_batch(MIGRATIONS)
        .expect("Failed to run migrations");

    (dir, conn)
}

/// Pooled variant for handler-level tests.
pub fn setup_test_pool() -> (TempDir, DbPool) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = dir.path().join("test.db");
    let pool = db::init_pool(db_path.to_str().expect("utf-8 path"));
    db::run_migrations(&pool);
    (dir, pool)
}

pub fn create_form(conn: &Connection, name: &str, allow_multiple: bool) -> i64 {
    form::create(
        conn,
        &NewForm {
            name: name.to_string(),
            description: String::new(),
            is_active: true,
            allow_multiple_submissions: allow_multiple,
        },
    )
    .expect("create form")
}

pub fn create_field(
    conn: &Connection,
    form_id: i64,
    label: &str,
    field_type: FieldType,
    required: bool,
    options: &[&str],
) -> i64 {
    field::create(
        conn,
        form_id,
        &NewField {
            label: label.to_string(),
            field_type,
            required,
            options: options.iter().map(|o| o.to_string()).collect(),
            validation_type: "none".to_string(),
            validation_rule: None,
            sort_order: None,
        },
    )
    .expect("create field")
}

pub fn submit(
    conn: &mut Connection,
    form_id: i64,
    submitted_by: &str,
    answers: &[(i64, FieldValue)],
) -> i64 {
    let (id, _) = submission::create(conn, form_id, submitted_by, None, answers)
        .expect("create submission");
    id
}

/// Pin a submission's created_at for date-filter tests.
pub fn set_created_at(conn: &Connection, submission_id: i64, timestamp: &str) {
    conn.execute(
        "UPDATE submissions SET created_at = ?1 WHERE id = ?2",
        rusqlite::params![timestamp, submission_id],
    )
    .expect("set created_at");
}
