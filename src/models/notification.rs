use rusqlite::{Connection, params};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: i64,
    pub submission_id: Option<i64>,
    pub message: String,
    pub is_read: bool,
    pub created_at: String,
}

pub struct NotificationPage {
    pub notifications: Vec<Notification>,
    pub page: i64,
    pub per_page: i64,
    pub total_count: i64,
    pub total_pages: i64,
}

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get("id")?,
        submission_id: row.get("submission_id")?,
        message: row.get("message")?,
        is_read: row.get("is_read")?,
        created_at: row.get("created_at")?,
    })
}

pub fn create(
    conn: &Connection,
    submission_id: Option<i64>,
    message: &str,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO notifications (submission_id, message) VALUES (?1, ?2)",
        params![submission_id, message],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Paginated feed, newest first.
pub fn find_recent(
    conn: &Connection,
    page: i64,
    per_page: i64,
) -> rusqlite::Result<NotificationPage> {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total_count: i64 =
        conn.query_row("SELECT COUNT(*) FROM notifications", [], |row| row.get(0))?;
    let total_pages = (total_count as f64 / per_page as f64).ceil() as i64;

    let mut stmt = conn.prepare(
        "SELECT id, submission_id, message, is_read, created_at \
         FROM notifications ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
    )?;
    let notifications = stmt
        .query_map(params![per_page, offset], row_to_notification)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(NotificationPage {
        notifications,
        page,
        per_page,
        total_count,
        total_pages,
    })
}

pub fn mark_read(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    let changed = conn.execute(
        "UPDATE notifications SET is_read = 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(changed > 0)
}
