pub mod analytics_handlers;
pub mod field_handlers;
pub mod form_handlers;
pub mod notification_handlers;
pub mod submission_handlers;

use std::collections::HashMap;

use actix_web::{HttpRequest, web};
use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::submission::{Status, SubmissionFilter};

/// Route table. Shared by `main` and the HTTP-level tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Forms
            .route("/forms", web::get().to(form_handlers::list))
            .route("/forms", web::post().to(form_handlers::create))
            .route("/forms/{id}", web::get().to(form_handlers::read))
            .route("/forms/{id}", web::put().to(form_handlers::update))
            .route("/forms/{id}", web::delete().to(form_handlers::delete))
            // Fields
            .route("/forms/{id}/fields", web::get().to(field_handlers::list))
            .route("/forms/{id}/fields", web::post().to(field_handlers::create))
            .route("/fields/{id}", web::put().to(field_handlers::update))
            .route("/fields/{id}", web::delete().to(field_handlers::delete))
            // Submissions
            .route("/forms/{id}/submit", web::post().to(submission_handlers::submit))
            .route("/forms/{id}/responses", web::get().to(submission_handlers::form_responses))
            .route("/submissions", web::get().to(submission_handlers::list))
            .route("/submissions/{id}", web::get().to(submission_handlers::detail))
            .route("/submissions/{id}/status", web::post().to(submission_handlers::set_status))
            .route("/statistics", web::get().to(submission_handlers::statistics))
            // Analytics
            .route("/forms/{id}/analytics", web::get().to(analytics_handlers::form_analytics))
            // Notification feed
            .route("/notifications", web::get().to(notification_handlers::list))
            .route("/notifications/{id}/read", web::post().to(notification_handlers::mark_read)),
    );
    cfg.route(
        "/ws/notifications",
        web::get().to(notification_handlers::ws_connect),
    );
}

/// Parse the shared submission filter from query parameters.
/// Unknown statuses and malformed dates are Bad-Request, naming the value.
pub(crate) fn parse_filter(query: &HashMap<String, String>) -> Result<SubmissionFilter, AppError> {
    let status = match query.get("status") {
        Some(s) => Some(
            Status::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("Unknown status '{s}'")))?,
        ),
        None => None,
    };
    let date_from = parse_date_param(query, "date_from")?;
    let date_to = parse_date_param(query, "date_to")?;
    let submitted_by = query
        .get("submitted_by")
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.trim().to_string());

    Ok(SubmissionFilter {
        status,
        date_from,
        date_to,
        submitted_by,
    })
}

fn parse_date_param(
    query: &HashMap<String, String>,
    name: &str,
) -> Result<Option<NaiveDate>, AppError> {
    match query.get(name) {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
            .map(Some)
            .map_err(|_| {
                AppError::BadRequest(format!("Invalid {name} '{raw}', expected YYYY-MM-DD"))
            }),
        None => Ok(None),
    }
}

/// Page/per_page with the same defaults and caps everywhere.
pub(crate) fn parse_pagination(query: &HashMap<String, String>) -> (i64, i64) {
    let page = query
        .get("page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(1)
        .max(1);
    let per_page = query
        .get("per_page")
        .and_then(|p| p.parse::<i64>().ok())
        .unwrap_or(50)
        .clamp(1, 100);
    (page, per_page)
}

/// Client address for submission attribution: first X-Forwarded-For entry,
/// falling back to the peer address.
pub(crate) fn client_ip(req: &HttpRequest) -> Option<String> {
    if let Some(forwarded) = req
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return Some(first.to_string());
            }
        }
    }
    req.peer_addr().map(|addr| addr.ip().to_string())
}
