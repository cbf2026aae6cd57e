use std::collections::HashMap;

use actix_web::{HttpResponse, web};

use super::parse_filter;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::{analytics, field, form};

/// GET /api/forms/{id}/analytics
///
/// Query parameters: `status`, `date_from`, `date_to`, `submitted_by`
/// (AND-combined filter) and `recent_days` (recency window, default 7).
pub async fn form_analytics(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let filter = parse_filter(&query)?;
    let recent_days = match query.get("recent_days") {
        Some(raw) => raw
            .parse::<i64>()
            .ok()
            .filter(|d| *d > 0)
            .ok_or_else(|| {
                AppError::BadRequest(format!("Invalid recent_days '{raw}', expected a positive integer"))
            })?,
        None => analytics::DEFAULT_RECENT_DAYS,
    };

    let conn = pool.get()?;
    let form = form::find_by_id(&conn, form_id)?.ok_or(AppError::NotFound)?;
    let fields = field::find_for_form(&conn, form_id)?;
    let report = analytics::compute(&conn, &form, &fields, &filter, recent_days)?;
    Ok(HttpResponse::Ok().json(report))
}
