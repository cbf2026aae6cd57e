use std::collections::HashMap;

use actix_web::{HttpResponse, web};
use serde::Serialize;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::{field, form};

#[derive(Serialize)]
struct FormDetail {
    #[serde(flatten)]
    form: form::Form,
    fields: Vec<field::Field>,
}

/// GET /api/forms — list forms, optional `is_active` filter.
pub async fn list(
    pool: web::Data<DbPool>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let is_active = query
        .get("is_active")
        .map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"));
    let conn = pool.get()?;
    let forms = form::find_all(&conn, is_active)?;
    Ok(HttpResponse::Ok().json(forms))
}

/// POST /api/forms
pub async fn create(
    pool: web::Data<DbPool>,
    body: web::Json<form::NewForm>,
) -> Result<HttpResponse, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation(vec!["Form name is required".into()]));
    }
    let conn = pool.get()?;
    let id = form::create(&conn, &body)?;
    let created = form::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Created().json(created))
}

/// GET /api/forms/{id} — form with its fields in display order.
pub async fn read(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let conn = pool.get()?;
    let form = form::find_by_id(&conn, form_id)?.ok_or(AppError::NotFound)?;
    let fields = field::find_for_form(&conn, form_id)?;
    Ok(HttpResponse::Ok().json(FormDetail { form, fields }))
}

/// PUT /api/forms/{id}
pub async fn update(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<form::NewForm>,
) -> Result<HttpResponse, AppError> {
    if body.name.trim().is_empty() {
        return Err(AppError::Validation(vec!["Form name is required".into()]));
    }
    let form_id = path.into_inner();
    let conn = pool.get()?;
    if !form::update(&conn, form_id, &body)? {
        return Err(AppError::NotFound);
    }
    let updated = form::find_by_id(&conn, form_id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/forms/{id}
///
/// A form with submissions is never hard-deleted; it is soft-disabled via
/// `is_active` instead, and the response says which happened.
pub async fn delete(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let conn = pool.get()?;
    if form::find_by_id(&conn, form_id)?.is_none() {
        return Err(AppError::NotFound);
    }

    if form::submission_count(&conn, form_id)? > 0 {
        form::soft_disable(&conn, form_id)?;
        return Ok(HttpResponse::Ok()
            .json(serde_json::json!({"deleted": false, "disabled": true})));
    }

    form::delete(&conn, form_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"deleted": true, "disabled": false})))
}
