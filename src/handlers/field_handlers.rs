use actix_web::{HttpResponse, web};
use rusqlite::Connection;

use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::field::{self, FieldType, NewField, VALIDATION_TYPES};
use crate::models::form;

/// GET /api/forms/{id}/fields
pub async fn list(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let conn = pool.get()?;
    if form::find_by_id(&conn, form_id)?.is_none() {
        return Err(AppError::NotFound);
    }
    let fields = field::find_for_form(&conn, form_id)?;
    Ok(HttpResponse::Ok().json(fields))
}

/// POST /api/forms/{id}/fields
pub async fn create(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<NewField>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let conn = pool.get()?;
    if form::find_by_id(&conn, form_id)?.is_none() {
        return Err(AppError::NotFound);
    }
    let errors = validate_field(&conn, form_id, &body, 0)?;
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    let id = field::create(&conn, form_id, &body)?;
    let created = field::find_by_id(&conn, id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Created().json(created))
}

/// PUT /api/fields/{id}
pub async fn update(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<NewField>,
) -> Result<HttpResponse, AppError> {
    let field_id = path.into_inner();
    let conn = pool.get()?;
    let existing = field::find_by_id(&conn, field_id)?.ok_or(AppError::NotFound)?;
    let errors = validate_field(&conn, existing.form_id, &body, field_id)?;
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    field::update(&conn, field_id, &body)?;
    let updated = field::find_by_id(&conn, field_id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(updated))
}

/// DELETE /api/fields/{id}
///
/// Fields with recorded responses cannot be deleted — the responses would
/// dangle and analytics would silently lose history.
pub async fn delete(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let field_id = path.into_inner();
    let conn = pool.get()?;
    if field::find_by_id(&conn, field_id)?.is_none() {
        return Err(AppError::NotFound);
    }
    if field::response_count(&conn, field_id)? > 0 {
        return Err(AppError::BadRequest(
            "Field has recorded responses and cannot be deleted".into(),
        ));
    }
    field::delete(&conn, field_id)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({"deleted": true})))
}

fn validate_field(
    conn: &Connection,
    form_id: i64,
    field: &NewField,
    exclude_id: i64,
) -> Result<Vec<String>, AppError> {
    let mut errors = Vec::new();
    if field.label.trim().is_empty() {
        errors.push("Field label is required".to_string());
    }
    if field.field_type == FieldType::Dropdown && field.options.is_empty() {
        errors.push("Dropdown fields require at least one option".to_string());
    }
    if !field.field_type.is_choice() && !field.options.is_empty() {
        errors.push(format!(
            "Options are only valid for choice fields, not {}",
            field.field_type.as_str()
        ));
    }
    if !VALIDATION_TYPES.contains(&field.validation_type.as_str()) {
        errors.push(format!("Unknown validation type '{}'", field.validation_type));
    }
    if field.validation_type == "regex"
        && field.validation_rule.as_deref().unwrap_or("").trim().is_empty()
    {
        errors.push("Regex validation requires a validation rule".to_string());
    }
    if let Some(sort_order) = field.sort_order {
        if field::sort_order_taken(conn, form_id, sort_order, exclude_id)? {
            errors.push(format!("Order {sort_order} is already taken on this form"));
        }
    }
    Ok(errors)
}
