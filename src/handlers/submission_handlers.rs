use std::collections::HashMap;

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{client_ip, parse_filter, parse_pagination};
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::field::{self, Field};
use crate::models::form;
use crate::models::submission::{self, FieldValue, Status, Submission, SubmitRequest};
use crate::notify::{self, Broadcaster};

#[derive(Serialize)]
struct SubmissionWithAnswers {
    #[serde(flatten)]
    submission: Submission,
    answers: serde_json::Map<String, Value>,
}

/// POST /api/forms/{id}/submit
///
/// Validates and persists a submission atomically, then hands off to the
/// notification dispatcher. Any validation failure rejects the whole
/// submission; nothing is partially persisted.
pub async fn submit(
    pool: web::Data<DbPool>,
    broadcaster: web::Data<Broadcaster>,
    req: HttpRequest,
    path: web::Path<i64>,
    body: web::Json<SubmitRequest>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let mut conn = pool.get()?;

    let form = form::find_by_id(&conn, form_id)?.ok_or(AppError::NotFound)?;
    if !form.is_active {
        return Err(AppError::BadRequest(
            "Form is not accepting submissions".into(),
        ));
    }

    let submitted_by = body.submitted_by.trim().to_string();
    if !form.allow_multiple_submissions
        && !submitted_by.is_empty()
        && submission::has_submission_from(&conn, form_id, &submitted_by)?
    {
        return Err(AppError::BadRequest(format!(
            "'{submitted_by}' has already submitted this form"
        )));
    }

    let fields = field::find_for_form(&conn, form_id)?;
    let resolved = resolve_answers(&fields, &body)?;

    // Coerce every answer before touching the database; a single mismatch
    // rejects the submission with the full list of offending fields.
    let mut errors = Vec::new();
    let mut coerced: HashMap<i64, FieldValue> = HashMap::new();
    for field in &fields {
        if let Some(raw) = resolved.get(&field.id) {
            match FieldValue::coerce(field, raw) {
                Ok(Some(value)) => {
                    coerced.insert(field.id, value);
                }
                Ok(None) => {} // empty answer, no row
                Err(msg) => errors.push(msg),
            }
        }
    }
    for field in &fields {
        if field.required && !coerced.contains_key(&field.id) {
            errors.push(format!("Missing required field '{}'", field.label));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    // One response per field, in display order.
    let answers: Vec<(i64, FieldValue)> = fields
        .iter()
        .filter_map(|f| coerced.get(&f.id).map(|v| (f.id, v.clone())))
        .collect();

    let ip = client_ip(&req);
    let (submission_id, submitted_at) =
        submission::create(&mut conn, form_id, &submitted_by, ip.as_deref(), &answers)?;

    // Post-commit: best-effort, never fails the request.
    notify::notify_submission(
        &conn,
        &broadcaster,
        &form,
        submission_id,
        &submitted_by,
        Status::Submitted.as_str(),
        &submitted_at,
    );

    let summary = submission::answers_for(&conn, submission_id)?;
    Ok(HttpResponse::Created().json(serde_json::json!({
        "submission_id": submission_id,
        "form_id": form_id,
        "submitted_by": submitted_by,
        "status": Status::Submitted.as_str(),
        "submitted_at": submitted_at,
        "answers": summary,
    })))
}

/// Map each provided answer onto a field of the form. Labels are matched
/// tolerantly (exact, trimmed, lowercased, slugified) the way the admin UI
/// historically sent them; numeric keys fall back to field ids. Any
/// unresolvable reference rejects the submission.
fn resolve_answers(
    fields: &[Field],
    body: &SubmitRequest,
) -> Result<HashMap<i64, Value>, AppError> {
    let fields_by_id: HashMap<i64, &Field> = fields.iter().map(|f| (f.id, f)).collect();
    let mut fields_by_key: HashMap<String, &Field> = HashMap::new();
    for f in fields {
        for key in label_keys(&f.label) {
            fields_by_key.insert(key, f);
        }
    }

    let mut resolved: HashMap<i64, Value> = HashMap::new();
    let mut errors = Vec::new();

    if let Some(answers) = &body.answers {
        for (key, value) in answers {
            let field = label_keys(key)
                .into_iter()
                .find_map(|k| fields_by_key.get(&k))
                .copied()
                .or_else(|| {
                    key.trim()
                        .parse::<i64>()
                        .ok()
                        .and_then(|id| fields_by_id.get(&id).copied())
                });
            match field {
                Some(f) => {
                    resolved.insert(f.id, value.clone());
                }
                None => errors.push(format!("Unknown field '{key}' for this form")),
            }
        }
    } else if let Some(items) = &body.answers_list {
        for item in items {
            let field = item
                .field_id
                .and_then(|id| fields_by_id.get(&id).copied())
                .or_else(|| {
                    item.field_label.as_deref().and_then(|label| {
                        label_keys(label)
                            .into_iter()
                            .find_map(|k| fields_by_key.get(&k))
                            .copied()
                    })
                });
            match field {
                Some(f) => {
                    resolved.insert(f.id, item.value.clone());
                }
                None => errors.push(format!(
                    "Unknown field reference (field_id={:?}, field_label={:?})",
                    item.field_id, item.field_label
                )),
            }
        }
    } else {
        return Err(AppError::BadRequest(
            "Provide answers as an object in \"answers\" or an array in \"answers_list\"".into(),
        ));
    }

    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }
    Ok(resolved)
}

/// Candidate lookup keys for a field label, most to least exact.
fn label_keys(label: &str) -> Vec<String> {
    let trimmed = label.trim();
    vec![
        label.to_string(),
        trimmed.to_string(),
        trimmed.to_lowercase(),
        slugify(trimmed),
    ]
}

/// Lowercase, alphanumerics kept, runs of anything else collapsed to '-'.
fn slugify(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut last_dash = true;
    for c in s.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// GET /api/submissions — filtered, paginated, newest first, with answers.
pub async fn list(
    pool: web::Data<DbPool>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let filter = parse_filter(&query)?;
    let (page, per_page) = parse_pagination(&query);
    let form_id = match query.get("form").or_else(|| query.get("form_id")) {
        Some(raw) => Some(raw.parse::<i64>().map_err(|_| {
            AppError::BadRequest(format!("Invalid form id '{raw}'"))
        })?),
        None => None,
    };

    let conn = pool.get()?;
    let data = submission::find_filtered(&conn, form_id, &filter, page, per_page)?;
    let results = data
        .submissions
        .into_iter()
        .map(|s| {
            let answers = submission::answers_for(&conn, s.id)?;
            Ok(SubmissionWithAnswers {
                submission: s,
                answers,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total_count": data.total_count,
        "page": data.page,
        "per_page": data.per_page,
        "total_pages": data.total_pages,
        "results": results,
    })))
}

/// GET /api/submissions/{id}
pub async fn detail(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let submission_id = path.into_inner();
    let conn = pool.get()?;
    let sub = submission::find_by_id(&conn, submission_id)?.ok_or(AppError::NotFound)?;
    let form_name = form::find_by_id(&conn, sub.form_id)?
        .map(|f| f.name)
        .unwrap_or_default();
    let answers = submission::answers_for(&conn, submission_id)?;

    let mut body = serde_json::to_value(&sub)?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert("form_name".into(), Value::String(form_name));
        obj.insert("answers".into(), Value::Object(answers));
    }
    Ok(HttpResponse::Ok().json(body))
}

#[derive(Deserialize)]
pub struct StatusBody {
    pub status: String,
}

/// POST /api/submissions/{id}/status — workflow status change.
pub async fn set_status(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    body: web::Json<StatusBody>,
) -> Result<HttpResponse, AppError> {
    let status = Status::parse(&body.status)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown status '{}'", body.status)))?;
    let submission_id = path.into_inner();
    let conn = pool.get()?;
    if !submission::set_status(&conn, submission_id, status)? {
        return Err(AppError::NotFound);
    }
    let updated = submission::find_by_id(&conn, submission_id)?.ok_or(AppError::NotFound)?;
    Ok(HttpResponse::Ok().json(updated))
}

/// GET /api/forms/{id}/responses — all responses for one form.
pub async fn form_responses(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let form_id = path.into_inner();
    let filter = parse_filter(&query)?;
    let (page, per_page) = parse_pagination(&query);

    let conn = pool.get()?;
    let form = form::find_by_id(&conn, form_id)?.ok_or(AppError::NotFound)?;
    let data = submission::find_filtered(&conn, Some(form_id), &filter, page, per_page)?;
    let submissions = data
        .submissions
        .into_iter()
        .map(|s| {
            let answers = submission::answers_for(&conn, s.id)?;
            Ok(SubmissionWithAnswers {
                submission: s,
                answers,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "form": {
            "id": form.id,
            "name": form.name,
            "description": form.description,
        },
        "total_submissions": data.total_count,
        "page": data.page,
        "per_page": data.per_page,
        "total_pages": data.total_pages,
        "submissions": submissions,
    })))
}

/// GET /api/statistics — global submission counts.
pub async fn statistics(
    pool: web::Data<DbPool>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let days = query
        .get("days")
        .and_then(|d| d.parse::<i64>().ok())
        .filter(|d| *d > 0)
        .unwrap_or(7);
    let cutoff = (Utc::now() - Duration::days(days))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();

    let conn = pool.get()?;
    let total = submission::total_count(&conn)?;
    let recent = submission::count_created_since(&conn, &cutoff)?;
    let by_status: Vec<Value> = submission::count_by_status(&conn)?
        .into_iter()
        .map(|(status, count)| serde_json::json!({"status": status, "count": count}))
        .collect();
    let by_form: Vec<Value> = submission::count_by_form(&conn)?
        .into_iter()
        .map(|(id, name, count)| {
            serde_json::json!({"form_id": id, "form_name": name, "count": count})
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total_submissions": total,
        "recent_submissions": recent,
        "period_days": days,
        "by_status": by_status,
        "by_form": by_form,
    })))
}
