//! HTTP-level tests covering the REST surface: routing, status codes, and
//! the JSON shapes of the submit and analytics endpoints.

mod common;
use common::setup_test_pool;

use actix_web::{App, test, web};
use serde_json::{Value, json};

use formbase::db::DbPool;
use formbase::handlers;
use formbase::notify::Broadcaster;

macro_rules! test_app {
    ($pool:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($pool.clone()))
                .app_data(web::Data::new(Broadcaster::new()))
                .configure(handlers::configure),
        )
        .await
    };
}

async fn create_feedback_form(pool: &DbPool) -> (i64, Value) {
    let app = test_app!(pool);

    let req = test::TestRequest::post()
        .uri("/api/forms")
        .set_json(json!({"name": "Feedback", "description": "How did we do?"}))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;
    let form_id = form["id"].as_i64().expect("form id");

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({"label": "Name", "field_type": "text", "required": true}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({
            "label": "Rating",
            "field_type": "dropdown",
            "options": ["Excellent", "Good", "Fair", "Poor"]
        }))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    (form_id, form)
}

#[actix_rt::test]
async fn test_form_crud_over_http() {
    let (_dir, pool) = setup_test_pool();
    let (form_id, form) = create_feedback_form(&pool).await;
    assert_eq!(form["name"], "Feedback");
    assert_eq!(form["is_active"], true);

    let app = test_app!(&pool);
    let req = test::TestRequest::get()
        .uri(&format!("/api/forms/{form_id}"))
        .to_request();
    let detail: Value = test::call_and_read_body_json(&app, req).await;
    let fields = detail["fields"].as_array().expect("fields");
    assert_eq!(fields.len(), 2);
    assert_eq!(fields[0]["label"], "Name");
    assert_eq!(fields[1]["order"], 2);

    let req = test::TestRequest::get().uri("/api/forms/9999").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    // No submissions yet, so the delete is a real delete.
    let req = test::TestRequest::delete()
        .uri(&format!("/api/forms/{form_id}"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["deleted"], true);
}

#[actix_rt::test]
async fn test_submit_then_analytics_roundtrip() {
    let (_dir, pool) = setup_test_pool();
    let (form_id, _) = create_feedback_form(&pool).await;
    let app = test_app!(&pool);

    // Labels match tolerantly: lowercase works.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/submit"))
        .set_json(json!({
            "submitted_by": "a@example.com",
            "answers": {"name": "A", "Rating": "Good"}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["status"], "submitted");
    assert_eq!(body["answers"]["Name"], "A");
    assert_eq!(body["answers"]["Rating"], "Good");

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/submit"))
        .set_json(json!({
            "submitted_by": "b@example.com",
            "answers": {"Name": "B"}
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::get()
        .uri(&format!("/api/forms/{form_id}/analytics"))
        .to_request();
    let report: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(report["form"]["total_fields"], 2);
    assert_eq!(report["submission_analytics"]["total_submissions"], 2);
    assert_eq!(report["submission_analytics"]["status_breakdown"]["submitted"], 2);
    assert_eq!(report["submission_analytics"]["average_completion_rate"], 100.0);

    let field_analytics = report["field_analytics"].as_array().expect("fields");
    assert_eq!(field_analytics[0]["response_rate"], 100.0);
    assert_eq!(field_analytics[1]["response_rate"], 50.0);
    assert_eq!(field_analytics[1]["option_breakdown"]["Good"], 1);
    assert_eq!(field_analytics[1]["option_breakdown"]["Excellent"], 0);
}

#[actix_rt::test]
async fn test_submit_validation_failures() {
    let (_dir, pool) = setup_test_pool();
    let (form_id, _) = create_feedback_form(&pool).await;
    let app = test_app!(&pool);

    // Missing required field.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/submit"))
        .set_json(json!({"answers": {"Rating": "Good"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);
    let body: Value = test::read_body_json(resp).await;
    let details = body["details"].as_array().expect("details");
    assert!(details.iter().any(|d| d.as_str().unwrap().contains("Name")));

    // Unknown field reference rejects the whole submission.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/submit"))
        .set_json(json!({"answers": {"Name": "A", "Nonexistent": "x"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);

    // Neither answers nor answers_list.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/submit"))
        .set_json(json!({"submitted_by": "a@example.com"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // Unknown form.
    let req = test::TestRequest::post()
        .uri("/api/forms/9999/submit")
        .set_json(json!({"answers": {"Name": "A"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    // Nothing was persisted by any of the rejected submissions.
    let req = test::TestRequest::get().uri("/api/submissions").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_count"], 0);
}

#[actix_rt::test]
async fn test_single_submission_enforcement() {
    let (_dir, pool) = setup_test_pool();
    let app = test_app!(&pool);

    let req = test::TestRequest::post()
        .uri("/api/forms")
        .set_json(json!({"name": "Once only", "allow_multiple_submissions": false}))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;
    let form_id = form["id"].as_i64().unwrap();

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({"label": "Note", "field_type": "text"}))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let submit = |who: &str| {
        test::TestRequest::post()
            .uri(&format!("/api/forms/{form_id}/submit"))
            .set_json(json!({"submitted_by": who, "answers": {"Note": "hi"}}))
            .to_request()
    };

    let resp = test::call_service(&app, submit("jo@example.com")).await;
    assert_eq!(resp.status(), 201);
    let resp = test::call_service(&app, submit("jo@example.com")).await;
    assert_eq!(resp.status(), 400);
    // A different submitter is fine, and anonymous is never deduplicated.
    let resp = test::call_service(&app, submit("other@example.com")).await;
    assert_eq!(resp.status(), 201);
    let resp = test::call_service(&app, submit("")).await;
    assert_eq!(resp.status(), 201);
    let resp = test::call_service(&app, submit("")).await;
    assert_eq!(resp.status(), 201);
}

#[actix_rt::test]
async fn test_analytics_filter_errors() {
    let (_dir, pool) = setup_test_pool();
    let (form_id, _) = create_feedback_form(&pool).await;
    let app = test_app!(&pool);

    let req = test::TestRequest::get()
        .uri(&format!("/api/forms/{form_id}/analytics?date_from=not-a-date"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert!(body["error"].as_str().unwrap().contains("date_from"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/forms/{form_id}/analytics?status=bogus"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get()
        .uri(&format!("/api/forms/{form_id}/analytics?recent_days=0"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let req = test::TestRequest::get()
        .uri("/api/forms/9999/analytics")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_rt::test]
async fn test_notifications_feed_after_submission() {
    let (_dir, pool) = setup_test_pool();
    let (form_id, _) = create_feedback_form(&pool).await;
    let app = test_app!(&pool);

    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/submit"))
        .set_json(json!({"submitted_by": "jo@example.com", "answers": {"Name": "Jo"}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);

    let req = test::TestRequest::get().uri("/api/notifications").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["total_count"], 1);
    let note = &body["notifications"][0];
    assert_eq!(note["is_read"], false);
    assert!(note["message"].as_str().unwrap().contains("Feedback"));

    let note_id = note["id"].as_i64().unwrap();
    let req = test::TestRequest::post()
        .uri(&format!("/api/notifications/{note_id}/read"))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["is_read"], true);

    let req = test::TestRequest::get().uri("/api/statistics").to_request();
    let stats: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(stats["total_submissions"], 1);
    assert_eq!(stats["by_status"][0]["status"], "submitted");
}

#[actix_rt::test]
async fn test_field_validation_over_http() {
    let (_dir, pool) = setup_test_pool();
    let app = test_app!(&pool);

    let req = test::TestRequest::post()
        .uri("/api/forms")
        .set_json(json!({"name": "Strict"}))
        .to_request();
    let form: Value = test::call_and_read_body_json(&app, req).await;
    let form_id = form["id"].as_i64().unwrap();

    // Dropdown without options.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({"label": "Pick", "field_type": "dropdown"}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);

    // Options on a non-choice field.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({"label": "Age", "field_type": "number", "options": ["1"]}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);

    // Duplicate order.
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({"label": "A", "field_type": "text", "order": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let req = test::TestRequest::post()
        .uri(&format!("/api/forms/{form_id}/fields"))
        .set_json(json!({"label": "B", "field_type": "text", "order": 1}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 422);
}
