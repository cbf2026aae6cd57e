//! Notification dispatcher tests: topic pub/sub ordering, no-replay
//! semantics, listener pruning, and the post-commit dispatch path.

mod common;
use common::*;

use formbase::models::{form, notification};
use formbase::notify::{Broadcaster, SUBMISSIONS_TOPIC, SubmissionEvent, notify_submission};

fn event(submission_id: i64) -> SubmissionEvent {
    SubmissionEvent {
        submission_id,
        form_id: 1,
        submitted_by: "jo@example.com".to_string(),
        status: "submitted".to_string(),
        timestamp: "2026-08-01 10:00:00".to_string(),
    }
}

#[tokio::test]
async fn test_subscriber_receives_events_in_publish_order() {
    let broadcaster = Broadcaster::new();
    let mut rx = broadcaster.subscribe(SUBMISSIONS_TOPIC);

    broadcaster.publish(SUBMISSIONS_TOPIC, &event(1));
    broadcaster.publish(SUBMISSIONS_TOPIC, &event(2));
    broadcaster.publish(SUBMISSIONS_TOPIC, &event(3));

    for expected in 1..=3 {
        let payload = rx.recv().await.expect("event");
        let value: serde_json::Value = serde_json::from_str(&payload).expect("json");
        assert_eq!(value["submission_id"], expected);
        assert_eq!(value["submitted_by"], "jo@example.com");
        assert_eq!(value["status"], "submitted");
    }
}

#[tokio::test]
async fn test_no_replay_for_late_subscriber() {
    let broadcaster = Broadcaster::new();
    let mut early = broadcaster.subscribe(SUBMISSIONS_TOPIC);

    broadcaster.publish(SUBMISSIONS_TOPIC, &event(1));

    // Subscribes after the publish: must never see event 1.
    let mut late = broadcaster.subscribe(SUBMISSIONS_TOPIC);
    broadcaster.publish(SUBMISSIONS_TOPIC, &event(2));

    let first: serde_json::Value =
        serde_json::from_str(&early.recv().await.expect("event")).expect("json");
    assert_eq!(first["submission_id"], 1);
    let second: serde_json::Value =
        serde_json::from_str(&early.recv().await.expect("event")).expect("json");
    assert_eq!(second["submission_id"], 2);

    let late_first: serde_json::Value =
        serde_json::from_str(&late.recv().await.expect("event")).expect("json");
    assert_eq!(late_first["submission_id"], 2);
    assert!(late.try_recv().is_err(), "late subscriber got a replayed event");
}

#[tokio::test]
async fn test_topics_are_isolated() {
    let broadcaster = Broadcaster::new();
    let mut notif = broadcaster.subscribe(SUBMISSIONS_TOPIC);
    let mut other = broadcaster.subscribe("audit");

    broadcaster.publish(SUBMISSIONS_TOPIC, &event(1));

    assert!(notif.recv().await.is_some());
    assert!(other.try_recv().is_err());
}

#[tokio::test]
async fn test_dropped_listener_is_pruned_and_others_survive() {
    let broadcaster = Broadcaster::new();
    let dead = broadcaster.subscribe(SUBMISSIONS_TOPIC);
    let mut alive = broadcaster.subscribe(SUBMISSIONS_TOPIC);
    assert_eq!(broadcaster.listener_count(SUBMISSIONS_TOPIC), 2);

    drop(dead);
    broadcaster.publish(SUBMISSIONS_TOPIC, &event(1));

    assert_eq!(broadcaster.listener_count(SUBMISSIONS_TOPIC), 1);
    let payload: serde_json::Value =
        serde_json::from_str(&alive.recv().await.expect("event")).expect("json");
    assert_eq!(payload["submission_id"], 1);
}

#[tokio::test]
async fn test_publish_without_listeners_is_a_no_op() {
    let broadcaster = Broadcaster::new();
    // Must not panic or error; delivery is best-effort.
    broadcaster.publish(SUBMISSIONS_TOPIC, &event(1));
    assert_eq!(broadcaster.listener_count(SUBMISSIONS_TOPIC), 0);
}

#[tokio::test]
async fn test_notify_submission_stores_record_and_publishes() {
    let (_dir, conn) = setup_test_db();
    let form_id = create_form(&conn, "Contact", true);
    let form = form::find_by_id(&conn, form_id).expect("query").expect("form");

    let broadcaster = Broadcaster::new();
    let mut rx = broadcaster.subscribe(SUBMISSIONS_TOPIC);

    notify_submission(
        &conn,
        &broadcaster,
        &form,
        42,
        "jo@example.com",
        "submitted",
        "2026-08-01 10:00:00",
    );

    // Stored notification record.
    let page = notification::find_recent(&conn, 1, 10).expect("page");
    assert_eq!(page.total_count, 1);
    let record = &page.notifications[0];
    assert_eq!(record.submission_id, Some(42));
    assert!(record.message.contains("Contact"));
    assert!(record.message.contains("jo@example.com"));
    assert!(!record.is_read);

    // Published event with the flat payload.
    let payload: serde_json::Value =
        serde_json::from_str(&rx.recv().await.expect("event")).expect("json");
    assert_eq!(payload["submission_id"], 42);
    assert_eq!(payload["form_id"], form_id);
    assert_eq!(payload["status"], "submitted");
    assert_eq!(payload["timestamp"], "2026-08-01 10:00:00");
}

#[tokio::test]
async fn test_notify_submission_anonymous_label() {
    let (_dir, conn) = setup_test_db();
    let form_id = create_form(&conn, "Contact", true);
    let form = form::find_by_id(&conn, form_id).expect("query").expect("form");
    let broadcaster = Broadcaster::new();

    notify_submission(&conn, &broadcaster, &form, 7, "", "submitted", "2026-08-01 10:00:00");

    let page = notification::find_recent(&conn, 1, 10).expect("page");
    assert!(page.notifications[0].message.contains("Anonymous"));
}

#[test]
fn test_mark_read() {
    let (_dir, conn) = setup_test_db();
    let id = notification::create(&conn, None, "manual note").expect("create");

    assert!(notification::mark_read(&conn, id).expect("mark"));
    let page = notification::find_recent(&conn, 1, 10).expect("page");
    assert!(page.notifications[0].is_read);

    assert!(!notification::mark_read(&conn, 9999).expect("mark missing"));
}
