//! Topic-based broadcast channel for real-time notifications.
//!
//! Listeners subscribe to a named topic and receive every event published
//! afterward, in publish order. There is no replay and no durability: a
//! listener that connects after an event was published never sees it.
//! Delivery is best-effort — publish failures are logged and swallowed,
//! never surfaced to the request that triggered them.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::models::{form::Form, notification};

/// Topic all new-submission events are published to.
pub const SUBMISSIONS_TOPIC: &str = "notifications";

/// Flat event payload pushed to WebSocket listeners on a new submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionEvent {
    pub submission_id: i64,
    pub form_id: i64,
    pub submitted_by: String,
    pub status: String,
    pub timestamp: String,
}

/// Registry of listener senders grouped by topic. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct Broadcaster {
    topics: Arc<RwLock<HashMap<String, Vec<mpsc::UnboundedSender<String>>>>>,
}

impl Broadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new listener on a topic. The returned receiver yields every
    /// event published to the topic from this point on.
    pub fn subscribe(&self, topic: &str) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.topics.write() {
            Ok(mut map) => map.entry(topic.to_string()).or_default().push(tx),
            Err(_) => log::error!("Broadcaster registry poisoned; dropping subscription"),
        }
        rx
    }

    /// Publish an event to every live listener on a topic. Closed listeners
    /// are pruned as a side effect.
    pub fn publish(&self, topic: &str, event: &impl Serialize) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                log::error!("Failed to serialize event for topic '{topic}': {e}");
                return;
            }
        };
        let mut map = match self.topics.write() {
            Ok(m) => m,
            Err(_) => {
                log::error!("Broadcaster registry poisoned; dropping event for '{topic}'");
                return;
            }
        };
        if let Some(senders) = map.get_mut(topic) {
            senders.retain(|tx| tx.send(payload.clone()).is_ok());
            if senders.is_empty() {
                map.remove(topic);
            }
        }
    }

    /// Number of live listeners on a topic.
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .map(|map| map.get(topic).map_or(0, |v| v.len()))
            .unwrap_or(0)
    }
}

/// Post-commit notification step for a newly persisted submission.
///
/// Runs strictly after the submission transaction has committed: first stores
/// a Notification row, then publishes the event to [`SUBMISSIONS_TOPIC`].
/// Both phases are independently failable and non-fatal — a failure here must
/// never turn a persisted submission into a client-visible error.
pub fn notify_submission(
    conn: &Connection,
    broadcaster: &Broadcaster,
    form: &Form,
    submission_id: i64,
    submitted_by: &str,
    status: &str,
    timestamp: &str,
) {
    let submitter = if submitted_by.is_empty() {
        "Anonymous"
    } else {
        submitted_by
    };
    let message = format!(
        "Form '{}' answered by {} (Submission {})",
        form.name, submitter, submission_id
    );
    if let Err(e) = notification::create(conn, Some(submission_id), &message) {
        log::error!("Failed to store notification for submission {submission_id}: {e}");
    }

    broadcaster.publish(
        SUBMISSIONS_TOPIC,
        &SubmissionEvent {
            submission_id,
            form_id: form.id,
            submitted_by: submitted_by.to_string(),
            status: status.to_string(),
            timestamp: timestamp.to_string(),
        },
    );
}
