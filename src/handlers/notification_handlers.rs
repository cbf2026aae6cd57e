use std::collections::HashMap;

use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::Message;

use super::parse_pagination;
use crate::db::DbPool;
use crate::errors::AppError;
use crate::models::notification;
use crate::notify::{Broadcaster, SUBMISSIONS_TOPIC};

/// GET /api/notifications — stored notification feed, newest first.
pub async fn list(
    pool: web::Data<DbPool>,
    query: web::Query<HashMap<String, String>>,
) -> Result<HttpResponse, AppError> {
    let (page, per_page) = parse_pagination(&query);
    let conn = pool.get()?;
    let data = notification::find_recent(&conn, page, per_page)?;
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "total_count": data.total_count,
        "page": data.page,
        "per_page": data.per_page,
        "total_pages": data.total_pages,
        "notifications": data.notifications,
    })))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let conn = pool.get()?;
    if !notification::mark_read(&conn, id)? {
        return Err(AppError::NotFound);
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({"id": id, "is_read": true})))
}

/// GET /ws/notifications — WebSocket upgrade for real-time submission events.
///
/// The connection subscribes to the submissions topic on accept and receives
/// every event published afterward; nothing already published is replayed.
/// On close or transport error the channel is dropped and the broadcaster
/// prunes the dead sender on its next publish.
pub async fn ws_connect(
    req: HttpRequest,
    body: web::Payload,
    broadcaster: web::Data<Broadcaster>,
) -> Result<HttpResponse, actix_web::Error> {
    let (response, mut ws_session, mut msg_stream) = actix_ws::handle(&req, body)?;

    let mut rx = broadcaster.subscribe(SUBMISSIONS_TOPIC);

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    if ws_session.text(msg).await.is_err() {
                        break;
                    }
                }
                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if ws_session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        Message::Text(_) => {
                            // Clients interact over HTTP; inbound text is ignored.
                        }
                        _ => {}
                    }
                }
                else => break,
            }
        }
        // Dropping rx closes the sender; the broadcaster prunes it on the
        // next publish to the topic.
    });

    Ok(response)
}
