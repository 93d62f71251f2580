//! HTTP routes
//!
//! | Route          | Transport                                     |
//! |----------------|-----------------------------------------------|
//! | `POST /return` | latency acknowledgment                        |
//! | `GET /sse`     | server-sent events, one `message` event each  |
//! | `GET /ws`      | WebSocket, one text frame each                |
//! | `POST /lp`     | long-poll, one JSON body per request          |

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::ws::{self, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::{SinkExt, Stream, StreamExt};

use crate::hub::{BenchHub, Subscription};
use crate::latency::ReturnAck;
use crate::message::{monotonic_nanos, Message};

/// Build the router for a hub
pub fn router(hub: Arc<BenchHub>) -> Router {
    Router::new()
        .route("/return", post(submit_return))
        .route("/sse", get(sse_handler))
        .route("/ws", get(ws_handler))
        .route("/lp", post(long_poll))
        .with_state(hub)
}

/// Record an acknowledgment
///
/// The receipt instant is taken before the body is parsed.
pub async fn submit_return(State(hub): State<Arc<BenchHub>>, body: Bytes) -> StatusCode {
    let received_at = monotonic_nanos();

    match serde_json::from_slice::<ReturnAck>(&body) {
        Ok(ack) => {
            hub.submit_return_at(&ack, received_at);
            StatusCode::OK
        }
        Err(e) => {
            tracing::debug!(error = %e, "Rejected malformed acknowledgment");
            StatusCode::BAD_REQUEST
        }
    }
}

/// Open a server-sent event stream
pub async fn sse_handler(
    State(hub): State<Arc<BenchHub>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(event_stream(hub.subscribe_stream())).keep_alive(KeepAlive::default())
}

/// Turn a subscription into SSE events
///
/// The subscription lives inside the stream, so the client unregisters when
/// the response body is dropped.
fn event_stream(subscription: Subscription) -> impl Stream<Item = Result<Event, Infallible>> {
    futures::stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.recv().await?;
        let event = match message.to_json() {
            Ok(json) => Event::default().event("message").data(json),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode message");
                Event::default().comment("encode error")
            }
        };
        Some((Ok(event), subscription))
    })
}

/// Upgrade to a WebSocket
pub async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<BenchHub>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<BenchHub>) {
    let mut subscription = hub.subscribe_socket();
    let (mut ws_tx, mut ws_rx) = socket.split();

    loop {
        tokio::select! {
            message = subscription.recv() => {
                let Some(message) = message else {
                    let _ = ws_tx.send(ws::Message::Close(None)).await;
                    break;
                };
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to encode message");
                        continue;
                    }
                };
                if let Err(e) = ws_tx.send(ws::Message::Text(json)).await {
                    tracing::debug!(error = %e, "WebSocket send failed");
                    break;
                }
            }

            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(ws::Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket receive failed");
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}

/// Wait for the next message and return it as the response body
pub async fn long_poll(State(hub): State<Arc<BenchHub>>) -> Response {
    poll_response(hub.poll().wait().await)
}

fn poll_response(message: Option<Message>) -> Response {
    let no_cache = [(header::CACHE_CONTROL, "no-cache")];

    match message {
        Some(message) => (no_cache, Json(message)).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, no_cache).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::message::{MessageFactory, Payload};
    use crate::persistence::PersistenceConfig;
    use crate::server::ServerConfig;

    fn hub(dir: &std::path::Path) -> Arc<BenchHub> {
        let config = ServerConfig::default()
            .persistence(PersistenceConfig::default().fixed_file(dir.join("LogReply.csv")));
        let factory = MessageFactory::new(Payload::from_static("X"));
        Arc::new(BenchHub::with_factory(&config, factory, Utc::now()).unwrap())
    }

    #[tokio::test]
    async fn test_return_accepts_ack() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(dir.path());

        let body = r#"{"timestamp":"2024-01-01T00:00:00Z","protocol":"ws","sendTime":1}"#;
        let status = submit_return(State(Arc::clone(&hub)), Bytes::from(body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(hub.stats().records_submitted, 1);
    }

    #[tokio::test]
    async fn test_return_accepts_legacy_field_name() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(dir.path());

        let body = r#"{"timestamp":"2024-01-01T00:00:00Z","protocol":"lp","nanoTime":1}"#;
        let status = submit_return(State(hub), Bytes::from(body)).await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_return_rejects_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(dir.path());

        for body in ["", "not json", r#"{"protocol":"carrier-pigeon","sendTime":1}"#] {
            let status = submit_return(State(Arc::clone(&hub)), Bytes::from(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }
        assert_eq!(hub.stats().records_submitted, 0);
    }

    #[tokio::test]
    async fn test_long_poll_answered_by_tick() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(dir.path());

        let request = tokio::spawn(long_poll(State(Arc::clone(&hub))));
        while hub.registry().counts().lp == 0 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        hub.tick();

        let response = request.await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    }

    #[test]
    fn test_unanswered_poll_is_unavailable() {
        let response = poll_response(None);

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    }

    #[tokio::test]
    async fn test_event_stream_ends_with_subscription() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(dir.path());

        let mut events = Box::pin(event_stream(hub.subscribe_stream()));
        hub.tick();
        assert!(events.next().await.is_some());

        hub.close_clients();
        assert!(events.next().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_event_stream_unregisters() {
        let dir = tempfile::tempdir().unwrap();
        let hub = hub(dir.path());

        let events = event_stream(hub.subscribe_stream());
        assert_eq!(hub.registry().counts().sse, 1);

        drop(events);
        assert_eq!(hub.registry().counts().sse, 0);
    }
}
