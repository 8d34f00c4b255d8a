//! SSE notification stream
//!
//! `GET /events?user_id=N` registers the user's notification channel and
//! relays events interleaved with a 60-second heartbeat. Disconnecting
//! unregisters the channel so later pushes are dropped instead of queued.

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use futures::stream::Stream;
use intervox_common::events::UserEvent;
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::server::AppContext;
use super::ErrorBody;
use crate::notify::Notifier;

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
pub struct EventStreamQuery {
    pub user_id: Option<u64>,
}

/// Unregisters the channel when the stream is dropped.
struct Registration {
    notifier: Arc<Notifier>,
    user_id: u64,
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.notifier.unregister(self.user_id);
    }
}

fn to_sse_event(event: &UserEvent) -> Option<Event> {
    Event::default().json_data(event).ok()
}

/// GET /events - per-user notification stream
pub async fn event_stream(
    State(ctx): State<AppContext>,
    Query(query): Query<EventStreamQuery>,
) -> Response {
    let Some(user_id) = query.user_id.filter(|id| *id != 0) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody {
                error: "user_id is required".to_string(),
            }),
        )
            .into_response();
    };

    info!(user_id, "New SSE client connected");
    let mut rx = ctx.notifier.register(user_id);
    let registration = Registration {
        notifier: Arc::clone(&ctx.notifier),
        user_id,
    };

    let stream: std::pin::Pin<Box<dyn Stream<Item = Result<Event, Infallible>> + Send>> =
        Box::pin(async_stream::stream! {
            let _registration = registration;

            if let Some(event) = to_sse_event(&UserEvent::ConnectionEstablished {
                user_id,
                timestamp: Utc::now().timestamp(),
            }) {
                yield Ok(event);
            }

            let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
            heartbeat.tick().await; // first tick completes immediately

            loop {
                tokio::select! {
                    received = rx.recv() => match received {
                        Some(event) => {
                            if let Some(event) = to_sse_event(&event) {
                                yield Ok(event);
                            }
                        }
                        None => break,
                    },
                    _ = heartbeat.tick() => {
                        if let Some(event) = to_sse_event(&UserEvent::Heartbeat {
                            timestamp: Utc::now().timestamp(),
                        }) {
                            yield Ok(event);
                        }
                    }
                }
            }
        });

    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(HEARTBEAT_INTERVAL)
                .text("keep-alive"),
        )
        .into_response()
}
