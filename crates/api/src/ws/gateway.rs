//! Connection gateway
//!
//! Owns the WebSocket lifecycle: authenticate, join, serve, drain.
//! Each connection runs as a single task multiplexing the socket, the
//! room's bus subscription, and the heartbeat timer; teardown is the
//! straight-line code after the loop, so cleanup runs exactly once no
//! matter which side terminated the connection.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use crate::bus::GroupEvent;
use crate::state::AppState;
use crate::store::{rooms, sessions, Room, StoreError};
use crate::ws::events::ServerEvent;
use crate::ws::router;
use crate::auth::Identity;

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    pub token: Option<String>,
}

/// Everything an event handler needs about the connection it serves.
pub struct ConnectionCtx {
    pub state: AppState,
    pub identity: Identity,
    pub room: Room,
    outbound: mpsc::UnboundedSender<Message>,
}

impl ConnectionCtx {
    /// Queue an event for this connection only.
    pub fn send(&self, event: &ServerEvent) {
        match serde_json::to_string(event) {
            Ok(json) => {
                let _ = self.outbound.send(Message::Text(json));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode outbound event");
            }
        }
    }

    /// Fan an event out to the whole room, tagged with this
    /// connection's user as origin.
    pub async fn publish(&self, event: ServerEvent) {
        let group_event = GroupEvent {
            origin_user_id: Some(self.identity.user_id),
            event,
        };
        if let Err(e) = self.state.bus.publish(&self.room.name, group_event).await {
            tracing::error!(room = %self.room.name, error = %e, "Broadcast publish failed");
        }
    }
}

/// GET /ws/chat/:room_name
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(room_name): Path<String>,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, room_name, query.token))
}

/// Send a terminal error frame and close. Used on every pre-Active
/// failure so clients always learn why they were rejected.
async fn reject(mut socket: WebSocket, message: &str) {
    let event = ServerEvent::Error {
        message: message.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&event) {
        let _ = socket.send(Message::Text(json)).await;
    }
    let _ = socket.close().await;
}

async fn handle_socket(socket: WebSocket, state: AppState, room_name: String, token: Option<String>) {
    // Authenticating: no frame other than an error leaves before this passes.
    let Some(token) = token else {
        return reject(socket, "Authentication required").await;
    };
    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(e) => {
            tracing::debug!(room = %room_name, error = %e, "Connection rejected");
            return reject(socket, &e.to_string()).await;
        }
    };

    // Joining: room resolution, fanout membership, presence session.
    let room = match rooms::resolve_or_create(&state.pool, &room_name, &identity).await {
        Ok(room) => room,
        Err(StoreError::Validation(msg)) => return reject(socket, msg).await,
        Err(StoreError::Database(e)) => {
            tracing::error!(room = %room_name, error = %e, "Room resolution failed");
            return reject(socket, "Database error").await;
        }
    };

    let mut subscription = match state.bus.subscribe(&room.name).await {
        Ok(subscription) => subscription,
        Err(e) => {
            tracing::error!(room = %room.name, error = %e, "Bus subscribe failed");
            return reject(socket, "Service unavailable").await;
        }
    };

    let session = match sessions::open_session(&state.pool, room.id, &identity).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(room = %room.name, error = %e, "Session open failed");
            state.bus.unsubscribe(&subscription).await;
            return reject(socket, "Database error").await;
        }
    };

    tracing::info!(
        room = %room.name,
        user_id = identity.user_id,
        role = %identity.role,
        "Connection active"
    );

    // Active: outbound frames go through a queue drained by a send
    // pump, so bus fanout never blocks on a slow socket.
    let (mut sink, mut stream) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sink.send(frame).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let ctx = ConnectionCtx {
        state: state.clone(),
        identity: identity.clone(),
        room: room.clone(),
        outbound: outbound_tx,
    };

    ctx.send(&ServerEvent::ConnectionEstablished {
        user_id: identity.user_id,
        user_name: identity.name.clone(),
        message: format!("Connected to room {}", room.name),
    });

    let mut heartbeat =
        tokio::time::interval(Duration::from_secs(state.config.heartbeat_interval_secs));
    // The first tick completes immediately; consume it so heartbeats
    // start one full interval after connect.
    heartbeat.tick().await;

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => router::dispatch(&ctx, &text).await,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by axum, binary ignored
                    Some(Err(e)) => {
                        tracing::debug!(room = %room.name, error = %e, "Socket error");
                        break;
                    }
                }
            }
            event = subscription.recv() => {
                match event {
                    Some(group_event) => {
                        if let Some(server_event) =
                            filter_group_event(group_event, identity.user_id)
                        {
                            ctx.send(&server_event);
                        }
                    }
                    None => {
                        tracing::warn!(room = %room.name, "Bus subscription ended");
                        break;
                    }
                }
            }
            _ = heartbeat.tick() => {
                ctx.send(&ServerEvent::Heartbeat {
                    timestamp: OffsetDateTime::now_utc(),
                });
            }
            _ = &mut send_task => break,
        }
    }

    // Draining: runs exactly once, in this order, whichever arm broke
    // the loop.
    if let Err(e) = sessions::close_session(&state.pool, session.id).await {
        tracing::error!(room = %room.name, error = %e, "Session close failed");
    }
    state.bus.unsubscribe(&subscription).await;

    let offline = GroupEvent {
        origin_user_id: Some(identity.user_id),
        event: ServerEvent::UserOffline {
            user_id: identity.user_id,
            user_name: identity.name.clone(),
            disconnect_time: OffsetDateTime::now_utc(),
        },
    };
    if let Err(e) = state.bus.publish(&room.name, offline).await {
        tracing::warn!(room = %room.name, error = %e, "Offline broadcast failed");
    }

    send_task.abort();
    tracing::info!(room = %room.name, user_id = identity.user_id, "Connection closed");
}

/// Per-recipient suppression. Typing and offline events skip the
/// connection of the user who caused them; chat messages and
/// notifications reach everyone, sender included.
fn filter_group_event(group_event: GroupEvent, self_user_id: i64) -> Option<ServerEvent> {
    let suppressed = matches!(
        group_event.event,
        ServerEvent::TypingStatus { .. } | ServerEvent::UserOffline { .. }
    ) && group_event.origin_user_id == Some(self_user_id);

    if suppressed {
        None
    } else {
        Some(group_event.event)
    }
}
