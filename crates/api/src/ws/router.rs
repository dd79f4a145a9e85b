//! Event router
//!
//! One frame in, one handler out. Undecodable frames answer with an
//! error event and never kill the connection; a handler failure is
//! reported to the sender the same way.

use time::OffsetDateTime;

use crate::store::{messages, StoreError};
use crate::ws::events::{
    ClientEvent, MediaData, MessagePayload, MessagesReadNotice, ServerEvent,
};
use crate::ws::gateway::ConnectionCtx;

pub async fn dispatch(ctx: &ConnectionCtx, text: &str) {
    let event = match serde_json::from_str::<ClientEvent>(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::debug!(
                room = %ctx.room.name,
                user_id = ctx.identity.user_id,
                error = %e,
                "Undecodable client event"
            );
            ctx.send(&ServerEvent::Error {
                message: "Invalid event format".to_string(),
            });
            return;
        }
    };

    match event {
        ClientEvent::ChatMessage {
            message,
            product_id,
            media_data,
        } => handle_chat_message(ctx, message, product_id, media_data).await,
        ClientEvent::TypingIndicator { is_typing } => handle_typing(ctx, is_typing).await,
        ClientEvent::MarkRead => handle_mark_read(ctx).await,
        ClientEvent::Heartbeat { timestamp } => handle_heartbeat(ctx, timestamp),
        ClientEvent::JoinRoom => {
            // Already joined at connect time; acknowledge in the log only.
            tracing::debug!(
                room = %ctx.room.name,
                user_id = ctx.identity.user_id,
                "Redundant join_room event"
            );
        }
    }
}

/// Persist, enrich, fan out. The durable write settles before any
/// broadcast; catalog enrichment is best effort and never blocks
/// delivery beyond its own timeout.
async fn handle_chat_message(
    ctx: &ConnectionCtx,
    body: String,
    product_id: Option<i64>,
    media_data: Option<MediaData>,
) {
    let message = match messages::insert_message(
        &ctx.state.pool,
        ctx.room.id,
        &ctx.identity,
        &body,
        product_id,
        media_data.as_ref(),
    )
    .await
    {
        Ok(message) => message,
        Err(StoreError::Validation(msg)) => {
            ctx.send(&ServerEvent::Error {
                message: msg.to_string(),
            });
            return;
        }
        Err(StoreError::Database(e)) => {
            tracing::error!(room = %ctx.room.name, error = %e, "Message persist failed");
            ctx.send(&ServerEvent::Error {
                message: "Failed to send message".to_string(),
            });
            return;
        }
    };

    let product_info = match product_id {
        Some(id) => ctx.state.catalog.product_info(id).await,
        None => None,
    };

    let payload = MessagePayload::from_message(&message, &ctx.room.name, product_info);
    ctx.publish(ServerEvent::ChatMessage { message: payload }).await;
}

async fn handle_typing(ctx: &ConnectionCtx, is_typing: bool) {
    ctx.publish(ServerEvent::TypingStatus {
        user_id: ctx.identity.user_id,
        user_name: ctx.identity.name.clone(),
        is_typing,
        sender_role: ctx.identity.role,
        room_name: ctx.room.name.clone(),
    })
    .await;
}

/// Flip the room's unread messages and tell the room about it. A
/// no-op read (nothing was unread) broadcasts nothing.
async fn handle_mark_read(ctx: &ConnectionCtx) {
    let message_ids = match messages::mark_room_read(&ctx.state.pool, ctx.room.id).await {
        Ok(ids) => ids,
        Err(e) => {
            tracing::error!(room = %ctx.room.name, error = %e, "Mark read failed");
            ctx.send(&ServerEvent::Error {
                message: "Failed to mark messages read".to_string(),
            });
            return;
        }
    };

    if message_ids.is_empty() {
        return;
    }

    let notice = MessagesReadNotice::new(
        &ctx.room.name,
        ctx.identity.user_id,
        &ctx.identity.name,
        message_ids,
    );
    ctx.publish(ServerEvent::Notification {
        notification: notice,
    })
    .await;
}

/// Client heartbeats are answered directly, not broadcast. The client
/// timestamp echoes back so round-trip time is measurable client-side.
fn handle_heartbeat(ctx: &ConnectionCtx, timestamp: Option<String>) {
    ctx.send(&ServerEvent::HeartbeatAck {
        timestamp,
        server_time: OffsetDateTime::now_utc(),
    });
}
