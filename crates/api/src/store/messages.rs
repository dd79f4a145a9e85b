//! Message persistence
//!
//! Durable-before-fanout: a message row is committed before any
//! broadcast happens, so a reconnecting client can always recover the
//! full history. Deletion is a soft flag; deleted rows stay for audit
//! but drop out of every read path.

use sqlx::PgPool;
use storechat_shared::{MediaType, Role};
use time::OffsetDateTime;

use crate::auth::Identity;
use crate::ws::events::MediaData;

use super::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub user_email: Option<String>,
    pub body: String,
    pub sender_role: Role,
    pub product_id: Option<i64>,
    pub media_url: Option<String>,
    pub media_type: Option<MediaType>,
    pub media_filename: Option<String>,
    pub is_read: bool,
    pub is_deleted: bool,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// Unread-work snapshot for the staff dashboard.
#[derive(Debug, serde::Serialize)]
pub struct PendingStats {
    pub pending_count: i64,
    pub recent: Vec<PendingMessage>,
}

#[derive(Debug, sqlx::FromRow, serde::Serialize)]
pub struct PendingMessage {
    pub id: i64,
    pub room_name: String,
    pub user_name: String,
    pub body: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Engine-wide counters.
#[derive(Debug, serde::Serialize)]
pub struct ChatStats {
    pub total_rooms: i64,
    pub total_messages: i64,
    pub active_sessions: i64,
    pub buyer_messages: i64,
    pub staff_messages: i64,
}

const MESSAGE_BODY_MAX: usize = 10_000;

/// Persist a chat message. A message must carry text or media;
/// whitespace-only bodies without an attachment are rejected before
/// the database is touched.
pub async fn insert_message(
    pool: &PgPool,
    room_id: i64,
    sender: &Identity,
    body: &str,
    product_id: Option<i64>,
    media: Option<&MediaData>,
) -> Result<Message, StoreError> {
    if body.trim().is_empty() && media.is_none() {
        return Err(StoreError::Validation("Message cannot be empty"));
    }
    if body.len() > MESSAGE_BODY_MAX {
        return Err(StoreError::Validation("Message too long"));
    }

    let message = sqlx::query_as::<_, Message>(
        r#"
        INSERT INTO chat_messages
            (room_id, user_id, user_name, user_email, body, sender_role,
             product_id, media_url, media_type, media_filename)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        RETURNING id, room_id, user_id, user_name, user_email, body, sender_role,
                  product_id, media_url, media_type, media_filename,
                  is_read, is_deleted, created_at, updated_at
        "#,
    )
    .bind(room_id)
    .bind(sender.user_id)
    .bind(&sender.name)
    .bind(&sender.email)
    .bind(body)
    .bind(sender.role)
    .bind(product_id)
    .bind(media.map(|m| m.media_url.as_str()))
    .bind(media.map(|m| m.media_type))
    .bind(media.and_then(|m| m.media_filename.as_deref()))
    .fetch_one(pool)
    .await?;

    Ok(message)
}

/// Page through a room's history, oldest first. Soft-deleted messages
/// are invisible here.
pub async fn list_messages(
    pool: &PgPool,
    room_id: i64,
    page: i64,
    page_size: i64,
) -> Result<(Vec<Message>, i64), StoreError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chat_messages WHERE room_id = $1 AND NOT is_deleted",
    )
    .bind(room_id)
    .fetch_one(pool)
    .await?;

    let offset = (page - 1) * page_size;
    let messages = sqlx::query_as::<_, Message>(
        r#"
        SELECT id, room_id, user_id, user_name, user_email, body, sender_role,
               product_id, media_url, media_type, media_filename,
               is_read, is_deleted, created_at, updated_at
        FROM chat_messages
        WHERE room_id = $1 AND NOT is_deleted
        ORDER BY created_at ASC, id ASC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(room_id)
    .bind(page_size)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    Ok((messages, total))
}

/// Flip every unread, undeleted message in the room to read. Returns
/// the affected ids so the caller can notify the room; an empty result
/// means nothing changed and nothing should be broadcast.
pub async fn mark_room_read(pool: &PgPool, room_id: i64) -> Result<Vec<i64>, StoreError> {
    let ids: Vec<i64> = sqlx::query_scalar(
        r#"
        UPDATE chat_messages
        SET is_read = TRUE, updated_at = NOW()
        WHERE room_id = $1 AND NOT is_read AND NOT is_deleted
        RETURNING id
        "#,
    )
    .bind(room_id)
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Soft-delete a message. The row survives, reads skip it.
pub async fn soft_delete_message(
    pool: &PgPool,
    room_id: i64,
    message_id: i64,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        r#"
        UPDATE chat_messages
        SET is_deleted = TRUE, updated_at = NOW()
        WHERE id = $1 AND room_id = $2 AND NOT is_deleted
        "#,
    )
    .bind(message_id)
    .bind(room_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Unread buyer messages awaiting a staff reply, with the most recent
/// few for the dashboard preview.
pub async fn pending_stats(pool: &PgPool) -> Result<PendingStats, StoreError> {
    let pending_count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM chat_messages
        WHERE NOT is_read AND NOT is_deleted AND sender_role = 'buyer'
        "#,
    )
    .fetch_one(pool)
    .await?;

    let recent = sqlx::query_as::<_, PendingMessage>(
        r#"
        SELECT m.id, r.name AS room_name, m.user_name, LEFT(m.body, 50) AS body, m.created_at
        FROM chat_messages m
        JOIN chat_rooms r ON r.id = m.room_id
        WHERE NOT m.is_read AND NOT m.is_deleted AND m.sender_role = 'buyer'
        ORDER BY m.created_at DESC
        LIMIT 10
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(PendingStats {
        pending_count,
        recent,
    })
}

pub async fn chat_stats(pool: &PgPool) -> Result<ChatStats, StoreError> {
    let total_rooms: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_rooms WHERE is_active")
        .fetch_one(pool)
        .await?;

    let total_messages: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages WHERE NOT is_deleted")
            .fetch_one(pool)
            .await?;

    let active_sessions: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions WHERE ended_at IS NULL")
            .fetch_one(pool)
            .await?;

    let buyer_messages: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM chat_messages WHERE NOT is_deleted AND sender_role = 'buyer'",
    )
    .fetch_one(pool)
    .await?;

    Ok(ChatStats {
        total_rooms,
        total_messages,
        active_sessions,
        staff_messages: total_messages - buyer_messages,
        buyer_messages,
    })
}
