//! Presence sessions
//!
//! One open session per (room, user), enforced by a partial unique
//! index. Reconnecting before the old session closed reuses the row
//! instead of stacking duplicates.

use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::Identity;

use super::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub id: i64,
    pub room_id: i64,
    pub user_id: i64,
    pub user_name: String,
    pub started_at: OffsetDateTime,
    pub ended_at: Option<OffsetDateTime>,
}

/// Open a presence session for a connection. If an open session
/// already exists for this (room, user) its start time resets; the
/// window is "currently connected", not connection history.
pub async fn open_session(
    pool: &PgPool,
    room_id: i64,
    identity: &Identity,
) -> Result<Session, StoreError> {
    let session = sqlx::query_as::<_, Session>(
        r#"
        INSERT INTO chat_sessions (room_id, user_id, user_name, user_email, user_role)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (room_id, user_id) WHERE ended_at IS NULL
        DO UPDATE SET started_at = NOW(), user_name = EXCLUDED.user_name
        RETURNING id, room_id, user_id, user_name, started_at, ended_at
        "#,
    )
    .bind(room_id)
    .bind(identity.user_id)
    .bind(&identity.name)
    .bind(&identity.email)
    .bind(identity.role.to_string())
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// Close a session. Closing twice is a no-op, so the gateway's drain
/// path stays idempotent even if teardown runs after a failed join.
pub async fn close_session(pool: &PgPool, session_id: i64) -> Result<(), StoreError> {
    sqlx::query("UPDATE chat_sessions SET ended_at = NOW() WHERE id = $1 AND ended_at IS NULL")
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use storechat_shared::Role;

    // Requires a running Postgres instance.
    #[tokio::test]
    #[ignore]
    async fn test_one_open_session_per_room_and_user() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = storechat_shared::create_pool(&url, 5).await.unwrap();
        let identity = Identity {
            user_id: 42,
            email: "buyer@example.com".to_string(),
            name: "Test Buyer".to_string(),
            role: Role::Buyer,
        };

        let room = crate::store::rooms::resolve_or_create(&pool, "it-room-sessions", &identity)
            .await
            .unwrap();

        let first = open_session(&pool, room.id, &identity).await.unwrap();
        let second = open_session(&pool, room.id, &identity).await.unwrap();
        // Reconnect reuses the open row.
        assert_eq!(first.id, second.id);

        close_session(&pool, second.id).await.unwrap();
        // Idempotent close.
        close_session(&pool, second.id).await.unwrap();

        let third = open_session(&pool, room.id, &identity).await.unwrap();
        assert_ne!(third.id, second.id);
        close_session(&pool, third.id).await.unwrap();
    }
}
