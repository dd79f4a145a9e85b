//! Room registry
//!
//! Rooms are created on first join, keyed by client-supplied name.
//! Creation is idempotent under concurrency: the insert races are
//! settled by the unique constraint, and everyone re-reads the winner.

use sqlx::PgPool;
use time::OffsetDateTime;

use crate::auth::Identity;

use super::StoreError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Room {
    pub id: i64,
    pub name: String,
    pub buyer_id: Option<i64>,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    pub is_active: bool,
    pub created_at: OffsetDateTime,
}

/// Room list entry for the staff dashboard, with aggregates folded in.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct RoomSummary {
    pub id: i64,
    pub name: String,
    pub buyer_id: Option<i64>,
    pub buyer_name: Option<String>,
    pub buyer_email: Option<String>,
    pub is_active: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub message_count: i64,
    pub unread_count: i64,
    pub last_message: Option<String>,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_message_at: Option<OffsetDateTime>,
}

/// Find the room for a connection, creating it if this is the first
/// join. When a buyer joins, the room's buyer fields are reconciled to
/// the verified identity rather than trusted from the room name.
pub async fn resolve_or_create(
    pool: &PgPool,
    name: &str,
    identity: &Identity,
) -> Result<Room, StoreError> {
    if name.is_empty() || name.len() > 100 {
        return Err(StoreError::Validation("Invalid room name"));
    }

    let mut tx = pool.begin().await?;

    // Losing the insert race is fine; the re-read below picks up the winner.
    sqlx::query("INSERT INTO chat_rooms (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .execute(&mut *tx)
        .await?;

    let room = sqlx::query_as::<_, Room>(
        "SELECT id, name, buyer_id, buyer_name, buyer_email, is_active, created_at
         FROM chat_rooms WHERE name = $1",
    )
    .bind(name)
    .fetch_one(&mut *tx)
    .await?;

    let room = if identity.role.is_buyer() && room.buyer_id != Some(identity.user_id) {
        if let Some(existing) = room.buyer_id {
            tracing::warn!(
                room_name = %name,
                existing_buyer = existing,
                new_buyer = identity.user_id,
                "Room buyer reassigned on join"
            );
        }
        sqlx::query_as::<_, Room>(
            "UPDATE chat_rooms
             SET buyer_id = $1, buyer_name = $2, buyer_email = $3
             WHERE id = $4
             RETURNING id, name, buyer_id, buyer_name, buyer_email, is_active, created_at",
        )
        .bind(identity.user_id)
        .bind(&identity.name)
        .bind(&identity.email)
        .bind(room.id)
        .fetch_one(&mut *tx)
        .await?
    } else {
        room
    };

    tx.commit().await?;
    Ok(room)
}

pub async fn find_by_name(pool: &PgPool, name: &str) -> Result<Option<Room>, StoreError> {
    let room = sqlx::query_as::<_, Room>(
        "SELECT id, name, buyer_id, buyer_name, buyer_email, is_active, created_at
         FROM chat_rooms WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(room)
}

/// Room list for staff, most recently active first. `search` matches
/// room name, buyer name, or buyer email. Unread counts only cover
/// buyer messages, since that is what staff triage on.
pub async fn list_rooms(
    pool: &PgPool,
    search: Option<&str>,
) -> Result<Vec<RoomSummary>, StoreError> {
    let pattern = search.map(|s| format!("%{s}%"));

    let rooms = sqlx::query_as::<_, RoomSummary>(
        r#"
        SELECT
            r.id, r.name, r.buyer_id, r.buyer_name, r.buyer_email,
            r.is_active, r.created_at,
            COUNT(m.id) FILTER (WHERE NOT m.is_deleted) AS message_count,
            COUNT(m.id) FILTER (
                WHERE NOT m.is_read AND NOT m.is_deleted AND m.sender_role = 'buyer'
            ) AS unread_count,
            (
                SELECT LEFT(m2.body, 50) FROM chat_messages m2
                WHERE m2.room_id = r.id AND NOT m2.is_deleted
                ORDER BY m2.created_at DESC LIMIT 1
            ) AS last_message,
            MAX(m.created_at) FILTER (WHERE NOT m.is_deleted) AS last_message_at
        FROM chat_rooms r
        LEFT JOIN chat_messages m ON m.room_id = r.id
        WHERE r.is_active
          AND ($1::TEXT IS NULL
               OR r.name ILIKE $1
               OR r.buyer_name ILIKE $1
               OR r.buyer_email ILIKE $1)
        GROUP BY r.id
        ORDER BY MAX(m.created_at) DESC NULLS LAST, r.created_at DESC
        "#,
    )
    .bind(pattern)
    .fetch_all(pool)
    .await?;

    Ok(rooms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storechat_shared::Role;

    fn buyer_identity() -> Identity {
        Identity {
            user_id: 42,
            email: "buyer@example.com".to_string(),
            name: "Test Buyer".to_string(),
            role: Role::Buyer,
        }
    }

    async fn test_pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        storechat_shared::create_pool(&url, 5)
            .await
            .expect("pool creation failed")
    }

    #[tokio::test]
    async fn test_room_name_validation() {
        // Validation fires before any pool access, so a lazy pool works.
        let pool = PgPool::connect_lazy("postgres://unused/unused").expect("lazy pool");
        let result = resolve_or_create(&pool, "", &buyer_identity()).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));

        let long_name = "x".repeat(101);
        let result = resolve_or_create(&pool, &long_name, &buyer_identity()).await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
    }

    // Requires a running Postgres instance.
    #[tokio::test]
    #[ignore]
    async fn test_resolve_or_create_is_idempotent() {
        let pool = test_pool().await;
        let identity = buyer_identity();

        let first = resolve_or_create(&pool, "it-room-idem", &identity)
            .await
            .unwrap();
        let second = resolve_or_create(&pool, "it-room-idem", &identity)
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.buyer_id, Some(identity.user_id));
    }

    // Requires a running Postgres instance.
    #[tokio::test]
    #[ignore]
    async fn test_staff_join_does_not_claim_room() {
        let pool = test_pool().await;
        let staff = Identity {
            user_id: 7,
            email: "staff@example.com".to_string(),
            name: "Staff".to_string(),
            role: Role::Staff,
        };

        let room = resolve_or_create(&pool, "it-room-staff", &staff)
            .await
            .unwrap();
        assert_eq!(room.buyer_id, None);
    }
}
