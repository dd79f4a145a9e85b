//! Read-model HTTP surface
//!
//! Staff dashboards and reconnecting clients read chat state here;
//! all live traffic goes over the WebSocket. Same store, same
//! authorization rules: staff see everything, a buyer sees only the
//! room they own.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use storechat_shared::PaginatedResponse;

use crate::auth::{require_staff, AuthUser, Identity};
use crate::bus::GroupEvent;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::store::{messages, rooms, Room};
use crate::ws::events::{MessagePayload, MessagesReadNotice, ServerEvent};

#[derive(Debug, Deserialize)]
pub struct RoomsQuery {
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl Pagination {
    fn resolve(&self) -> (i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(20).clamp(1, 100);
        (page, page_size)
    }
}

/// A buyer may only touch the room whose buyer_id matches their
/// verified identity; staff pass unconditionally.
fn authorize_room_access(identity: &Identity, room: &Room) -> Result<(), ApiError> {
    if identity.role.is_staff() || room.buyer_id == Some(identity.user_id) {
        Ok(())
    } else {
        Err(ApiError::Forbidden)
    }
}

async fn load_room(state: &AppState, room_name: &str) -> Result<Room, ApiError> {
    rooms::find_by_name(&state.pool, room_name)
        .await?
        .ok_or(ApiError::NotFound)
}

/// GET /api/v1/rooms
pub async fn list_rooms(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Query(query): Query<RoomsQuery>,
) -> ApiResult<Json<Value>> {
    require_staff(&identity)?;

    let rooms = rooms::list_rooms(&state.pool, query.search.as_deref()).await?;
    let count = rooms.len();
    Ok(Json(json!({ "rooms": rooms, "count": count })))
}

/// GET /api/v1/rooms/:room_name/messages
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_name): Path<String>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<PaginatedResponse<MessagePayload>>> {
    let room = load_room(&state, &room_name).await?;
    authorize_room_access(&identity, &room)?;

    let (page, page_size) = pagination.resolve();
    let (messages, total) = messages::list_messages(&state.pool, room.id, page, page_size).await?;

    let payloads = messages
        .iter()
        .map(|m| MessagePayload::from_message(m, &room.name, None))
        .collect();

    Ok(Json(PaginatedResponse::new(payloads, total, page, page_size)))
}

/// POST /api/v1/rooms/:room_name/read
///
/// Same semantics as the live mark_read event, for clients catching up
/// over HTTP. Live participants still hear about it through the bus.
pub async fn mark_read(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path(room_name): Path<String>,
) -> ApiResult<Json<Value>> {
    let room = load_room(&state, &room_name).await?;
    authorize_room_access(&identity, &room)?;

    let message_ids = messages::mark_room_read(&state.pool, room.id).await?;
    let count = message_ids.len();

    if count > 0 {
        let notice =
            MessagesReadNotice::new(&room.name, identity.user_id, &identity.name, message_ids);
        let event = GroupEvent {
            origin_user_id: Some(identity.user_id),
            event: ServerEvent::Notification {
                notification: notice,
            },
        };
        if let Err(e) = state.bus.publish(&room.name, event).await {
            tracing::warn!(room = %room.name, error = %e, "Read notification broadcast failed");
        }
    }

    Ok(Json(json!({ "count": count })))
}

/// DELETE /api/v1/rooms/:room_name/messages/:message_id
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
    Path((room_name, message_id)): Path<(String, i64)>,
) -> ApiResult<Json<Value>> {
    require_staff(&identity)?;

    let room = load_room(&state, &room_name).await?;
    if !messages::soft_delete_message(&state.pool, room.id, message_id).await? {
        return Err(ApiError::NotFound);
    }

    Ok(Json(json!({ "deleted": true })))
}

/// GET /api/v1/chat/stats
pub async fn stats(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Value>> {
    require_staff(&identity)?;

    let stats = messages::chat_stats(&state.pool).await?;
    Ok(Json(json!({ "stats": stats })))
}

/// GET /api/v1/chat/pending
pub async fn pending(
    State(state): State<AppState>,
    AuthUser(identity): AuthUser,
) -> ApiResult<Json<Value>> {
    require_staff(&identity)?;

    let pending = messages::pending_stats(&state.pool).await?;
    Ok(Json(json!({
        "pending_count": pending.pending_count,
        "recent": pending.recent,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use storechat_shared::Role;
    use time::OffsetDateTime;

    fn room_owned_by(buyer_id: Option<i64>) -> Room {
        Room {
            id: 1,
            name: "room-1".to_string(),
            buyer_id,
            buyer_name: None,
            buyer_email: None,
            is_active: true,
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn identity(user_id: i64, role: Role) -> Identity {
        Identity {
            user_id,
            email: "u@example.com".to_string(),
            name: "U".to_string(),
            role,
        }
    }

    #[test]
    fn test_staff_can_access_any_room() {
        let room = room_owned_by(Some(99));
        assert!(authorize_room_access(&identity(1, Role::Staff), &room).is_ok());
        assert!(authorize_room_access(&identity(1, Role::Admin), &room).is_ok());
    }

    #[test]
    fn test_buyer_limited_to_own_room() {
        let room = room_owned_by(Some(42));
        assert!(authorize_room_access(&identity(42, Role::Buyer), &room).is_ok());
        assert!(matches!(
            authorize_room_access(&identity(43, Role::Buyer), &room),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn test_buyer_denied_on_unclaimed_room() {
        let room = room_owned_by(None);
        assert!(matches!(
            authorize_room_access(&identity(42, Role::Buyer), &room),
            Err(ApiError::Forbidden)
        ));
    }

    #[test]
    fn test_pagination_defaults_and_clamping() {
        let (page, size) = Pagination {
            page: None,
            page_size: None,
        }
        .resolve();
        assert_eq!((page, size), (1, 20));

        let (page, size) = Pagination {
            page: Some(0),
            page_size: Some(5000),
        }
        .resolve();
        assert_eq!((page, size), (1, 100));
    }
}
