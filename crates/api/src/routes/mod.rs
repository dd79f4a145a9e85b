//! HTTP route configuration

pub mod chat;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::ws::ws_handler;

/// Build the complete application router
pub fn create_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/rooms", get(chat::list_rooms))
        .route("/rooms/:room_name/messages", get(chat::list_messages))
        .route("/rooms/:room_name/read", post(chat::mark_read))
        .route(
            "/rooms/:room_name/messages/:message_id",
            axum::routing::delete(chat::delete_message),
        )
        .route("/chat/stats", get(chat::stats))
        .route("/chat/pending", get(chat::pending));

    Router::new()
        .route("/health", get(health::health))
        .route("/health/liveness", get(health::liveness))
        .route("/health/readiness", get(health::readiness))
        .route("/ws/chat/:room_name", get(ws_handler))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
