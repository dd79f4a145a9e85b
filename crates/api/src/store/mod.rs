//! Persistent chat state
//!
//! Rooms, messages, and presence sessions, all backed by Postgres.
//! Every write validates before touching the pool so a rejected event
//! never burns a round trip.

pub mod messages;
pub mod rooms;
pub mod sessions;

pub use messages::Message;
pub use rooms::Room;
pub use sessions::Session;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Validation error: {0}")]
    Validation(&'static str),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
