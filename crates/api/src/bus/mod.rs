//! Broadcast bus
//!
//! Fanout seam between connections. A group key (the room name) maps
//! to the set of live subscriptions; publishing delivers a copy of the
//! event to every subscription in the group, including the
//! publisher's own. Per-recipient suppression (typing, offline) is the
//! gateway's job, keyed off `origin_user_id`.

pub mod local;
pub mod redis;

pub use local::LocalBus;
pub use redis::RedisBus;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ws::events::ServerEvent;

/// Event as carried on the bus. The origin travels with the payload so
/// a receiving connection can suppress its own typing/offline echoes
/// even when the event arrived from another process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupEvent {
    pub origin_user_id: Option<i64>,
    pub event: ServerEvent,
}

#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("Broadcast backend error: {0}")]
    Backend(String),
    #[error("Event codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

impl From<::redis::RedisError> for BusError {
    fn from(err: ::redis::RedisError) -> Self {
        BusError::Backend(err.to_string())
    }
}

/// Live membership in a group. Dropping the subscription tears down
/// any backend forwarder task; the owner should still call
/// `unsubscribe` for prompt group cleanup.
pub struct BusSubscription {
    pub(crate) id: Uuid,
    pub(crate) group: String,
    pub(crate) rx: mpsc::UnboundedReceiver<GroupEvent>,
    pub(crate) forwarder: Option<JoinHandle<()>>,
}

impl BusSubscription {
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Receive the next event for this subscription. Returns `None`
    /// once the backend side has gone away.
    pub async fn recv(&mut self) -> Option<GroupEvent> {
        self.rx.recv().await
    }
}

impl Drop for BusSubscription {
    fn drop(&mut self) {
        if let Some(handle) = self.forwarder.take() {
            handle.abort();
        }
    }
}

/// Fanout backend. `LocalBus` covers a single process; `RedisBus`
/// spans processes via pub/sub. Selected once at startup.
#[async_trait]
pub trait BroadcastBus: Send + Sync {
    async fn subscribe(&self, group: &str) -> Result<BusSubscription, BusError>;

    async fn unsubscribe(&self, subscription: &BusSubscription);

    async fn publish(&self, group: &str, event: GroupEvent) -> Result<(), BusError>;
}
