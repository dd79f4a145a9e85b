//! Redis pub/sub broadcast backend
//!
//! Spans the room fanout across processes. Each subscription holds a
//! dedicated pub/sub connection drained by a forwarder task; publishes
//! go through a shared multiplexed connection that reconnects on its
//! own.

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{BroadcastBus, BusError, BusSubscription, GroupEvent};

/// Channel key namespace. Keeps chat traffic apart from anything else
/// sharing the Redis instance.
fn channel_key(group: &str) -> String {
    format!("chat:{group}")
}

pub struct RedisBus {
    client: redis::Client,
    manager: ConnectionManager,
}

impl RedisBus {
    pub async fn connect(redis_url: &str) -> Result<Self, BusError> {
        let client = redis::Client::open(redis_url)?;
        let manager = ConnectionManager::new(client.clone()).await?;
        Ok(Self { client, manager })
    }
}

#[async_trait]
impl BroadcastBus for RedisBus {
    async fn subscribe(&self, group: &str) -> Result<BusSubscription, BusError> {
        let channel = channel_key(group);
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(&channel).await?;

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(async move {
            let mut stream = pubsub.on_message();
            while let Some(msg) = stream.next().await {
                let payload: String = match msg.get_payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Unreadable pub/sub payload");
                        continue;
                    }
                };
                match serde_json::from_str::<GroupEvent>(&payload) {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::warn!(channel = %channel, error = %e, "Undecodable group event");
                    }
                }
            }
        });

        Ok(BusSubscription {
            id: Uuid::new_v4(),
            group: group.to_string(),
            rx,
            forwarder: Some(forwarder),
        })
    }

    async fn unsubscribe(&self, subscription: &BusSubscription) {
        // The forwarder owns the pub/sub connection; aborting it drops
        // the connection and with it the server-side subscription.
        if let Some(handle) = &subscription.forwarder {
            handle.abort();
        }
    }

    async fn publish(&self, group: &str, event: GroupEvent) -> Result<(), BusError> {
        let payload = serde_json::to_string(&event)?;
        let mut conn = self.manager.clone();
        let _receivers: i64 = conn.publish(channel_key(group), payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::events::ServerEvent;

    #[test]
    fn test_channel_key_namespacing() {
        assert_eq!(channel_key("room-7"), "chat:room-7");
    }

    // Requires a running Redis instance.
    #[tokio::test]
    #[ignore]
    async fn test_round_trip_through_redis() {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let bus = RedisBus::connect(&url).await.unwrap();

        let mut sub = bus.subscribe("it-room").await.unwrap();
        // Give the subscription a moment to register server-side.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        bus.publish(
            "it-room",
            GroupEvent {
                origin_user_id: Some(1),
                event: ServerEvent::Error {
                    message: "probe".to_string(),
                },
            },
        )
        .await
        .unwrap();

        let received = tokio::time::timeout(std::time::Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.origin_user_id, Some(1));
        bus.unsubscribe(&sub).await;
    }
}
