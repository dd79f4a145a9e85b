//! In-process broadcast backend
//!
//! Single-node fanout over a shared subscriber map. The default
//! backend for development and single-instance deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use super::{BroadcastBus, BusError, BusSubscription, GroupEvent};

type SubscriberMap = HashMap<String, HashMap<Uuid, mpsc::UnboundedSender<GroupEvent>>>;

#[derive(Default)]
pub struct LocalBus {
    groups: RwLock<SubscriberMap>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    async fn group_size(&self, group: &str) -> usize {
        self.groups
            .read()
            .await
            .get(group)
            .map(|subs| subs.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl BroadcastBus for LocalBus {
    async fn subscribe(&self, group: &str) -> Result<BusSubscription, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut groups = self.groups.write().await;
        groups.entry(group.to_string()).or_default().insert(id, tx);

        Ok(BusSubscription {
            id,
            group: group.to_string(),
            rx,
            forwarder: None,
        })
    }

    async fn unsubscribe(&self, subscription: &BusSubscription) {
        let mut groups = self.groups.write().await;
        if let Some(subs) = groups.get_mut(&subscription.group) {
            subs.remove(&subscription.id);
            if subs.is_empty() {
                groups.remove(&subscription.group);
            }
        }
    }

    async fn publish(&self, group: &str, event: GroupEvent) -> Result<(), BusError> {
        let groups = self.groups.read().await;
        if let Some(subs) = groups.get(group) {
            for tx in subs.values() {
                // A closed receiver means the connection is mid-teardown;
                // it will unsubscribe itself.
                let _ = tx.send(event.clone());
            }
        }
        Ok(())
    }
}
