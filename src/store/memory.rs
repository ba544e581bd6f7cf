use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{sort_subscribers, StoreError, SubscriberStore};
use crate::domain::subscriber::Subscriber;

/// A process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySubscriberStore {
    subscribers: RwLock<HashMap<String, Subscriber>>,
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn add_if_absent(&self, subscriber: &Subscriber) -> Result<bool, StoreError> {
        let mut subscribers = self.subscribers.write().await;
        if subscribers.contains_key(subscriber.email.as_ref()) {
            return Ok(false);
        }
        subscribers.insert(subscriber.email.to_string(), subscriber.clone());
        Ok(true)
    }

    async fn remove(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.subscribers.write().await.remove(email).is_some())
    }

    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        let mut subscribers: Vec<Subscriber> =
            self.subscribers.read().await.values().cloned().collect();
        sort_subscribers(&mut subscribers);
        Ok(subscribers)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        Ok(self.subscribers.read().await.len() as u64)
    }
}
