use async_trait::async_trait;
use bb8_redis::RedisConnectionManager;
use redis::AsyncCommands;
use secrecy::ExposeSecret;

use super::{sort_subscribers, StoreError, SubscriberStore};
use crate::config::RedisSettings;
use crate::domain::subscriber::Subscriber;

/// Subscribers in a single Redis hash: field = email, value = MessagePack
/// encoded record.
#[derive(Clone)]
pub struct RedisSubscriberStore {
    pool: bb8::Pool<RedisConnectionManager>,
    key: String,
}

impl RedisSubscriberStore {
    pub fn new(pool: bb8::Pool<RedisConnectionManager>, key: String) -> Self {
        Self { pool, key }
    }

    pub async fn connect(config: &RedisSettings) -> Result<Self, StoreError> {
        let manager = RedisConnectionManager::new(config.url.expose_secret().as_str())?;
        let pool = bb8::Pool::builder()
            .max_size(config.max_connections)
            .build(manager)
            .await?;

        Ok(Self::new(pool, config.key.clone()))
    }
}

#[async_trait]
impl SubscriberStore for RedisSubscriberStore {
    #[tracing::instrument(name = "inserting new subscriber into redis", skip(self, subscriber), fields(email = %subscriber.email))]
    async fn add_if_absent(&self, subscriber: &Subscriber) -> Result<bool, StoreError> {
        let record = rmp_serde::to_vec_named(subscriber)?;
        let inserted: bool = self
            .pool
            .get()
            .await?
            .hset_nx(&self.key, subscriber.email.as_ref(), record)
            .await?;

        Ok(inserted)
    }

    #[tracing::instrument(name = "deleting subscriber from redis", skip(self))]
    async fn remove(&self, email: &str) -> Result<bool, StoreError> {
        let removed: u64 = self.pool.get().await?.hdel(&self.key, email).await?;
        Ok(removed > 0)
    }

    #[tracing::instrument(name = "listing subscribers from redis", skip(self))]
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        let records: Vec<Vec<u8>> = self.pool.get().await?.hvals(&self.key).await?;

        let mut subscribers = records
            .iter()
            .map(|record| rmp_serde::from_slice(record).map_err(StoreError::from))
            .collect::<Result<Vec<Subscriber>, _>>()?;
        sort_subscribers(&mut subscribers);

        Ok(subscribers)
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: u64 = self.pool.get().await?.hlen(&self.key).await?;
        Ok(count)
    }
}
