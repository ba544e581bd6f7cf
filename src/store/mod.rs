//! Persistence of waitlist subscribers, keyed by normalized email address.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;

use crate::config::{Settings, StoreBackend};
use crate::domain::subscriber::Subscriber;

mod memory;
mod postgres;
mod redis;

pub use self::memory::InMemorySubscriberStore;
pub use self::postgres::PgSubscriberStore;
pub use self::redis::RedisSubscriberStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Postgres(#[from] sqlx::Error),

    #[error(transparent)]
    Redis(#[from] ::redis::RedisError),

    #[error("can't get a connection from the pool")]
    Pool(#[from] bb8::RunError<::redis::RedisError>),

    #[error(transparent)]
    Decode(#[from] rmp_serde::decode::Error),

    #[error(transparent)]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("stored subscriber record is invalid: {0}")]
    InvalidRecord(String),
}

/// Key-value storage for subscribers.
///
/// Implementations must make [`SubscriberStore::add_if_absent`] atomic: two
/// concurrent calls for the same email must never both report an insertion.
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Insert `subscriber` unless a record with the same email exists.
    /// Returns `true` when the record was inserted.
    async fn add_if_absent(&self, subscriber: &Subscriber) -> Result<bool, StoreError>;

    /// Remove the record stored under `email`. Returns `true` when a record
    /// was removed.
    async fn remove(&self, email: &str) -> Result<bool, StoreError>;

    /// All subscribers, oldest first.
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError>;

    async fn count(&self) -> Result<u64, StoreError>;
}

/// Open the backend selected in the configuration.
pub async fn connect(config: &Settings) -> anyhow::Result<Arc<dyn SubscriberStore>> {
    let store: Arc<dyn SubscriberStore> = match config.store.backend {
        StoreBackend::Memory => Arc::new(InMemorySubscriberStore::default()),
        StoreBackend::Postgres => Arc::new(
            PgSubscriberStore::connect(&config.database)
                .await
                .context("Could not connect to the database")?,
        ),
        StoreBackend::Redis => Arc::new(
            RedisSubscriberStore::connect(&config.redis)
                .await
                .context("Could not connect to redis")?,
        ),
    };

    tracing::info!(backend = ?config.store.backend, "subscriber store ready");
    Ok(store)
}

/// Oldest first; ties broken by email so the order is total.
pub(crate) fn sort_subscribers(subscribers: &mut [Subscriber]) {
    subscribers.sort_by(|a, b| {
        a.joined_at
            .cmp(&b.joined_at)
            .then_with(|| a.email.as_ref().cmp(b.email.as_ref()))
    });
}
