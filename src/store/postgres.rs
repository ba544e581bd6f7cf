use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use super::{StoreError, SubscriberStore};
use crate::config::DatabaseSettings;
use crate::domain::subscriber::Subscriber;

/// Subscribers in a Postgres table whose primary key is the email.
#[derive(Debug, Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct SubscriberRow {
    email: String,
    name: String,
    role: String,
    joined_at: DateTime<Utc>,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = StoreError;
    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        Ok(Self {
            name: row.name.try_into().map_err(StoreError::InvalidRecord)?,
            email: row.email.try_into().map_err(StoreError::InvalidRecord)?,
            role: row.role.try_into().map_err(StoreError::InvalidRecord)?,
            joined_at: row.joined_at,
        })
    }
}

impl PgSubscriberStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and bring the schema up to date.
    pub async fn connect(config: &DatabaseSettings) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(config.with_db())
            .await?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(sqlx::Error::from)?;

        Ok(Self::new(pool))
    }
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    #[tracing::instrument(name = "inserting new subscriber into the database", skip(self, subscriber), fields(email = %subscriber.email))]
    async fn add_if_absent(&self, subscriber: &Subscriber) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"insert into waitlist_subscribers (email, name, role, joined_at) values ($1, $2, $3, $4) on conflict (email) do nothing"#,
        )
        .bind(subscriber.email.as_ref())
        .bind(subscriber.name.as_ref())
        .bind(subscriber.role.as_str())
        .bind(subscriber.joined_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(detail = e.to_string(), "failed to save new subscriber");
            e
        })?;

        Ok(result.rows_affected() == 1)
    }

    #[tracing::instrument(name = "deleting subscriber from the database", skip(self))]
    async fn remove(&self, email: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(r#"delete from waitlist_subscribers where email = $1"#)
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(name = "listing subscribers from the database", skip(self))]
    async fn list(&self) -> Result<Vec<Subscriber>, StoreError> {
        sqlx::query_as::<_, SubscriberRow>(
            r#"
            select email, name, role, joined_at
            from waitlist_subscribers
            order by joined_at, email
            "#,
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Subscriber::try_from)
        .collect()
    }

    async fn count(&self) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar(r#"select count(*) from waitlist_subscribers"#)
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }
}
