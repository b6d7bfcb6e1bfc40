use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::MultiplexedConnection};
use tracing::{info, warn};

use crate::{
    clients::idempotency::IdempotencyStore,
    config::Config,
    models::{retry::RetryConfig, status::IdempotencyStatus},
    utils::retry_with_backoff,
};

pub struct RedisClient {
    connection: MultiplexedConnection,
    idempotency_ttl_seconds: u64,
    retry_config: RetryConfig,
}

impl RedisClient {
    pub async fn connect(config: &Config, redis_url: &str) -> Result<Self, Error> {
        info!("Connecting to Redis");

        let client =
            Client::open(redis_url).map_err(|_| anyhow!("Failed to create redis client"))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|_| anyhow!("Failed to connect to redis client"))?;

        info!("Redis connection established");

        Ok(Self {
            connection,
            idempotency_ttl_seconds: config.idempotency_ttl_seconds,
            retry_config: config.retry_config(),
        })
    }

    fn key(idempotency_key: &str) -> String {
        format!("idempotency:{}", idempotency_key)
    }

    async fn set_status(&self, idempotency_key: &str, status: &IdempotencyStatus) -> Result<(), Error> {
        let mut conn = self.connection.clone();

        conn.set_ex::<_, _, ()>(
            Self::key(idempotency_key),
            status.as_str(),
            self.idempotency_ttl_seconds,
        )
        .await
        .map_err(|e| anyhow!("Failed to mark value as {}: {}", status.as_str(), e))
    }
}

#[async_trait]
impl IdempotencyStore for RedisClient {
    async fn check_idempotency(&self, idempotency_key: &str) -> Result<IdempotencyStatus, Error> {
        let key = Self::key(idempotency_key);
        let mut conn = self.connection.clone();

        let value: Option<String> = conn
            .get(&key)
            .await
            .map_err(|_| anyhow!("Failed to get cached value"))?;

        let status = IdempotencyStatus::from_stored(value.as_deref());
        if status == IdempotencyStatus::NotFound && value.is_some() {
            warn!(key = %key, "Unknown idempotency status, treating as not found");
        }

        Ok(status)
    }

    async fn mark_as_processing(&self, idempotency_key: &str) -> Result<(), Error> {
        self.set_status(idempotency_key, &IdempotencyStatus::Processing)
            .await
    }

    async fn mark_as_sent(&self, idempotency_key: &str) -> Result<(), Error> {
        let key = Self::key(idempotency_key);

        retry_with_backoff(&self.retry_config, || {
            let key_clone = key.clone();
            let mut conn = self.connection.clone();
            let ttl = self.idempotency_ttl_seconds;

            async move {
                conn.set_ex::<_, _, ()>(&key_clone, "sent", ttl)
                    .await
                    .map_err(|e| e.to_string())
            }
        })
        .await
        .map_err(|e| anyhow!("mark_as_sent failed: {}", e))
    }

    async fn mark_as_failed(&self, idempotency_key: &str) -> Result<(), Error> {
        self.set_status(idempotency_key, &IdempotencyStatus::Failed)
            .await
    }

    async fn health_check(&self) -> Result<(), Error> {
        let mut conn = self.connection.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
