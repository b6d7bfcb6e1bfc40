use std::{
    collections::HashMap,
    sync::Mutex,
    time::{Duration, Instant},
};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;

use crate::models::status::IdempotencyStatus;

/// Per-event processing state, keyed by the trigger's event id.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    async fn check_idempotency(&self, key: &str) -> Result<IdempotencyStatus, Error>;

    async fn mark_as_processing(&self, key: &str) -> Result<(), Error>;

    async fn mark_as_sent(&self, key: &str) -> Result<(), Error>;

    async fn mark_as_failed(&self, key: &str) -> Result<(), Error>;

    async fn health_check(&self) -> Result<(), Error>;

    fn backend(&self) -> &'static str;
}

/// Used when no Redis is configured. Only deduplicates redeliveries that
/// reach the same process.
pub struct InMemoryIdempotency {
    entries: Mutex<HashMap<String, (IdempotencyStatus, Instant)>>,
    ttl: Duration,
}

impl InMemoryIdempotency {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_seconds),
        }
    }

    fn set(&self, key: &str, status: IdempotencyStatus) -> Result<(), Error> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Idempotency map lock poisoned"))?;

        let now = Instant::now();
        entries.retain(|_, (_, expires_at)| *expires_at > now);
        entries.insert(key.to_string(), (status, now + self.ttl));
        Ok(())
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotency {
    async fn check_idempotency(&self, key: &str) -> Result<IdempotencyStatus, Error> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("Idempotency map lock poisoned"))?;

        Ok(match entries.get(key) {
            Some((status, expires_at)) if *expires_at > Instant::now() => status.clone(),
            _ => IdempotencyStatus::NotFound,
        })
    }

    async fn mark_as_processing(&self, key: &str) -> Result<(), Error> {
        self.set(key, IdempotencyStatus::Processing)
    }

    async fn mark_as_sent(&self, key: &str) -> Result<(), Error> {
        self.set(key, IdempotencyStatus::Sent)
    }

    async fn mark_as_failed(&self, key: &str) -> Result<(), Error> {
        self.set(key, IdempotencyStatus::Failed)
    }

    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
