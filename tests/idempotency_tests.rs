use std::sync::Arc;

use anyhow::Result;
use event_notifier::{
    clients::{
        idempotency::{IdempotencyStore, InMemoryIdempotency},
        redis::RedisClient,
    },
    config::{Config, MessageDelivery},
    handlers::{Outcome, handle_event},
    models::{document::collections, status::IdempotencyStatus},
};
use serde_json::json;
use testcontainers::{
    GenericImage,
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
};

use crate::common::{RELAY_PATH, bodies_at, created, mount_relay_ok, test_context};

/// Test: The same event id is processed once
#[tokio::test]
async fn test_duplicate_events_are_deduplicated() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;
    mount_relay_ok(&ctx.server).await;
    let idempotency = InMemoryIdempotency::new(60);

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m1",
        json!({ "senderId": "u1", "receiverId": "u2", "content": "Hola" }),
    );

    let first = handle_event(&ctx.context, &idempotency, event.clone()).await?;
    assert!(matches!(first.outcome, Outcome::Relayed { .. }));
    assert_eq!(
        idempotency.check_idempotency(&event.id).await?,
        IdempotencyStatus::Sent
    );

    let second = handle_event(&ctx.context, &idempotency, event).await?;
    assert!(matches!(second.outcome, Outcome::Duplicate));

    assert_eq!(bodies_at(&ctx.server, RELAY_PATH).await.len(), 1);

    Ok(())
}

/// Test: A failed invocation can be retried
#[tokio::test]
async fn test_failed_events_are_retried() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    let idempotency = InMemoryIdempotency::new(60);

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m2",
        json!({ "senderId": "u1", "receiverId": "u2", "content": "Hola" }),
    );

    ctx.store.set_unavailable(true);
    assert!(handle_event(&ctx.context, &idempotency, event.clone()).await.is_err());
    assert_eq!(
        idempotency.check_idempotency(&event.id).await?,
        IdempotencyStatus::Failed
    );

    ctx.store.set_unavailable(false);
    let retried = handle_event(&ctx.context, &idempotency, event).await?;
    assert!(!matches!(retried.outcome, Outcome::Duplicate));

    Ok(())
}

/// Test: In-memory state is visible to synchronous callers
#[test]
fn test_in_memory_store_reports_processing() {
    let idempotency = InMemoryIdempotency::new(60);

    tokio_test::block_on(async {
        idempotency
            .mark_as_processing("evt-sync")
            .await
            .expect("mark processing");
    });

    let status = tokio_test::block_on(idempotency.check_idempotency("evt-sync"))
        .expect("check idempotency");
    assert_eq!(status, IdempotencyStatus::Processing);
    assert_eq!(idempotency.backend(), "memory");
}

fn redis_config(redis_url: &str) -> Result<Config> {
    let vars = vec![
        ("GCP_PROJECT_ID".to_string(), "test-project".to_string()),
        ("MESSAGING_RELAY_URL".to_string(), "http://relay".to_string()),
        ("EMAIL_RELAY_URL".to_string(), "http://email".to_string()),
        ("ADMIN_API_KEY".to_string(), "admin".to_string()),
        ("DELETE_USER_API_KEY".to_string(), "delete".to_string()),
        ("REDIS_URL".to_string(), redis_url.to_string()),
        ("IDEMPOTENCY_TTL_SECONDS".to_string(), "60".to_string()),
    ];
    Ok(envy::from_iter(vars)?)
}

/// Test: Redis tracks the full event lifecycle
#[tokio::test]
#[ignore = "requires a Docker daemon"]
async fn test_redis_state_transitions() -> Result<()> {
    let container = GenericImage::new("redis", "7.2.4")
        .with_exposed_port(6379.tcp())
        .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"))
        .start()
        .await?;

    let host = container.get_host().await?;
    let port = container.get_host_port_ipv4(6379.tcp()).await?;
    let redis_url = format!("redis://{}:{}", host, port);

    let config = redis_config(&redis_url)?;
    let redis: Arc<dyn IdempotencyStore> = Arc::new(RedisClient::connect(&config, &redis_url).await?);

    let key = format!("test_states_{}", uuid::Uuid::new_v4());

    assert_eq!(redis.check_idempotency(&key).await?, IdempotencyStatus::NotFound);

    redis.mark_as_processing(&key).await?;
    assert_eq!(redis.check_idempotency(&key).await?, IdempotencyStatus::Processing);

    redis.mark_as_sent(&key).await?;
    assert_eq!(redis.check_idempotency(&key).await?, IdempotencyStatus::Sent);

    redis.health_check().await?;
    assert_eq!(redis.backend(), "redis");

    Ok(())
}
