use anyhow::Result;
use event_notifier::{
    config::MessageDelivery,
    handlers::{Outcome, route},
    models::{document::collections, fcm::PushPayload},
    resolver::{SkipReason, aggregate, dispatch_all},
};
use serde_json::json;
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{body_partial_json, method, path},
};

use crate::common::{
    FCM_PATH, bodies_at, created, mount_fcm_ok, test_context, user_with_token,
};

/// Test: One rejected token does not stop delivery to the others
#[tokio::test]
async fn test_failed_token_does_not_affect_siblings() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;

    Mock::given(method("POST"))
        .and(path(FCM_PATH))
        .and(body_partial_json(json!({ "message": { "token": "tok-b" } })))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal"))
        .with_priority(1)
        .mount(&ctx.server)
        .await;
    mount_fcm_ok(&ctx.server).await;

    let tokens = vec![
        "tok-a".to_string(),
        "tok-b".to_string(),
        "tok-c".to_string(),
    ];
    let payload = PushPayload::new("Hola", "Mundo", "channel_chat");

    let attempts = dispatch_all(&ctx.context.fcm, &tokens, &payload).await;
    let result = aggregate(&attempts);

    assert_eq!(attempts.len(), 3);
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 1);
    assert!(result.processed());

    let failed: Vec<&str> = attempts
        .iter()
        .filter(|attempt| !attempt.is_success())
        .map(|attempt| attempt.token.as_str())
        .collect();
    assert_eq!(failed, vec!["tok-b"]);

    assert_eq!(bodies_at(&ctx.server, FCM_PATH).await.len(), 3);

    Ok(())
}

/// Test: An empty token list sends nothing
#[tokio::test]
async fn test_empty_token_list_sends_nothing() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    mount_fcm_ok(&ctx.server).await;

    let payload = PushPayload::new("Hola", "Mundo", "channel_chat");
    let attempts = dispatch_all(&ctx.context.fcm, &[], &payload).await;

    assert!(attempts.is_empty());
    assert!(!aggregate(&attempts).processed());
    assert!(bodies_at(&ctx.server, FCM_PATH).await.is_empty());

    Ok(())
}

/// Test: Shared tokens across recipients are pushed once, the sender never
#[tokio::test]
async fn test_push_mode_deduplicates_tokens_and_skips_sender() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    mount_fcm_ok(&ctx.server).await;

    ctx.store
        .insert(collections::USERS, "u1", user_with_token("u1", "tok-sender"));
    ctx.store
        .insert(collections::USERS, "u2", user_with_token("u2", "tok-shared"));
    ctx.store.insert(
        collections::USERS,
        "u3",
        json!({
            "fcmToken": "tok-shared",
            "fcmTokens": { "tablet": "tok-tablet" }
        }),
    );

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m1",
        json!({
            "senderId": "u1",
            "senderName": "Ana",
            "receiverId": "u2",
            "receiversIds": ["u2", "u3", "u1"],
            "type": "ANNOUNCEMENT",
            "content": "Reunión mañana",
            "conversationId": "c1"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;

    let Outcome::Delivered { result, .. } = outcome else {
        panic!("expected delivery, got {:?}", outcome);
    };
    assert_eq!(result.success_count, 2);
    assert_eq!(result.failure_count, 0);

    let bodies = bodies_at(&ctx.server, FCM_PATH).await;
    let mut tokens: Vec<&str> = bodies
        .iter()
        .filter_map(|body| body["message"]["token"].as_str())
        .collect();
    tokens.sort();
    assert_eq!(tokens, vec!["tok-shared", "tok-tablet"]);

    let message = &bodies[0]["message"];
    assert_eq!(message["notification"]["title"], "Nuevo mensaje de Ana");
    assert_eq!(message["data"]["tipo"], "ANNOUNCEMENT");
    assert_eq!(message["data"]["messageId"], "m1");
    assert_eq!(message["data"]["conversationId"], "c1");
    assert_eq!(
        message["android"]["notification"]["channel_id"],
        "channel_announcements"
    );

    Ok(())
}

/// Test: A recipient id that is not a document key resolves through the secondary key
#[tokio::test]
async fn test_identity_falls_back_to_secondary_key() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    mount_fcm_ok(&ctx.server).await;

    ctx.store.insert(
        collections::USERS,
        "auto-generated-id",
        user_with_token("12345678A", "tok-fallback"),
    );

    let profile = ctx
        .context
        .resolver
        .resolve_identity("12345678A")
        .await?
        .expect("profile found through dni");
    assert_eq!(profile.id, "auto-generated-id");

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m2",
        json!({
            "senderId": "u1",
            "receiverId": "12345678A",
            "content": "Hola"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;
    assert!(matches!(outcome, Outcome::Delivered { .. }));

    let bodies = bodies_at(&ctx.server, FCM_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["message"]["token"], "tok-fallback");

    Ok(())
}

/// Test: Recipients without a profile or tokens produce no dispatch
#[tokio::test]
async fn test_recipients_without_tokens_are_skipped() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    mount_fcm_ok(&ctx.server).await;

    ctx.store
        .insert(collections::USERS, "u2", json!({ "dni": "u2", "nombre": "Sin token" }));

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m3",
        json!({
            "senderId": "u1",
            "receiversIds": ["u2", "ghost"],
            "content": "Hola"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;

    assert!(matches!(
        outcome,
        Outcome::Skipped {
            reason: SkipReason::NoTokens
        }
    ));
    assert!(bodies_at(&ctx.server, FCM_PATH).await.is_empty());

    Ok(())
}

/// Test: A failing document store fails the invocation
#[tokio::test]
async fn test_store_failure_propagates() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    ctx.store.set_unavailable(true);

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m4",
        json!({ "senderId": "u1", "receiverId": "u2", "content": "Hola" }),
    );

    assert!(route(&ctx.context, &event).await.is_err());

    Ok(())
}
