use anyhow::Result;
use event_notifier::{
    config::MessageDelivery,
    handlers::{Outcome, route},
    models::{
        document::collections,
        event::{ChangeKind, TriggerEvent},
    },
    resolver::SkipReason,
};
use serde_json::json;
use wiremock::{
    Mock, ResponseTemplate,
    matchers::{method, path},
};

use crate::common::{
    FCM_PATH, RELAY_PATH, bodies_at, created, mount_fcm_ok, mount_relay_ok, test_context,
    user_with_token,
};

/// Test: Unified messages are relayed once with the deduplicated recipients
#[tokio::test]
async fn test_unified_message_is_relayed() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;
    mount_relay_ok(&ctx.server).await;

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m1",
        json!({
            "senderId": "u1",
            "senderName": "Ana",
            "receiverId": "u2",
            "receiversIds": ["u2", "u3", "u1"],
            "content": "Hola a todos",
            "conversationId": "c1"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;

    let Outcome::Relayed {
        recipients, error, ..
    } = outcome
    else {
        panic!("expected relay, got {:?}", outcome);
    };
    assert_eq!(recipients, vec!["u2", "u3"]);
    assert!(error.is_none());

    let bodies = bodies_at(&ctx.server, RELAY_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(
        bodies[0],
        json!({
            "messageId": "m1",
            "senderId": "u1",
            "participantsIds": ["u2", "u3"],
            "messageType": "CHAT",
            "messageContent": "Hola a todos",
            "messageTitle": "Nuevo mensaje de Ana",
            "conversationId": "c1"
        })
    );

    Ok(())
}

/// Test: Messages without content are not sent
#[tokio::test]
async fn test_empty_content_is_skipped() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;
    mount_relay_ok(&ctx.server).await;

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m2",
        json!({ "senderId": "u1", "receiverId": "u2", "content": "" }),
    );

    let outcome = route(&ctx.context, &event).await?;

    assert!(matches!(
        outcome,
        Outcome::Skipped {
            reason: SkipReason::EmptyContent
        }
    ));
    assert!(bodies_at(&ctx.server, RELAY_PATH).await.is_empty());

    Ok(())
}

/// Test: Linking-request messages are sent even without content
#[tokio::test]
async fn test_exempt_type_is_sent_without_content() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;
    mount_relay_ok(&ctx.server).await;

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m3",
        json!({
            "senderId": "u1",
            "receiverId": "u2",
            "type": "SOLICITUD_VINCULACION"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;

    assert!(matches!(outcome, Outcome::Relayed { .. }));

    let bodies = bodies_at(&ctx.server, RELAY_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["messageType"], "SOLICITUD_VINCULACION");
    assert_eq!(bodies[0]["messageContent"], "");

    Ok(())
}

/// Test: A message addressed only to its sender is not sent
#[tokio::test]
async fn test_sender_only_message_has_no_recipients() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;
    mount_relay_ok(&ctx.server).await;

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m4",
        json!({
            "senderId": "u1",
            "receiverId": "u1",
            "receiversIds": ["u1"],
            "content": "Nota personal"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;

    assert!(matches!(
        outcome,
        Outcome::Skipped {
            reason: SkipReason::NoRecipients
        }
    ));
    assert!(bodies_at(&ctx.server, RELAY_PATH).await.is_empty());

    Ok(())
}

/// Test: An unavailable relay is reported on the outcome, not raised
#[tokio::test]
async fn test_relay_failure_is_reported() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;

    Mock::given(method("POST"))
        .and(path(RELAY_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&ctx.server)
        .await;

    let event = created(
        collections::UNIFIED_MESSAGES,
        "m5",
        json!({ "senderId": "u1", "receiverId": "u2", "content": "Hola" }),
    );

    let outcome = route(&ctx.context, &event).await?;

    let Outcome::Relayed {
        response, error, ..
    } = outcome
    else {
        panic!("expected relay outcome, got {:?}", outcome);
    };
    assert!(response.is_none());
    assert!(error.is_some_and(|e| e.contains("503")));

    Ok(())
}

/// Test: Legacy messages relay their stored participant list
#[tokio::test]
async fn test_legacy_message_relays_participants() -> Result<()> {
    let ctx = test_context(MessageDelivery::Push).await;
    mount_relay_ok(&ctx.server).await;

    let event = created(
        collections::MESSAGES,
        "legacy-1",
        json!({
            "senderId": "u1",
            "participantsIds": ["u1", "u2"],
            "content": "Mensaje antiguo"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;
    assert!(matches!(outcome, Outcome::Relayed { .. }));

    let bodies = bodies_at(&ctx.server, RELAY_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["participantsIds"], json!(["u1", "u2"]));
    assert_eq!(bodies[0]["messageType"], "UNKNOWN");
    assert_eq!(bodies[0]["messageTitle"], "Nuevo mensaje");
    assert!(bodies[0].get("conversationId").is_none());

    Ok(())
}

/// Test: Activity logs are pushed with their defaults
#[tokio::test]
async fn test_activity_log_is_pushed() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;
    mount_fcm_ok(&ctx.server).await;

    ctx.store
        .insert(collections::USERS, "u2", user_with_token("u2", "tok-family"));

    let event = created(
        collections::ACTIVITY_LOGS,
        "log-1",
        json!({
            "senderId": "prof-1",
            "receiverId": "u2",
            "content": "Hoy ha comido bien"
        }),
    );

    let outcome = route(&ctx.context, &event).await?;
    assert!(matches!(outcome, Outcome::Delivered { .. }));

    let bodies = bodies_at(&ctx.server, FCM_PATH).await;
    assert_eq!(bodies.len(), 1);

    let message = &bodies[0]["message"];
    assert_eq!(message["token"], "tok-family");
    assert_eq!(message["notification"]["title"], "Nuevo registro de actividad");
    assert_eq!(message["data"]["tipo"], "DAILY_RECORD");
    assert_eq!(message["data"]["registroId"], "log-1");
    assert_eq!(message["android"]["notification"]["channel_id"], "channel_tareas");

    Ok(())
}

/// Test: Deletions and unrelated collections are ignored
#[tokio::test]
async fn test_unrouted_events_are_ignored() -> Result<()> {
    let ctx = test_context(MessageDelivery::Relay).await;

    let deleted = TriggerEvent {
        id: "evt-deleted".to_string(),
        kind: ChangeKind::Deleted,
        collection: collections::UNIFIED_MESSAGES.to_string(),
        document_id: "m1".to_string(),
        before: None,
        after: None,
    };
    assert!(matches!(route(&ctx.context, &deleted).await?, Outcome::Ignored));

    let unrelated = created("centros", "c1", json!({ "nombre": "Centro" }));
    assert!(matches!(route(&ctx.context, &unrelated).await?, Outcome::Ignored));

    let no_data = TriggerEvent {
        after: None,
        ..created(collections::UNIFIED_MESSAGES, "m1", json!({}))
    };
    assert!(matches!(
        route(&ctx.context, &no_data).await?,
        Outcome::Skipped {
            reason: SkipReason::NoData
        }
    ));

    assert!(ctx.server.received_requests().await.unwrap_or_default().is_empty());

    Ok(())
}
