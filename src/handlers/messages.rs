use tracing::{info, warn};

use crate::{
    clients::apps_script::RelayMessage,
    config::MessageDelivery,
    error::{NotifierError, Result},
    handlers::{Context, Outcome},
    models::{
        document::Fields,
        event::EventRecord,
        fcm::{PushPayload, channel_for_message_type},
    },
    resolver::{
        RecipientSet, SkipReason, aggregate, compute_recipients, dispatch_all,
        participant_recipients,
    },
};

/// Types that are delivered even without text content.
const CONTENT_EXEMPT_TYPES: &[&str] = &["SOLICITUD_VINCULACION"];

fn requires_content(message_type: &str) -> bool {
    !CONTENT_EXEMPT_TYPES.contains(&message_type)
}

fn skipped(message_id: &str, reason: SkipReason) -> Result<Outcome> {
    info!(message_id, reason = ?reason, "Message not notified");
    Ok(Outcome::Skipped { reason })
}

pub async fn on_unified_message(ctx: &Context, message_id: &str, fields: &Fields) -> Result<Outcome> {
    let record = EventRecord::from_fields(fields);

    let recipients = match compute_recipients(&record) {
        Ok(recipients) => recipients,
        Err(reason) => return skipped(message_id, reason),
    };

    let message_type = record.kind.clone().unwrap_or_else(|| "CHAT".to_string());
    let content = record.content.clone().unwrap_or_default();

    if content.is_empty() && requires_content(&message_type) {
        return skipped(message_id, SkipReason::EmptyContent);
    }

    let sender_name = record.sender_name.as_deref().unwrap_or("Usuario");
    let title = record
        .title
        .clone()
        .unwrap_or_else(|| format!("Nuevo mensaje de {}", sender_name));
    let conversation_id = record.conversation_id.clone().unwrap_or_default();

    match ctx.message_delivery {
        MessageDelivery::Relay => {
            let message = RelayMessage {
                message_id: message_id.to_string(),
                sender_id: record.sender_id.clone(),
                participants_ids: recipients.into_vec(),
                message_type,
                message_content: content,
                message_title: title,
                conversation_id: Some(conversation_id),
            };
            Ok(relay(ctx, message).await)
        }
        MessageDelivery::Push => {
            let payload = PushPayload::new(title, content, channel_for_message_type(&message_type))
                .with_data("tipo", message_type)
                .with_data("messageId", message_id)
                .with_data("conversationId", conversation_id);
            push_to_recipients(ctx, message_id, &recipients, &payload).await
        }
    }
}

/// Older message documents that carry their own `participantsIds`.
pub async fn on_legacy_message(ctx: &Context, message_id: &str, fields: &Fields) -> Result<Outcome> {
    let record = EventRecord::from_fields(fields);

    let recipients = match participant_recipients(&record) {
        Ok(recipients) => recipients,
        Err(reason) => return skipped(message_id, reason),
    };

    let Some(content) = record.content.clone() else {
        return skipped(message_id, SkipReason::EmptyContent);
    };

    let title = match (&record.title, &record.sender_name) {
        (Some(title), _) => title.clone(),
        (None, Some(sender_name)) => format!("Nuevo mensaje de {}", sender_name),
        (None, None) => "Nuevo mensaje".to_string(),
    };

    let message = RelayMessage {
        message_id: message_id.to_string(),
        sender_id: record.sender_id.clone(),
        participants_ids: recipients.into_vec(),
        message_type: record.kind.clone().unwrap_or_else(|| "UNKNOWN".to_string()),
        message_content: content,
        message_title: title,
        conversation_id: None,
    };

    Ok(relay(ctx, message).await)
}

/// Activity log entries are always pushed directly.
pub async fn on_activity_log(ctx: &Context, log_id: &str, fields: &Fields) -> Result<Outcome> {
    let record = EventRecord::from_fields(fields);

    let recipients = match compute_recipients(&record) {
        Ok(recipients) => recipients,
        Err(reason) => return skipped(log_id, reason),
    };

    let log_type = record
        .kind
        .clone()
        .unwrap_or_else(|| "DAILY_RECORD".to_string());
    let content = record.content.clone().unwrap_or_default();

    if content.is_empty() && requires_content(&log_type) {
        return skipped(log_id, SkipReason::EmptyContent);
    }

    let title = record
        .title
        .clone()
        .unwrap_or_else(|| "Nuevo registro de actividad".to_string());

    let payload = PushPayload::new(title, content, channel_for_message_type(&log_type))
        .with_data("tipo", log_type)
        .with_data("registroId", log_id);

    push_to_recipients(ctx, log_id, &recipients, &payload).await
}

/// Relay failures are reported on the outcome, not raised.
async fn relay(ctx: &Context, message: RelayMessage) -> Outcome {
    let recipients = message.participants_ids.clone();

    match ctx.relay.relay_message(&message).await {
        Ok(response) => {
            info!(
                message_id = %message.message_id,
                recipients = recipients.len(),
                "Message forwarded to relay"
            );
            Outcome::Relayed {
                recipients,
                response: Some(response),
                error: None,
            }
        }
        Err(e) => {
            warn!(message_id = %message.message_id, error = %e, "Messaging relay unavailable");
            Outcome::Relayed {
                recipients,
                response: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn push_to_recipients(
    ctx: &Context,
    record_id: &str,
    recipients: &RecipientSet,
    payload: &PushPayload,
) -> Result<Outcome> {
    let tokens = ctx
        .resolver
        .resolve_recipient_tokens(recipients)
        .await
        .map_err(NotifierError::store)?;

    if tokens.is_empty() {
        return skipped(record_id, SkipReason::NoTokens);
    }

    let attempts = dispatch_all(&ctx.fcm, &tokens, payload).await;
    let result = aggregate(&attempts);

    info!(
        record_id,
        recipients = recipients.len(),
        success_count = result.success_count,
        failure_count = result.failure_count,
        "Push notifications dispatched"
    );

    Ok(Outcome::Delivered {
        result,
        attempts,
        email: None,
    })
}
