pub mod admin;
pub mod claims;
pub mod deletion;
pub mod linking;
pub mod messages;

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    clients::{
        apps_script::AppsScriptClient, auth::IdentityToolkitClient, fcm::FcmClient,
        idempotency::IdempotencyStore, store::DocumentStore,
    },
    config::MessageDelivery,
    error::Result,
    models::{
        claims::CustomClaims,
        delivery::{AggregateResult, DeliveryAttempt},
        document::collections,
        event::{ChangeKind, TriggerEvent},
        status::{DeletionStatus, IdempotencyStatus},
    },
    resolver::{Resolver, SkipReason},
};

/// Clients shared by every handler, built once at start-up.
pub struct Context {
    pub store: Arc<dyn DocumentStore>,
    pub resolver: Resolver,
    pub fcm: FcmClient,
    pub relay: AppsScriptClient,
    pub auth: IdentityToolkitClient,
    pub message_delivery: MessageDelivery,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmailStatus {
    Sent,
    Failed { error: String },
    NoAddress,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Outcome {
    Ignored,
    Duplicate,
    Skipped {
        reason: SkipReason,
    },
    Relayed {
        recipients: Vec<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        response: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Delivered {
        result: AggregateResult,
        attempts: Vec<DeliveryAttempt>,
        #[serde(skip_serializing_if = "Option::is_none")]
        email: Option<EmailStatus>,
    },
    EmailOnly {
        email: EmailStatus,
    },
    ClaimsSynced {
        uid: String,
        claims: CustomClaims,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    DeletionProcessed {
        status: DeletionStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        uid: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub event_id: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Picks the handler for a document write.
pub async fn route(ctx: &Context, event: &TriggerEvent) -> Result<Outcome> {
    let id = event.document_id.as_str();

    let (Some(after), ChangeKind::Created | ChangeKind::Updated) = (&event.after, event.kind)
    else {
        return Ok(match event.kind {
            ChangeKind::Deleted => Outcome::Ignored,
            _ => Outcome::Skipped {
                reason: SkipReason::NoData,
            },
        });
    };

    match (event.collection.as_str(), event.kind) {
        (collections::UNIFIED_MESSAGES, ChangeKind::Created) => {
            messages::on_unified_message(ctx, id, after).await
        }
        (collections::MESSAGES, ChangeKind::Created) => {
            messages::on_legacy_message(ctx, id, after).await
        }
        (collections::ACTIVITY_LOGS, ChangeKind::Created) => {
            messages::on_activity_log(ctx, id, after).await
        }
        (collections::LINKING_REQUESTS, ChangeKind::Created) => {
            linking::on_created(ctx, id, after).await
        }
        (collections::LINKING_REQUESTS, ChangeKind::Updated) => match &event.before {
            Some(before) => linking::on_updated(ctx, id, before, after).await,
            None => Ok(Outcome::Skipped {
                reason: SkipReason::NoData,
            }),
        },
        (collections::DELETION_REQUESTS, ChangeKind::Created) => {
            deletion::on_created(ctx, id, after).await
        }
        (collections::USERS, ChangeKind::Created) => claims::on_user_created(ctx, id, after).await,
        (collections::USERS, ChangeKind::Updated) => match &event.before {
            Some(before) => claims::on_user_updated(ctx, id, before, after).await,
            None => Ok(Outcome::Skipped {
                reason: SkipReason::NoData,
            }),
        },
        _ => Ok(Outcome::Ignored),
    }
}

/// Routes an event at most once per event id. Idempotency-store failures
/// are logged and never block processing.
pub async fn handle_event(
    ctx: &Context,
    idempotency: &dyn IdempotencyStore,
    event: TriggerEvent,
) -> Result<EventResponse> {
    info!(
        event_id = %event.id,
        collection = %event.collection,
        document_id = %event.document_id,
        kind = ?event.kind,
        "Processing trigger event"
    );

    match idempotency.check_idempotency(&event.id).await {
        Ok(IdempotencyStatus::Sent) => {
            info!(event_id = %event.id, "Event already processed, skipping");
            return Ok(EventResponse {
                event_id: event.id,
                outcome: Outcome::Duplicate,
            });
        }
        Ok(IdempotencyStatus::Processing) => {
            info!(event_id = %event.id, "Event is being processed elsewhere, skipping");
            return Ok(EventResponse {
                event_id: event.id,
                outcome: Outcome::Duplicate,
            });
        }
        Ok(_) => {}
        Err(e) => warn!(event_id = %event.id, error = %e, "Idempotency check failed"),
    }

    if let Err(e) = idempotency.mark_as_processing(&event.id).await {
        warn!(event_id = %event.id, error = %e, "Failed to mark event as processing");
    }

    match route(ctx, &event).await {
        Ok(outcome) => {
            if let Err(e) = idempotency.mark_as_sent(&event.id).await {
                warn!(event_id = %event.id, error = %e, "Failed to mark event as processed");
            }

            Ok(EventResponse {
                event_id: event.id,
                outcome,
            })
        }
        Err(e) => {
            if let Err(mark_err) = idempotency.mark_as_failed(&event.id).await {
                warn!(event_id = %event.id, error = %mark_err, "Failed to mark event as failed");
            }
            Err(e)
        }
    }
}
